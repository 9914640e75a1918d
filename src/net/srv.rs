//! DNS SRV lookup
//!
//! Service records are looked up with the system resolver configuration.
//! Lookup failures are not errors: callers fall back to their configured
//! host list, so any failure yields an empty list.

use hickory_resolver::Resolver;
use rand::Rng;

/// One service record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    /// Target host name without the trailing root dot
    pub target: String,
}

/// Look up the SRV records published for `name`.
///
/// Records are returned in resolver order; see [`prioritize`] for RFC 2782
/// selection order.
pub fn srv_list(name: &str) -> Vec<SrvRecord> {
    let resolver = match Resolver::from_system_conf() {
        Ok(resolver) => resolver,
        Err(e) => {
            tracing::debug!(error = %e, "could not load system resolver configuration");
            return Vec::new();
        }
    };

    match resolver.srv_lookup(name) {
        Ok(lookup) => lookup
            .iter()
            .map(|srv| SrvRecord {
                priority: srv.priority(),
                weight: srv.weight(),
                port: srv.port(),
                target: srv.target().to_utf8().trim_end_matches('.').to_string(),
            })
            .collect(),
        Err(e) => {
            tracing::debug!(name, error = %e, "SRV lookup returned no records");
            Vec::new()
        }
    }
}

/// Order records for connection attempts: ascending priority, and weighted
/// random order within each priority (RFC 2782).
pub fn prioritize(records: Vec<SrvRecord>) -> Vec<SrvRecord> {
    prioritize_with(records, &mut rand::thread_rng())
}

pub fn prioritize_with<R: Rng>(mut records: Vec<SrvRecord>, rng: &mut R) -> Vec<SrvRecord> {
    records.sort_by_key(|r| r.priority);

    let mut ordered = Vec::with_capacity(records.len());
    let mut rest = records.into_iter().peekable();

    while let Some(first) = rest.next() {
        let priority = first.priority;
        let mut group = vec![first];
        while let Some(next) = rest.next_if(|r| r.priority == priority) {
            group.push(next);
        }

        // Zero-weight records go first so they are only chosen when the
        // random pick lands on zero.
        group.sort_by_key(|r| r.weight != 0);

        while !group.is_empty() {
            let total: u64 = group.iter().map(|r| u64::from(r.weight)).sum();
            let pick = rng.gen_range(0..=total);

            let mut running = 0u64;
            let index = group
                .iter()
                .position(|r| {
                    running += u64::from(r.weight);
                    running >= pick
                })
                .unwrap_or(0);

            ordered.push(group.remove(index));
        }
    }

    ordered
}

/// Host/port pairs for `name` in connection-attempt order
pub fn prioritized_hosts(name: &str) -> Vec<(String, u16)> {
    prioritize(srv_list(name))
        .into_iter()
        .map(|r| (r.target, r.port))
        .collect()
}
