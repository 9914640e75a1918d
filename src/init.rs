//! Process-wide initialisation
//!
//! The TLS library tables are set up exactly once, on first connection
//! construction. `openssl::init()` installs the locking callbacks required by
//! pre-1.1 OpenSSL and registers the library's own at-exit cleanup, so there
//! is no explicit teardown here.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialise the socket and TLS layers if that has not happened yet.
///
/// Safe to call from many threads; the body runs once.
pub fn ensure() {
    INIT.call_once(|| {
        openssl::init();

        // Writes on a socket the peer has closed must surface as EPIPE
        // instead of terminating the process.
        // SAFETY: installing SIG_IGN for SIGPIPE has no preconditions.
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }

        tracing::debug!(openssl = openssl::version::version(), "transport layer initialised");
    });
}

/// Whether [`ensure`] has completed
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
