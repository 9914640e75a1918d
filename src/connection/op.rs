//! Read and write operation objects
//!
//! An operation borrows a connection and caller-owned buffers for its
//! lifetime. It is driven either incrementally with [`IoOp::cont`], which
//! makes one non-blocking attempt per call, or to completion with
//! [`IoOp::wait`].
//!
//! "Full" operations ([`ReadOp`], [`WriteOp`]) transfer every byte of one or
//! more buffer segments; "some" operations ([`ReadSomeOp`], [`WriteSomeOp`])
//! complete on the first non-zero transfer.

use super::Stream;
use crate::error::{Error, Result};

/// Progress of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    NotStarted,
    InProgress,
    /// Finished with the given byte count
    Completed(usize),
}

/// Common operation interface
pub trait IoOp {
    /// Make one non-blocking attempt. Returns true once completed.
    fn cont(&mut self) -> Result<bool>;

    /// Block until completed and return the byte count
    fn wait(&mut self) -> Result<usize>;

    /// Mark an unfinished operation completed with zero bytes.
    ///
    /// Bytes may already have crossed the wire; this only stops the
    /// operation from being driven further.
    fn cancel(&mut self);

    fn state(&self) -> OpState;

    fn is_completed(&self) -> bool {
        matches!(self.state(), OpState::Completed(_))
    }

    /// Byte count once completed
    fn result(&self) -> Option<usize> {
        match self.state() {
            OpState::Completed(n) => Some(n),
            _ => None,
        }
    }
}

/// Cursor over a list of buffer segments
#[derive(Debug)]
struct Segments<B> {
    bufs: Vec<B>,
    index: usize,
    offset: usize,
    total: usize,
}

impl<B: AsRef<[u8]>> Segments<B> {
    fn new(bufs: Vec<B>) -> Self {
        let total = bufs.iter().map(|b| b.as_ref().len()).sum();
        let mut segments = Segments {
            bufs,
            index: 0,
            offset: 0,
            total,
        };
        segments.settle();
        segments
    }

    fn is_done(&self) -> bool {
        self.index == self.bufs.len()
    }

    fn advance(&mut self, n: usize) {
        self.offset += n;
        self.settle();
    }

    /// Step past filled (or empty) segments
    fn settle(&mut self) {
        while !self.is_done() && self.offset == self.bufs[self.index].as_ref().len() {
            self.index += 1;
            self.offset = 0;
        }
    }

    fn remaining_in_segment(&self) -> usize {
        self.bufs[self.index].as_ref().len() - self.offset
    }
}

impl<'a> Segments<&'a mut [u8]> {
    fn current_mut(&mut self) -> &mut [u8] {
        let offset = self.offset;
        &mut self.bufs[self.index][offset..]
    }
}

impl<'a> Segments<&'a [u8]> {
    fn current(&self) -> &[u8] {
        &self.bufs[self.index][self.offset..]
    }
}

fn cancel_state(state: &mut OpState) {
    if !matches!(state, OpState::Completed(_)) {
        *state = OpState::Completed(0);
    }
}

/// Read exactly enough bytes to fill every segment
pub struct ReadOp<'a, S: Stream + ?Sized> {
    stream: &'a mut S,
    segments: Segments<&'a mut [u8]>,
    state: OpState,
}

impl<'a, S: Stream + ?Sized> ReadOp<'a, S> {
    /// Fails with [`Error::EndOfStream`] if the stream is not open
    pub fn new<I>(stream: &'a mut S, bufs: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a mut [u8]>,
    {
        if !stream.is_open() {
            return Err(Error::EndOfStream);
        }

        let segments = Segments::new(bufs.into_iter().collect());
        let state = if segments.is_done() {
            OpState::Completed(0)
        } else {
            OpState::NotStarted
        };

        Ok(ReadOp {
            stream,
            segments,
            state,
        })
    }

    fn finish_if_done(&mut self) -> bool {
        if self.segments.is_done() {
            self.state = OpState::Completed(self.segments.total);
        }
        self.segments.is_done()
    }
}

impl<'a, S: Stream + ?Sized> IoOp for ReadOp<'a, S> {
    fn cont(&mut self) -> Result<bool> {
        if self.is_completed() {
            return Ok(true);
        }

        self.state = OpState::InProgress;
        let n = self.stream.recv_some(self.segments.current_mut(), false)?;
        self.segments.advance(n);
        Ok(self.finish_if_done())
    }

    fn wait(&mut self) -> Result<usize> {
        while !self.is_completed() {
            self.state = OpState::InProgress;
            let n = self.segments.remaining_in_segment();
            self.stream.recv_exact(self.segments.current_mut())?;
            self.segments.advance(n);
            self.finish_if_done();
        }
        Ok(self.result().unwrap_or(0))
    }

    fn cancel(&mut self) {
        cancel_state(&mut self.state);
    }

    fn state(&self) -> OpState {
        self.state
    }
}

/// Write every byte of every segment
pub struct WriteOp<'a, S: Stream + ?Sized> {
    stream: &'a mut S,
    segments: Segments<&'a [u8]>,
    state: OpState,
}

impl<'a, S: Stream + ?Sized> WriteOp<'a, S> {
    /// Fails with [`Error::NotConnected`] if the stream is not open
    pub fn new<I>(stream: &'a mut S, bufs: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        if !stream.is_open() {
            return Err(Error::NotConnected);
        }

        let segments = Segments::new(bufs.into_iter().collect());
        let state = if segments.is_done() {
            OpState::Completed(0)
        } else {
            OpState::NotStarted
        };

        Ok(WriteOp {
            stream,
            segments,
            state,
        })
    }

    fn finish_if_done(&mut self) -> bool {
        if self.segments.is_done() {
            self.state = OpState::Completed(self.segments.total);
        }
        self.segments.is_done()
    }
}

impl<'a, S: Stream + ?Sized> IoOp for WriteOp<'a, S> {
    fn cont(&mut self) -> Result<bool> {
        if self.is_completed() {
            return Ok(true);
        }

        self.state = OpState::InProgress;
        let n = self.stream.send_some(self.segments.current(), false)?;
        self.segments.advance(n);
        Ok(self.finish_if_done())
    }

    fn wait(&mut self) -> Result<usize> {
        while !self.is_completed() {
            self.state = OpState::InProgress;
            let n = self.segments.remaining_in_segment();
            self.stream.send_all(self.segments.current())?;
            self.segments.advance(n);
            self.finish_if_done();
        }
        Ok(self.result().unwrap_or(0))
    }

    fn cancel(&mut self) {
        cancel_state(&mut self.state);
    }

    fn state(&self) -> OpState {
        self.state
    }
}

/// Read whatever is available, at least one byte
pub struct ReadSomeOp<'a, S: Stream + ?Sized> {
    stream: &'a mut S,
    buf: &'a mut [u8],
    state: OpState,
}

impl<'a, S: Stream + ?Sized> ReadSomeOp<'a, S> {
    pub fn new(stream: &'a mut S, buf: &'a mut [u8]) -> Result<Self> {
        if !stream.is_open() {
            return Err(Error::EndOfStream);
        }

        let state = if buf.is_empty() {
            OpState::Completed(0)
        } else {
            OpState::NotStarted
        };
        Ok(ReadSomeOp { stream, buf, state })
    }

    fn step(&mut self, wait: bool) -> Result<bool> {
        if self.is_completed() {
            return Ok(true);
        }

        self.state = OpState::InProgress;
        let n = self.stream.recv_some(self.buf, wait)?;
        if n > 0 {
            self.state = OpState::Completed(n);
        }
        Ok(n > 0)
    }
}

impl<'a, S: Stream + ?Sized> IoOp for ReadSomeOp<'a, S> {
    fn cont(&mut self) -> Result<bool> {
        self.step(false)
    }

    fn wait(&mut self) -> Result<usize> {
        while !self.step(true)? {}
        Ok(self.result().unwrap_or(0))
    }

    fn cancel(&mut self) {
        cancel_state(&mut self.state);
    }

    fn state(&self) -> OpState {
        self.state
    }
}

/// Write as much as the stream accepts, at least one byte
pub struct WriteSomeOp<'a, S: Stream + ?Sized> {
    stream: &'a mut S,
    buf: &'a [u8],
    state: OpState,
}

impl<'a, S: Stream + ?Sized> WriteSomeOp<'a, S> {
    pub fn new(stream: &'a mut S, buf: &'a [u8]) -> Result<Self> {
        if !stream.is_open() {
            return Err(Error::NotConnected);
        }

        let state = if buf.is_empty() {
            OpState::Completed(0)
        } else {
            OpState::NotStarted
        };
        Ok(WriteSomeOp { stream, buf, state })
    }

    fn step(&mut self, wait: bool) -> Result<bool> {
        if self.is_completed() {
            return Ok(true);
        }

        self.state = OpState::InProgress;
        let n = self.stream.send_some(self.buf, wait)?;
        if n > 0 {
            self.state = OpState::Completed(n);
        }
        Ok(n > 0)
    }
}

impl<'a, S: Stream + ?Sized> IoOp for WriteSomeOp<'a, S> {
    fn cont(&mut self) -> Result<bool> {
        self.step(false)
    }

    fn wait(&mut self) -> Result<usize> {
        while !self.step(true)? {}
        Ok(self.result().unwrap_or(0))
    }

    fn cancel(&mut self) {
        cancel_state(&mut self.state);
    }

    fn state(&self) -> OpState {
        self.state
    }
}
