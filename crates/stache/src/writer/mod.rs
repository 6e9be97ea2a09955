//! Output writers and the deferred-output chain
//!
//! Rendering threads a [`Writer`] through every node: each node writes to the
//! writer it is given and returns the writer the next node should use. A
//! deferred tag returns a [`Latch`] in place of the writer it was given, so
//! everything after it is buffered until the deferred work has written its
//! own output.

mod latch;

pub use latch::Latch;

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// A destination for rendered text.
pub trait Sink: Send {
    /// Append text.
    fn write_str(&mut self, text: &str) -> io::Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for String {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.push_str(text);
        Ok(())
    }
}

/// Adapts any [`io::Write`] into a [`Sink`].
#[derive(Debug)]
pub struct IoSink<W>(pub W);

impl<W: io::Write + Send> Sink for IoSink<W> {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.0.write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// A handle to the current position in the output stream.
///
/// Cloning a writer shares the destination.
#[derive(Clone)]
pub enum Writer {
    /// In-memory buffer
    Buffer(Arc<Mutex<String>>),

    /// Arbitrary sink
    Sink(Arc<Mutex<Box<dyn Sink>>>),

    /// Placeholder for output that follows outstanding deferred work
    Latched(Arc<Latch>),
}

impl Writer {
    /// A writer into a fresh in-memory buffer, and the buffer itself.
    pub fn buffer() -> (Writer, Arc<Mutex<String>>) {
        let buffer = Arc::new(Mutex::new(String::new()));
        (Writer::Buffer(Arc::clone(&buffer)), buffer)
    }

    /// A writer into `sink`.
    pub fn sink(sink: impl Sink + 'static) -> Writer {
        let boxed: Box<dyn Sink> = Box::new(sink);
        Writer::Sink(Arc::new(Mutex::new(boxed)))
    }

    /// A writer into an [`io::Write`] destination.
    pub fn io<W: io::Write + Send + 'static>(out: W) -> Writer {
        Writer::sink(IoSink(out))
    }

    /// Append text at this position.
    pub fn write_str(&self, text: &str) -> Result<()> {
        match self {
            Writer::Buffer(buffer) => {
                buffer.lock().push_str(text);
                Ok(())
            }
            Writer::Sink(sink) => Ok(sink.lock().write_str(text)?),
            Writer::Latched(latch) => latch.write_str(text),
        }
    }

    /// Flush the destination without waiting for deferred work.
    pub fn flush(&self) -> Result<()> {
        match self {
            Writer::Buffer(_) | Writer::Latched(_) => Ok(()),
            Writer::Sink(sink) => Ok(sink.lock().flush()?),
        }
    }

    /// Whether this writer is waiting on deferred work
    pub fn is_latched(&self) -> bool {
        matches!(self, Writer::Latched(_))
    }

    /// Wait for all deferred work behind this writer, then flush.
    ///
    /// Returns the first deferred failure encountered along the chain.
    pub fn finish(self) -> Result<()> {
        let mut current = self;
        loop {
            match current {
                Writer::Latched(latch) => current = latch.wait()?,
                other => return other.flush(),
            }
        }
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Writer::Buffer(buffer) => write!(f, "Writer::Buffer({} bytes)", buffer.lock().len()),
            Writer::Sink(_) => write!(f, "Writer::Sink"),
            Writer::Latched(latch) => write!(f, "Writer::Latched({:?})", latch),
        }
    }
}
