//! Order-preserving latch for deferred output

use parking_lot::{Condvar, Mutex};

use super::Writer;
use crate::error::{MustacheError, Result};

enum Status {
    Pending,
    Done(Writer),
    Failed(MustacheError),
}

struct State {
    buffer: String,
    status: Status,
}

/// Stands in for a writer while deferred work is outstanding.
///
/// Everything rendered after a deferred tag is written to the latch and
/// buffered. When the work completes, the buffer is flushed once into the
/// writer the work ended with, and later writes pass straight through to it.
/// Output therefore lands in document order whatever order the work finishes
/// in, and no worker ever blocks waiting for another.
pub struct Latch {
    state: Mutex<State>,
    settled: Condvar,
}

impl Latch {
    /// Create a pending latch
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                buffer: String::new(),
                status: Status::Pending,
            }),
            settled: Condvar::new(),
        }
    }

    /// Whether the deferred work has completed or failed
    pub fn is_settled(&self) -> bool {
        !matches!(self.state.lock().status, Status::Pending)
    }

    pub(crate) fn write_str(&self, text: &str) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match &state.status {
            Status::Pending => {
                state.buffer.push_str(text);
                Ok(())
            }
            // Forward under the lock so a concurrent `complete` cannot reorder
            Status::Done(target) => target.write_str(text),
            Status::Failed(error) => Err(error.clone()),
        }
    }

    /// Settle the latch: flush buffered output into `target` and pass
    /// through to it from now on.
    pub(crate) fn complete(&self, target: Writer) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let buffered = std::mem::take(&mut state.buffer);
        let flushed = if buffered.is_empty() {
            Ok(())
        } else {
            target.write_str(&buffered)
        };
        state.status = match &flushed {
            Ok(()) => Status::Done(target),
            Err(error) => Status::Failed(error.clone()),
        };
        self.settled.notify_all();
        flushed
    }

    /// Settle the latch as failed, discarding buffered output.
    pub(crate) fn fail(&self, error: MustacheError) {
        let mut state = self.state.lock();
        state.buffer.clear();
        state.status = Status::Failed(error);
        self.settled.notify_all();
    }

    /// Block until settled, returning the writer output continues into.
    pub(crate) fn wait(&self) -> Result<Writer> {
        let mut state = self.state.lock();
        loop {
            match &state.status {
                Status::Done(target) => return Ok(target.clone()),
                Status::Failed(error) => return Err(error.clone()),
                Status::Pending => self.settled.wait(&mut state),
            }
        }
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Latch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        let status = match state.status {
            Status::Pending => "pending",
            Status::Done(_) => "done",
            Status::Failed(_) => "failed",
        };
        f.debug_struct("Latch")
            .field("status", &status)
            .field("buffered", &state.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::error::RenderError;

    #[test]
    fn test_buffers_until_complete() {
        let (root, output) = Writer::buffer();
        let latch = Latch::new();
        latch.write_str("after").unwrap();
        assert_eq!(output.lock().as_str(), "");

        root.write_str("before ").unwrap();
        latch.complete(root).unwrap();
        assert_eq!(output.lock().as_str(), "before after");

        latch.write_str("!").unwrap();
        assert_eq!(output.lock().as_str(), "before after!");
    }

    #[test]
    fn test_failure_surfaces_on_write_and_wait() {
        let latch = Latch::new();
        latch.fail(
            RenderError::DeferredFailure {
                name: "x".to_string(),
                message: "boom".to_string(),
            }
            .into(),
        );
        assert!(latch.is_settled());
        assert!(latch.write_str("text").is_err());
        assert!(latch.wait().is_err());
    }

    #[test]
    fn test_wait_releases_when_completed_elsewhere() {
        let (root, output) = Writer::buffer();
        let latch = Arc::new(Latch::new());
        latch.write_str("tail").unwrap();

        let worker = {
            let latch = Arc::clone(&latch);
            let root = root.clone();
            thread::spawn(move || {
                root.write_str("head-").unwrap();
                latch.complete(root).unwrap();
            })
        };

        let next = latch.wait().unwrap();
        worker.join().unwrap();
        next.finish().unwrap();
        assert_eq!(output.lock().as_str(), "head-tail");
    }
}
