use std::io::{self, Read};

/// Read-ahead wrapper that lets detection rewind a non-seekable stream.
///
/// `mark(limit)` starts recording everything read from the inner reader;
/// `reset()` replays from the mark. Once more than `limit` bytes have been
/// read past the mark, the mark is dropped and `reset()` fails, the same
/// contract as a buffered, markable input stream.
#[derive(Debug)]
pub struct MarkableReader<R> {
    inner: R,
    recorded: Vec<u8>,
    /// Replay cursor into `recorded`
    pos: usize,
    limit: usize,
    marked: bool,
}

impl<R: Read> MarkableReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
            pos: 0,
            limit: 0,
            marked: false,
        }
    }

    /// Set the mark at the current position
    pub fn mark(&mut self, limit: usize) {
        // Keep the not-yet-replayed tail so nothing already buffered is lost
        self.recorded.drain(..self.pos);
        self.pos = 0;
        self.limit = limit;
        self.marked = true;
    }

    /// Rewind to the last mark
    pub fn reset(&mut self) -> io::Result<()> {
        if !self.marked {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "stream mark is not set or was invalidated",
            ));
        }
        self.pos = 0;
        Ok(())
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    fn invalidate(&mut self) {
        self.marked = false;
        self.recorded.clear();
        self.pos = 0;
    }
}

impl<R: Read> Read for MarkableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pos < self.recorded.len() {
            let available = &self.recorded[self.pos..];
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            self.pos += n;
            return Ok(n);
        }

        let n = self.inner.read(buf)?;

        if self.marked {
            if self.recorded.len() + n > self.limit {
                tracing::debug!(limit = self.limit, "read past mark limit, mark invalidated");
                self.invalidate();
            } else {
                self.recorded.extend_from_slice(&buf[..n]);
                self.pos = self.recorded.len();
            }
        } else if !self.recorded.is_empty() {
            // Replay finished without a mark; release the buffer
            self.recorded.clear();
            self.pos = 0;
        }

        Ok(n)
    }
}
