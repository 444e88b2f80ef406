use std::io::{self, Write};

use log::{trace, warn};

pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// A writer that hands bytes to `inner` only in whole blocks of `capacity`
/// bytes, plus one final partial block when closed.
///
/// [`close`](BlockSink::close) reports errors from that last flush. A sink
/// that is dropped instead still flushes its partial block, but can only log
/// a failure.
#[derive(Debug)]
pub struct BlockSink<W: Write> {
    // Only `None` once `close` has taken it.
    inner: Option<W>,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: Write> BlockSink<W> {
    pub fn new(inner: W) -> Self {
        Self::with_capacity(DEFAULT_BLOCK_SIZE, inner)
    }

    /// A `capacity` of zero is treated as one.
    pub fn with_capacity(capacity: usize, inner: W) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Some(inner),
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes accepted but not yet handed to the inner writer.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        if let Some(inner) = self.inner.as_mut() {
            trace!("flushing {} byte block", self.buf.len());
            inner.write_all(&self.buf)?;
        }
        self.buf.clear();
        Ok(())
    }

    /// Flushes the remaining partial block and returns the inner writer.
    pub fn close(mut self) -> io::Result<W> {
        let flushed = self.flush_block();
        // Never retried from `drop`, part of the block may already be written.
        self.buf.clear();
        flushed?;
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| io::Error::other("block sink already closed"))?;
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for BlockSink<W> {
    /// Accepts at most what fits in the current block. A full block is handed
    /// on before anything from `data` is taken, so an error means nothing
    /// from `data` was accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() == self.capacity {
            self.flush_block()?;
        }
        let n = (self.capacity - self.buf.len()).min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        Ok(n)
    }

    /// Pushes out the partial block early, breaking the whole-block pattern.
    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for BlockSink<W> {
    fn drop(&mut self) {
        let pending = self.buf.len();
        if let Err(err) = self.flush_block() {
            warn!("block sink dropped with {pending} unflushed bytes: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Remembers the size of every write it receives.
    #[derive(Default)]
    struct Blocks {
        writes: Vec<usize>,
        data: Vec<u8>,
    }

    impl Write for &mut Blocks {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.len());
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Broken;

    /// Fails its first write, then records everything.
    #[derive(Default)]
    struct FailOnce {
        failed: bool,
        data: Vec<u8>,
    }

    impl Write for &mut FailOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(io::Error::other("transient"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_whole_blocks_then_remainder() {
        let mut blocks = Blocks::default();
        let mut sink = BlockSink::with_capacity(4, &mut blocks);
        sink.write_all(&[1, 2, 3]).unwrap();
        sink.write_all(&[4, 5, 6, 7, 8, 9]).unwrap();
        sink.write_all(&[10]).unwrap();
        assert_eq!(sink.buffered(), &[9, 10]);
        sink.close().unwrap();

        assert_eq!(blocks.writes, vec![4, 4, 2]);
        assert_eq!(blocks.data, (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn exact_multiple_leaves_nothing_to_close() {
        let mut blocks = Blocks::default();
        let mut sink = BlockSink::with_capacity(3, &mut blocks);
        sink.write_all(&[0; 6]).unwrap();
        sink.close().unwrap();
        assert_eq!(blocks.writes, vec![3, 3]);
    }

    #[test]
    fn drop_flushes_partial_block() {
        let mut blocks = Blocks::default();
        {
            let mut sink = BlockSink::new(&mut blocks);
            sink.write_all(b"qoif").unwrap();
        }
        assert_eq!(blocks.data, b"qoif");
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut blocks = Blocks::default();
        let mut sink = BlockSink::with_capacity(0, &mut blocks);
        assert_eq!(sink.capacity(), 1);
        sink.write_all(&[1, 2]).unwrap();
        drop(sink);
        assert_eq!(blocks.writes, vec![1, 1]);
    }

    #[test]
    fn failed_write_accepts_nothing() {
        let data = [1, 2, 3, 4, 5, 6];
        let mut inner = FailOnce::default();
        let mut sink = BlockSink::with_capacity(4, &mut inner);
        assert_eq!(sink.write(&data).unwrap(), 4);
        assert!(sink.write(&data[4..]).is_err());
        assert_eq!(sink.buffered(), &[1, 2, 3, 4]);

        sink.write_all(&data[4..]).unwrap();
        sink.close().unwrap();
        assert_eq!(inner.data, data);
    }

    #[test]
    fn storage_errors_propagate() {
        let mut sink = BlockSink::with_capacity(2, Broken);
        sink.write_all(&[1, 2]).unwrap();
        assert!(sink.write_all(&[3]).is_err());

        let mut sink = BlockSink::with_capacity(8, Broken);
        sink.write_all(&[1]).unwrap();
        let err = sink.close().unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
