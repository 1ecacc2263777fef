use std::io::{self, Write};

use bytes::{Buf, BytesMut};

/// Write wrapper that forwards only complete, newline-terminated lines
/// to its destination, regardless of how callers chunk their writes.
///
/// Every byte is buffered first; each complete line then goes downstream
/// as its own write, in order, and a trailing partial line stays
/// buffered until a later write supplies its terminator. A failed
/// forward leaves the failing line (and everything after it) buffered,
/// so the next write attempt retries it. Callers must serialize writes
/// to one instance.
pub struct LineWriter<W: Write> {
    inner: W,
    buffer: BytesMut,
}

impl<W: Write> LineWriter<W> {
    pub fn new(inner: W) -> LineWriter<W> {
        LineWriter {
            inner,
            buffer: BytesMut::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Bytes still awaiting a line terminator (or a successful forward).
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Discards any buffered partial line.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LineWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        while let Some(i) = self.buffer.iter().position(|&b| b == b'\n') {
            // forward before consuming so a failed line stays buffered
            // for the next write attempt
            self.inner.write_all(&self.buffer[..=i])?;
            self.buffer.advance(i + 1);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<Vec<u8>>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailOnce {
        fail_next: bool,
        writes: Vec<Vec<u8>>,
    }

    impl Write for FailOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_next {
                self.fail_next = false;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "destination gone"));
            }
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_chunks(chunks: &[&str]) -> Vec<String> {
        let mut w = LineWriter::new(Recorder::default());
        for chunk in chunks {
            let n = w.write(chunk.as_bytes()).unwrap();
            assert_eq!(n, chunk.len());
        }
        w.get_ref()
            .writes
            .iter()
            .map(|b| String::from_utf8(b.clone()).unwrap())
            .collect()
    }

    #[test]
    fn test_no_input_no_output() {
        let lines: Vec<String> = run_chunks(&[]);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_split_line_reassembled() {
        assert_eq!(run_chunks(&["A", "B", "C", "\n"]), ["ABC\n"]);
    }

    #[test]
    fn test_multiple_lines_per_chunk() {
        assert_eq!(run_chunks(&["A\n", "B", "C\n\n"]), ["A\n", "BC\n", "\n"]);
    }

    #[test]
    fn test_partial_line_stays_buffered() {
        let mut w = LineWriter::new(Recorder::default());
        w.write(b"no terminator yet").unwrap();
        assert!(w.get_ref().writes.is_empty());
        assert_eq!(w.buffered(), b"no terminator yet");

        w.write(b"\n").unwrap();
        assert_eq!(w.get_ref().writes, vec![b"no terminator yet\n".to_vec()]);
        assert!(w.buffered().is_empty());
    }

    #[test]
    fn test_failed_forward_is_retried() {
        let mut w = LineWriter::new(FailOnce {
            fail_next: true,
            writes: Vec::new(),
        });

        let err = w.write(b"A\nB\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        // nothing was consumed; both lines are still buffered
        assert_eq!(w.buffered(), b"A\nB\n");

        let n = w.write(b"").unwrap();
        assert_eq!(n, 0);
        assert_eq!(w.get_mut().writes, vec![b"A\n".to_vec(), b"B\n".to_vec()]);
        assert!(w.buffered().is_empty());
    }
}
