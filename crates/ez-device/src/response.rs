//! Bounded response building.

use std::fmt;

use crate::error::ArenaError;

/// Write `args` into `buf`, truncating instead of overflowing.
///
/// Returns the number of bytes written.
pub fn format_bounded(buf: &mut [u8], args: fmt::Arguments<'_>) -> usize {
    let mut out = Truncating { buf, len: 0 };
    // Truncating never fails, so neither does formatting into it.
    let _ = fmt::Write::write_fmt(&mut out, args);
    out.len
}

struct Truncating<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let take = s.len().min(self.buf.len() - self.len);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Cursor over the response view of the arena.
///
/// Every append is checked against the view before any byte is copied.
#[derive(Debug)]
pub struct ResponseWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> ResponseWriter<'a> {
    /// Start an empty response over `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        ResponseWriter { buf, len: 0 }
    }

    /// Size of the response view.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The response produced so far.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append raw bytes.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), ArenaError> {
        self.reserve(bytes.len())?;
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Append a numeric slot.
    pub fn put_u64(&mut self, value: u64) -> Result<(), ArenaError> {
        self.append(&value.to_le_bytes())
    }

    /// Append a NUL-terminated string.
    pub fn put_cstr(&mut self, s: &[u8]) -> Result<(), ArenaError> {
        self.reserve(s.len() + 1)?;
        self.append(s)?;
        self.append(&[0])
    }

    /// Discard everything written.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replace the response with error text, truncated to the view.
    pub fn error(&mut self, args: fmt::Arguments<'_>) {
        self.len = format_bounded(&mut self.buf[..], args);
    }

    fn reserve(&self, requested: usize) -> Result<(), ArenaError> {
        if requested > self.remaining() {
            return Err(ArenaError::Overflow {
                requested,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bounded_truncates() {
        let mut buf = [0u8; 8];
        let n = format_bounded(&mut buf, format_args!("value={}", 123456789));
        assert_eq!(n, 8);
        assert_eq!(&buf, b"value=12");

        let mut empty = [0u8; 0];
        assert_eq!(format_bounded(&mut empty, format_args!("anything")), 0);
    }

    #[test]
    fn test_append_and_written() {
        let mut buf = [0u8; 16];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.put_u64(0x1040).unwrap();
        resp.put_cstr(b"ok").unwrap();
        assert_eq!(resp.len(), 11);
        assert_eq!(resp.remaining(), 5);
        assert_eq!(&resp.written()[8..], b"ok\0");
    }

    #[test]
    fn test_overflow_rejected_before_write() {
        let mut buf = [0xAAu8; 4];
        let mut resp = ResponseWriter::new(&mut buf);
        let err = resp.append(&[1, 2, 3, 4, 5]).unwrap_err();
        assert_eq!(
            err,
            ArenaError::Overflow {
                requested: 5,
                remaining: 4
            }
        );
        assert!(resp.is_empty());

        // A C-string that only fits without its terminator is rejected whole.
        assert!(resp.put_cstr(b"abcd").is_err());
        assert!(resp.is_empty());
        drop(resp);
        assert_eq!(buf, [0xAA; 4]);
    }

    #[test]
    fn test_error_replaces_response() {
        let mut buf = [0u8; 10];
        let mut resp = ResponseWriter::new(&mut buf);
        resp.append(b"partial").unwrap();
        resp.error(format_args!("bad request {}", 42));
        assert_eq!(resp.written(), b"bad reques");
    }
}
