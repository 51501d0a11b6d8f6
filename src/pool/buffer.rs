//! Output buffer with staged growth and fast-path numeric writers
//!
//! Growth doubles while the buffer is small, then slows (1.5x to 64 KiB,
//! 1.25x beyond) so large renders stop over-committing memory. Small
//! integers and one/two-decimal floats are written by direct digit
//! computation instead of the general formatting machinery.

use crate::config::constants::pool::{
    BUFFER_INITIAL_CAPACITY, BUFFER_MEDIUM_LIMIT, BUFFER_POOL_RETAIN, BUFFER_SMALL_LIMIT,
};
use crate::runtime::value::format_float;
use std::sync::Mutex;

/// Growable render output buffer
#[derive(Debug, Default)]
pub struct Buffer {
    data: String,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            data: String::with_capacity(BUFFER_INITIAL_CAPACITY),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: String::with_capacity(capacity),
        }
    }

    /// Grow to hold `additional` more bytes, following the staged
    /// growth policy
    fn grow_for(&mut self, additional: usize) {
        let needed = self.data.len() + additional;
        let capacity = self.data.capacity();
        if needed <= capacity {
            return;
        }
        let target = if capacity < BUFFER_SMALL_LIMIT {
            capacity * 2
        } else if capacity < BUFFER_MEDIUM_LIMIT {
            capacity + capacity / 2
        } else {
            capacity + capacity / 4
        };
        let target = target.max(needed).max(BUFFER_INITIAL_CAPACITY);
        self.data.reserve_exact(target - self.data.len());
    }

    pub fn write_str(&mut self, s: &str) {
        self.grow_for(s.len());
        self.data.push_str(s);
    }

    pub fn write_char(&mut self, c: char) {
        self.grow_for(c.len_utf8());
        self.data.push(c);
    }

    /// Write an integer by direct digit computation
    pub fn write_int(&mut self, value: i64) {
        let mut digits = [0u8; 20];
        let mut remaining = value.unsigned_abs();
        let mut pos = digits.len();
        loop {
            pos -= 1;
            digits[pos] = b'0' + (remaining % 10) as u8;
            remaining /= 10;
            if remaining == 0 {
                break;
            }
        }
        let count = digits.len() - pos + usize::from(value < 0);
        self.grow_for(count);
        if value < 0 {
            self.data.push('-');
        }
        for &digit in &digits[pos..] {
            self.data.push(digit as char);
        }
    }

    /// Write a float: one/two-decimal values take the scaled-integer
    /// path, everything else falls back to general formatting
    pub fn write_float(&mut self, value: f64) {
        if value.is_finite() && value.abs() < 1e15 {
            let scaled = value * 100.0;
            if scaled == scaled.trunc() {
                let cents = scaled as i64;
                if value < 0.0 || cents < 0 {
                    self.write_char('-');
                }
                let cents = cents.unsigned_abs();
                self.write_int((cents / 100) as i64);
                self.write_char('.');
                let frac = cents % 100;
                if frac % 10 == 0 {
                    self.write_int((frac / 10) as i64);
                } else {
                    if frac < 10 {
                        self.write_char('0');
                    }
                    self.write_int(frac as i64);
                }
                return;
            }
        }
        self.write_str(&format_float(value));
    }

    pub fn as_str(&self) -> &str {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Consume the buffer, yielding the rendered text
    pub fn into_string(self) -> String {
        self.data
    }

    /// Take the rendered text, leaving the buffer empty and usable
    pub fn take_string(&mut self) -> String {
        std::mem::take(&mut self.data)
    }
}

/// Pool of output buffers for reuse across render calls
#[derive(Default)]
pub struct BufferPool {
    buffers: Mutex<Vec<Buffer>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a cleared buffer from the pool, or allocate a fresh one
    pub fn acquire(&self) -> Buffer {
        match self.buffers.lock() {
            Ok(mut buffers) => buffers.pop().unwrap_or_else(Buffer::new),
            Err(_) => Buffer::new(),
        }
    }

    /// Return a buffer to the pool, cleared
    pub fn release(&self, mut buffer: Buffer) {
        buffer.clear();
        if let Ok(mut buffers) = self.buffers.lock() {
            if buffers.len() < BUFFER_POOL_RETAIN {
                buffers.push(buffer);
            }
        }
    }

    pub fn idle_count(&self) -> usize {
        self.buffers.lock().map(|buffers| buffers.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_int() {
        let mut buf = Buffer::new();
        buf.write_int(0);
        buf.write_char(' ');
        buf.write_int(42);
        buf.write_char(' ');
        buf.write_int(-7);
        buf.write_char(' ');
        buf.write_int(i64::MIN);
        assert_eq!(buf.as_str(), "0 42 -7 -9223372036854775808");
    }

    #[test]
    fn test_write_float_fast_paths() {
        let mut buf = Buffer::new();
        buf.write_float(1.5);
        assert_eq!(buf.as_str(), "1.5");

        buf.clear();
        buf.write_float(2.0);
        assert_eq!(buf.as_str(), "2.0");

        buf.clear();
        buf.write_float(3.25);
        assert_eq!(buf.as_str(), "3.25");

        buf.clear();
        buf.write_float(-0.5);
        assert_eq!(buf.as_str(), "-0.5");

        buf.clear();
        buf.write_float(0.05);
        assert_eq!(buf.as_str(), "0.05");
    }

    #[test]
    fn test_write_float_fallback() {
        let mut buf = Buffer::new();
        buf.write_float(0.125);
        assert_eq!(buf.as_str(), "0.125");
    }

    #[test]
    fn test_growth_keeps_content() {
        let mut buf = Buffer::with_capacity(4);
        for i in 0..1000 {
            buf.write_int(i);
            buf.write_char(',');
        }
        assert!(buf.as_str().starts_with("0,1,2,"));
        assert!(buf.as_str().ends_with("999,"));
    }

    #[test]
    fn test_pool_acquire_returns_cleared_buffer() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.write_str("leftover");
        pool.release(buf);

        let reused = pool.acquire();
        assert!(reused.is_empty());
    }

    #[test]
    fn test_take_string_keeps_buffer_usable() {
        let mut buf = Buffer::new();
        buf.write_str("hello");
        assert_eq!(buf.take_string(), "hello");
        assert!(buf.is_empty());
        buf.write_str("again");
        assert_eq!(buf.as_str(), "again");
    }
}
