//! 行切分
//!
//! 把按块到达的原始字节切成行，去掉控制字符 (< 32)，丢弃空行。
//! 跨块拼接的行取第一个贡献字节所在块的接收时间。

use bytes::{Bytes, BytesMut};

/// Splits timestamped chunks into timestamped lines
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: BytesMut,
    since: Option<f64>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk received at `timestamp`; returns every completed line
    pub fn push(&mut self, chunk: &[u8], timestamp: f64) -> Vec<(f64, Bytes)> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if let Some(line) = self.take_line() {
                    lines.push(line);
                }
            } else if byte >= 32 {
                if self.since.is_none() {
                    self.since = Some(timestamp);
                }
                self.buf.extend_from_slice(&[byte]);
            }
        }
        lines
    }

    /// Emit a trailing unterminated line, if any
    pub fn flush(&mut self) -> Option<(f64, Bytes)> {
        self.take_line()
    }

    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    fn take_line(&mut self) -> Option<(f64, Bytes)> {
        let since = self.since.take()?;
        if self.buf.is_empty() {
            return None;
        }
        Some((since, self.buf.split().freeze()))
    }
}

/// Strip control characters from a single line
pub fn clean_line(raw: &[u8]) -> Option<Bytes> {
    let cleaned: Vec<u8> = raw.iter().copied().filter(|&b| b >= 32).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(Bytes::from(cleaned))
    }
}
