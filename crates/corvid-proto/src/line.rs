//! Line-based codec for tokio.
//!
//! Reads and writes newline-terminated lines. The line codec is where the
//! transport's buffering limit lives; the message grammar above it imposes
//! no length cap of its own.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;

/// Default maximum line length in bytes (the classic wire limit).
pub const DEFAULT_MAX_LINE_LEN: usize = 512;

/// Newline-delimited line codec.
pub struct LineCodec {
    /// Index of the next byte to check for a newline.
    next_index: usize,
    /// Maximum line length.
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<String>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(error::ProtocolError::LineTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            Ok(Some(String::from_utf8(line.to_vec())?))
        } else {
            // No complete line yet; remember where the scan stopped.
            self.next_index = src.len();

            if src.len() > self.max_len {
                return Err(error::ProtocolError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }

            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> error::Result<()> {
        dst.extend(line.into_bytes());
        Ok(())
    }
}
