//! Message codec for tokio.
//!
//! Wraps [`LineCodec`] and parses lines into [`Message`] values. Lines
//! that do not parse are skipped in place, so one malformed line never
//! stalls or kills a framed stream.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error;
use crate::line::LineCodec;
use crate::message::Message;

/// Tokio codec for encoding/decoding protocol messages.
pub struct MessageCodec {
    inner: LineCodec,
}

impl MessageCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self {
            inner: LineCodec::new(),
        }
    }

    /// Create a codec with a custom line limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            inner: LineCodec::with_max_len(max_len),
        }
    }

    /// Sanitize an outgoing line: truncate at the first line ending so a
    /// message body can never smuggle a second command onto the wire.
    fn sanitize(mut line: String) -> String {
        if let Some(pos) = line.find(&['\r', '\n'][..]) {
            line.truncate(pos);
            line.push('\n');
        }
        line
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = error::ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        loop {
            match self.inner.decode(src) {
                Ok(Some(line)) => {
                    if let Some(msg) = Message::parse(&line) {
                        return Ok(Some(msg));
                    }
                    tracing::trace!(line = %line.trim_end(), "skipping unparseable line");
                }
                Ok(None) => return Ok(None),
                // A non-UTF-8 line was consumed whole; skip it like any
                // other unparseable line.
                Err(error::ProtocolError::Decode(e)) => {
                    tracing::trace!(error = %e, "skipping non-UTF-8 line");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = error::ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        self.inner.encode(Self::sanitize(msg.to_string()), dst)
    }
}
