//! Length-field framing.

use bytes::{Buf, BytesMut};

use crate::codec::byte_to_message_decoder::MessageDecoder;
use crate::error::PipelineError;

/// Splits a byte stream on a big-endian length field, stripping the field
/// from the emitted frame.
pub struct LengthFieldBasedFrameDecoder {
    max_frame_length: usize,
    length_field_length: usize,
}

impl LengthFieldBasedFrameDecoder {
    /// Creates a decoder with a `length_field_length`-byte header (1, 2, 4
    /// or 8) and frames capped at `max_frame_length` bytes.
    pub fn new(max_frame_length: usize, length_field_length: usize) -> Self {
        assert!(
            matches!(length_field_length, 1 | 2 | 4 | 8),
            "unsupported length field length {}",
            length_field_length
        );
        Self {
            max_frame_length,
            length_field_length,
        }
    }
}

impl MessageDecoder for LengthFieldBasedFrameDecoder {
    fn id(&self) -> String {
        "LengthFieldBasedFrameDecoder".to_string()
    }

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<BytesMut>, PipelineError> {
        if buf.len() < self.length_field_length {
            return Ok(None);
        }

        let frame_length = (&buf[..self.length_field_length]).get_uint(self.length_field_length);
        let frame_length = usize::try_from(frame_length)
            .map_err(|_| PipelineError::Codec(format!("frame length {} overflows", frame_length)))?;
        if frame_length > self.max_frame_length {
            return Err(PipelineError::Codec(format!(
                "frame length {} exceeds max {}",
                frame_length, self.max_frame_length
            )));
        }

        if buf.len() < self.length_field_length + frame_length {
            return Ok(None);
        }

        let _ = buf.split_to(self.length_field_length);
        Ok(Some(buf.split_to(frame_length)))
    }
}
