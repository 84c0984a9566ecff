//! Frame and message codecs expressed as pipeline handlers.

pub mod byte_to_message_decoder;
pub mod length_field_prepender;
pub mod string_codec;
