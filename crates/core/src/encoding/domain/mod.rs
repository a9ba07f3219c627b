pub mod encode_error;
pub mod encoder;
