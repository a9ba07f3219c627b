pub mod frame_name;
pub mod frame_source;
