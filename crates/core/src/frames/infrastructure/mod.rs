pub mod directory_frame_source;
