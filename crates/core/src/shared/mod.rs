pub mod constants;
pub mod frame;
pub mod render_request;
