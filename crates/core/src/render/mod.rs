pub mod render_error;
pub mod render_observer;
pub mod render_state;
pub mod timelapse_engine;
