pub mod actions;
pub mod config;
pub mod csv_loader;
pub mod dispatcher;
pub mod gesture_buffer;
pub mod gesture_classifier;
pub mod hid;
pub mod mouse_filter;
pub mod optimizer;
pub mod performance;
pub mod pipeline;
pub mod settings;
pub mod source;
pub mod types;
pub mod worker;
