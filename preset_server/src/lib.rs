pub mod config;
mod net;

pub use crate::config::{ConfigError, ServerArgs, DEFAULT_BIND};
pub use crate::net::{router, PresetServer, MAX_REQUEST_BYTES};
