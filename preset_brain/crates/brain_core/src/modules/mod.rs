pub mod adapter;
pub mod catalog;
pub mod extract;
pub mod gemini;
pub mod handler;
pub mod system_prompt;

pub mod protocol {
    pub use preset_protocol::*;
}
