pub mod modules;

pub use modules::{adapter, catalog, extract, gemini, handler, protocol, system_prompt};
