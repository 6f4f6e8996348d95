#![allow(dead_code)]

use async_trait::async_trait;
use brain_core::gemini::{GenerationError, TextGenerator};
use std::sync::Mutex;

/// Returns a canned response (or failure) and remembers every prompt it saw.
pub struct MockGenerator {
    reply: Result<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            reply: Err(msg.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        if let Ok(mut guard) = self.prompts.lock() {
            guard.push(prompt.to_string());
        }
        self.reply.clone().map_err(GenerationError::Upstream)
    }
}

pub const ONE_BLOCK: &str = r#"{"preset":[{"fx-block-name":"FX","effect-name":"Overdrive","on/off":"on","setting":{"Drive":7}}]}"#;

/// A well-formed answer for the built-in GE150 Pro: one entry per chain block.
pub fn ge150_reply() -> String {
    let blocks = [
        ("FX/COMP", "Comp", "off"),
        ("DS/OD", "Blues DR", "on"),
        ("AMP", "Deluxe Rev", "on"),
        ("CAB", "US 212", "on"),
        ("NS", "Noise Gate", "on"),
        ("EQ", "Guitar EQ 1", "off"),
        ("MOD", "Chorus", "off"),
        ("DELAY", "Analog", "on"),
        ("REVERB", "Spring", "on"),
    ];
    let entries: Vec<serde_json::Value> = blocks
        .iter()
        .map(|(block, effect, on)| {
            serde_json::json!({
                "fx-block-name": block,
                "effect-name": effect,
                "on/off": on,
                "setting": { "Level": 6.5, "Tone": 4.5 }
            })
        })
        .collect();
    serde_json::json!({ "preset": entries }).to_string()
}
