use crate::modules::extract::{parse_preset, ResponseFormat};
use crate::modules::gemini::{GenerationError, TextGenerator};
use crate::modules::protocol::{DeviceDescriptor, Preset};
use crate::modules::system_prompt::build_prompt;
use std::sync::Arc;

/// Prompt build → external call → parse, for one device and one tone request.
#[derive(Clone)]
pub struct PresetAdapter {
    generator: Arc<dyn TextGenerator>,
    format: ResponseFormat,
}

impl PresetAdapter {
    pub fn new(generator: Arc<dyn TextGenerator>, format: ResponseFormat) -> Self {
        Self { generator, format }
    }

    pub fn prompt_for(
        &self,
        descriptor: &DeviceDescriptor,
        tone_description: &str,
    ) -> Result<String, GenerationError> {
        build_prompt(descriptor, tone_description, self.format).map_err(GenerationError::Prompt)
    }

    pub async fn generate(
        &self,
        descriptor: &DeviceDescriptor,
        tone_description: &str,
    ) -> Result<Preset, GenerationError> {
        let prompt = self.prompt_for(descriptor, tone_description)?;
        log::debug!(
            "preset prompt for {:?} ({}):\n{prompt}",
            descriptor.device_id,
            self.format
        );

        let raw = self.generator.generate_text(&prompt).await?;
        let preset = parse_preset(&raw, self.format)?;

        for issue in audit_preset(descriptor, &preset) {
            log::warn!("{}: {issue}", descriptor.device_id);
        }
        Ok(preset)
    }
}

/// Differences between a generated preset and what the device actually offers.
/// Informational only; the preset is returned regardless.
pub fn audit_preset(descriptor: &DeviceDescriptor, preset: &Preset) -> Vec<String> {
    let mut issues = Vec::new();
    let chain = &descriptor.effect_chain;

    if preset.len() != chain.len() {
        issues.push(format!(
            "preset has {} blocks, effect-chain has {}",
            preset.len(),
            chain.len()
        ));
    }

    for block in preset {
        if descriptor.models_for(&block.block_name).is_none() {
            issues.push(format!("unknown block {:?}", block.block_name));
        } else if !descriptor.offers_model(&block.block_name, &block.effect_name) {
            issues.push(format!(
                "effect {:?} is not listed for block {:?}",
                block.effect_name, block.block_name
            ));
        }
    }

    let known_order: Vec<&str> = preset
        .iter()
        .map(|b| b.block_name.as_str())
        .filter(|name| chain.iter().any(|c| c == name))
        .collect();
    let expected_order: Vec<&str> = chain
        .iter()
        .map(String::as_str)
        .filter(|c| known_order.contains(c))
        .collect();
    if known_order != expected_order {
        issues.push("block order differs from effect-chain".to_string());
    }

    issues
}
