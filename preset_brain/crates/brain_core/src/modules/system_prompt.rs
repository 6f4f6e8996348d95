use crate::modules::extract::ResponseFormat;
use crate::modules::protocol::{DeviceDescriptor, EffectBlock, PresetEnvelope, SettingValue};
use std::collections::BTreeMap;

const TASK_RULES: &str = r#"Generate the effects chain preset.
- Produce exactly one entry per block of the "effect-chain", in the same order.
- Set "fx-block-name" to the block name exactly as written in "effect-chain".
- Choose a single "effect-name" from the "model_name" values listed for that block in "modules". Never invent a model.
- Set "on/off" to "on" for blocks the tone needs and "off" for blocks it doesn't.
- Provide realistic and appropriate "setting" key/value pairs as numbers (e.g., Level: 5.5, Gain: 8.0, Tone: 4.5). Prefer the parameter names given in the model description."#;

const RAW_JSON_RULES: &str = r#"Respond with ONLY a JSON object that has a single top-level key "preset" holding the array of entries. No prose, no markdown."#;

const FENCED_JSON_RULES: &str = r#"Respond with the JSON object inside a single fenced code block that opens with ```json on its own line and closes with ```. The object has a single top-level key "preset" holding the array of entries."#;

/// Builds the full generation prompt for one device and one tone request.
pub fn build_prompt(
    descriptor: &DeviceDescriptor,
    tone_description: &str,
    format: ResponseFormat,
) -> Result<String, serde_json::Error> {
    let constraints = serde_json::to_string(descriptor)?;
    let skeleton = serde_json::to_string_pretty(&example_skeleton(descriptor))?;

    let (format_rules, example) = match format {
        ResponseFormat::RawJson => (RAW_JSON_RULES, skeleton),
        ResponseFormat::FencedJson => (FENCED_JSON_RULES, format!("```json\n{skeleton}\n```")),
    };

    Ok(format!(
        "**Pedal Configuration (Use these constraints):**\n{constraints}\n\n\
         **User Tone Request:**\n{tone_description}\n\n\
         **Task:**\n{TASK_RULES}\n\
         Target device: {device}. Block order: {chain}.\n\n\
         **Output Format:**\n{format_rules}\n\
         Example shape (one entry shown, values are placeholders):\n{example}\n",
        device = descriptor.device_id,
        chain = descriptor.effect_chain.join(" → "),
    ))
}

fn example_skeleton(descriptor: &DeviceDescriptor) -> PresetEnvelope {
    let block_name = descriptor
        .effect_chain
        .first()
        .cloned()
        .unwrap_or_else(|| "<block>".to_string());
    let effect_name = descriptor
        .models_for(&block_name)
        .and_then(|models| models.first())
        .map(|m| m.model_name.clone())
        .unwrap_or_else(|| "<model_name>".to_string());

    let mut settings = BTreeMap::new();
    settings.insert("Level".to_string(), SettingValue::from(5));

    PresetEnvelope {
        preset: vec![EffectBlock {
            block_name,
            effect_name,
            enabled: true,
            settings,
        }],
    }
}
