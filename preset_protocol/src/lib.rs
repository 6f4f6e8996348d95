use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const PEDAL_NOT_FOUND: &str = "Pedal not found";
pub const GENERATION_FAILED: &str = "Failed to generate preset";
pub const INVALID_REQUEST: &str = "Invalid request";

/// One selectable effect model inside a block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelOption {
    #[serde(rename = "no")]
    pub index: i32,
    pub model_name: String,
    #[serde(default)]
    pub description: String,
}

/// Capabilities of one pedal: its signal chain and the models each block offers.
///
/// The serde shape is the on-disk descriptor document, and it is also what gets
/// embedded into the generation prompt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    #[serde(rename = "Device")]
    pub device_id: String,
    #[serde(default)]
    pub note: String,
    #[serde(rename = "effect-chain", deserialize_with = "deserialize_effect_chain")]
    pub effect_chain: Vec<String>,
    pub modules: BTreeMap<String, Vec<ModelOption>>,
}

impl DeviceDescriptor {
    pub fn models_for(&self, block: &str) -> Option<&[ModelOption]> {
        self.modules.get(block).map(Vec::as_slice)
    }

    pub fn offers_model(&self, block: &str, model_name: &str) -> bool {
        self.models_for(block)
            .is_some_and(|models| models.iter().any(|m| m.model_name == model_name))
    }
}

/// Splits a chain written as a single string, e.g. `"FX/COMP → DS/OD → AMP"`.
pub fn split_effect_chain(chain: &str) -> Vec<String> {
    chain
        .replace("->", "→")
        .split(|c| matches!(c, '→' | '>' | ','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn deserialize_effect_chain<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ChainRepr {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match ChainRepr::deserialize(deserializer)? {
        ChainRepr::List(blocks) => blocks
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect(),
        ChainRepr::Joined(s) => split_effect_chain(&s),
    })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PresetRequest {
    #[serde(rename = "selectedPedal")]
    pub selected_device_id: String,
    #[serde(rename = "toneDescription")]
    pub tone_description: String,
}

/// A setting as the generator wrote it. Numbers keep their JSON form, so `7` stays `7`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SettingValue {
    Number(serde_json::Number),
    Text(String),
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Number(n.into())
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EffectBlock {
    #[serde(rename = "fx-block-name")]
    pub block_name: String,
    #[serde(rename = "effect-name")]
    pub effect_name: String,
    #[serde(rename = "on/off", with = "on_off")]
    pub enabled: bool,
    #[serde(rename = "setting")]
    pub settings: BTreeMap<String, SettingValue>,
}

pub type Preset = Vec<EffectBlock>;

/// Top-level object the generator is asked to emit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PresetEnvelope {
    pub preset: Preset,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }

    pub fn pedal_not_found() -> Self {
        Self::new(PEDAL_NOT_FOUND)
    }

    pub fn generation_failed() -> Self {
        Self::new(GENERATION_FAILED)
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST)
    }
}

mod on_off {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(enabled: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if *enabled { "on" } else { "off" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Word(String),
        }

        match Repr::deserialize(d)? {
            Repr::Flag(b) => Ok(b),
            Repr::Word(w) => match w.trim().to_ascii_lowercase().as_str() {
                "on" | "true" | "enabled" => Ok(true),
                "off" | "false" | "disabled" | "bypass" => Ok(false),
                other => Err(de::Error::custom(format!("invalid on/off value: {other:?}"))),
            },
        }
    }
}
