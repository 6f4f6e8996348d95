use crate::modules::gemini::GenerationError;
use crate::modules::protocol::Preset;
use std::fmt;
use std::str::FromStr;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";
const LINE_FENCE_CLOSE: &str = "\n```";
const PRESET_KEY: &str = "preset";

/// How the generator is asked to format its answer, and therefore how the
/// payload is pulled back out of the response text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// The whole response body is the JSON object.
    #[default]
    RawJson,
    /// The JSON object sits inside a ```` ```json ```` fenced block.
    FencedJson,
}

impl ResponseFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseFormat::RawJson => "raw-json",
            ResponseFormat::FencedJson => "fenced-json",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw-json" | "raw_json" | "raw" | "json" => Ok(ResponseFormat::RawJson),
            "fenced-json" | "fenced_json" | "fenced" | "markdown" => Ok(ResponseFormat::FencedJson),
            other => Err(format!(
                "unknown response format {other:?} (expected raw-json or fenced-json)"
            )),
        }
    }
}

/// Locates the JSON payload inside `text` according to `format`.
pub fn extract_payload(text: &str, format: ResponseFormat) -> Result<&str, GenerationError> {
    match format {
        ResponseFormat::RawJson => Ok(text.trim()),
        ResponseFormat::FencedJson => {
            fenced_json_block(text).ok_or_else(|| GenerationError::MissingFence {
                raw: text.to_string(),
            })
        }
    }
}

/// Interior of the first fenced block tagged `json`.
///
/// The tag has to end its line; ```` ```jsonc ```` or ```` ```json5 ```` do not match.
/// The block closes at the first fence that starts a line, so backticks inside
/// JSON strings stay part of the payload.
pub fn fenced_json_block(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(pos) = text[from..].find(FENCE_OPEN) {
        let tag_end = from + pos + FENCE_OPEN.len();
        let rest = text[tag_end..].trim_start_matches(|c| c == ' ' || c == '\t');
        let body = rest
            .strip_prefix("\r\n")
            .or_else(|| rest.strip_prefix('\n'));
        let Some(body) = body else {
            from = tag_end;
            continue;
        };
        if body.starts_with(FENCE_CLOSE) {
            return Some("");
        }
        let end = body.find(LINE_FENCE_CLOSE)?;
        return Some(body[..end].trim_end_matches(|c| c == '\r' || c == '\n'));
    }
    None
}

/// Extracts, parses and unwraps the `preset` array from a raw generator response.
pub fn parse_preset(text: &str, format: ResponseFormat) -> Result<Preset, GenerationError> {
    let payload = extract_payload(text, format)?;

    let mut value: serde_json::Value =
        serde_json::from_str(payload).map_err(|source| GenerationError::Parse {
            source,
            raw: text.to_string(),
        })?;

    let entries = value
        .as_object_mut()
        .and_then(|obj| obj.remove(PRESET_KEY))
        .ok_or_else(|| GenerationError::MissingKey {
            raw: text.to_string(),
        })?;

    serde_json::from_value::<Preset>(entries).map_err(|source| GenerationError::Parse {
        source,
        raw: text.to_string(),
    })
}
