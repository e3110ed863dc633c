//! Turn-marker cleanup for raw completions.
//!
//! Some backends echo the whole prompt template back. The answer is whatever
//! follows the last assistant-turn marker.

use serde::{Deserialize, Serialize};

const CHATML_ASSISTANT: &str = "<|im_start|>assistant";
const MISTRAL_INST_END: &str = "[/INST]";
const VICUNA_ASSISTANT: &str = "ASSISTANT:";

/// End-of-turn tokens stripped from the tail of a cleaned answer.
const END_TOKENS: &[&str] = &["<|im_end|>", "</s>", "<|endoftext|>"];

/// Prompt template family of the backend's raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMarkerFormat {
    /// Output is already the bare answer.
    Plain,
    ChatMl,
    MistralInst,
    Vicuna,
    /// Use whichever known marker occurs last in the text.
    #[default]
    Auto,
}

impl TurnMarkerFormat {
    fn marker(&self) -> Option<&'static str> {
        match self {
            Self::ChatMl => Some(CHATML_ASSISTANT),
            Self::MistralInst => Some(MISTRAL_INST_END),
            Self::Vicuna => Some(VICUNA_ASSISTANT),
            Self::Plain | Self::Auto => None,
        }
    }

    /// Return the assistant's answer from a raw completion.
    ///
    /// Text without the expected marker is returned unchanged.
    pub fn clean(&self, raw: &str) -> String {
        let split_at = match self {
            Self::Plain => None,
            Self::Auto => [Self::ChatMl, Self::MistralInst, Self::Vicuna]
                .iter()
                .filter_map(|f| f.marker().and_then(|m| after_last(raw, m)))
                .max(),
            other => other.marker().and_then(|m| after_last(raw, m)),
        };

        match split_at {
            Some(offset) => strip_end_tokens(&raw[offset..]),
            None => raw.to_string(),
        }
    }
}

/// Byte offset just past the last occurrence of `marker`.
fn after_last(text: &str, marker: &str) -> Option<usize> {
    text.rfind(marker).map(|pos| pos + marker.len())
}

fn strip_end_tokens(answer: &str) -> String {
    let mut text = answer.trim();
    loop {
        let before = text.len();
        for token in END_TOKENS {
            if let Some(stripped) = text.strip_suffix(token) {
                text = stripped.trim_end();
            }
        }
        if text.len() == before {
            break;
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_passes_through() {
        let raw = "  <|im_start|>assistant kept as is ";
        assert_eq!(TurnMarkerFormat::Plain.clean(raw), raw);
    }

    #[test]
    fn missing_marker_returns_text_unchanged() {
        let raw = "⌀1.250 ±0.001\n";
        assert_eq!(TurnMarkerFormat::ChatMl.clean(raw), raw);
        assert_eq!(TurnMarkerFormat::Auto.clean(raw), raw);
    }

    #[test]
    fn chatml_takes_text_after_last_marker() {
        let raw = "<|im_start|>system\nYou are...\n<|im_start|>user\n<image>\nAnalyze\n<|im_start|>assistant\n2.490 ±0.002<|im_end|>";
        assert_eq!(TurnMarkerFormat::ChatMl.clean(raw), "2.490 ±0.002");
    }

    #[test]
    fn mistral_inst_marker() {
        let raw = "[INST] <image>\nWhat dimensions? [/INST] R0.125 and ⌀1.000</s>";
        assert_eq!(TurnMarkerFormat::MistralInst.clean(raw), "R0.125 and ⌀1.000");
    }

    #[test]
    fn vicuna_marker() {
        let raw = "USER: <image>\nList dims ASSISTANT: 1/4-20 UNC-2A";
        assert_eq!(TurnMarkerFormat::Vicuna.clean(raw), "1/4-20 UNC-2A");
    }

    #[test]
    fn auto_uses_latest_marker() {
        let raw = "[INST] prompt [/INST] draft <|im_start|>assistant\nfinal answer";
        assert_eq!(TurnMarkerFormat::Auto.clean(raw), "final answer");
    }

    #[test]
    fn serde_names_are_snake_case() {
        let json = serde_json::to_string(&TurnMarkerFormat::MistralInst).unwrap();
        assert_eq!(json, "\"mistral_inst\"");
        let parsed: TurnMarkerFormat = serde_json::from_str("\"chat_ml\"").unwrap();
        assert_eq!(parsed, TurnMarkerFormat::ChatMl);
    }
}
