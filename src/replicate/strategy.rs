//! Named request builders and output formatters that Replicate tones select
//! from their configuration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::types::Output;
use crate::{conversation, generation::GenerationOptions};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicateStrategy {
    pub builder: ReplicateBuilder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatter: Option<ReplicateFormatter>,
}
impl ReplicateStrategy {
    pub fn new(builder: ReplicateBuilder, formatter: Option<ReplicateFormatter>) -> Self {
        Self { builder, formatter }
    }

    pub fn build(&self, options: &GenerationOptions, length: fn(&str) -> usize) -> Value {
        self.builder.build(options, length)
    }

    pub fn format(&self, output: &Output) -> String {
        match self.formatter {
            Some(formatter) => formatter.format(output),
            None => concatenate(output),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplicateBuilder {
    Dolly,
    StableLm,
    /// Sends the whole conversation, not just the latest prompt.
    Vicuna,
}
impl ReplicateBuilder {
    pub fn build(self, options: &GenerationOptions, length: fn(&str) -> usize) -> Value {
        let generation_tokens = options.budget.generation_tokens;
        match self {
            Self::Dolly => json!({
                "top_k": 50,
                "top_p": 1,
                "decoding": "top_k",
                "max_length": generation_tokens,
                "temperature": 0.75,
                "repetition_penalty": 1.2,
                "prompt": options.prompt,
            }),
            Self::StableLm => json!({
                "prompt": options.prompt,
                "max_tokens": generation_tokens,
                "top_p": 1,
                "temperature": 0.75,
                "repetition_penalty": 1.2,
            }),
            Self::Vicuna => {
                let prompt = conversation::build_prompt(options, "Vicuna", length);
                json!({
                    "prompt": prompt.prompt,
                    "max_length": prompt.length + generation_tokens,
                    "top_p": 1,
                    "temperature": 0.7,
                    "repetition_penalty": 1.2,
                })
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplicateFormatter {
    /// Vicuna's first fragment is missing its trailing space.
    Vicuna,
}
impl ReplicateFormatter {
    pub fn format(self, output: &Output) -> String {
        match self {
            Self::Vicuna => {
                let fragments: &[String] = match output {
                    Output::Text(text) => std::slice::from_ref(text),
                    Output::Fragments(fragments) => fragments,
                };
                let mut text = String::new();
                for (i, fragment) in fragments.iter().enumerate() {
                    text += fragment;
                    if i == 0 && !fragment.ends_with(' ') {
                        text.push(' ');
                    }
                }
                text
            }
        }
    }
}

/// Joins the output fragments in order, without a separator.
pub fn concatenate(output: &Output) -> String {
    match output {
        Output::Text(text) => text.clone(),
        Output::Fragments(fragments) => fragments.concat(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generation::{prompt_length, Budget},
        tone,
    };

    fn fragments(parts: &[&str]) -> Output {
        Output::Fragments(parts.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn default_formatting_concatenates() {
        let strategy = ReplicateStrategy::new(ReplicateBuilder::Dolly, None);
        assert_eq!(strategy.format(&fragments(&["Hello", " world"])), "Hello world");
        assert_eq!(strategy.format(&Output::Text("as is".into())), "as is");
        assert_eq!(strategy.format(&fragments(&[])), "");
    }

    #[test]
    fn vicuna_formatting_spaces_the_first_fragment() {
        let strategy =
            ReplicateStrategy::new(ReplicateBuilder::Vicuna, Some(ReplicateFormatter::Vicuna));
        assert_eq!(strategy.format(&fragments(&["Hi", "there", "!"])), "Hi there!");
        assert_eq!(strategy.format(&fragments(&["Hi ", "there"])), "Hi there");
        assert_eq!(strategy.format(&fragments(&[])), "");
    }

    #[test]
    fn builders_shape_the_payload() {
        let tones = tone::catalog();
        let tone = tone::find(&tones, "tone-dolly").unwrap();
        let options = GenerationOptions {
            prompt: "Tell me a joke".to_string(),
            tone,
            budget: Budget {
                generation_tokens: 300,
                ..Budget::default()
            },
            history: vec![],
            preamble: "",
            progress: Box::new(|_| {}),
        };

        let dolly = ReplicateBuilder::Dolly.build(&options, prompt_length);
        assert_eq!(dolly["prompt"], "Tell me a joke");
        assert_eq!(dolly["max_length"], 300);
        assert_eq!(dolly["decoding"], "top_k");

        let stablelm = ReplicateBuilder::StableLm.build(&options, prompt_length);
        assert_eq!(stablelm["prompt"], "Tell me a joke");
        assert_eq!(stablelm["max_tokens"], 300);
        assert!(stablelm.get("max_length").is_none());

        let vicuna = ReplicateBuilder::Vicuna.build(&options, prompt_length);
        let prompt = vicuna["prompt"].as_str().unwrap();
        assert_eq!(prompt, "### Human: Tell me a joke\n### Vicuna:");
        assert_eq!(vicuna["max_length"], prompt_length(prompt) + 300);
    }
}
