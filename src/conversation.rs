use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use indoc::formatdoc;
use serenity::model::prelude::UserId;

use crate::{generation::GenerationOptions, tone::PromptType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub input: String,
    pub output: String,
}

/// Per-user chat history, capped at `capacity` exchanges.
pub struct Conversations {
    capacity: usize,
    history: Mutex<HashMap<UserId, Vec<Exchange>>>,
}
impl Conversations {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn history(&self, user: UserId) -> Vec<Exchange> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    pub fn push(&self, user: UserId, exchange: Exchange) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = history.entry(user).or_default();
        entries.push(exchange);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }
    }

    /// Forgets everything about `user`; returns whether there was anything to forget.
    pub fn reset(&self, user: UserId) -> bool {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user)
            .map_or(false, |h| !h.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptData {
    pub prompt: String,
    /// Length of `prompt` as measured by the length function used to build it.
    pub length: usize,
}

/// Builds a `### Human:` / `### {assistant}:` style chat prompt, dropping the
/// oldest exchanges until it fits the context budget.
pub fn build_prompt(
    options: &GenerationOptions,
    assistant: &str,
    length: fn(&str) -> usize,
) -> PromptData {
    let tone = options.tone;
    let preamble = match (tone.settings.prompt_type, &tone.prompt) {
        (PromptType::Initial, Some(prompt)) => prompt.clone(),
        (PromptType::Personality, Some(_)) => match tone.formatted_prompt() {
            Some(personality) => format!("{}\n\n{personality}", options.preamble),
            None => options.preamble.to_string(),
        },
        _ => options.preamble.to_string(),
    };

    let mut exchanges: Vec<String> = options
        .history
        .iter()
        .rev()
        .take(options.budget.max_messages)
        .rev()
        .map(|e| {
            formatdoc! {"
                ### Human: {input}
                ### {assistant}: {output}
            ", input = e.input, output = e.output}
        })
        .collect();

    let tail = format!("### Human: {}\n### {assistant}:", options.prompt);
    loop {
        let mut prompt = String::new();
        if !preamble.is_empty() {
            prompt += &preamble;
            prompt += "\n\n";
        }
        for exchange in &exchanges {
            prompt += exchange;
        }
        prompt += &tail;

        let prompt_length = length(&prompt);
        if prompt_length <= options.budget.context_tokens || exchanges.is_empty() {
            return PromptData {
                prompt,
                length: prompt_length,
            };
        }
        exchanges.remove(0);
    }
}
