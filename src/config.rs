use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::{
    generation::Budget,
    replicate::api::DEFAULT_API_BASE,
    tone::{self, Tone},
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Configuration {
    pub authentication: Authentication,
    #[serde(default)]
    pub replicate: Replicate,
    pub inference: Inference,
    #[serde(default)]
    pub access: Access,
    pub commands: HashMap<String, Command>,
    #[serde(default = "tone::catalog")]
    pub tones: Vec<Tone>,
}
impl Configuration {
    const FILENAME: &str = "config.toml";

    pub fn load() -> anyhow::Result<Self> {
        let config = if let Ok(file) = std::fs::read_to_string(Self::FILENAME) {
            toml::from_str(&file).context("failed to load config")?
        } else {
            let config = Self::default();
            config.save()?;
            config
        };

        Ok(config)
    }

    fn save(&self) -> anyhow::Result<()> {
        Ok(std::fs::write(
            Self::FILENAME,
            toml::to_string_pretty(self)?,
        )?)
    }

    /// The tone used when a user doesn't pick one.
    pub fn default_tone(&self) -> Option<&Tone> {
        tone::find(&self.tones, &self.inference.default_tone).or_else(|| self.tones.first())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        let command = |description: &str, kind| Command {
            enabled: true,
            description: description.to_string(),
            kind,
        };

        Self {
            authentication: Authentication::default(),
            replicate: Replicate::default(),
            inference: Inference::default(),
            access: Access::default(),
            commands: HashMap::from_iter([
                (
                    "chat".to_string(),
                    command("Chat with the bot using one of its tones.", CommandKind::Chat),
                ),
                (
                    "reset".to_string(),
                    command("Forget your conversation with the bot.", CommandKind::Reset),
                ),
            ]),
            tones: tone::catalog(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Authentication {
    pub discord_token: Option<String>,
    pub replicate_token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Replicate {
    pub api_base: String,
}
impl Default for Replicate {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Inference {
    /// Low values will result in you getting throttled by Discord
    pub discord_message_update_interval_ms: u64,
    /// Whether or not to replace '\n' with newlines
    pub replace_newlines: bool,
    /// Identifier of the tone used when none is given, e.g. `tone-vicuna`
    pub default_tone: String,
    /// System preamble that tone prompts are layered onto
    pub preamble: String,
    /// Cooldown between generations for a single user, before tone modifiers
    pub cooldown_ms: u64,
    /// How many exchanges to remember per user
    pub history_capacity: usize,
    /// Limits for tones that don't set their own
    pub defaults: Budget,
}
impl Default for Inference {
    fn default() -> Self {
        Self {
            discord_message_update_interval_ms: 250,
            replace_newlines: true,
            default_tone: "tone-vicuna".to_string(),
            preamble: "I am a helpful assistant chatting with users in a Discord server. I answer concisely and use Markdown where it helps.".to_string(),
            cooldown_ms: 10_000,
            history_capacity: 10,
            defaults: Budget::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Access {
    /// Discord user IDs allowed to use premium tones
    pub premium_users: HashSet<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Chat,
    Reset,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Command {
    pub enabled: bool,
    pub description: String,
    pub kind: CommandKind,
}
