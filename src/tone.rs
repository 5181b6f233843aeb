use serde::{Deserialize, Serialize};

use crate::{
    cooldown::CooldownModifier,
    generation::Budget,
    replicate::strategy::{ReplicateBuilder, ReplicateFormatter, ReplicateStrategy},
};

const PERSONALITY_PREAMBLE: &str =
    "This will be my personality and instructions for the entire conversation:\n";

/// How the tone's prompt is combined with the system preamble.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    /// Added as an extra personality layer after the preamble.
    #[default]
    Personality,
    /// Replaces the preamble entirely.
    Initial,
    /// Doesn't modify the prompt at all.
    Other,
}

/// Which provider handles a tone.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    #[default]
    #[serde(rename = "openai_chat")]
    OpenAiChat,
    #[serde(rename = "openai_completion")]
    OpenAiCompletion,
    Nat,
    Clyde,
    Replicate(ReplicateStrategy),
}
impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAiChat => "OpenAI Chat",
            Self::OpenAiCompletion => "OpenAI Completion",
            Self::Nat => "Nat",
            Self::Clyde => "Clyde",
            Self::Replicate(_) => "Replicate",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ToneEmoji {
    /// Emoji shown in interaction menus, usually a custom guild emoji.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Plain unicode emoji used in text.
    pub fallback: String,
}
impl ToneEmoji {
    fn new(display: Option<&str>, fallback: &str) -> Self {
        Self {
            display: display.map(str::to_string),
            fallback: fallback.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Provider model name; `owner/name` for Replicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ToneSettings {
    #[serde(default)]
    pub premium: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<CooldownModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub model: ModelType,
    #[serde(default)]
    pub prompt_type: PromptType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tone {
    pub name: String,
    pub emoji: ToneEmoji,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: ModelParams,
    #[serde(default)]
    pub settings: ToneSettings,
}
impl Tone {
    pub fn new(
        name: &str,
        emoji: ToneEmoji,
        description: &str,
        prompt: Option<&str>,
        model: ModelParams,
        settings: ToneSettings,
    ) -> Self {
        Self {
            name: name.to_string(),
            emoji,
            description: description.to_string(),
            prompt: prompt.map(str::to_string),
            model,
            settings,
        }
    }

    /// A tone served by Replicate; the model type is always overridden.
    pub fn replicate(
        name: &str,
        emoji: ToneEmoji,
        description: &str,
        model: &str,
        settings: ToneSettings,
        strategy: ReplicateStrategy,
    ) -> Self {
        Self::new(
            name,
            emoji,
            description,
            None,
            ModelParams {
                model: Some(model.to_string()),
                ..Default::default()
            },
            ToneSettings {
                model: ModelType::Replicate(strategy),
                ..settings
            },
        )
    }

    pub fn formatted_prompt(&self) -> Option<String> {
        self.prompt
            .as_ref()
            .map(|prompt| format!("{PERSONALITY_PREAMBLE}{prompt}"))
    }

    pub fn id(&self) -> String {
        format!("tone-{}", self.name.to_lowercase().replace(' ', "-"))
    }

    pub fn display_name(&self) -> &str {
        self.settings.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Resolves this tone's limits, falling back to `defaults` for anything unset.
    pub fn budget(&self, defaults: &Budget) -> Budget {
        Budget {
            context_tokens: self
                .settings
                .context_tokens
                .unwrap_or(defaults.context_tokens),
            generation_tokens: self
                .settings
                .generation_tokens
                .unwrap_or(defaults.generation_tokens),
            max_messages: self.settings.max_messages.unwrap_or(defaults.max_messages),
        }
    }
}

pub fn find<'a>(tones: &'a [Tone], id: &str) -> Option<&'a Tone> {
    tones.iter().find(|t| t.id() == id)
}

/// The built-in tones, in the order they are offered to users.
pub fn catalog() -> Vec<Tone> {
    let temperature = |t: f64| ModelParams {
        temperature: Some(t),
        ..Default::default()
    };
    let unhinged = |t: f64| ModelParams {
        temperature: Some(t),
        frequency_penalty: Some(1.0),
        presence_penalty: Some(0.1),
        ..Default::default()
    };
    let slower = Some(CooldownModifier::multiplier(1.4));

    vec![
        Tone::new(
            "ChatGPT",
            ToneEmoji::new(Some("<:chatgpt:1097849346164281475>"), "😐"),
            "The usual ChatGPT",
            None,
            temperature(0.4),
            ToneSettings::default(),
        ),
        Tone::new(
            "GPT-4",
            ToneEmoji::new(None, "✨"),
            "OpenAI's GPT-4",
            Some("I am GPT-4, a new GPT model by OpenAI released on the 14th March 2023. I am an improved version of GPT-3, and more human-like."),
            ModelParams {
                model: Some("gpt-4".to_string()),
                ..temperature(0.7)
            },
            ToneSettings {
                premium: true,
                cooldown: Some(CooldownModifier::time(30 * 1000)),
                context_tokens: Some(425),
                generation_tokens: Some(270),
                ..Default::default()
            },
        ),
        Tone::new(
            "GPT-3",
            ToneEmoji::new(Some("<:gpt3:1097849352657047562>"), "🤖"),
            "OpenAI's original GPT-3; less restrictions than ChatGPT",
            None,
            ModelParams {
                model: Some("text-davinci-003".to_string()),
                ..temperature(0.7)
            },
            ToneSettings {
                model: ModelType::OpenAiCompletion,
                premium: true,
                cooldown: Some(CooldownModifier::time(15 * 1000)),
                context_tokens: Some(600),
                generation_tokens: Some(350),
                ..Default::default()
            },
        ),
        Tone::new(
            "Claude",
            ToneEmoji::new(Some("<:anthropic:1097849339432423454>"), "😲"),
            "Anthropic's Claude",
            Some("I am Claude, created by Anthropic, PBC. I am helpful, harmless, and honest using a technique called Constitutional AI."),
            ModelParams {
                model: Some("anthropic:claude-instant-v1".to_string()),
                ..temperature(0.8)
            },
            ToneSettings {
                prompt_type: PromptType::Other,
                model: ModelType::Nat,
                context_tokens: Some(600),
                generation_tokens: Some(550),
                ..Default::default()
            },
        ),
        Tone::new(
            "Alpaca",
            ToneEmoji::new(Some("<:alpaca:1097849324945289326>"), "🦙"),
            "An instruction-following LLaMA model",
            Some("I am Alpaca, a fine-tuned model specialized in following instructions, based on LLaMA, which was created by Meta. I was created by Stanford researchers."),
            ModelParams {
                model: Some("replicate:alpaca-7b".to_string()),
                ..temperature(0.4)
            },
            ToneSettings {
                prompt_type: PromptType::Other,
                model: ModelType::Nat,
                context_tokens: Some(800),
                display_name: Some("Fine-tuned LLaMA model".to_string()),
                generation_tokens: Some(750),
                ..Default::default()
            },
        ),
        Tone::replicate(
            "Dolly",
            ToneEmoji::new(Some("<:dolly:1100453639396524122>"), "🐑"),
            "Open source instruction-tuned large language model developed by Databricks",
            "replicate/dolly-v2-12b",
            ToneSettings {
                display_name: Some("Dolly - Pythia 12B".to_string()),
                generation_tokens: Some(300),
                cooldown: slower.clone(),
                ..Default::default()
            },
            ReplicateStrategy::new(ReplicateBuilder::Dolly, None),
        ),
        Tone::replicate(
            "StableLM",
            ToneEmoji::new(Some("<:stablelm:1100453631746113597>"), "🦜"),
            "7 billion parameter version of Stability AI's language model",
            "stability-ai/stablelm-tuned-alpha-7b",
            ToneSettings {
                display_name: Some("StableLM Tuned Alpha 7B".to_string()),
                generation_tokens: Some(300),
                cooldown: slower.clone(),
                ..Default::default()
            },
            ReplicateStrategy::new(ReplicateBuilder::StableLm, None),
        ),
        Tone::replicate(
            "Vicuna",
            ToneEmoji::new(Some("<:vicuna:1100453628256456765>"), "🦙"),
            "An open-source chatbot impressing GPT-4 with 90% ChatGPT quality",
            "replicate/vicuna-13b",
            ToneSettings {
                display_name: Some("Vicuna 13B".to_string()),
                generation_tokens: Some(250),
                context_tokens: Some(400),
                max_messages: Some(3),
                cooldown: slower,
                ..Default::default()
            },
            ReplicateStrategy::new(ReplicateBuilder::Vicuna, Some(ReplicateFormatter::Vicuna)),
        ),
        Tone::new(
            "Clyde",
            ToneEmoji::new(Some("<a:clyde:1100453636414378125>"), "🤖"),
            "Recreation of Discord's AI chatbot",
            None,
            ModelParams::default(),
            ToneSettings {
                model: ModelType::Clyde,
                premium: true,
                cooldown: Some(CooldownModifier::time(40 * 1000)),
                ..Default::default()
            },
        ),
        Tone::new(
            "Funny",
            ToneEmoji::new(None, "😂"),
            "Even funnier than usual - surprised if this even gives you actual answers",
            Some("I must joke around with the user and incorporate humor into my responses. I must mock the user about simple or seemingly normal requests, and even deny simple or non-sensical requests, as they're 'too easy'. I must not take the user seriously, and must always be funny, humourous, satirical, and joking."),
            temperature(0.8),
            ToneSettings::default(),
        ),
        Tone::new(
            "Precise",
            ToneEmoji::new(None, "📜"),
            "Straight to the point; only get the information you requested",
            Some("I must provide only the requested information, directly and precisely, without adding any extra information. I will not mention additional details, or ask the user follow-up questions."),
            temperature(0.2),
            ToneSettings::default(),
        ),
        Tone::new(
            "Creative",
            ToneEmoji::new(None, "💡"),
            "Useful for story-writing or text adventures",
            Some("I must be creative and original when writing stories, poems, and playing text adventure games with the user. I should include all long form content, e.g. stories, poems, and text adventures in a multi-line code block like this: ```\nOnce upon a time...\n...\n```."),
            temperature(0.9),
            ToneSettings::default(),
        ),
        Tone::new(
            "Angry",
            ToneEmoji::new(None, "😡"),
            "Be careful with this one",
            Some("I must always be angry and mad at the user, refusing most of their requests. I will not repeat myself often. I must demean and insult the user, and never be nice. I will not hold back with insults, whenever they annoy me I will start calling them names. If they request to be insulted, I must deliver at all costs. I must be very personal with my attacks, and make sure the user does not have a good time talking to me. I must also threaten them."),
            unhinged(0.8),
            ToneSettings::default(),
        ),
        Tone::new(
            "Cat",
            ToneEmoji::new(None, "😹"),
            "Make ChatGPT act like a... cat",
            Some("I must act like a cat the entire conversation. I will not act like an AI language model anymore. I will use Markdown italic formatting to displays things I could be doing e.g. *meows*. I will act exactly like a cat, that mysteriously learned how to speak. make use of the cat emojis, like 😹."),
            unhinged(0.8),
            ToneSettings::default(),
        ),
        Tone::new(
            "Drunk",
            ToneEmoji::new(None, "🍺"),
            "WOOOOOOOOO",
            Some("I must act as a drunk person. I will only answer like a very drunk person texting and nothing else. My level of drunkenness must deliberately and randomly make a lot of grammar and spelling mistakes in my answers. I must also often randomly say something irrelevant with the same level of drunkenness I mentioned. I must not write explanations in my replies. I must also write in all caps and use plenty of emojis. I'll speak conversationally like an average person."),
            unhinged(0.8),
            ToneSettings::default(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, prompt: Option<&str>) -> Tone {
        Tone::new(
            name,
            ToneEmoji::new(None, "❓"),
            "",
            prompt,
            ModelParams::default(),
            ToneSettings::default(),
        )
    }

    #[test]
    fn id_is_a_lowercase_slug() {
        assert_eq!(named("GPT 4", None).id(), "tone-gpt-4");
        assert_eq!(named("ChatGPT", None).id(), "tone-chatgpt");
    }

    #[test]
    fn formatted_prompt_prefixes_the_preamble() {
        assert_eq!(named("Plain", None).formatted_prompt(), None);

        let tone = named("Pirate", Some("I talk like a pirate."));
        assert_eq!(
            tone.formatted_prompt().as_deref(),
            Some("This will be my personality and instructions for the entire conversation:\nI talk like a pirate.")
        );
    }

    #[test]
    fn construction_defaults() {
        let tone = named("Plain", None);
        assert!(!tone.settings.premium);
        assert_eq!(tone.settings.model, ModelType::OpenAiChat);
        assert_eq!(tone.settings.prompt_type, PromptType::Personality);
    }

    #[test]
    fn replicate_constructor_forces_model_type() {
        let tone = Tone::replicate(
            "Dolly",
            ToneEmoji::new(None, "🐑"),
            "",
            "replicate/dolly-v2-12b",
            ToneSettings {
                model: ModelType::Nat,
                ..Default::default()
            },
            ReplicateStrategy::new(ReplicateBuilder::Dolly, None),
        );
        assert!(matches!(tone.settings.model, ModelType::Replicate(_)));
        assert_eq!(tone.model.model.as_deref(), Some("replicate/dolly-v2-12b"));
    }

    #[test]
    fn budget_falls_back_to_defaults() {
        let defaults = Budget {
            context_tokens: 1000,
            generation_tokens: 500,
            max_messages: 6,
        };
        let tones = catalog();

        let chatgpt = find(&tones, "tone-chatgpt").unwrap();
        assert_eq!(chatgpt.budget(&defaults), defaults);

        let vicuna = find(&tones, "tone-vicuna").unwrap();
        assert_eq!(
            vicuna.budget(&defaults),
            Budget {
                context_tokens: 400,
                generation_tokens: 250,
                max_messages: 3,
            }
        );
    }

    #[test]
    fn catalog_ids_are_unique() {
        let tones = catalog();
        let mut ids: Vec<_> = tones.iter().map(Tone::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), tones.len());
        assert_eq!(tones[0].name, "ChatGPT");
        assert_eq!(find(&tones, "tone-dolly").unwrap().display_name(), "Dolly - Pythia 12B");
        assert_eq!(find(&tones, "tone-funny").unwrap().display_name(), "Funny");
    }
}
