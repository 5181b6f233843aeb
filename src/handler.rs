use crate::{
    config::{CommandKind, Configuration},
    constant,
    conversation::{Conversations, Exchange},
    cooldown::Cooldowns,
    generation::{ChatClient, GenerationError, GenerationOptions, Progress},
    replicate::ReplicateApi,
    tone::{self, Tone},
    util::{self, run_and_report_error, DiscordInteraction},
};
use anyhow::Context as AnyhowContext;
use serenity::{
    async_trait,
    client::{Context, EventHandler},
    futures::StreamExt,
    http::Http,
    model::{
        application::interaction::Interaction,
        prelude::{
            command::{Command, CommandOptionType},
            interaction::application_command::ApplicationCommandInteraction,
            *,
        },
    },
};
use std::{
    collections::HashSet,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

pub struct Handler {
    config: Configuration,
    client: ChatClient,
    conversations: Conversations,
    cooldowns: Cooldowns,
}
impl Handler {
    pub fn new(config: Configuration, client: ChatClient) -> Self {
        let conversations = Conversations::new(config.inference.history_capacity);
        let cooldowns = Cooldowns::new(Duration::from_millis(config.inference.cooldown_ms));
        Self {
            config,
            client,
            conversations,
            cooldowns,
        }
    }
}
#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected; registering commands...", ready.user.name);

        if let Err(err) = ready_handler(&ctx.http, &self.config).await {
            error!("Error while registering commands: `{err}`");
            std::process::exit(1);
        }

        info!("{} is good to go!", ready.user.name);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let http = &ctx.http;
        if let Interaction::ApplicationCommand(cmd) = interaction {
            let name = cmd.data.name.as_str();
            let Some(command) = self.config.commands.get(name).filter(|c| c.enabled) else {
                return;
            };

            match command.kind {
                CommandKind::Chat => run_and_report_error(&cmd, http, self.chat(&cmd, http)).await,
                CommandKind::Reset => {
                    run_and_report_error(&cmd, http, self.reset(&cmd, http)).await
                }
            }
        }
    }
}

async fn ready_handler(http: &Http, config: &Configuration) -> anyhow::Result<()> {
    let registered_commands = Command::get_global_application_commands(http).await?;
    let registered_commands: HashSet<_> = registered_commands
        .iter()
        .map(|c| c.name.as_str())
        .collect();

    let our_commands: HashSet<_> = config
        .commands
        .iter()
        .filter(|(_, v)| v.enabled)
        .map(|(k, _)| k.as_str())
        .collect();

    if registered_commands != our_commands {
        // If the commands registered with Discord don't match the commands configured
        // for this bot, reset them entirely.
        Command::set_global_application_commands(http, |c| c.set_application_commands(vec![]))
            .await?;
    }

    for (name, command) in config.commands.iter().filter(|(_, v)| v.enabled) {
        Command::create_global_application_command(http, |cmd| {
            cmd.name(name).description(command.description.as_str());
            if command.kind == CommandKind::Chat {
                create_chat_options(cmd, &config.tones);
            }
            cmd
        })
        .await?;
    }

    Ok(())
}

fn create_chat_options<'a>(
    command: &'a mut serenity::builder::CreateApplicationCommand,
    tones: &[tone::Tone],
) -> &'a mut serenity::builder::CreateApplicationCommand {
    command
        .create_option(|opt| {
            opt.name(constant::value::PROMPT)
                .description("What to say to the bot.")
                .kind(CommandOptionType::String)
                .required(true)
        })
        .create_option(|opt| {
            opt.name(constant::value::TONE)
                .description("Which tone the bot should respond in.")
                .kind(CommandOptionType::String)
                .required(false);
            // Discord allows at most 25 choices.
            for tone in tones.iter().take(25) {
                opt.add_string_choice(format!("{} {}", tone.emoji.fallback, tone.name), tone.id());
            }
            opt
        })
}

impl Handler {
    async fn chat(&self, cmd: &ApplicationCommandInteraction, http: &Http) -> anyhow::Result<()> {
        use constant::value as v;
        use util::value_to_string;

        let inference = &self.config.inference;

        let options = &cmd.data.options;
        let user_prompt = util::get_value(options, v::PROMPT)
            .and_then(value_to_string)
            .context("no prompt specified")?;

        let user_prompt = if inference.replace_newlines {
            user_prompt.replace("\\n", "\n")
        } else {
            user_prompt
        };

        let tone = match util::get_value(options, v::TONE).and_then(value_to_string) {
            Some(id) => tone::find(&self.config.tones, &id)
                .with_context(|| format!("unknown tone `{id}`"))?,
            None => self.config.default_tone().context("no tones are configured")?,
        };

        admit(&self.config, &self.client, &self.cooldowns, cmd.user.id, tone)?;

        let thinking = format!(
            "{} **{}** is thinking...",
            tone.emoji.fallback,
            tone.display_name()
        );
        if let Err(err) = cmd.create(http, &thinking).await {
            self.cooldowns.clear(cmd.user.id);
            return Err(err);
        }

        let (progress_tx, progress_rx) = flume::unbounded::<Progress>();
        let options = GenerationOptions {
            prompt: user_prompt.clone(),
            tone,
            budget: tone.budget(&inference.defaults),
            history: self.conversations.history(cmd.user.id),
            preamble: &inference.preamble,
            progress: Box::new(move |progress| {
                progress_tx.send(progress).ok();
            }),
        };

        debug!(user = %cmd.user.tag(), tone = %tone.name, "starting generation");

        let update_interval =
            Duration::from_millis(inference.discord_message_update_interval_ms);
        let (result, streamed) = tokio::join!(
            self.client.complete(options),
            stream_progress(cmd, http, progress_rx, update_interval),
        );

        if let Err(err) = streamed {
            warn!("failed to stream progress: {err:?}");
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                self.cooldowns.clear(cmd.user.id);
                return Err(err.into());
            }
        };

        info!(
            user = %cmd.user.tag(),
            tone = %tone.name,
            prompt_tokens = response.usage.prompt,
            completion_tokens = response.usage.completion,
            duration_ms = response.duration.as_millis() as u64,
            "generation finished"
        );

        let footer = format!(
            "*{} {} · {} tokens · {}*",
            tone.emoji.fallback,
            tone.display_name(),
            response.usage.prompt + response.usage.completion,
            util::format_duration(response.duration)
        );
        let body = if response.text.trim().is_empty() {
            "*The model didn't say anything.*"
        } else {
            response.text.as_str()
        };
        let body = util::truncate_to(
            body,
            constant::MESSAGE_LIMIT.saturating_sub(footer.chars().count() + 2),
        );
        cmd.edit(http, &format!("{body}\n\n{footer}")).await?;

        self.conversations.push(
            cmd.user.id,
            Exchange {
                input: user_prompt,
                output: response.text,
            },
        );

        Ok(())
    }

    async fn reset(&self, cmd: &ApplicationCommandInteraction, http: &Http) -> anyhow::Result<()> {
        let message = if self.conversations.reset(cmd.user.id) {
            "Your conversation has been reset."
        } else {
            "You don't have a conversation to reset."
        };
        cmd.create(http, message).await
    }
}

/// Lets `user` generate with `tone`, starting their cooldown.
///
/// Unavailable and premium tones are refused before the cooldown is touched.
fn admit<A: ReplicateApi>(
    config: &Configuration,
    client: &ChatClient<A>,
    cooldowns: &Cooldowns,
    user: UserId,
    tone: &Tone,
) -> anyhow::Result<()> {
    if !client.is_available(tone) {
        return Err(GenerationError::Unavailable(tone.settings.model.name()).into());
    }

    if tone.settings.premium && !config.access.premium_users.contains(&user.0) {
        anyhow::bail!(
            "The **{}** tone is only available to Premium members.",
            tone.name
        );
    }

    if let Err(remaining) = cooldowns.check(user, tone.settings.cooldown.as_ref()) {
        anyhow::bail!(
            "You're on cooldown; try again in {}.",
            util::format_duration(remaining)
        );
    }

    Ok(())
}

/// Mirrors the latest partial text into the interaction response.
///
/// Each snapshot replaces the previous one, so repeated snapshots are skipped.
async fn stream_progress(
    cmd: &ApplicationCommandInteraction,
    http: &Http,
    progress_rx: flume::Receiver<Progress>,
    update_interval: Duration,
) -> anyhow::Result<()> {
    let mut stream = progress_rx.into_stream();
    let mut last_update = Instant::now();
    let mut shown = String::new();

    while let Some(progress) = stream.next().await {
        if progress.text == shown || last_update.elapsed() < update_interval {
            continue;
        }

        cmd.edit(http, &util::truncate(&progress.text)).await?;
        shown = progress.text;
        last_update = Instant::now();
    }

    Ok(())
}
