use serenity::{
    async_trait,
    http::Http,
    model::prelude::{
        interaction::{
            application_command::{
                ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue,
            },
            InteractionResponseType,
        },
        Message,
    },
};
use std::{future::Future, time::Duration};
use tracing::error;

use crate::constant::MESSAGE_LIMIT;

pub fn get_value<'a>(
    options: &'a [CommandDataOption],
    name: &'a str,
) -> Option<&'a CommandDataOptionValue> {
    options
        .iter()
        .find(|v| v.name == name)
        .and_then(|v| v.resolved.as_ref())
}

pub fn value_to_string(v: &CommandDataOptionValue) -> Option<String> {
    match v {
        CommandDataOptionValue::String(v) => Some(v.clone()),
        _ => None,
    }
}

#[async_trait]
pub trait DiscordInteraction: Send + Sync {
    async fn create(&self, http: &Http, message: &str) -> anyhow::Result<()>;
    async fn get_interaction_message(&self, http: &Http) -> anyhow::Result<Message>;
    async fn edit(&self, http: &Http, message: &str) -> anyhow::Result<()>;
    async fn create_or_edit(&self, http: &Http, message: &str) -> anyhow::Result<()>;
}
#[async_trait]
impl DiscordInteraction for ApplicationCommandInteraction {
    async fn create(&self, http: &Http, msg: &str) -> anyhow::Result<()> {
        Ok(self
            .create_interaction_response(http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| {
                        message
                            .content(msg)
                            .allowed_mentions(|m| m.empty_roles().empty_users().empty_parse())
                    })
            })
            .await?)
    }
    async fn get_interaction_message(&self, http: &Http) -> anyhow::Result<Message> {
        Ok(self.get_interaction_response(http).await?)
    }
    async fn edit(&self, http: &Http, message: &str) -> anyhow::Result<()> {
        Ok(self
            .get_interaction_message(http)
            .await?
            .edit(http, |m| m.content(message))
            .await?)
    }
    async fn create_or_edit(&self, http: &Http, message: &str) -> anyhow::Result<()> {
        Ok(
            if let Ok(mut msg) = self.get_interaction_message(http).await {
                msg.edit(http, |m| m.content(message)).await?
            } else {
                self.create(http, message).await?
            },
        )
    }
}

/// Runs the [body] and edits the interaction response if an error occurs.
pub async fn run_and_report_error(
    interaction: &dyn DiscordInteraction,
    http: &Http,
    body: impl Future<Output = anyhow::Result<()>>,
) {
    if let Err(err) = body.await {
        if let Err(report) = interaction
            .create_or_edit(http, &format!("Error: {err}"))
            .await
        {
            error!("failed to report `{err}`: {report:?}");
        }
    }
}

/// Cuts `text` down to what fits in a Discord message, marking the cut.
pub fn truncate(text: &str) -> String {
    truncate_to(text, MESSAGE_LIMIT)
}

pub fn truncate_to(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{}m {}s", duration.as_secs() / 60, duration.as_secs() % 60)
    }
}
