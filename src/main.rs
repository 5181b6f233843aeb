use anyhow::Context as AnyhowContext;
use serenity::{model::prelude::*, Client};
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod constant;
mod conversation;
mod cooldown;
mod generation;
mod handler;
mod image;
mod replicate;
mod tone;
mod util;

use config::Configuration;
use generation::ChatClient;
use replicate::{HttpReplicate, ReplicateModel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tonecord=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Configuration::load()?;

    let discord_token = config
        .authentication
        .discord_token
        .clone()
        .context("Expected authentication.discord_token to be filled in config")?;

    if config.authentication.replicate_token.is_none() {
        warn!("authentication.replicate_token is not set; Replicate will reject requests");
    }
    let replicate = HttpReplicate::new(
        &config.replicate.api_base,
        config.authentication.replicate_token.clone(),
    );
    let chat = ChatClient::new(ReplicateModel::new(replicate));

    let mut client = Client::builder(discord_token, GatewayIntents::default())
        .event_handler(handler::Handler::new(config, chat))
        .await
        .context("Error creating client")?;

    if let Err(why) = client.start().await {
        error!("Client error: {why:?}");
    }

    Ok(())
}
