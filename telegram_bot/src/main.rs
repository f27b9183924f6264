mod config;
mod format;
mod handlers;
mod keyboard;
mod models;
mod webhook;

use ai_client::AiClient;
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;

use config::{Args, Settings};
use handlers::Command;
use models::{model_keys, ModelStore};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let settings = Settings::from_args(&args)?;
    tracing::info!(
        "Starting TG bot connected to AI service on [{}]",
        settings.endpoint
    );

    let bot = match &args.tg_token {
        Some(token) => Bot::new(token),
        None => {
            tracing::warn!("Telegram token is not provided, creating from env");
            Bot::from_env()
        }
    };
    let bot_info = bot.get_me().await?;
    tracing::info!("Started bot: @{}", bot_info.username());
    bot.set_my_commands(Command::bot_commands()).await?;

    let client = Arc::new(AiClient::new(settings.client.clone())?);
    let store = Arc::new(ModelStore::new(settings.default_model));
    tracing::info!("Available models: {}", model_keys().join(", "));

    let hook = settings.webhook.clone();
    let settings = Arc::new(settings);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handlers::schema())
        .dependencies(dptree::deps![client, store, settings])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build();

    match hook {
        Some(hook) => {
            tracing::info!(
                "Setting webhook {}, listening on {}",
                hook.url,
                hook.address
            );
            let options = webhooks::Options::new(hook.address, hook.url);
            let (listener, stop_flag, router) = webhooks::axum_to_router(bot, options).await?;
            let app = webhook::with_health_route(router);
            tokio::spawn(async move {
                if let Err(err) = webhook::serve(app, hook.address, stop_flag).await {
                    tracing::error!("Webhook server failed: {err:#}");
                }
            });
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            tracing::info!("No webhook configured, using long polling");
            dispatcher.dispatch().await;
        }
    }

    tracing::info!("Bot shutdown");
    Ok(())
}
