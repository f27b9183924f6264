use std::sync::Arc;

use ai_client::{AiClient, ReplyRequest};
use anyhow::Result;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode};
use teloxide::utils::command::BotCommands;
use teloxide::utils::html;
use tracing::instrument;

use crate::config::Settings;
use crate::format::format_reply;
use crate::keyboard::{model_keyboard, parse_callback};
use crate::models::{Model, ModelStore};

pub const PROCESSING: &str = "⏳ Processing request...";
pub const PROCESSING_FAILED: &str = "⚠️ Request processing error";
pub const TEXT_ONLY: &str = "Only text messages are supported";

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot and reset the model")]
    Start,
    #[command(description = "choose the AI model")]
    Model,
    #[command(description = "show this help")]
    Help,
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    let messages = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_message));

    dptree::entry()
        .branch(messages)
        .branch(Update::filter_callback_query().endpoint(handle_model_callback))
}

fn greeting(default: &Model) -> String {
    format!(
        "{}\n\nChoose an AI model or open the web app.\nDefault: {}",
        html::bold("🤖 AI Assistant Bot"),
        html::escape(default.title)
    )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    store: Arc<ModelStore>,
    settings: Arc<Settings>,
) -> Result<()> {
    let user = msg.from().map(|user| user.id);

    match cmd {
        Command::Start => {
            let model = match user {
                Some(user) => store.reset(user).await,
                None => store.default_model(),
            };
            bot.send_message(msg.chat.id, greeting(model))
                .parse_mode(ParseMode::Html)
                .reply_markup(model_keyboard(None, settings.web_app_url.as_ref()))
                .await?;
        }
        Command::Model => {
            let model = match user {
                Some(user) => store.get(user).await,
                None => store.default_model(),
            };
            bot.send_message(msg.chat.id, "🔧 Choose an AI model:")
                .reply_markup(model_keyboard(Some(model), settings.web_app_url.as_ref()))
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
    }
    Ok(())
}

async fn handle_model_callback(
    bot: Bot,
    q: CallbackQuery,
    store: Arc<ModelStore>,
    settings: Arc<Settings>,
) -> Result<()> {
    let Some(key) = q.data.as_deref().and_then(parse_callback) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let Some(model) = store.select(q.from.id, key).await else {
        bot.answer_callback_query(q.id)
            .text("❌ Unknown model")
            .show_alert(true)
            .await?;
        return Ok(());
    };
    tracing::info!("User {} selected: {}", q.from.id.0, model.key);

    if let Some(message) = &q.message {
        let edited = bot
            .edit_message_text(
                message.chat.id,
                message.id,
                format!("🎛️ <b>Current model:</b>\n{}", html::escape(model.title)),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(model_keyboard(Some(model), settings.web_app_url.as_ref()))
            .await;

        if let Err(e) = edited {
            tracing::error!("Model select error: {e}");
            bot.answer_callback_query(q.id)
                .text("⚠️ Model selection error")
                .show_alert(true)
                .await?;
            return Ok(());
        }
    }

    bot.answer_callback_query(q.id)
        .text(format!("✅ Selected: {}", model.title))
        .await?;
    Ok(())
}

#[instrument(skip_all, fields(user, model, reply_len))]
async fn handle_message(
    bot: Bot,
    msg: Message,
    client: Arc<AiClient>,
    store: Arc<ModelStore>,
    settings: Arc<Settings>,
) -> Result<()> {
    let span = tracing::Span::current();

    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, TEXT_ONLY).await?;
        return Ok(());
    };

    let model = match msg.from() {
        Some(user) => {
            span.record("user", user.id.0);
            store.get(user.id).await
        }
        None => store.default_model(),
    };
    span.record("model", model.key);
    tracing::info!("Query: {text}");

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    let processing = bot.send_message(msg.chat.id, PROCESSING).await?;

    let reply = relay(&client, &settings, text, model).await;

    if let Err(e) = bot.delete_message(msg.chat.id, processing.id).await {
        tracing::warn!("Failed to delete the processing message: {e}");
    }

    match reply {
        Ok(reply) => {
            span.record("reply_len", reply.len());
            for part in format_reply(model, &reply) {
                bot.send_message(msg.chat.id, part)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            tracing::info!("SUCCESS");
        }
        Err(e) => {
            tracing::error!("Error: {e:#}");
            bot.send_message(msg.chat.id, PROCESSING_FAILED).await?;
        }
    }
    Ok(())
}

/// Sends `text` to the AI service on behalf of `model`. Service failures come
/// back as placeholder text; only an invalid request is an error.
async fn relay(
    client: &AiClient,
    settings: &Settings,
    text: &str,
    model: &Model,
) -> Result<String> {
    let request = ReplyRequest::new(
        text,
        settings.endpoint.clone(),
        Some(model.key.to_string()),
    )?;
    Ok(client.send(&request).await)
}
