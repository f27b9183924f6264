use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};

use crate::models::{Model, MODELS};

pub const CALLBACK_PREFIX: &str = "model_";

pub fn callback_data(model: &Model) -> String {
    format!("{CALLBACK_PREFIX}{}", model.key)
}

/// Extracts the model key from a keyboard callback, `None` for foreign data.
pub fn parse_callback(data: &str) -> Option<&str> {
    data.strip_prefix(CALLBACK_PREFIX)
}

/// One row per model, the selected one marked green, then the optional
/// Web App button.
pub fn model_keyboard(selected: Option<&Model>, web_app: Option<&Url>) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = MODELS
        .iter()
        .map(|model| {
            let icon = if selected.map(|s| s.key) == Some(model.key) {
                "🟢"
            } else {
                "⚪"
            };
            vec![InlineKeyboardButton::callback(
                format!("{icon} {}", model.title),
                callback_data(model),
            )]
        })
        .collect();

    if let Some(url) = web_app {
        rows.push(vec![InlineKeyboardButton::web_app(
            "🌍 Web App",
            WebAppInfo { url: url.clone() },
        )]);
    }

    InlineKeyboardMarkup::new(rows)
}
