use std::collections::HashMap;

use teloxide::types::UserId;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    pub key: &'static str,
    pub title: &'static str,
}

pub const MODELS: &[Model] = &[
    Model {
        key: "deepseek",
        title: "🧠 DeepSeek 0324",
    },
    Model {
        key: "deepseek-r1",
        title: "🚀 DeepSeek R1",
    },
    Model {
        key: "deepseek-v3",
        title: "💎 DeepSeek v3",
    },
    Model {
        key: "gemini",
        title: "🔮 Gemini Pro",
    },
    Model {
        key: "gemma",
        title: "💎 Gemma 27B",
    },
    Model {
        key: "qwen",
        title: "🎲 Qwen 32B",
    },
    Model {
        key: "qwen 2.5",
        title: "🎲 Qwen 2.5",
    },
    Model {
        key: "llama-4-maverick",
        title: "🦙 Llama Maverick",
    },
    Model {
        key: "llama-4-scout",
        title: "🦙 Llama Scout",
    },
];

pub const DEFAULT_MODEL: &str = "deepseek";

pub fn find_model(key: &str) -> Option<&'static Model> {
    MODELS.iter().find(|model| model.key == key)
}

pub fn model_keys() -> Vec<&'static str> {
    MODELS.iter().map(|model| model.key).collect()
}

/// Which model each user picked. Users without an entry get the default.
#[derive(Debug)]
pub struct ModelStore {
    default: &'static Model,
    selections: RwLock<HashMap<UserId, &'static Model>>,
}

impl ModelStore {
    pub fn new(default: &'static Model) -> Self {
        Self {
            default,
            selections: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_model(&self) -> &'static Model {
        self.default
    }

    pub async fn get(&self, user: UserId) -> &'static Model {
        self.selections
            .read()
            .await
            .get(&user)
            .copied()
            .unwrap_or(self.default)
    }

    /// Stores `key` for `user`. Returns `None` if the key is not in the catalog.
    pub async fn select(&self, user: UserId, key: &str) -> Option<&'static Model> {
        let model = find_model(key)?;
        self.selections.write().await.insert(user, model);
        Some(model)
    }

    pub async fn reset(&self, user: UserId) -> &'static Model {
        self.selections.write().await.insert(user, self.default);
        self.default
    }
}
