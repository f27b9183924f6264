use std::net::SocketAddr;
use std::time::Duration;

use ai_client::{ClientConfig, ResponseMode, RetryPolicy};
use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::Url;

use crate::models::{find_model, model_keys, Model, DEFAULT_MODEL};

pub const WEBHOOK_PATH: &str = "/webhook";

#[derive(Parser, Debug)]
#[clap(
    author = "Alex Markov",
    version = "0.1.0",
    about = "Telegram bot relaying chat messages to an AI completion service"
)]
pub struct Args {
    #[clap(short, long, env = "TG_TOKEN", hide_env_values = true)]
    pub tg_token: Option<String>,
    #[clap(
        short,
        long,
        env = "AI_SERVICE_URL",
        default_value = "http://127.0.0.1:8080/chat"
    )]
    pub ai_service_url: String,
    /// Public HTTPS base URL. Without it (or when empty) the bot uses long polling.
    #[clap(short, long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,
    #[clap(short, long, env = "PORT", default_value = "10000")]
    pub port: u16,
    #[clap(long, env = "DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub default_model: String,
    #[clap(long, env = "WEB_APP_URL", default_value = "https://w5model.netlify.app/")]
    pub web_app_url: Option<String>,
    #[clap(long, default_value = "60")]
    pub timeout_secs: u64,
    #[clap(long, default_value = "3")]
    pub max_attempts: u32,
    #[clap(long, default_value = "5")]
    pub backoff_secs: u64,
    /// Ask the service for a `text/event-stream` reply.
    #[clap(long)]
    pub stream: bool,
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Webhook {
    pub url: Url,
    pub address: SocketAddr,
}

/// Validated settings shared with the handlers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Url,
    pub default_model: &'static Model,
    pub web_app_url: Option<Url>,
    pub webhook: Option<Webhook>,
    pub client: ClientConfig,
}

impl Settings {
    pub fn from_args(args: &Args) -> Result<Self> {
        let endpoint = ai_client::parse_endpoint(&args.ai_service_url)
            .with_context(|| format!("invalid AI service URL {:?}", args.ai_service_url))?;

        let Some(default_model) = find_model(&args.default_model) else {
            bail!(
                "unknown default model {:?}, expected one of {}",
                args.default_model,
                model_keys().join(", ")
            );
        };

        let web_app_url = args
            .web_app_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(Url::parse)
            .transpose()
            .context("invalid Web App URL")?;

        let webhook = args
            .webhook_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|base| webhook(base, args.port))
            .transpose()?;

        let client = ClientConfig {
            timeout: Duration::from_secs(args.timeout_secs),
            retry: RetryPolicy {
                max_attempts: args.max_attempts,
                status_backoff: Duration::from_secs(args.backoff_secs),
                network_backoff: Duration::from_secs(args.backoff_secs),
            },
            mode: if args.stream {
                ResponseMode::Stream
            } else {
                ResponseMode::Json
            },
        };

        Ok(Self {
            endpoint,
            default_model,
            web_app_url,
            webhook,
            client,
        })
    }
}

fn webhook(base: &str, port: u16) -> Result<Webhook> {
    let full = format!("{}{WEBHOOK_PATH}", base.trim_end_matches('/'));
    let url = Url::parse(&full).with_context(|| format!("invalid webhook URL {full:?}"))?;
    if url.scheme() != "https" {
        bail!("WEBHOOK_URL must use HTTPS, got {full:?}");
    }
    Ok(Webhook {
        url,
        address: SocketAddr::from(([0, 0, 0, 0], port)),
    })
}
