//! Telegram adapter (teloxide).
//!
//! Implements the core `NotificationSink` over the Bot API and hosts the
//! operator front end (registration conversation and commands).

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use teloxide::{prelude::*, types::InputFile};
use tokio::time::sleep;

pub mod handlers;
pub mod router;

use ytb_core::{
    config::Config,
    domain::OperatorId,
    errors::Error,
    messaging::{port::NotificationSink, types::SinkCapabilities},
    Result,
};

// Extra room over the upload timeout so the core's timer fires first.
const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);
const FLOOD_BACKOFF: Duration = Duration::from_secs(5);

/// Build the bot with an HTTP client that tolerates long uploads, pointed at a
/// local Bot API server when one is configured.
pub fn build_bot(cfg: &Config) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(cfg.upload_timeout + CLIENT_TIMEOUT_MARGIN)
        .build()?;
    let mut bot = Bot::with_client(cfg.telegram_bot_token.clone(), client);
    if let Some(api_url) = &cfg.telegram_api_url {
        bot = bot.set_api_url(url::Url::parse(api_url)?);
    }
    Ok(bot)
}

#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(operator: OperatorId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(operator.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        match e {
            teloxide::RequestError::Network(e) => Error::Network(format!("telegram: {e}")),
            teloxide::RequestError::Io(e) => Error::Network(format!("telegram: {e}")),
            teloxide::RequestError::RetryAfter(_) => {
                Error::Network("telegram: flood control".to_string())
            }
            other => Error::External(format!("telegram error: {other}")),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(_) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(FLOOD_BACKOFF).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities::TELEGRAM
    }

    async fn send_media(&self, operator: OperatorId, artifact: &Path, caption: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_video(Self::tg_chat(operator), InputFile::file(artifact.to_path_buf()))
                .caption(caption.to_string())
                .supports_streaming(true)
        })
        .await?;
        Ok(())
    }

    async fn send_text(&self, operator: OperatorId, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(operator), text.to_string())
        })
        .await?;
        Ok(())
    }
}
