// Push delivery transports
//
// - WebhookPush: POSTs the push message as JSON to a configured URL
// - LogPush: no transport configured; logs and drops

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use notifagg_engine::{PushDelivery, PushMessage, PushReceipt};
use std::time::Duration;
use tracing::{debug, info};

pub struct WebhookPush {
    client: reqwest::Client,
    url: String,
}

impl WebhookPush {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create reqwest client: {}", e))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl PushDelivery for WebhookPush {
    async fn send_push(&self, message: PushMessage) -> Result<PushReceipt> {
        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .with_context(|| format!("push webhook request to {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("push webhook returned {}", status);
        }

        debug!(recipient_id = %message.recipient_id, %status, "push delivered");
        Ok(PushReceipt::Delivered)
    }
}

pub struct LogPush;

#[async_trait]
impl PushDelivery for LogPush {
    async fn send_push(&self, message: PushMessage) -> Result<PushReceipt> {
        info!(
            recipient_id = %message.recipient_id,
            title = %message.title,
            body = %message.body,
            "push (no webhook configured)"
        );
        Ok(PushReceipt::Dropped {
            reason: "no push webhook configured".to_string(),
        })
    }
}
