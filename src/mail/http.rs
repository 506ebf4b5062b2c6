use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tracing::debug;

use super::{Mailer, ResetEmail};

/// Delivers mail through an HTTP relay that accepts the message as JSON.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &ResetEmail) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .context("send mail to relay")?;

        if !response.status().is_success() {
            bail!("mail relay returned error status: {}", response.status());
        }

        debug!(to = %email.to, "reset mail accepted by relay");
        Ok(())
    }
}
