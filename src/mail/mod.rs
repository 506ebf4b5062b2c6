use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

mod http;

pub use http::HttpMailer;

const RESET_SUBJECT: &str = "Phare Password Reset";

/// `<origin>/resetPassword/<resetId>/<email>`, each segment percent-encoded.
pub fn reset_link(frontend_origin: &str, reset_id: Uuid, email: &str) -> anyhow::Result<String> {
    let mut url = reqwest::Url::parse(frontend_origin)
        .with_context(|| format!("invalid frontend origin: {frontend_origin}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("frontend origin cannot hold a path: {frontend_origin}"))?
        .pop_if_empty()
        .extend(["resetPassword", &reset_id.to_string(), email]);
    Ok(url.into())
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResetEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl ResetEmail {
    pub fn new(to: &str, from: &str, link: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: RESET_SUBJECT.to_string(),
            text: link.to_string(),
            html: format!("<b>{}</b>", escape_html(link)),
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &ResetEmail) -> anyhow::Result<()>;
}

/// Fallback when no relay is configured: the message is only logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &ResetEmail) -> anyhow::Result<()> {
        // The link is a credential; only the recipient goes to the log.
        info!(to = %email.to, subject = %email.subject, "mail relay not configured; reset mail not delivered");
        Ok(())
    }
}
