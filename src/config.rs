use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Where password-reset mail goes and how long a reset link stays valid.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub frontend_origin: String,
    pub ttl_minutes: i64,
}

/// Mail relay settings. `api_url == None` means mail is only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub reset: ResetConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = get("JWT_SECRET").context("JWT_SECRET is not set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");
        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "phare".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "phare-users".into()),
            ttl_minutes: parse_minutes(get("JWT_TTL_MINUTES"), 60),
        };

        let frontend_origin =
            get("FRONTEND_ORIGIN").unwrap_or_else(|| "http://localhost:3000".into());
        reqwest::Url::parse(&frontend_origin)
            .with_context(|| format!("FRONTEND_ORIGIN is not a valid URL: {frontend_origin}"))?;
        let reset = ResetConfig {
            frontend_origin,
            ttl_minutes: parse_minutes(get("RESET_TTL_MINUTES"), 30),
        };

        let api_url = get("MAIL_API_URL").filter(|v| !v.trim().is_empty());
        let api_key = get("MAIL_API_KEY");
        if api_url.is_some() && api_key.is_none() {
            anyhow::bail!("MAIL_API_KEY is required when MAIL_API_URL is set");
        }
        let mail = MailConfig {
            api_url,
            api_key,
            from: get("MAIL_FROM").unwrap_or_else(|| "no-reply@phare.local".into()),
        };

        Ok(Self {
            database_url,
            jwt,
            reset,
            mail,
        })
    }
}

/// Upper bound for any configured lifetime: ten years.
pub const MAX_TTL_MINUTES: i64 = 10 * 366 * 24 * 60;

fn parse_minutes(raw: Option<String>, default: i64) -> i64 {
    raw.and_then(|v| v.parse::<i64>().ok())
        .filter(|m| *m > 0)
        .map(|m| m.min(MAX_TTL_MINUTES))
        .unwrap_or(default)
}
