use std::time::Duration;

use anyhow::Context;
use loader::{Credentials, RequestConfig};
use reqwest::Method;
use reqwest::header::{self, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

pub struct Config {
    /// Resource to load. Loading is disabled when absent.
    pub url: Option<String>,
    /// Prefixed to urls starting with `/`
    pub base_url: Option<String>,
    pub method: Method,
    /// Sent as a JSON body when set.
    pub body: Option<String>,
    pub timeout: Option<Duration>,
    pub bearer_token: Option<SecretString>,
    pub credentials: Credentials,
}

impl Config {
    /// Read configuration from the process environment. A url given as the
    /// first command line argument overrides `LOADER_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok(), std::env::args().nth(1))
    }

    pub fn from_vars(
        lookup: impl Fn(&str) -> Option<String>,
        url_arg: Option<String>,
    ) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let method = match var("LOADER_METHOD") {
            Some(method) => Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid LOADER_METHOD: {method}"))?,
            None => Method::GET,
        };

        let timeout = var("LOADER_TIMEOUT_SECS")
            .map(|secs| {
                secs.parse::<u64>().with_context(|| {
                    format!("Invalid LOADER_TIMEOUT_SECS: {secs}")
                })
            })
            .transpose()?
            .map(Duration::from_secs);

        let credentials = match var("LOADER_CREDENTIALS").as_deref() {
            None | Some("same-origin") => Credentials::SameOrigin,
            Some("omit") => Credentials::Omit,
            Some("include") => Credentials::Include,
            Some(other) => {
                anyhow::bail!("Invalid LOADER_CREDENTIALS: {other}")
            }
        };

        Ok(Config {
            url: url_arg.or_else(|| var("LOADER_URL")),
            base_url: var("LOADER_BASE_URL"),
            method,
            body: var("LOADER_BODY"),
            timeout,
            bearer_token: var("LOADER_BEARER_TOKEN").map(SecretString::from),
            credentials,
        })
    }

    pub fn request_config(&self) -> anyhow::Result<RequestConfig> {
        let mut config = RequestConfig::get()
            .method(self.method.clone())
            .credentials(self.credentials);
        if let Some(body) = &self.body {
            config = config.body(body.as_bytes()).header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        if let Some(timeout) = self.timeout {
            config = config.timeout(timeout);
        }
        if let Some(token) = &self.bearer_token {
            config = config
                .bearer_auth(token.expose_secret())
                .context("Invalid LOADER_BEARER_TOKEN")?;
        }
        Ok(config)
    }
}
