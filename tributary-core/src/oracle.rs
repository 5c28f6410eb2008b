use std::time::Duration;

use serde_json::{Value, json};

use crate::config::OracleConfig;

const OPENROUTER_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const ORACLE_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug)]
pub enum OracleError {
    /// Transport-level failure: connect, timeout, TLS.
    Http(String),
    /// The provider answered with a non-success status.
    Api(String),
    /// The provider answered but produced no usable content.
    Empty,
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Http(message) => write!(f, "merge oracle request failed: {message}"),
            OracleError::Api(message) => write!(f, "merge oracle rejected the request: {message}"),
            OracleError::Empty => write!(f, "merge oracle returned no content"),
        }
    }
}

impl std::error::Error for OracleError {}

/// The merge seam. The engine commits to MERGE; an oracle decides how the
/// two contents become one. Implementations must be total in the sense that
/// any failure is reported, never a silent pick-a-side.
pub trait MergeOracle {
    fn merge(&self, local: &str, source: &str) -> Result<String, OracleError>;
}

/// Default oracle: one OpenRouter chat completion per merge.
pub struct OpenRouterOracle {
    client: reqwest::blocking::Client,
    config: OracleConfig,
}

impl OpenRouterOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(ORACLE_TIMEOUT)
            .build()
            .map_err(|err| OracleError::Http(err.to_string()))?;
        Ok(Self { client, config })
    }
}

impl MergeOracle for OpenRouterOracle {
    fn merge(&self, local: &str, source: &str) -> Result<String, OracleError> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": crate::MERGE_SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!(
                        "<target>\n{local}\n</target>\n\n<source>\n{source}\n</source>"
                    )
                }
            ]
        });

        let response = self
            .client
            .post(OPENROUTER_COMPLETIONS_URL)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|err| OracleError::Http(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(OracleError::Api(format!("{status}: {}", detail.trim())));
        }

        let payload: Value = response
            .json()
            .map_err(|err| OracleError::Api(err.to_string()))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(OracleError::Empty)?;

        let merged = strip_code_fence(content);
        if merged.trim().is_empty() {
            return Err(OracleError::Empty);
        }
        Ok(merged)
    }
}

/// Deferred-credential oracle: resolves configuration and builds the HTTP
/// client on the first merge, so ingest runs that never diverge never need an
/// API key at all.
pub struct LazyOpenRouterOracle {
    model: Option<String>,
    api_key_env: Option<String>,
    inner: once_cell::sync::OnceCell<OpenRouterOracle>,
}

impl LazyOpenRouterOracle {
    pub fn new(model: Option<String>, api_key_env: Option<String>) -> Self {
        Self {
            model,
            api_key_env,
            inner: once_cell::sync::OnceCell::new(),
        }
    }
}

impl MergeOracle for LazyOpenRouterOracle {
    fn merge(&self, local: &str, source: &str) -> Result<String, OracleError> {
        let oracle = self.inner.get_or_try_init(|| {
            let config = crate::config::resolve_oracle_config(
                self.model.as_deref(),
                self.api_key_env.as_deref(),
            )
            .map_err(|err| OracleError::Api(err.to_string()))?;
            OpenRouterOracle::new(config)
        })?;
        oracle.merge(local, source)
    }
}

/// Models often wrap whole-file answers in a code fence despite instructions.
/// Strip one outer fence pair; leave anything else alone.
pub fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return content.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() < 2 || !lines.last().is_some_and(|line| line.trim() == "```") {
        return content.to_string();
    }
    lines.remove(0);
    lines.pop();
    let mut body = lines.join("\n");
    body.push('\n');
    body
}
