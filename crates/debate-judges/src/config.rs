use std::time::Duration;

/// Endpoint and sampling settings for the judge model.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:8000/v1`
    pub url: String,
    /// Bearer token. Local inference servers usually need none.
    pub api_key: Option<String>,
    pub model: String,
    /// Low by default: rulings should be reproducible.
    pub temperature: f32,
    pub max_tokens: u32,
    /// HTTP-level timeout, `ARENA_JUDGE_HTTP_TIMEOUT_SECS`. Kept below the
    /// engine's per-judge bound (`ARENA_JUDGE_TIMEOUT_SECS`) so a hung
    /// request surfaces as an HTTP error rather than a judge timeout.
    pub request_timeout: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl JudgeConfig {
    /// Read `ARENA_JUDGE_*` variables through `lookup`, falling back to
    /// local defaults for anything missing or unparseable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }
        Self {
            url: lookup("ARENA_JUDGE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:8000/v1".into()),
            api_key: lookup("ARENA_JUDGE_API_KEY").filter(|k| !k.is_empty()),
            model: lookup("ARENA_JUDGE_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
            temperature: parsed(&lookup, "ARENA_JUDGE_TEMPERATURE").unwrap_or(0.2),
            max_tokens: parsed(&lookup, "ARENA_JUDGE_MAX_TOKENS").unwrap_or(1024),
            request_timeout: Duration::from_secs(parsed(&lookup, "ARENA_JUDGE_HTTP_TIMEOUT_SECS").unwrap_or(45)),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.url)
    }
}

/// Check if the judge endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{url}/models");
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
