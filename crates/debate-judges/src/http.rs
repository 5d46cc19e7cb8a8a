//! OpenAI-compatible chat completions adjudicator.

use std::sync::LazyLock;

use async_trait::async_trait;
use debate_engine::{AdjudicationRequest, Adjudicator, AdjudicatorError, Decision, Judge, JudgeRuling};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::JudgeConfig;
use crate::prompts::{system_prompt, user_prompt, PROMPT_VERSION};

/// Outermost JSON object in a model reply, tolerating code fences and prose.
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("JSON_OBJECT_RE regex should compile"));

/// Highest score a judge may award.
const MAX_SCORE: f32 = 10.0;

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct RulingPayload {
    challenger_score: f32,
    opponent_score: f32,
    winner: String,
    #[serde(default)]
    rationale: String,
}

/// Extract and validate a ruling from raw model output.
pub fn parse_ruling(text: &str) -> Result<JudgeRuling, AdjudicatorError> {
    let json = JSON_OBJECT_RE
        .find(text)
        .ok_or_else(|| AdjudicatorError::Malformed("no JSON object in reply".into()))?;
    let payload: RulingPayload = serde_json::from_str(json.as_str())
        .map_err(|e| AdjudicatorError::Malformed(e.to_string()))?;

    let decision = match payload.winner.trim().to_lowercase().as_str() {
        "challenger" => Decision::Challenger,
        "opponent" => Decision::Opponent,
        "tie" | "draw" => Decision::Tie,
        other => {
            return Err(AdjudicatorError::Malformed(format!(
                "unknown winner '{}'",
                other
            )))
        }
    };

    for score in [payload.challenger_score, payload.opponent_score] {
        if !(0.0..=MAX_SCORE).contains(&score) {
            return Err(AdjudicatorError::Malformed(format!(
                "score {} outside 0..={}",
                score, MAX_SCORE
            )));
        }
    }

    Ok(JudgeRuling {
        challenger_score: payload.challenger_score,
        opponent_score: payload.opponent_score,
        decision,
        rationale: payload.rationale.trim().to_string(),
    })
}

/// Judges debates by prompting a chat completions endpoint once per persona.
#[derive(Clone)]
pub struct HttpAdjudicator {
    config: JudgeConfig,
    http: reqwest::Client,
}

impl HttpAdjudicator {
    pub fn new(config: JudgeConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    async fn complete(&self, judge: &Judge, request: &AdjudicationRequest) -> Result<String, AdjudicatorError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(judge),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(request),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut call = self.http.post(self.config.completions_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await.map_err(|e| {
            if e.is_timeout() {
                AdjudicatorError::Timeout(self.config.request_timeout)
            } else {
                AdjudicatorError::Request(format!("HTTP request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdjudicatorError::Request(format!(
                "judge API error ({}): {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdjudicatorError::Malformed(format!("Failed to parse response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdjudicatorError::Malformed("empty completion".into()))
    }
}

#[async_trait]
impl Adjudicator for HttpAdjudicator {
    async fn score(
        &self,
        judge: &Judge,
        request: &AdjudicationRequest,
    ) -> Result<JudgeRuling, AdjudicatorError> {
        debug!(
            debate_id = %request.debate_id,
            judge = %judge.id,
            pass = request.pass,
            model = %self.config.model,
            prompt_version = PROMPT_VERSION,
            "Calling judge"
        );
        let text = self.complete(judge, request).await?;
        parse_ruling(&text)
    }
}
