//! The session state machine: plan once, then generate / evaluate / repair
//! until a solid comes out or the retry budget is spent.

use std::fmt;

use forge_geom::Solid;
use forge_script::{EvalLimits, Evaluator};

use crate::analyze::{GeometryReport, analyze};
use crate::backend::{AgentError, Capability, ChatBackend, ChatMessage};
use crate::classify::corrective_message;
use crate::extract::extract_code;
use crate::normalize::normalize;
use crate::prompts;

#[derive(Debug, Clone)]
pub struct DesignRequest {
    pub prompt: String,
    /// Previously accepted source to modify instead of starting fresh.
    pub base_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of corrective retries after the first attempt; total attempts
    /// are `retry_budget + 1` exactly.
    pub retry_budget: usize,
    /// Gate each candidate behind a reviewer verdict before accepting it.
    pub review: bool,
    pub planner: Capability,
    pub coder: Capability,
    pub reviewer: Capability,
    pub eval_limits: EvalLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            review: false,
            planner: Capability {
                model: "deepseek/deepseek-chat".to_string(),
                temperature: 0.2,
            },
            coder: Capability {
                model: "deepseek/deepseek-coder".to_string(),
                temperature: 0.7,
            },
            reviewer: Capability {
                model: "deepseek/deepseek-chat".to_string(),
                temperature: 0.2,
            },
            eval_limits: EvalLimits::default(),
        }
    }
}

/// One entry of the session error log; keeps the raw failure text so later
/// attempts can be checked for exact repeats.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub attempt: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub source: String,
    pub solid: Solid,
    pub plan: String,
    pub report: GeometryReport,
    pub attempts: usize,
    pub failures: Vec<AttemptFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The chat backend failed; the session stops immediately, whatever the
    /// remaining budget.
    AgentUnavailable(String),
    ExhaustedRetries {
        attempts: usize,
        failures: Vec<AttemptFailure>,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AgentUnavailable(reason) => {
                write!(f, "chat backend unavailable: {reason}")
            }
            SessionError::ExhaustedRetries { attempts, failures } => {
                let summary = failures
                    .iter()
                    .map(|failure| failure.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(
                    f,
                    "failed to produce a valid part after {attempts} attempt(s): {summary}"
                )
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<AgentError> for SessionError {
    fn from(value: AgentError) -> Self {
        match value {
            AgentError::Unavailable(reason) => SessionError::AgentUnavailable(reason),
        }
    }
}

pub struct Orchestrator<B: ChatBackend> {
    backend: B,
    config: PipelineConfig,
}

impl<B: ChatBackend> Orchestrator<B> {
    pub fn new(backend: B, config: PipelineConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Runs one full session. Sequential by construction: the session owns
    /// its conversation and shares nothing with other sessions.
    pub async fn run(&self, request: &DesignRequest) -> Result<SessionOutcome, SessionError> {
        let plan = self.plan(&request.prompt).await?;
        tracing::debug!(plan_len = plan.len(), "planner replied");

        let mut conversation = vec![ChatMessage::system(prompts::CODER_SYSTEM_PROMPT)];
        if let Some(base) = &request.base_code {
            conversation.push(ChatMessage::user(
                "Here is the current PartScript program; modify it rather than starting over.",
            ));
            conversation.push(ChatMessage::assistant(format!(
                "```partscript\n{base}\n```"
            )));
        }
        conversation.push(ChatMessage::user(format!(
            "Design request: {}\n\nDesign plan:\n{plan}",
            request.prompt
        )));

        let evaluator = Evaluator::new(self.config.eval_limits);
        let max_attempts = self.config.retry_budget + 1;
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for attempt in 1..=max_attempts {
            tracing::info!(attempt, max_attempts, "generating candidate program");
            let reply = self
                .backend
                .complete(&self.config.coder, &conversation)
                .await?;
            conversation.push(ChatMessage::assistant(reply.clone()));

            let source = extract_code(&reply);
            let solid = match evaluator.run(&source).map_err(|err| err.to_string()) {
                Ok(value) => match normalize(value).map_err(|err| err.to_string()) {
                    Ok(solid) => Some(solid),
                    Err(message) => {
                        self.record_failure(&mut conversation, &mut failures, attempt, message);
                        None
                    }
                },
                Err(message) => {
                    self.record_failure(&mut conversation, &mut failures, attempt, message);
                    None
                }
            };
            let Some(solid) = solid else {
                continue;
            };

            let report = analyze(&solid);

            if self.config.review {
                let verdict = self.review(&request.prompt, &source, &report).await?;
                if let Err(message) = verdict {
                    self.record_failure(&mut conversation, &mut failures, attempt, message);
                    continue;
                }
            }

            tracing::info!(attempt, volume = report.volume, "session succeeded");
            return Ok(SessionOutcome {
                source,
                solid,
                plan,
                report,
                attempts: attempt,
                failures,
            });
        }

        Err(SessionError::ExhaustedRetries {
            attempts: max_attempts,
            failures,
        })
    }

    async fn plan(&self, prompt: &str) -> Result<String, SessionError> {
        let messages = [
            ChatMessage::system(prompts::PLANNER_SYSTEM_PROMPT),
            ChatMessage::user(prompt.to_string()),
        ];
        Ok(self.backend.complete(&self.config.planner, &messages).await?)
    }

    async fn review(
        &self,
        prompt: &str,
        source: &str,
        report: &GeometryReport,
    ) -> Result<Result<(), String>, SessionError> {
        let messages = [
            ChatMessage::system(prompts::REVIEWER_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Design request: {prompt}\n\nProgram:\n```partscript\n{source}\n```\n\nMeasured volume: {:.2} mm3",
                report.volume
            )),
        ];
        let reply = self
            .backend
            .complete(&self.config.reviewer, &messages)
            .await?;
        Ok(review_verdict(&reply))
    }

    fn record_failure(
        &self,
        conversation: &mut Vec<ChatMessage>,
        failures: &mut Vec<AttemptFailure>,
        attempt: usize,
        message: String,
    ) {
        tracing::warn!(attempt, %message, "attempt failed");
        let prior: Vec<String> = failures
            .iter()
            .map(|failure| failure.message.clone())
            .collect();
        let corrective = corrective_message(&message, &prior);
        failures.push(AttemptFailure { attempt, message });
        conversation.push(ChatMessage::user(corrective));
    }
}

/// PASS on the first line accepts; anything else rejects, with whatever the
/// reviewer wrote carried along as the reason.
fn review_verdict(reply: &str) -> Result<(), String> {
    let trimmed = reply.trim();
    let mut lines = trimmed.lines();
    let first = lines.next().unwrap_or("").trim();
    if first.to_ascii_uppercase().starts_with("PASS") {
        return Ok(());
    }

    let mut notes = lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if notes.is_empty() {
        notes = if first.is_empty() {
            "no verdict given".to_string()
        } else {
            first.to_string()
        };
    }
    Err(format!("reviewer rejected the program: {notes}"))
}
