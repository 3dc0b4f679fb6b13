//! Testing utilities for the autopipe workspace
//!
//! Shared test helpers, fixtures, and a scripted task executor.

#![allow(missing_docs)]

use async_trait::async_trait;
use autopipe_artifact::Stage;
use autopipe_core::{
    CompletionRequest, CompletionResponse, EngineConfig, ExecutorError, PipelineEngine,
    TaskExecutor,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Canned well-formed response for each stage
#[must_use]
pub fn canned_response(stage: Stage) -> &'static str {
    match stage {
        Stage::Requirements => {
            r#"{"functional": ["users can log in with email and password"], "nonFunctional": ["responds within 200ms"], "acceptanceCriteria": ["valid credentials reach the dashboard"]}"#
        }
        Stage::Design => {
            r#"{"architecture": "layered web app", "components": ["LoginForm", "AuthService"], "dataModel": "User(email, password_hash)", "apis": ["POST /login"]}"#
        }
        Stage::Coding => {
            r#"{"files": [{"path": "src/login.rs", "content": "pub fn login() {}", "language": "rust"}], "changes": ["add login form handler"]}"#
        }
        Stage::Testing => {
            r##"{"testFiles": [{"path": "tests/login.rs", "content": "#[test] fn ok() {}", "language": "rust"}], "passed": 3, "failed": 0, "coverage": 82.5}"##
        }
        Stage::Deployment => {
            r#"{"config": "replicas: 2", "documentation": "Run the server and open /login", "checklist": ["set SESSION_SECRET"]}"#
        }
    }
}

/// Scripted result of one executor call
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Respond with this text
    Succeed(String),
    /// Fail with `ExecutorError::Other`
    Fail(String),
    /// Sleep, then apply the inner outcome
    Delay(Duration, Box<Outcome>),
}

impl Outcome {
    #[must_use]
    pub fn succeed(content: impl Into<String>) -> Self {
        Self::Succeed(content.into())
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    #[must_use]
    pub fn delayed(self, by: Duration) -> Self {
        Self::Delay(by, Box::new(self))
    }
}

/// Holds a stage's call open until the test releases it
#[derive(Debug, Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

/// Task executor driven by per-stage scripts
///
/// Each call is attributed to the stage whose role appears in the system
/// prompt. Scripted outcomes are consumed in order; once a stage's script
/// runs out, the fallback applies (by default the stage's canned response).
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<Stage, VecDeque<Outcome>>>,
    fallback: Mutex<Option<Outcome>>,
    gates: Mutex<HashMap<Stage, Arc<Gate>>>,
    log: Mutex<Vec<Stage>>,
}

impl ScriptedExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for a stage
    #[must_use]
    pub fn with_script(self, stage: Stage, outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        self.scripts
            .lock()
            .entry(stage)
            .or_default()
            .extend(outcomes);
        self
    }

    /// Queue `count` failures for a stage
    #[must_use]
    pub fn failing(self, stage: Stage, count: usize, message: &str) -> Self {
        self.with_script(stage, (0..count).map(|_| Outcome::fail(message)))
    }

    /// Outcome used once a stage's script is exhausted
    #[must_use]
    pub fn with_fallback(self, outcome: Outcome) -> Self {
        *self.fallback.lock() = Some(outcome);
        self
    }

    /// Hold calls for `stage` until [`release`](Self::release) is called
    #[must_use]
    pub fn gated(self, stage: Stage) -> Self {
        self.gates.lock().insert(stage, Arc::new(Gate::default()));
        self
    }

    /// Wait until a gated stage's call has started
    ///
    /// # Panics
    /// Panics if `stage` was not gated.
    pub async fn entered(&self, stage: Stage) {
        let gate = self.gate(stage).expect("stage is not gated");
        gate.entered.notified().await;
    }

    /// Let one held call for a gated stage proceed
    ///
    /// # Panics
    /// Panics if `stage` was not gated.
    pub fn release(&self, stage: Stage) {
        let gate = self.gate(stage).expect("stage is not gated");
        gate.release.notify_one();
    }

    /// Calls made for a stage
    #[must_use]
    pub fn calls(&self, stage: Stage) -> usize {
        self.log.lock().iter().filter(|s| **s == stage).count()
    }

    /// Stages of all calls, in call order
    #[must_use]
    pub fn call_log(&self) -> Vec<Stage> {
        self.log.lock().clone()
    }

    fn gate(&self, stage: Stage) -> Option<Arc<Gate>> {
        self.gates.lock().get(&stage).cloned()
    }

    fn next_outcome(&self, stage: Stage) -> Outcome {
        if let Some(outcome) = self.scripts.lock().get_mut(&stage).and_then(VecDeque::pop_front) {
            return outcome;
        }
        self.fallback
            .lock()
            .clone()
            .unwrap_or_else(|| Outcome::succeed(canned_response(stage)))
    }
}

/// Stage whose role the system prompt names
#[must_use]
pub fn stage_of(request: &CompletionRequest) -> Option<Stage> {
    Stage::ALL
        .into_iter()
        .find(|stage| request.system_prompt.contains(stage.role()))
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ExecutorError> {
        let stage = stage_of(&request)
            .ok_or_else(|| ExecutorError::InvalidResponse("unrecognised stage prompt".to_string()))?;
        self.log.lock().push(stage);

        if let Some(gate) = self.gate(stage) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut outcome = self.next_outcome(stage);
        loop {
            match outcome {
                Outcome::Succeed(content) => return Ok(CompletionResponse::new(content)),
                Outcome::Fail(message) => return Err(ExecutorError::Other(message)),
                Outcome::Delay(by, inner) => {
                    tokio::time::sleep(by).await;
                    outcome = *inner;
                }
            }
        }
    }
}

/// Engine config with millisecond backoff so retry tests stay fast
#[must_use]
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig::new().with_retry(Duration::from_millis(10), Duration::from_millis(100))
}

/// In-memory engine over a scripted executor
#[must_use]
pub fn engine_with(executor: &Arc<ScriptedExecutor>) -> PipelineEngine {
    let executor: Arc<dyn TaskExecutor> = Arc::clone(executor) as Arc<dyn TaskExecutor>;
    PipelineEngine::with_config(executor, fast_engine_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopipe_core::StageArtifacts;

    fn request(stage: Stage) -> CompletionRequest {
        CompletionRequest {
            system_prompt: format!("You are a {}.", stage.role()),
            user_prompt: String::new(),
            max_tokens: 16,
            temperature: 0.0,
        }
    }

    #[test]
    fn canned_responses_decode() {
        for stage in Stage::ALL {
            assert!(
                StageArtifacts::decode(stage, canned_response(stage)).is_some(),
                "{stage} canned response should decode"
            );
        }
    }

    #[tokio::test]
    async fn script_then_fallback() {
        let executor = ScriptedExecutor::new().failing(Stage::Design, 1, "nope");

        let first = executor.complete(request(Stage::Design)).await;
        assert_eq!(first, Err(ExecutorError::Other("nope".to_string())));

        let second = executor.complete(request(Stage::Design)).await.unwrap();
        assert_eq!(second.content, canned_response(Stage::Design));
        assert_eq!(executor.calls(Stage::Design), 2);
        assert_eq!(executor.calls(Stage::Coding), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_outcome_sleeps() {
        let executor = ScriptedExecutor::new()
            .with_fallback(Outcome::succeed("{}").delayed(Duration::from_millis(500)));

        let started = tokio::time::Instant::now();
        executor.complete(request(Stage::Testing)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn unknown_prompt_is_rejected() {
        let executor = ScriptedExecutor::new();
        let mut req = request(Stage::Coding);
        req.system_prompt = "You are a poet.".to_string();

        assert!(matches!(
            executor.complete(req).await,
            Err(ExecutorError::InvalidResponse(_))
        ));
        assert!(executor.call_log().is_empty());
    }
}
