//! Test support.
//!
//! `ScriptedGenerator` stands in for the text service: it replays a
//! queue of canned responses (or errors) and records every request it
//! received, so tests can assert on prompts without touching the
//! network. `ContinuityHarness` bundles a scripted pipeline with the
//! assertions integration tests keep reaching for.

use crate::arc::ArcStage;
use crate::format::ContentFormat;
use crate::pipeline::{UnitOutcome, UnitPipeline};
use crate::revision::PlanUnit;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use textgen::{GenerationError, GenerationRequest, TextGenerator};

#[derive(Default)]
struct Script {
    responses: VecDeque<Result<String, GenerationError>>,
    requests: Vec<GenerationRequest>,
}

/// A text generator that replays scripted responses.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn push_text(&self, text: impl Into<String>) {
        self.lock().responses.push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: GenerationError) {
        self.lock().responses.push_back(Err(error));
    }

    /// How many generate calls have been made.
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// The prompt of the most recent request, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.lock().requests.last().map(|r| r.prompt.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("scripted generator lock poisoned")
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let mut script = self.lock();
        script.requests.push(request);
        script.responses.pop_front().unwrap_or_else(|| {
            Err(GenerationError::Config(
                "scripted generator ran out of responses".to_string(),
            ))
        })
    }
}

/// A scripted pipeline plus assertion helpers.
pub struct ContinuityHarness {
    pub generator: ScriptedGenerator,
    pub pipeline: UnitPipeline<ScriptedGenerator>,
}

impl ContinuityHarness {
    pub fn new(
        format: ContentFormat,
        outline: &str,
        plans: Vec<PlanUnit>,
        total_units: u32,
    ) -> Self {
        let generator = ScriptedGenerator::new();
        let pipeline =
            UnitPipeline::new(generator.clone(), format, outline, plans, total_units);
        Self {
            generator,
            pipeline,
        }
    }

    /// Queue the extraction response for the next unit.
    pub fn script_extraction(&self, json: &str) {
        self.generator.push_text(json);
    }

    /// Process one unit, panicking on pipeline failure.
    #[track_caller]
    pub async fn process(&mut self, content: &str, unit_number: u32) -> UnitOutcome {
        match self.pipeline.process_unit(content, unit_number).await {
            Ok(outcome) => outcome,
            Err(e) => panic!("unit {unit_number} failed: {e}"),
        }
    }

    #[track_caller]
    pub fn assert_stage(&self, character: &str, expected: ArcStage) {
        let stage = self
            .pipeline
            .arcs()
            .arc(character)
            .unwrap_or_else(|| panic!("character {character} is not tracked"))
            .stage;
        assert_eq!(
            stage, expected,
            "{character} is in {} stage, expected {}",
            stage.name(),
            expected.name()
        );
    }

    #[track_caller]
    pub fn assert_thread_status(
        &self,
        description_prefix: &str,
        expected: crate::discovery::ThreadStatus,
    ) {
        let state = self.pipeline.discovery_state();
        let thread = state
            .threads
            .iter()
            .find(|t| t.description.starts_with(description_prefix))
            .unwrap_or_else(|| panic!("no thread starting with {description_prefix:?}"));
        assert_eq!(
            thread.status, expected,
            "thread {:?} is {}, expected {}",
            thread.description,
            thread.status.name(),
            expected.name()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_generator_replays_in_order() {
        let generator = ScriptedGenerator::new();
        generator.push_text("first");
        generator.push_error(GenerationError::Network("down".into()));

        let first = generator.generate(GenerationRequest::new("a")).await;
        assert_eq!(first.unwrap(), "first");

        let second = generator.generate(GenerationRequest::new("b")).await;
        assert!(second.is_err());

        // Exhausted scripts fail loudly rather than hanging tests.
        let third = generator.generate(GenerationRequest::new("c")).await;
        assert!(matches!(third, Err(GenerationError::Config(_))));

        assert_eq!(generator.calls(), 3);
        assert_eq!(generator.last_prompt().as_deref(), Some("c"));
    }
}
