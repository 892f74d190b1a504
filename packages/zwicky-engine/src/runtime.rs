//! Drives a [`Session`] against a live model.
//!
//! Actions are reduced as soon as they are submitted. The effects they emit
//! run as owned futures in a [`FuturesUnordered`], and each outcome is fed
//! back through the reducer in completion order, so a slow request never
//! holds up an unrelated one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::agents::llm_client::LlmClient;
use crate::error::Result;
use crate::export;
use crate::ideas::IdeaKind;
use crate::logging::{LogEventType, SessionLogger};
use crate::prompts::{self, ChatRequest, PromptBuilder};
use crate::session::{self, Action, Effect, Session, reduce};

pub struct Workbench<C: LlmClient + 'static> {
    runner: EffectRunner<C>,
    session: Session,
    in_flight: FuturesUnordered<BoxFuture<'static, Action>>,
}

impl<C: LlmClient + 'static> Workbench<C> {
    pub fn new(client: C, prompts: PromptBuilder, session: Session) -> Self {
        Self {
            runner: EffectRunner {
                client: Arc::new(client),
                prompts: Arc::new(prompts),
                logger: None,
            },
            session,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn with_logger(mut self, logger: SessionLogger) -> Self {
        self.runner.logger = Some(Arc::new(logger));
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &C {
        &self.runner.client
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.runner.prompts
    }

    /// Number of effects still waiting on the model.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Reduces `action` now and queues its effects without waiting for them.
    pub fn submit(&mut self, action: Action) {
        for effect in reduce(&mut self.session, action) {
            self.spawn(effect);
        }
    }

    /// Waits for the next effect to finish and reduces its outcome. Returns
    /// false when nothing was in flight.
    pub async fn next_completion(&mut self) -> bool {
        let Some(outcome) = self.in_flight.next().await else {
            return false;
        };
        self.submit(outcome);
        true
    }

    /// Drives every queued effect, and any follow-ups, to completion.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    /// Submits `action` and waits until nothing is pending.
    pub async fn dispatch(&mut self, action: Action) {
        self.submit(action);
        self.settle().await;
    }

    /// Runs one effect and returns the action that reports its outcome.
    pub async fn perform(&self, effect: &Effect) -> Action {
        self.runner.perform(effect).await
    }

    fn spawn(&mut self, effect: Effect) {
        debug!(operation = effect.operation(), "effect queued");
        let runner = self.runner.clone();
        self.in_flight.push(Box::pin(async move { runner.perform(&effect).await }));
    }

    /// Writes the current grid to `path`. On failure the session error is set
    /// and `None` is returned.
    pub async fn export_to(&mut self, path: &Path) -> Option<PathBuf> {
        let written = self.write_export(path).await;
        let ok = written.is_ok();
        reduce(&mut self.session, Action::ExportFinished(written));
        if !ok {
            return None;
        }
        info!(path = %path.display(), "grid exported");
        self.runner
            .note(
                LogEventType::GridExported,
                "Grid exported",
                json!({ "path": path.display().to_string() }),
            )
            .await;
        Some(path.to_path_buf())
    }

    /// Exports into `dir` under a timestamped file name.
    pub async fn export_into(&mut self, dir: &Path) -> Option<PathBuf> {
        let path = dir.join(export::default_file_name(Utc::now()));
        self.export_to(&path).await
    }

    async fn write_export(&self, path: &Path) -> Result<()> {
        let document =
            export::export_document(&self.session.challenge, &self.session.grid, Utc::now())?;
        tokio::fs::write(path, document.to_json()?).await?;
        Ok(())
    }

    /// Replaces the grid with the contents of `path`. Returns false, leaving
    /// everything but the error slot untouched, if the file cannot be used.
    pub async fn import_from(&mut self, path: &Path) -> bool {
        let imported = match tokio::fs::read_to_string(path).await {
            Ok(json) => export::import_document(&json, self.session.ids()),
            Err(e) => Err(e.into()),
        };
        let ok = imported.is_ok();
        reduce(&mut self.session, Action::ImportGrid(imported));
        if ok {
            self.runner
                .note(
                    LogEventType::GridImported,
                    "Grid imported",
                    json!({
                        "path": path.display().to_string(),
                        "attributes": self.session.grid.attributes().len(),
                    }),
                )
                .await;
        }
        ok
    }
}

/// The effect-performing half of the runtime. Cheap to clone so each queued
/// effect owns what it needs.
struct EffectRunner<C> {
    client: Arc<C>,
    prompts: Arc<PromptBuilder>,
    logger: Option<Arc<SessionLogger>>,
}

impl<C> Clone for EffectRunner<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            prompts: Arc::clone(&self.prompts),
            logger: self.logger.clone(),
        }
    }
}

impl<C: LlmClient> EffectRunner<C> {
    async fn perform(&self, effect: &Effect) -> Action {
        let operation = effect.operation();
        match effect {
            Effect::GenerateAttributes { challenge } => {
                let result = self
                    .call(operation, self.prompts.attributes(challenge))
                    .await
                    .and_then(|text| prompts::parse_attributes(&text));
                if let Ok(drafts) = &result {
                    let names: Vec<&str> = drafts.iter().map(|d| d.name.as_str()).collect();
                    self.note(
                        LogEventType::AttributesGenerated,
                        "Attributes generated",
                        json!({ "count": drafts.len(), "names": names }),
                    )
                    .await;
                }
                Action::AttributesGenerated(result)
            }
            Effect::GenerateIdea {
                challenge,
                components,
            } => {
                let result = self
                    .call(operation, self.prompts.idea(challenge, components))
                    .await
                    .map(|text| session::titled(&text, IdeaKind::Generated));
                if let Ok(titled) = &result {
                    let rendered: Vec<String> = components.iter().map(|c| c.to_string()).collect();
                    self.note(
                        LogEventType::IdeaGenerated,
                        "Idea generated",
                        json!({ "title": titled.title, "components": rendered }),
                    )
                    .await;
                }
                Action::IdeaGenerated {
                    components: components.clone(),
                    result,
                }
            }
            Effect::ExpandIdea {
                idea,
                challenge,
                components,
                summary,
            } => {
                let result = self
                    .call(
                        operation,
                        self.prompts.expansion(challenge, components, summary),
                    )
                    .await;
                if result.is_ok() {
                    self.note(
                        LogEventType::IdeaExpanded,
                        "Idea expanded",
                        json!({ "idea": idea }),
                    )
                    .await;
                }
                Action::ExpansionFinished {
                    idea: idea.clone(),
                    result,
                }
            }
            Effect::GenerateVariation {
                source,
                challenge,
                inspiration,
            } => {
                let result = self
                    .call(operation, self.prompts.variation(challenge, inspiration))
                    .await
                    .map(|text| session::titled(&text, IdeaKind::Variation));
                if let Ok(titled) = &result {
                    self.note(
                        LogEventType::VariationGenerated,
                        "Variation generated",
                        json!({ "source": source, "title": titled.title }),
                    )
                    .await;
                }
                Action::VariationGenerated {
                    source: source.clone(),
                    result,
                }
            }
        }
    }

    async fn call(&self, operation: &str, request: Result<ChatRequest>) -> Result<String> {
        let request = request?;
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log_prompt_sent(operation, request.prompt()).await {
                warn!(error = %e, "failed to write session log");
            }
        }

        let result = self.client.complete(&request).await;

        if let Some(logger) = &self.logger {
            let logged = match &result {
                Ok(text) => logger.log_response_received(operation, text).await,
                Err(err) => logger.log_failure(operation, err).await,
            };
            if let Err(e) = logged {
                warn!(error = %e, "failed to write session log");
            }
        }
        result
    }

    async fn note(&self, event_type: LogEventType, message: &str, details: serde_json::Value) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log_outcome(event_type, message, details).await {
                warn!(error = %e, "failed to write session log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::llm_client::mocks::MockLlmClient;
    use crate::config::TokenBudgets;
    use crate::domain::types::Component;
    use crate::ideas::ExpansionState;
    use crate::logging::LogEvent;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    fn workbench(mock: &MockLlmClient) -> Workbench<MockLlmClient> {
        Workbench::new(
            mock.clone(),
            PromptBuilder::new("test/model", TokenBudgets::default()),
            Session::seeded(7),
        )
    }

    async fn fill_grid(bench: &mut Workbench<MockLlmClient>) {
        bench
            .dispatch(Action::SetChallenge("Grow reading".into()))
            .await;
        bench.dispatch(Action::AddAttribute).await;
        let attr = bench.session().grid.attributes()[0].id.clone();
        bench
            .dispatch(Action::RenameAttribute {
                attribute: attr.clone(),
                name: "Audience".into(),
            })
            .await;
        bench.dispatch(Action::AddItem(attr.clone())).await;
        let item = bench.session().grid.attributes()[0].items[0].id.clone();
        bench
            .dispatch(Action::SetItemText {
                attribute: attr.clone(),
                item: item.clone(),
                text: "Students".into(),
            })
            .await;
        bench
            .dispatch(Action::CommitItemEdit {
                attribute: attr,
                item,
            })
            .await;
    }

    #[tokio::test]
    async fn test_generate_attributes_replaces_grid() {
        let mock = MockLlmClient::new();
        mock.add_response(concat!(
            "```json\n",
            r#"[{"name": "Format", "question": "What shape?"}, {"name": "Venue"}]"#,
            "\n```",
        ));
        let mut bench = workbench(&mock);
        fill_grid(&mut bench).await;

        bench.dispatch(Action::RequestAttributes).await;

        let session = bench.session();
        assert!(!session.busy.generating_attributes);
        assert_eq!(session.error, None);
        let attrs = session.grid.attributes();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, "Format");
        assert_eq!(attrs[0].question.as_deref(), Some("What shape?"));
        assert!(attrs.iter().all(|a| a.items.is_empty()));

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test/model");
        assert_eq!(requests[0].max_tokens, 1500);
        assert!(requests[0].prompt().contains("Grow reading"));
    }

    #[tokio::test]
    async fn test_unparseable_attributes_surface_error() {
        let mock = MockLlmClient::new();
        mock.add_response("Sorry, I cannot help with that.");
        let mut bench = workbench(&mock);
        fill_grid(&mut bench).await;

        bench.dispatch(Action::RequestAttributes).await;

        let session = bench.session();
        assert!(!session.busy.generating_attributes);
        assert_eq!(session.grid.attributes()[0].name, "Audience");
        assert!(
            session
                .error
                .as_deref()
                .unwrap()
                .starts_with("Failed to generate attributes: Could not parse model response")
        );
    }

    #[tokio::test]
    async fn test_generate_then_expand_idea() {
        let mock = MockLlmClient::new();
        mock.add_response("**Reading buddies**\n\nPair students up weekly.");
        mock.add_response("**How to execute:**\n1) Recruit");
        let mut bench = workbench(&mock);
        fill_grid(&mut bench).await;

        bench.dispatch(Action::RequestIdea).await;

        let idea = bench.session().ideas.iter().next().unwrap().clone();
        assert_eq!(idea.title, "Reading buddies");
        assert_eq!(idea.summary, "Pair students up weekly.");
        assert_eq!(idea.components, vec![Component::new("Audience", "Students")]);
        assert_eq!(mock.requests()[0].max_tokens, 300);

        bench.dispatch(Action::ExpandIdea(idea.id.clone())).await;

        let expanded = bench.session().ideas.get(&idea.id).unwrap();
        assert_eq!(
            expanded.expansion,
            ExpansionState::Expanded("**How to execute:**\n1) Recruit".into())
        );
        let expand_request = &mock.requests()[1];
        assert_eq!(expand_request.max_tokens, 1200);
        assert!(expand_request.prompt().contains("Pair students up weekly."));
        assert!(expand_request.prompt().contains("Audience: Students"));
    }

    #[tokio::test]
    async fn test_http_failure_sets_error_and_clears_busy() {
        let mock = MockLlmClient::new();
        mock.add_http_error(502);
        let mut bench = workbench(&mock);
        fill_grid(&mut bench).await;

        bench.dispatch(Action::RequestIdea).await;

        let session = bench.session();
        assert!(!session.busy.generating_idea);
        assert!(session.ideas.is_empty());
        assert_eq!(
            session.error.as_deref(),
            Some("Failed to generate idea: API error: 502")
        );
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_request() {
        let mock = MockLlmClient::new();
        let mut bench = workbench(&mock);
        bench
            .dispatch(Action::SetChallenge("Grow reading".into()))
            .await;

        bench.dispatch(Action::RequestIdea).await;

        assert_eq!(mock.request_count(), 0);
        assert_eq!(
            bench.session().error.as_deref(),
            Some("Please add some items to the attributes first")
        );
    }

    #[tokio::test]
    async fn test_variation_uses_rendered_source() {
        let mock = MockLlmClient::new();
        mock.add_response("**Reading buddies**\n\nPair students up weekly.");
        mock.add_response("**Story circles**\nMeet in libraries.");
        let mut bench = workbench(&mock);
        fill_grid(&mut bench).await;
        bench.dispatch(Action::RequestIdea).await;
        let source = bench.session().ideas.iter().next().unwrap().id.clone();

        bench.dispatch(Action::RequestVariation(source.clone())).await;

        let request = &mock.requests()[1];
        assert_eq!(request.max_tokens, 350);
        assert!(
            request
                .prompt()
                .contains("**Reading buddies**\n\nPair students up weekly.")
        );
        let session = bench.session();
        assert_eq!(session.busy.varying, None);
        let newest = session.ideas.iter().next().unwrap();
        assert_eq!(newest.kind, IdeaKind::Variation);
        assert_eq!(newest.title, "Story circles");
        assert_eq!(newest.summary, "Meet in libraries.");
    }

    #[tokio::test]
    async fn test_idea_request_runs_while_attributes_pending() {
        let mock = MockLlmClient::new();
        let gate = Arc::new(Notify::new());
        mock.hold_budget(1500, Arc::clone(&gate));
        mock.add_response(r#"[{"name": "Format"}, {"name": "Venue"}]"#);
        mock.add_response("**Reading buddies**\n\nPair students up weekly.");
        let mut bench = workbench(&mock);
        fill_grid(&mut bench).await;

        bench.submit(Action::RequestAttributes);
        let stalled = timeout(Duration::from_millis(50), bench.next_completion()).await;
        assert!(stalled.is_err());
        assert_eq!(mock.request_count(), 1);
        assert!(bench.session().busy.generating_attributes);

        bench.submit(Action::RequestIdea);
        assert_eq!(bench.pending(), 2);
        assert!(bench.next_completion().await);

        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.requests()[1].max_tokens, 300);
        let session = bench.session();
        assert!(session.busy.generating_attributes);
        assert!(!session.busy.generating_idea);
        assert_eq!(session.ideas.len(), 1);
        assert_eq!(session.grid.attributes()[0].name, "Audience");

        gate.notify_one();
        bench.settle().await;

        assert_eq!(bench.pending(), 0);
        let session = bench.session();
        assert!(!session.busy.generating_attributes);
        assert_eq!(session.grid.attributes()[1].name, "Venue");
        assert_eq!(session.error, None);
    }

    #[tokio::test]
    async fn test_export_then_import_round_trip() {
        let dir = tempdir().unwrap();
        let mock = MockLlmClient::new();
        mock.add_response("**Reading buddies**\n\nPair students up.");
        let mut bench = workbench(&mock);
        fill_grid(&mut bench).await;
        bench.dispatch(Action::RequestIdea).await;

        let path = bench.export_into(dir.path()).await.unwrap();
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("zwicky-box-") && file_name.ends_with(".json"));

        bench
            .dispatch(Action::SetChallenge("Something else".into()))
            .await;
        assert!(bench.import_from(&path).await);

        let session = bench.session();
        assert_eq!(session.challenge, "Grow reading");
        assert_eq!(session.grid.attributes()[0].items[0].text, "Students");
        assert!(session.ideas.is_empty());
    }

    #[tokio::test]
    async fn test_export_empty_grid_sets_error() {
        let dir = tempdir().unwrap();
        let mut bench = workbench(&MockLlmClient::new());

        assert!(bench.export_into(dir.path()).await.is_none());
        assert!(bench.session().error.is_some());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_export_write_failure_reports_file_error() {
        let dir = tempdir().unwrap();
        let mut bench = workbench(&MockLlmClient::new());
        fill_grid(&mut bench).await;

        let missing = dir.path().join("no-such-dir").join("grid.json");
        assert!(bench.export_to(&missing).await.is_none());

        let error = bench.session().error.clone().unwrap();
        assert!(error.starts_with("Failed to export: File error: "), "{error}");
    }

    #[tokio::test]
    async fn test_import_invalid_file_keeps_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, r#"{"attributes": []}"#).await.unwrap();
        let mut bench = workbench(&MockLlmClient::new());
        fill_grid(&mut bench).await;

        assert!(!bench.import_from(&path).await);

        let session = bench.session();
        assert_eq!(session.challenge, "Grow reading");
        assert_eq!(session.grid.attributes().len(), 1);
        assert_eq!(
            session.error.as_deref(),
            Some("Failed to import: Invalid Zwicky Box format: missing required fields")
        );
    }

    #[tokio::test]
    async fn test_session_log_records_round_trip() {
        let dir = tempdir().unwrap();
        let mock = MockLlmClient::new();
        mock.add_response("**Reading buddies**\n\nPair students up.");
        let logger = SessionLogger::open(dir.path()).await.unwrap();
        let log_path = logger.path().to_path_buf();
        let mut bench = workbench(&mock).with_logger(logger);
        fill_grid(&mut bench).await;

        bench.dispatch(Action::RequestIdea).await;

        let content = tokio::fs::read_to_string(&log_path).await.unwrap();
        let events: Vec<LogEvent> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let kinds: Vec<_> = events.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                LogEventType::PromptSent,
                LogEventType::ResponseReceived,
                LogEventType::IdeaGenerated,
            ]
        );
    }
}
