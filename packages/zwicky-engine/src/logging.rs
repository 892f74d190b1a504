use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, ZwickyError};

/// What a session log line records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    SessionStart,
    PromptSent,
    ResponseReceived,
    AttributesGenerated,
    IdeaGenerated,
    IdeaExpanded,
    VariationGenerated,
    GridImported,
    GridExported,
    Error,
}

impl LogEventType {
    /// Raw prompt and response bodies are debug detail; everything else is
    /// either an outcome or a failure.
    fn level(&self) -> LogLevel {
        match self {
            Self::PromptSent | Self::ResponseReceived => LogLevel::Debug,
            Self::Error => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Error,
}

/// One JSONL line of the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub at: String,
    #[serde(rename = "event")]
    pub kind: LogEventType,
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl LogEvent {
    pub fn new(kind: LogEventType, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: kind.level(),
            kind,
            operation: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn for_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Appends session events to `<dir>/session.jsonl`. Each write reopens the
/// file, so several loggers on one directory interleave whole lines.
pub struct SessionLogger {
    path: PathBuf,
}

impl SessionLogger {
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            path: dir.join("session.jsonl"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, event: &LogEvent) -> Result<()> {
        let mut line = serde_json::to_string(event).map_err(ZwickyError::serialize)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn log_session_start(&self, model: &str, gateway_url: &str) -> Result<()> {
        let message = format!("Session started with {model}");
        let event = LogEvent::new(LogEventType::SessionStart, message)
            .with_details(json!({ "model": model, "gateway_url": gateway_url }));
        self.append(&event).await
    }

    pub async fn log_prompt_sent(&self, operation: &str, prompt: &str) -> Result<()> {
        let event = LogEvent::new(LogEventType::PromptSent, "Prompt sent")
            .for_operation(operation)
            .with_details(json!({ "prompt": prompt, "chars": prompt.chars().count() }));
        self.append(&event).await
    }

    pub async fn log_response_received(&self, operation: &str, response: &str) -> Result<()> {
        let event = LogEvent::new(LogEventType::ResponseReceived, "Response received")
            .for_operation(operation)
            .with_details(json!({
                "response": response,
                "chars": response.chars().count(),
            }));
        self.append(&event).await
    }

    pub async fn log_outcome(
        &self,
        kind: LogEventType,
        message: &str,
        details: Value,
    ) -> Result<()> {
        self.append(&LogEvent::new(kind, message).with_details(details))
            .await
    }

    pub async fn log_failure(&self, operation: &str, err: &ZwickyError) -> Result<()> {
        let event = LogEvent::new(LogEventType::Error, err.to_string())
            .for_operation(operation);
        self.append(&event).await
    }
}
