pub mod agents;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod grid;
pub mod ideas;
pub mod logging;
pub mod prompts;
pub mod runtime;
pub mod session;

// Top-level re-exports for convenience
pub use agents::llm_client::{GatewayClient, LlmClient};
pub use config::EngineConfig;
pub use domain::ids::{Id, IdSource, SequentialIds, UuidIds};
pub use domain::types::{Attribute, AttributeDraft, Component, Item};
pub use error::{Result, ZwickyError};
pub use grid::{EditTarget, Grid};
pub use ideas::{ExpansionState, Idea, IdeaHistory, IdeaKind};
pub use logging::SessionLogger;
pub use prompts::{ChatRequest, PromptBuilder};
pub use runtime::Workbench;
pub use session::{Action, BusyFlags, Effect, Session, reduce};
