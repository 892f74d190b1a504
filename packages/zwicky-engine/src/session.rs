//! Application state and the reducer that drives it.
//!
//! `reduce` is the only way state changes. It never performs I/O: work that
//! needs the model is returned as [`Effect`]s, and the outcome comes back
//! later as another [`Action`].

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::domain::ids::{Id, IdSource, SequentialIds, UuidIds};
use crate::domain::types::{AttributeDraft, Component};
use crate::error::{Result, ZwickyError};
use crate::export::ImportedGrid;
use crate::grid::Grid;
use crate::ideas::{self, Idea, IdeaHistory, IdeaKind};
use crate::prompts::{self, TitledText};

/// In-flight markers. Each one gates only its own trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusyFlags {
    pub generating_attributes: bool,
    pub generating_idea: bool,
    pub varying: Option<Id>,
}

pub struct Session {
    pub challenge: String,
    pub grid: Grid,
    pub ideas: IdeaHistory,
    pub busy: BusyFlags,
    /// Most recent user-visible error; a newer one replaces it.
    pub error: Option<String>,
    ids: Box<dyn IdSource>,
    rng: Box<dyn RngCore + Send>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("challenge", &self.challenge)
            .field("grid", &self.grid)
            .field("ideas", &self.ideas)
            .field("busy", &self.busy)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Box::new(UuidIds), Box::new(StdRng::from_os_rng()))
    }
}

impl Session {
    pub fn new(ids: Box<dyn IdSource>, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            challenge: String::new(),
            grid: Grid::new(),
            ideas: IdeaHistory::new(),
            busy: BusyFlags::default(),
            error: None,
            ids,
            rng,
        }
    }

    /// Sequential ids and a seeded generator: fully reproducible.
    pub fn seeded(seed: u64) -> Self {
        Self::new(
            Box::new(SequentialIds::new()),
            Box::new(StdRng::seed_from_u64(seed)),
        )
    }

    pub fn ids(&mut self) -> &mut dyn IdSource {
        self.ids.as_mut()
    }

    fn fail(&mut self, operation: &str, err: &ZwickyError) {
        let message = if err.is_validation() || matches!(err, ZwickyError::Import(_)) {
            err.to_string()
        } else {
            format!("Failed to {operation}: {err}")
        };
        warn!(%operation, error = %err, "operation failed");
        self.error = Some(message);
    }
}

#[derive(Debug)]
pub enum Action {
    SetChallenge(String),
    DismissError,

    AddAttribute,
    RenameAttribute { attribute: Id, name: String },
    BeginAttributeEdit(Id),
    FinishAttributeEdit,
    DeleteAttribute(Id),

    AddItem(Id),
    BeginItemEdit { attribute: Id, item: Id },
    SetItemText { attribute: Id, item: Id, text: String },
    CommitItemEdit { attribute: Id, item: Id },
    CommitItemAndAddNext { attribute: Id, item: Id },
    DeleteItem { attribute: Id, item: Id },
    ToggleSelect { attribute: Id, item: Id },

    RequestAttributes,
    AttributesGenerated(Result<Vec<AttributeDraft>>),

    RequestIdea,
    IdeaGenerated {
        components: Vec<Component>,
        result: Result<TitledText>,
    },

    ExpandIdea(Id),
    ExpansionFinished { idea: Id, result: Result<String> },

    RequestVariation(Id),
    VariationGenerated { source: Id, result: Result<TitledText> },

    ImportGrid(Result<ImportedGrid>),
    /// An export was attempted; carries the failure if there was one.
    ExportFinished(Result<()>),
}

/// Network work requested by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    GenerateAttributes {
        challenge: String,
    },
    GenerateIdea {
        challenge: String,
        components: Vec<Component>,
    },
    ExpandIdea {
        idea: Id,
        challenge: String,
        components: Vec<Component>,
        summary: String,
    },
    GenerateVariation {
        source: Id,
        challenge: String,
        inspiration: String,
    },
}

impl Effect {
    pub fn operation(&self) -> &'static str {
        match self {
            Effect::GenerateAttributes { .. } => "generate attributes",
            Effect::GenerateIdea { .. } => "generate idea",
            Effect::ExpandIdea { .. } => "generate idea details",
            Effect::GenerateVariation { .. } => "generate variation",
        }
    }
}

pub fn reduce(state: &mut Session, action: Action) -> Vec<Effect> {
    match action {
        Action::SetChallenge(text) => {
            state.challenge = text;
            Vec::new()
        }
        Action::DismissError => {
            state.error = None;
            Vec::new()
        }
        Action::RequestAttributes => request_attributes(state),
        Action::AttributesGenerated(result) => {
            state.busy.generating_attributes = false;
            match result {
                Ok(drafts) => {
                    let attributes = drafts
                        .into_iter()
                        .map(|d| d.into_attribute(state.ids.as_mut()))
                        .collect::<Vec<_>>();
                    info!(count = attributes.len(), "attributes generated");
                    state.grid.replace(attributes);
                }
                Err(err) => state.fail("generate attributes", &err),
            }
            Vec::new()
        }
        Action::RequestIdea => request_idea(state),
        Action::IdeaGenerated { components, result } => {
            state.busy.generating_idea = false;
            match result {
                Ok(titled) => {
                    let idea = new_idea(state, IdeaKind::Generated, titled, components);
                    info!(idea = %idea.id, title = %idea.title, "idea generated");
                    state.ideas.push_front(idea);
                }
                Err(err) => state.fail("generate idea", &err),
            }
            Vec::new()
        }
        Action::ExpandIdea(id) => expand_idea(state, id),
        Action::ExpansionFinished { idea, result } => {
            if let Err(err) = state.ideas.complete_expansion(&idea, &result) {
                debug!(%idea, error = %err, "expansion finished for unknown idea");
            }
            if let Err(err) = result {
                state.fail("generate idea details", &err);
            }
            Vec::new()
        }
        Action::RequestVariation(source) => request_variation(state, source),
        Action::VariationGenerated { source, result } => {
            if state.busy.varying.as_ref() == Some(&source) {
                state.busy.varying = None;
            }
            match result {
                Ok(titled) => {
                    let idea = new_idea(state, IdeaKind::Variation, titled, Vec::new());
                    info!(idea = %idea.id, %source, "variation generated");
                    state.ideas.push_front(idea);
                }
                Err(err) => state.fail("generate variation", &err),
            }
            Vec::new()
        }
        Action::ImportGrid(result) => {
            match result {
                Ok(imported) => {
                    state.challenge = imported.challenge;
                    state.grid.replace(imported.attributes);
                    state.ideas.clear();
                    state.error = None;
                    info!(
                        attributes = state.grid.attributes().len(),
                        "grid imported; idea history cleared"
                    );
                }
                Err(err) => state.fail("import", &err),
            }
            Vec::new()
        }
        Action::ExportFinished(result) => {
            if let Err(err) = result {
                state.fail("export", &err);
            }
            Vec::new()
        }
        edit => {
            reduce_grid(state, edit);
            Vec::new()
        }
    }
}

fn reduce_grid(state: &mut Session, action: Action) {
    let Session { grid, ids, .. } = state;
    let ids = ids.as_mut();
    let outcome: Result<()> = match action {
        Action::AddAttribute => {
            grid.add_attribute(ids);
            Ok(())
        }
        Action::RenameAttribute { attribute, name } => {
            grid.rename_attribute(&attribute, name);
            Ok(())
        }
        Action::BeginAttributeEdit(attribute) => {
            grid.begin_attribute_edit(&attribute);
            Ok(())
        }
        Action::FinishAttributeEdit => {
            grid.finish_attribute_edit();
            Ok(())
        }
        Action::DeleteAttribute(attribute) => {
            grid.delete_attribute(&attribute);
            Ok(())
        }
        Action::AddItem(attribute) => grid.add_item(&attribute, ids).map(|_| ()),
        Action::BeginItemEdit { attribute, item } => {
            grid.begin_item_edit(&attribute, &item);
            Ok(())
        }
        Action::SetItemText {
            attribute,
            item,
            text,
        } => {
            grid.set_item_text(&attribute, &item, text);
            Ok(())
        }
        Action::CommitItemEdit { attribute, item } => {
            grid.commit_item_edit(&attribute, &item);
            Ok(())
        }
        Action::CommitItemAndAddNext { attribute, item } => grid
            .commit_item_and_add_next(&attribute, &item, ids)
            .map(|_| ()),
        Action::DeleteItem { attribute, item } => {
            grid.delete_item(&attribute, &item);
            Ok(())
        }
        Action::ToggleSelect { attribute, item } => {
            grid.toggle_select(&attribute, &item);
            Ok(())
        }
        other => {
            debug!(?other, "not a grid action");
            Ok(())
        }
    };
    if let Err(err) = outcome {
        state.fail("edit grid", &err);
    }
}

fn request_attributes(state: &mut Session) -> Vec<Effect> {
    if state.busy.generating_attributes {
        return Vec::new();
    }
    if state.challenge.trim().is_empty() {
        state.fail("generate attributes", &ZwickyError::EmptyChallenge);
        return Vec::new();
    }
    state.busy.generating_attributes = true;
    state.error = None;
    vec![Effect::GenerateAttributes {
        challenge: state.challenge.clone(),
    }]
}

fn request_idea(state: &mut Session) -> Vec<Effect> {
    if state.busy.generating_idea {
        return Vec::new();
    }
    if state.challenge.trim().is_empty() {
        state.fail("generate idea", &ZwickyError::EmptyChallenge);
        return Vec::new();
    }
    let components = match ideas::sample_components(&state.grid, state.rng.as_mut()) {
        Ok(components) => components,
        Err(err) => {
            state.fail("generate idea", &err);
            return Vec::new();
        }
    };
    state.busy.generating_idea = true;
    state.error = None;
    vec![Effect::GenerateIdea {
        challenge: state.challenge.clone(),
        components,
    }]
}

fn expand_idea(state: &mut Session, id: Id) -> Vec<Effect> {
    if state.challenge.trim().is_empty() {
        state.fail("generate idea details", &ZwickyError::EmptyChallenge);
        return Vec::new();
    }
    if !state.ideas.begin_expansion(&id) {
        return Vec::new();
    }
    let Some(idea) = state.ideas.get(&id) else {
        return Vec::new();
    };
    let effect = Effect::ExpandIdea {
        idea: id.clone(),
        challenge: state.challenge.clone(),
        components: idea.components.clone(),
        summary: idea.summary.clone(),
    };
    state.error = None;
    vec![effect]
}

/// Only a repeat request for the idea already being varied is gated; a
/// different source runs independently and becomes the tracked one.
fn request_variation(state: &mut Session, source: Id) -> Vec<Effect> {
    if state.busy.varying.as_ref() == Some(&source) {
        return Vec::new();
    }
    let Some(idea) = state.ideas.get(&source) else {
        state.fail("generate variation", &ZwickyError::UnknownIdea(source));
        return Vec::new();
    };
    let inspiration = idea.render();
    if state.challenge.trim().is_empty() {
        state.fail("generate variation", &ZwickyError::EmptyChallenge);
        return Vec::new();
    }
    state.busy.varying = Some(source.clone());
    state.error = None;
    vec![Effect::GenerateVariation {
        source,
        challenge: state.challenge.clone(),
        inspiration,
    }]
}

fn new_idea(
    state: &mut Session,
    kind: IdeaKind,
    titled: TitledText,
    components: Vec<Component>,
) -> Idea {
    Idea {
        id: state.ids.next_id(),
        kind,
        title: titled.title,
        summary: titled.body,
        components,
        created_at: Utc::now(),
        expansion: Default::default(),
    }
}

/// Parses a generated idea reply with the placeholder for `kind`.
pub fn titled(text: &str, kind: IdeaKind) -> TitledText {
    prompts::extract_titled(text, kind.placeholder_title())
}
