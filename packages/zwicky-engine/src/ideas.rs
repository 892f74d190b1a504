use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::domain::ids::Id;
use crate::domain::types::Component;
use crate::error::{Result, ZwickyError};
use crate::grid::Grid;

/// How an idea came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaKind {
    Generated,
    Variation,
}

impl IdeaKind {
    /// Title used when the model response carries no bold title.
    pub fn placeholder_title(self) -> &'static str {
        match self {
            IdeaKind::Generated => "Idea",
            IdeaKind::Variation => "Idea Variation",
        }
    }
}

/// Detail-plan state of an idea. The plan text only exists once expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum ExpansionState {
    #[default]
    Collapsed,
    Loading,
    Expanded(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub id: Id,
    pub kind: IdeaKind,
    pub title: String,
    pub summary: String,
    /// Snapshot of the grid selection at generation time. Empty for variations.
    pub components: Vec<Component>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expansion: ExpansionState,
}

impl Idea {
    pub fn expanded_text(&self) -> Option<&str> {
        match &self.expansion {
            ExpansionState::Expanded(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.expansion == ExpansionState::Loading
    }

    /// Title and summary in the same marked-up shape the model produces.
    pub fn render(&self) -> String {
        format!("**{}**\n\n{}", self.title, self.summary)
    }
}

/// Generated ideas, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdeaHistory {
    ideas: Vec<Idea>,
}

impl IdeaHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_front(&mut self, idea: Idea) {
        self.ideas.insert(0, idea);
    }

    pub fn get(&self, id: &Id) -> Option<&Idea> {
        self.ideas.iter().find(|i| &i.id == id)
    }

    pub fn get_mut(&mut self, id: &Id) -> Option<&mut Idea> {
        self.ideas.iter_mut().find(|i| &i.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Idea> {
        self.ideas.iter()
    }

    pub fn len(&self) -> usize {
        self.ideas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    pub fn clear(&mut self) {
        self.ideas.clear();
    }

    /// `Collapsed -> Loading`. Returns false (and changes nothing) when the
    /// idea is unknown, already loading or already expanded.
    pub fn begin_expansion(&mut self, id: &Id) -> bool {
        match self.get_mut(id) {
            Some(idea) if idea.expansion == ExpansionState::Collapsed => {
                idea.expansion = ExpansionState::Loading;
                true
            }
            _ => false,
        }
    }

    /// `Loading -> Expanded` on success, `Loading -> Collapsed` on failure.
    pub fn complete_expansion(&mut self, id: &Id, outcome: &Result<String>) -> Result<()> {
        let idea = self
            .get_mut(id)
            .ok_or_else(|| ZwickyError::UnknownIdea(id.clone()))?;
        if !idea.is_loading() {
            return Ok(());
        }
        idea.expansion = match outcome {
            Ok(text) => ExpansionState::Expanded(text.clone()),
            Err(_) => ExpansionState::Collapsed,
        };
        Ok(())
    }
}

/// Picks the components for the next idea.
///
/// Only attributes with items are considered. Each contributes its selected
/// item when it has one and a uniformly random item otherwise, so a partial
/// selection mixes both modes per attribute.
pub fn sample_components<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> Result<Vec<Component>> {
    let components: Vec<Component> = grid
        .attributes()
        .iter()
        .filter(|a| !a.items.is_empty())
        .filter_map(|attr| {
            let item = match attr.selected_item() {
                Some(selected) => Some(selected),
                None => attr.items.choose(&mut *rng),
            }?;
            Some(Component::new(&attr.name, &item.text))
        })
        .collect();

    if components.is_empty() {
        return Err(ZwickyError::NoComponents);
    }
    Ok(components)
}
