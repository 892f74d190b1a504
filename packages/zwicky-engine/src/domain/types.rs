use serde::{Deserialize, Serialize};

use super::ids::Id;

/// One candidate option within an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: Id,
    pub text: String,
    #[serde(default)]
    pub selected: bool,
}

impl Item {
    pub fn new(id: Id, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            selected: false,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A named dimension of the solution space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Attribute {
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            question: None,
            items: Vec::new(),
        }
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        let question = question.into();
        self.question = (!question.is_empty()).then_some(question);
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn selected_item(&self) -> Option<&Item> {
        self.items.iter().find(|i| i.selected)
    }

    pub fn item(&self, item_id: &Id) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: &Id) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| &i.id == item_id)
    }
}

/// An attribute as proposed by the model or read from an export file,
/// before ids are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDraft {
    pub name: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub items: Vec<String>,
}

impl AttributeDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            question: String::new(),
            items: Vec::new(),
        }
    }

    /// Attaches fresh ids; every item starts unselected.
    pub fn into_attribute(self, ids: &mut dyn super::ids::IdSource) -> Attribute {
        let mut attribute = Attribute::new(ids.next_id(), self.name).with_question(self.question);
        for text in self.items {
            attribute = attribute.with_item(Item::new(ids.next_id(), text));
        }
        attribute
    }
}

/// One (attribute name, item text) pair captured when an idea is generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub attribute: String,
    pub item: String,
}

impl Component {
    pub fn new(attribute: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            item: item.into(),
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.attribute, self.item)
    }
}
