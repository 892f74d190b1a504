use tracing::debug;

use crate::domain::ids::{Id, IdSource};
use crate::domain::types::{Attribute, Item};
use crate::error::{Result, ZwickyError};

/// Placeholder name given to a manually added attribute.
pub const NEW_ATTRIBUTE_NAME: &str = "New Attribute";

/// Which cell of the grid currently has edit focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    Attribute(Id),
    Item { attribute: Id, item: Id },
}

/// The ordered attribute/item grid plus its edit focus.
///
/// Invariant: at most one item per attribute is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    attributes: Vec<Attribute>,
    editing: Option<EditTarget>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            editing: None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, id: &Id) -> Option<&Attribute> {
        self.attributes.iter().find(|a| &a.id == id)
    }

    fn attribute_mut(&mut self, id: &Id) -> Option<&mut Attribute> {
        self.attributes.iter_mut().find(|a| &a.id == id)
    }

    pub fn editing(&self) -> Option<&EditTarget> {
        self.editing.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn has_selection(&self) -> bool {
        self.attributes.iter().any(|a| a.selected_item().is_some())
    }

    /// Appends an attribute with the placeholder name and focuses it for renaming.
    pub fn add_attribute(&mut self, ids: &mut dyn IdSource) -> Id {
        let id = ids.next_id();
        self.attributes
            .push(Attribute::new(id.clone(), NEW_ATTRIBUTE_NAME));
        self.editing = Some(EditTarget::Attribute(id.clone()));
        debug!(attribute = %id, "attribute added");
        id
    }

    pub fn rename_attribute(&mut self, id: &Id, name: impl Into<String>) {
        if let Some(attr) = self.attribute_mut(id) {
            attr.name = name.into();
        }
    }

    pub fn begin_attribute_edit(&mut self, id: &Id) {
        if self.attribute(id).is_some() {
            self.editing = Some(EditTarget::Attribute(id.clone()));
        }
    }

    pub fn finish_attribute_edit(&mut self) {
        if matches!(self.editing, Some(EditTarget::Attribute(_))) {
            self.editing = None;
        }
    }

    pub fn delete_attribute(&mut self, id: &Id) {
        self.attributes.retain(|a| &a.id != id);
        let focused_here = match &self.editing {
            Some(EditTarget::Attribute(a)) => a == id,
            Some(EditTarget::Item { attribute, .. }) => attribute == id,
            None => false,
        };
        if focused_here {
            self.editing = None;
        }
    }

    /// Appends an empty, unselected item and focuses it for editing.
    pub fn add_item(&mut self, attribute_id: &Id, ids: &mut dyn IdSource) -> Result<Id> {
        let attr = self
            .attribute_mut(attribute_id)
            .ok_or_else(|| ZwickyError::UnknownAttribute(attribute_id.clone()))?;
        let item_id = ids.next_id();
        attr.items.push(Item::new(item_id.clone(), ""));
        self.editing = Some(EditTarget::Item {
            attribute: attribute_id.clone(),
            item: item_id.clone(),
        });
        Ok(item_id)
    }

    pub fn begin_item_edit(&mut self, attribute_id: &Id, item_id: &Id) {
        let exists = self
            .attribute(attribute_id)
            .is_some_and(|a| a.item(item_id).is_some());
        if exists {
            self.editing = Some(EditTarget::Item {
                attribute: attribute_id.clone(),
                item: item_id.clone(),
            });
        }
    }

    pub fn set_item_text(&mut self, attribute_id: &Id, item_id: &Id, text: impl Into<String>) {
        if let Some(item) = self
            .attribute_mut(attribute_id)
            .and_then(|a| a.item_mut(item_id))
        {
            item.text = text.into();
        }
    }

    /// Leaves edit mode for the item. Blank items are removed, which is how
    /// an abandoned "add item" is cancelled.
    pub fn commit_item_edit(&mut self, attribute_id: &Id, item_id: &Id) {
        if self.is_editing_item(attribute_id, item_id) {
            self.editing = None;
        }
        let blank = self
            .attribute(attribute_id)
            .and_then(|a| a.item(item_id))
            .is_some_and(Item::is_blank);
        if blank {
            debug!(attribute = %attribute_id, item = %item_id, "dropping blank item");
            self.delete_item(attribute_id, item_id);
        }
    }

    /// Commit followed by a fresh item in the same attribute (the Enter key).
    pub fn commit_item_and_add_next(
        &mut self,
        attribute_id: &Id,
        item_id: &Id,
        ids: &mut dyn IdSource,
    ) -> Result<Id> {
        self.commit_item_edit(attribute_id, item_id);
        self.add_item(attribute_id, ids)
    }

    pub fn delete_item(&mut self, attribute_id: &Id, item_id: &Id) {
        if let Some(attr) = self.attribute_mut(attribute_id) {
            attr.items.retain(|i| &i.id != item_id);
        }
        if self.is_editing_item(attribute_id, item_id) {
            self.editing = None;
        }
    }

    fn is_editing_item(&self, attribute_id: &Id, item_id: &Id) -> bool {
        let Some(EditTarget::Item { attribute, item }) = &self.editing else {
            return false;
        };
        attribute == attribute_id && item == item_id
    }

    /// Selects the item and clears its siblings, or deselects it if it was
    /// already selected. Other attributes are untouched.
    pub fn toggle_select(&mut self, attribute_id: &Id, item_id: &Id) {
        let Some(attr) = self.attribute_mut(attribute_id) else {
            return;
        };
        if attr.item(item_id).is_none() {
            return;
        }
        for item in &mut attr.items {
            item.selected = if &item.id == item_id {
                !item.selected
            } else {
                false
            };
        }
    }

    /// Bulk replacement. Drops every prior selection and the edit focus.
    pub fn replace(&mut self, attributes: Vec<Attribute>) {
        self.attributes = attributes;
        self.editing = None;
    }
}
