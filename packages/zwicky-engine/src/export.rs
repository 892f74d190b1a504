//! Portable JSON form of a grid.
//!
//! Ids and selection are not persisted: items export as bare text, and an
//! import mints fresh ids with every item unselected.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::IdSource;
use crate::domain::types::{Attribute, AttributeDraft};
use crate::error::{Result, ZwickyError};
use crate::grid::Grid;

pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedItem {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedAttribute {
    pub name: String,
    pub question: String,
    pub items: Vec<ExportedItem>,
}

/// Read-side shape of an attribute: missing and `null` fields both fall back
/// to empty.
#[derive(Debug, Deserialize)]
struct LooseAttribute {
    name: Option<String>,
    question: Option<String>,
    items: Option<Vec<LooseItem>>,
}

#[derive(Debug, Deserialize)]
struct LooseItem {
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub challenge: String,
    pub attributes: Vec<ExportedAttribute>,
    pub exported_at: String,
    pub version: String,
}

/// Challenge plus freshly identified attributes, ready to replace a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedGrid {
    pub challenge: String,
    pub attributes: Vec<Attribute>,
}

pub fn export_document(challenge: &str, grid: &Grid, now: DateTime<Utc>) -> Result<ExportDocument> {
    if grid.is_empty() {
        return Err(ZwickyError::NothingToExport);
    }
    let attributes = grid
        .attributes()
        .iter()
        .map(|attr| ExportedAttribute {
            name: attr.name.clone(),
            question: attr.question.clone().unwrap_or_default(),
            items: attr
                .items
                .iter()
                .map(|item| ExportedItem {
                    text: item.text.clone(),
                })
                .collect(),
        })
        .collect();

    Ok(ExportDocument {
        challenge: challenge.to_string(),
        attributes,
        exported_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        version: FORMAT_VERSION.to_string(),
    })
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(ZwickyError::serialize)
    }
}

/// `zwicky-box-<unix millis>.json`
pub fn default_file_name(now: DateTime<Utc>) -> String {
    format!("zwicky-box-{}.json", now.timestamp_millis())
}

/// Parses an export file. Fails without side effects if the body is not JSON,
/// `challenge` is missing or empty, or `attributes` is not an array.
pub fn import_document(json: &str, ids: &mut dyn IdSource) -> Result<ImportedGrid> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| ZwickyError::Import(e.to_string()))?;

    let challenge = value
        .get("challenge")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty());
    let attributes = value.get("attributes").filter(|a| a.is_array());
    let (Some(challenge), Some(attributes)) = (challenge, attributes) else {
        return Err(ZwickyError::Import(
            "Invalid Zwicky Box format: missing required fields".to_string(),
        ));
    };

    let loose: Vec<LooseAttribute> = serde_json::from_value(attributes.clone())
        .map_err(|e| ZwickyError::Import(e.to_string()))?;

    let attributes = loose
        .into_iter()
        .map(|attr| {
            AttributeDraft {
                name: attr.name.unwrap_or_default(),
                question: attr.question.unwrap_or_default(),
                items: attr
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .map(|i| i.text.unwrap_or_default())
                    .collect(),
            }
            .into_attribute(ids)
        })
        .collect();

    Ok(ImportedGrid {
        challenge: challenge.to_string(),
        attributes,
    })
}
