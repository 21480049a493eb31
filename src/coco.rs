//! COCO annotation documents as read from disk
//!
//! Real-world COCO exports are often sharded or trimmed, so every top-level
//! key is optional and per-record fields the converter can live without are
//! optional too. Unknown keys (`info`, `licenses`, `segmentation`, ...) are
//! ignored. Records are decoded one at a time, so a single malformed record
//! does not take the rest of its file down with it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::types::Outcome;

/// Image ids are integers in most exports and strings in some
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(id) => write!(f, "{}", id),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

/// COCO category information
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// COCO image information
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Image {
    pub id: RecordId,
    pub file_name: String,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// COCO annotation information
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Annotation {
    pub image_id: RecordId,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// [x, y, width, height] in pixels, origin at the top-left corner
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
}

/// A COCO file whose records are still undecoded; any subset of the three
/// sections may be present
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CocoDocument {
    #[serde(default)]
    pub images: Option<Vec<Value>>,
    #[serde(default)]
    pub annotations: Option<Vec<Value>>,
    #[serde(default)]
    pub categories: Option<Vec<Value>>,
}

impl CocoDocument {
    pub fn categories(&self) -> impl Iterator<Item = Outcome<Category>> + '_ {
        decode_section(&self.categories, "category")
    }

    pub fn images(&self) -> impl Iterator<Item = Outcome<Image>> + '_ {
        decode_section(&self.images, "image")
    }

    pub fn annotations(&self) -> impl Iterator<Item = Outcome<Annotation>> + '_ {
        decode_section(&self.annotations, "annotation")
    }
}

/// Decode each record of a section on its own; records that do not fit are skipped
fn decode_section<'a, T: DeserializeOwned + 'a>(
    section: &'a Option<Vec<Value>>,
    kind: &'static str,
) -> impl Iterator<Item = Outcome<T>> + 'a {
    section
        .iter()
        .flatten()
        .enumerate()
        .map(move |(index, record)| match T::deserialize(record) {
            Ok(value) => Outcome::Done(value),
            Err(e) => Outcome::Skipped(format!("Skipping {} #{}: {}", kind, index, e)),
        })
}

/// How strongly a parsed JSON value resembles a COCO document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CocoStructure {
    /// `images`, `annotations` and `categories` are all present
    Complete,
    /// `images` or `annotations` present, but not all three keys
    Partial,
    None,
}

/// Classify a JSON value by its top-level keys only
pub fn classify_structure(value: &Value) -> CocoStructure {
    let Some(object) = value.as_object() else {
        return CocoStructure::None;
    };
    let has = |key: &str| object.contains_key(key);

    if has("images") && has("annotations") && has("categories") {
        CocoStructure::Complete
    } else if has("images") || has("annotations") {
        CocoStructure::Partial
    } else {
        CocoStructure::None
    }
}
