//! Search query model and compilation.
//!
//! A [`SearchQuery`] is free text plus independent structured filters. The
//! compiler turns it into one parameterized SQL statement: each text term
//! must match (AND), and within a term any enabled source table may match
//! (UNION). Untrusted term content only ever travels as bound parameters.

pub mod compiler;

pub use compiler::{compile, CompiledQuery};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A structured search request.
///
/// `text` is split on whitespace into terms; empty or whitespace-only text
/// skips the text-search stage entirely while the filters still apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,

    pub folder: Option<String>,
    pub tag_id: Option<i64>,
    pub person_id: Option<i64>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub taken_after: Option<NaiveDate>,
    pub taken_before: Option<NaiveDate>,
    pub min_size_bytes: Option<i64>,
    pub max_size_bytes: Option<i64>,
    pub min_rating: Option<i32>,
    pub orientation: Option<Orientation>,

    /// Restrict term matching to tag-like sources, skipping captions.
    pub tags_only: bool,
    /// Also match AI-detected object tags and identified person names.
    pub include_ai_tags: bool,

    pub group_by: GroupBy,
    pub sort: SortOrder,
}

impl SearchQuery {
    /// Convenience constructor for a plain text search.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    None,
    Folder,
    CaptureDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    Filename,
    LargestFirst,
}

/// The known full-text source tables a term can match against.
///
/// Table names are structural SQL supplied by code, never by users; the
/// default set matches the schema in [`crate::db`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    /// Manual keyword tags.
    pub keywords: String,
    /// AI-detected object tags.
    pub objects: String,
    /// Identified person names.
    pub people: String,
    /// Captions, descriptions, copyright and credit text.
    pub captions: String,
}

impl Default for SourceSet {
    fn default() -> Self {
        Self {
            keywords: "keyword_fts".to_string(),
            objects: "object_fts".to_string(),
            people: "person_fts".to_string(),
            captions: "caption_fts".to_string(),
        }
    }
}
