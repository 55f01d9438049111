//! Knowledge-base entries and their type-specific payloads.

use crate::{OryokiError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest value accepted for [`EntryDetails::SupportCase::customer_satisfaction`].
pub const MAX_CUSTOMER_SATISFACTION: u8 = 5;

/// The type tag of an entry.
///
/// Serialises to the snake_case names that are also used as the payload
/// table names and as the `type` field of every export format.
///
/// ```rust
/// use oryoki_core::EntryKind;
///
/// let json = serde_json::to_string(&EntryKind::SupportCase).unwrap();
/// assert_eq!(json, r#""support_case""#);
/// assert_eq!("process".parse::<EntryKind>().unwrap(), EntryKind::Process);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    SupportCase,
    ProductKnowledge,
    Process,
}

impl EntryKind {
    /// Every kind, in the order the creation form offers them.
    pub const ALL: [EntryKind; 3] = [
        EntryKind::SupportCase,
        EntryKind::ProductKnowledge,
        EntryKind::Process,
    ];

    /// Wire name, identical to the payload table name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SupportCase => "support_case",
            Self::ProductKnowledge => "product_knowledge",
            Self::Process => "process",
        }
    }

    /// Display label used by the filter buttons.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::SupportCase => "Support Case",
            Self::ProductKnowledge => "Product Knowledge",
            Self::Process => "Process",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = OryokiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "support_case" => Ok(Self::SupportCase),
            "product_knowledge" => Ok(Self::ProductKnowledge),
            "process" => Ok(Self::Process),
            other => Err(OryokiError::InvalidKnowledgeBase(format!(
                "unknown entry type '{other}'"
            ))),
        }
    }
}

/// Visibility state of an entry. Drafts never appear in exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Published,
}

impl EntryStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl FromStr for EntryStatus {
    type Err = OryokiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(OryokiError::InvalidKnowledgeBase(format!(
                "unknown entry status '{other}'"
            ))),
        }
    }
}

/// The type-specific payload of an entry, stored in the table named after its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryDetails {
    SupportCase {
        problem: String,
        solution: String,
        customer_satisfaction: u8,
    },
    ProductKnowledge {
        knowledge_content: String,
    },
    Process {
        description: String,
    },
}

impl EntryDetails {
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::SupportCase { .. } => EntryKind::SupportCase,
            Self::ProductKnowledge { .. } => EntryKind::ProductKnowledge,
            Self::Process { .. } => EntryKind::Process,
        }
    }

    /// Rejects empty required text and out-of-range ratings.
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::ValidationFailed`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SupportCase { problem, solution, customer_satisfaction } => {
                require("Problem", problem)?;
                require("Solution", solution)?;
                if *customer_satisfaction > MAX_CUSTOMER_SATISFACTION {
                    return Err(OryokiError::ValidationFailed(format!(
                        "Customer satisfaction must be between 0 and {MAX_CUSTOMER_SATISFACTION}"
                    )));
                }
                Ok(())
            }
            Self::ProductKnowledge { knowledge_content } => {
                require("Knowledge content", knowledge_content)
            }
            Self::Process { description } => require("Description", description),
        }
    }
}

/// A reference to a user as shown next to an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

/// An image attached to an entry. `file_path` is relative to the image store root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryImage {
    pub id: String,
    pub entry_id: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub heading: String,
    pub details: EntryDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub is_frequent: bool,
    pub needs_improvement: bool,
    pub status: EntryStatus,
    pub author: UserRef,
    pub last_modified_by: Option<UserRef>,
    /// Topic names, sorted and free of duplicates.
    pub topics: Vec<String>,
    /// Only populated by single-entry reads.
    pub images: Vec<EntryImage>,
}

impl Entry {
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.details.kind()
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.status == EntryStatus::Draft
    }

    /// Whether the entry belongs in an export snapshot.
    #[must_use]
    pub fn is_exportable(&self) -> bool {
        self.status == EntryStatus::Published && !self.needs_improvement
    }
}

/// Everything the creation form submits.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub heading: String,
    pub details: EntryDetails,
    pub topics: Vec<String>,
    pub is_frequent: bool,
    pub needs_improvement: bool,
    pub status: EntryStatus,
}

impl NewEntry {
    /// A draft with no topics and both flags cleared.
    pub fn draft(heading: impl Into<String>, details: EntryDetails) -> Self {
        Self {
            heading: heading.into(),
            details,
            topics: Vec::new(),
            is_frequent: false,
            needs_improvement: false,
            status: EntryStatus::Draft,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require("Heading", &self.heading)?;
        self.details.validate()
    }
}

/// The editable part of an entry, as submitted by the edit modal.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryUpdate {
    pub heading: String,
    pub details: EntryDetails,
    pub topics: Vec<String>,
    pub is_frequent: bool,
    pub needs_improvement: bool,
}

impl EntryUpdate {
    /// Pre-fills an update with the entry's current values.
    #[must_use]
    pub fn from_entry(entry: &Entry) -> Self {
        Self {
            heading: entry.heading.clone(),
            details: entry.details.clone(),
            topics: entry.topics.clone(),
            is_frequent: entry.is_frequent,
            needs_improvement: entry.needs_improvement,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require("Heading", &self.heading)?;
        self.details.validate()
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OryokiError::ValidationFailed(format!("{field} is required")));
    }
    Ok(())
}
