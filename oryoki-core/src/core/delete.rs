//! Result type for entry removal.
//!
//! An entry spans several tables, and they are cleared in a fixed order
//! so that no row is ever left pointing at a deleted parent:
//!
//! 1. the type-specific payload row (`support_case`, `product_knowledge` or `process`),
//! 2. the topic associations in `entry_topics`,
//! 3. the image rows in `entry_images`,
//! 4. the `entries` row itself.
//!
//! All four run in one SQLite transaction. The image objects are removed from
//! the [`ImageStore`](super::image::ImageStore) only after the commit; objects
//! that cannot be removed are reported in [`DeleteResult::orphaned_images`]
//! instead of failing the delete.
//!
//! ```rust
//! use oryoki_core::DeleteResult;
//!
//! let result = DeleteResult {
//!     entry_id: "entry-1".to_string(),
//!     removed_topic_links: 2,
//!     removed_images: vec!["entry-1/1700000000000-1a2b3c4d.png".to_string()],
//!     orphaned_images: vec![],
//! };
//! let json = serde_json::to_string(&result).unwrap();
//! assert!(json.contains("removedTopicLinks"));
//! assert!(json.contains("orphanedImages"));
//! ```

use serde::{Deserialize, Serialize};

/// The outcome of [`KnowledgeBase::delete_entry`](super::knowledge_base::KnowledgeBase::delete_entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub entry_id: String,

    /// Number of `entry_topics` rows removed.
    pub removed_topic_links: usize,

    /// Store paths of every image that belonged to the entry.
    pub removed_images: Vec<String>,

    /// Paths whose stored object could not be removed; their rows are gone.
    pub orphaned_images: Vec<String>,
}
