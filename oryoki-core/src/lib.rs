//! Core library for Oryoki, a support team's knowledge base of support
//! cases, product knowledge and processes.
//!
//! The primary entry point is [`KnowledgeBase`], which represents an open
//! SQLite database file plus the [`ImageStore`] holding attachments. Every
//! mutation goes through `KnowledgeBase` methods and takes the [`Session`]
//! of the acting user. Searching happens in memory over fetched entries
//! with [`FilterState`] and [`SearchView`]; snapshots of the published
//! entries are serialised with [`KnowledgeBase::export`].
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    delete::DeleteResult,
    entry::{
        Entry, EntryDetails, EntryImage, EntryKind, EntryStatus, EntryUpdate, NewEntry, UserRef,
        MAX_CUSTOMER_SATISFACTION,
    },
    error::{OryokiError, Result},
    export::{
        escape_xml, export_file_name, export_snapshot, render_json, render_txt, render_xml,
        write_export, ExportFile, ExportFormat, ExportRecord, EXPORT_FILE_STEM, TXT_TITLE,
    },
    filter::{available_topics, filter_entries, FetchTicket, FilterState, SearchView},
    image::{DirImageStore, ImageStore, ImageUpload, MAX_IMAGES_PER_ENTRY},
    improvement::Improvement,
    knowledge_base::KnowledgeBase,
    operation::Operation,
    operation_log::{OperationLog, OperationSummary, PurgeStrategy},
    session::{Session, SessionMarker},
    settings::{
        default_data_directory, load_settings, load_settings_from, save_settings,
        save_settings_to, settings_file_path, AppSettings,
    },
    storage::Storage,
    topic::{normalize_topic_list, normalize_topic_name, Topic},
    user::{Role, User},
};
