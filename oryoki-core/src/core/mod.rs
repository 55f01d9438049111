//! Internal domain modules for the Oryoki core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod delete;
pub mod entry;
pub mod error;
pub mod export;
pub mod filter;
pub mod image;
pub mod improvement;
pub mod knowledge_base;
pub mod operation;
pub mod operation_log;
pub mod session;
pub mod settings;
pub mod storage;
pub mod topic;
pub mod user;

#[cfg(test)]
mod log_capture;

#[doc(inline)]
pub use delete::DeleteResult;
#[doc(inline)]
pub use entry::{
    Entry, EntryDetails, EntryImage, EntryKind, EntryStatus, EntryUpdate, NewEntry, UserRef,
    MAX_CUSTOMER_SATISFACTION,
};
#[doc(inline)]
pub use error::{OryokiError, Result};
#[doc(inline)]
pub use export::{
    escape_xml, export_file_name, export_snapshot, render_json, render_txt, render_xml,
    write_export, ExportFile, ExportFormat, ExportRecord, EXPORT_FILE_STEM, TXT_TITLE,
};
#[doc(inline)]
pub use filter::{available_topics, filter_entries, FetchTicket, FilterState, SearchView};
#[doc(inline)]
pub use image::{DirImageStore, ImageStore, ImageUpload, MAX_IMAGES_PER_ENTRY};
#[doc(inline)]
pub use improvement::Improvement;
#[doc(inline)]
pub use knowledge_base::KnowledgeBase;
#[doc(inline)]
pub use operation::Operation;
#[doc(inline)]
pub use operation_log::{OperationLog, OperationSummary, PurgeStrategy};
#[doc(inline)]
pub use session::{Session, SessionMarker};
#[doc(inline)]
pub use settings::{
    default_data_directory, load_settings, load_settings_from, save_settings, save_settings_to,
    settings_file_path, AppSettings,
};
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use topic::{normalize_topic_list, normalize_topic_name, Topic};
#[doc(inline)]
pub use user::{Role, User};
