//! High-level knowledge-base operations over an Oryoki SQLite database.

use crate::{
    export_snapshot, normalize_topic_list, normalize_topic_name, write_export, DeleteResult, Entry,
    EntryDetails, EntryKind, EntryStatus, EntryUpdate, ExportFile, ExportFormat, ExportRecord,
    ImageStore, NewEntry, Operation, OperationLog, OperationSummary, OryokiError, PurgeStrategy,
    Result, Session, Storage, Topic, UserRef,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SCHEMA_VERSION: &str = "1";

/// Separator used when topic names are concatenated in SQL.
const TOPIC_SEPARATOR: char = '\u{1f}';

const ENTRY_SELECT: &str = "SELECT e.id, e.type, e.heading, e.created_at, e.updated_at, e.last_modified_at,
        e.is_frequent, e.needs_improvement, e.status,
        e.author_id, COALESCE(a.username, 'Unknown'), e.last_modified_by, m.username,
        CASE e.type
            WHEN 'support_case' THEN sc.id IS NOT NULL
            WHEN 'product_knowledge' THEN pk.id IS NOT NULL
            ELSE p.id IS NOT NULL
        END AS has_payload,
        sc.problem, sc.solution, sc.customer_satisfaction, pk.knowledge_content, p.description,
        (SELECT GROUP_CONCAT(t.name, char(31))
           FROM entry_topics et JOIN topics t ON t.id = et.topic_id
          WHERE et.entry_id = e.id) AS topic_names
     FROM entries e
     LEFT JOIN kb_users a ON a.id = e.author_id
     LEFT JOIN kb_users m ON m.id = e.last_modified_by
     LEFT JOIN support_case sc ON sc.id = e.id
     LEFT JOIN product_knowledge pk ON pk.id = e.id
     LEFT JOIN process p ON p.id = e.id";

const NEWEST_FIRST: &str = "ORDER BY e.created_at DESC, e.rowid DESC";

/// An open knowledge base: the SQLite file, the image store holding
/// attachment bytes, and the operation log recording every mutation.
///
/// A `KnowledgeBase` owns a single connection and is meant to be used from
/// one thread at a time; hosts that share it wrap it in a `Mutex`.
pub struct KnowledgeBase {
    pub(super) storage: Storage,
    pub(super) images: Box<dyn ImageStore>,
    pub(super) operation_log: OperationLog,
}

impl KnowledgeBase {
    /// Creates a new knowledge-base database at `path` and initialises the schema.
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::Database`] for any SQLite failure.
    pub fn create<P: AsRef<Path>>(path: P, images: impl ImageStore + 'static) -> Result<Self> {
        let storage = Storage::create(&path)
            .inspect_err(|e| log::error!("failed to create knowledge base at {}: {e}", path.as_ref().display()))?;
        storage.connection().execute(
            "INSERT OR REPLACE INTO kb_meta (key, value) VALUES ('schema_version', ?)",
            [SCHEMA_VERSION],
        )?;
        log::info!("created knowledge base at {}", path.as_ref().display());
        Ok(Self::with_storage(storage, images))
    }

    /// Opens an existing knowledge base.
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::InvalidKnowledgeBase`] if the file lacks the
    /// expected tables, or [`OryokiError::Database`] for any SQLite failure.
    pub fn open<P: AsRef<Path>>(path: P, images: impl ImageStore + 'static) -> Result<Self> {
        let storage = Storage::open(&path)
            .inspect_err(|e| log::error!("failed to open knowledge base at {}: {e}", path.as_ref().display()))?;
        let version: Option<String> = storage
            .connection()
            .query_row("SELECT value FROM kb_meta WHERE key = 'schema_version'", [], |row| row.get(0))
            .optional()?;
        log::info!(
            "opened knowledge base at {} (schema {})",
            path.as_ref().display(),
            version.as_deref().unwrap_or("unversioned")
        );
        Ok(Self::with_storage(storage, images))
    }

    fn with_storage(storage: Storage, images: impl ImageStore + 'static) -> Self {
        Self {
            storage,
            images: Box::new(images),
            operation_log: OperationLog::new(PurgeStrategy::KeepLast { keep_last: 1000 }),
        }
    }

    /// Replaces the default retention of the operation log.
    #[must_use]
    pub fn with_purge_strategy(mut self, strategy: PurgeStrategy) -> Self {
        self.operation_log = OperationLog::new(strategy);
        self
    }

    /// Returns the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        self.storage.connection()
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// All entries with author, last modifier and topic names, newest first.
    ///
    /// Images are not loaded; use [`get_entry`](Self::get_entry) for those.
    pub fn list_entries(&self) -> Result<Vec<Entry>> {
        self.query_entries(&format!("{ENTRY_SELECT} {NEWEST_FIRST}"))
            .inspect_err(|e| log::error!("failed to load entries: {e}"))
    }

    /// Published entries only, newest first.
    pub fn list_published_entries(&self) -> Result<Vec<Entry>> {
        self.query_entries(&format!(
            "{ENTRY_SELECT} WHERE e.status = 'published' {NEWEST_FIRST}"
        ))
        .inspect_err(|e| log::error!("failed to load published entries: {e}"))
    }

    /// Fetches a single entry with its payload and images.
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::EntryNotFound`] if no entry has `entry_id`.
    pub fn get_entry(&self, entry_id: &str) -> Result<Entry> {
        self.load_entry(entry_id)
            .inspect_err(|e| log::error!("failed to load entry {entry_id}: {e}"))
    }

    fn load_entry(&self, entry_id: &str) -> Result<Entry> {
        let row = self
            .connection()
            .query_row(&format!("{ENTRY_SELECT} WHERE e.id = ?"), [entry_id], map_entry_row)
            .optional()?
            .ok_or_else(|| OryokiError::EntryNotFound(entry_id.to_string()))?;
        let mut entry = entry_from_row(row)?;
        entry.images = self.query_images(entry_id)?;
        Ok(entry)
    }

    fn query_entries(&self, sql: &str) -> Result<Vec<Entry>> {
        let mut stmt = self.connection().prepare(sql)?;
        let rows = stmt
            .query_map([], map_entry_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(entry_from_row).collect()
    }

    // ── Entry mutations ──────────────────────────────────────────────

    /// Creates an entry with its payload and topic links.
    ///
    /// The base row, the payload row and the topic links are written in one
    /// transaction, so a failure at any step leaves nothing behind.
    ///
    /// Returns the ID of the new entry.
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::ValidationFailed`] for an empty heading, empty
    /// required text or an out-of-range rating; nothing is written then.
    pub fn create_entry(&mut self, session: &Session, entry: NewEntry) -> Result<String> {
        self.insert_entry(session, &entry)
            .inspect_err(|e| log::error!("failed to create entry '{}': {e}", entry.heading))
    }

    fn insert_entry(&mut self, session: &Session, entry: &NewEntry) -> Result<String> {
        entry.validate()?;
        let now = now_millis();

        let tx = self.storage.connection_mut().transaction()?;
        let id = Self::insert_entry_in_tx(&tx, &self.operation_log, session, entry, now)?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        log::info!("created {} entry {id}", entry.details.kind());
        Ok(id)
    }

    /// Inserts the base row, payload row and topic links of `entry` within `tx`.
    pub(super) fn insert_entry_in_tx(
        tx: &Transaction,
        operation_log: &OperationLog,
        session: &Session,
        entry: &NewEntry,
        now: i64,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let kind = entry.details.kind();

        tx.execute(
            "INSERT INTO entries (id, type, heading, created_at, updated_at, is_frequent, needs_improvement, status, author_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                id,
                kind.as_str(),
                entry.heading.trim(),
                now,
                now,
                entry.is_frequent,
                entry.needs_improvement,
                entry.status.as_str(),
                session.user_id(),
            ],
        )?;
        insert_payload(tx, &id, &entry.details)?;
        let topics = Self::link_topics_in_tx(tx, operation_log, session, &id, &entry.topics, now)?;

        operation_log.log(
            tx,
            &Operation::CreateEntry {
                operation_id: new_operation_id(),
                timestamp: now,
                user_id: Some(session.user_id().to_string()),
                entry_id: id.clone(),
                kind,
                heading: entry.heading.trim().to_string(),
                status: entry.status,
                topics,
            },
        )?;
        Ok(id)
    }

    /// Replaces heading, flags, payload and topics of an entry.
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::EntryNotFound`] if the entry is gone and
    /// [`OryokiError::KindMismatch`] if `update` carries another kind's payload.
    pub fn update_entry(&mut self, session: &Session, entry_id: &str, update: EntryUpdate) -> Result<Entry> {
        self.save_update(session, entry_id, &update)
            .inspect_err(|e| log::error!("failed to update entry {entry_id}: {e}"))
    }

    fn save_update(&mut self, session: &Session, entry_id: &str, update: &EntryUpdate) -> Result<Entry> {
        update.validate()?;
        let now = now_millis();

        let tx = self.storage.connection_mut().transaction()?;
        Self::apply_update_in_tx(&tx, &self.operation_log, session, entry_id, update, now)?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        log::info!("updated entry {entry_id}");
        self.load_entry(entry_id)
    }

    /// Saves `pending` (if any) and publishes the entry, atomically.
    pub fn publish(&mut self, session: &Session, entry_id: &str, pending: Option<EntryUpdate>) -> Result<Entry> {
        self.set_status(session, entry_id, EntryStatus::Published, pending)
            .inspect_err(|e| log::error!("failed to publish entry {entry_id}: {e}"))
    }

    /// Saves `pending` (if any) and turns the entry back into a draft, atomically.
    pub fn convert_to_draft(
        &mut self,
        session: &Session,
        entry_id: &str,
        pending: Option<EntryUpdate>,
    ) -> Result<Entry> {
        self.set_status(session, entry_id, EntryStatus::Draft, pending)
            .inspect_err(|e| log::error!("failed to convert entry {entry_id} to draft: {e}"))
    }

    fn set_status(
        &mut self,
        session: &Session,
        entry_id: &str,
        status: EntryStatus,
        pending: Option<EntryUpdate>,
    ) -> Result<Entry> {
        if let Some(update) = &pending {
            update.validate()?;
        }
        let now = now_millis();

        let tx = self.storage.connection_mut().transaction()?;
        if let Some(update) = &pending {
            Self::apply_update_in_tx(&tx, &self.operation_log, session, entry_id, update, now)?;
        }
        tx.execute(
            "UPDATE entries SET status = ?1, updated_at = ?2, last_modified_at = ?2, last_modified_by = ?3
             WHERE id = ?4",
            rusqlite::params![status.as_str(), now, session.user_id(), entry_id],
        )?;
        if tx.changes() == 0 {
            return Err(OryokiError::EntryNotFound(entry_id.to_string()));
        }
        self.operation_log.log(
            &tx,
            &Operation::SetStatus {
                operation_id: new_operation_id(),
                timestamp: now,
                user_id: Some(session.user_id().to_string()),
                entry_id: entry_id.to_string(),
                status,
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        log::info!("entry {entry_id} is now {}", status.as_str());
        self.load_entry(entry_id)
    }

    fn apply_update_in_tx(
        tx: &Transaction,
        operation_log: &OperationLog,
        session: &Session,
        entry_id: &str,
        update: &EntryUpdate,
        now: i64,
    ) -> Result<()> {
        let kind: EntryKind = tx
            .query_row("SELECT type FROM entries WHERE id = ?", [entry_id], |row| row.get::<_, String>(0))
            .optional()?
            .ok_or_else(|| OryokiError::EntryNotFound(entry_id.to_string()))?
            .parse()?;
        if update.details.kind() != kind {
            return Err(OryokiError::KindMismatch {
                expected: kind.as_str().to_string(),
                found: update.details.kind().as_str().to_string(),
            });
        }

        tx.execute(
            "UPDATE entries SET heading = ?1, is_frequent = ?2, needs_improvement = ?3,
                    updated_at = ?4, last_modified_at = ?4, last_modified_by = ?5
             WHERE id = ?6",
            rusqlite::params![
                update.heading.trim(),
                update.is_frequent,
                update.needs_improvement,
                now,
                session.user_id(),
                entry_id,
            ],
        )?;
        write_payload(tx, entry_id, &update.details)?;

        tx.execute("DELETE FROM entry_topics WHERE entry_id = ?", [entry_id])?;
        let topics = Self::link_topics_in_tx(tx, operation_log, session, entry_id, &update.topics, now)?;

        operation_log.log(
            tx,
            &Operation::UpdateEntry {
                operation_id: new_operation_id(),
                timestamp: now,
                user_id: Some(session.user_id().to_string()),
                entry_id: entry_id.to_string(),
                heading: update.heading.trim().to_string(),
                topics,
            },
        )?;
        Ok(())
    }

    /// Deletes an entry and everything attached to it.
    ///
    /// Rows go in one transaction in the order payload, topic links, image
    /// rows, entry. Image objects are removed from the store after the
    /// commit; any that cannot be removed are logged and listed in
    /// [`DeleteResult::orphaned_images`].
    ///
    /// # Errors
    ///
    /// Returns [`OryokiError::EntryNotFound`] if no entry has `entry_id`.
    /// The transaction is rolled back automatically on any failure.
    pub fn delete_entry(&mut self, session: &Session, entry_id: &str) -> Result<DeleteResult> {
        self.remove_entry(session, entry_id)
            .inspect_err(|e| log::error!("failed to delete entry {entry_id}: {e}"))
    }

    fn remove_entry(&mut self, session: &Session, entry_id: &str) -> Result<DeleteResult> {
        let tx = self.storage.connection_mut().transaction()?;

        let kind: EntryKind = tx
            .query_row("SELECT type FROM entries WHERE id = ?", [entry_id], |row| row.get::<_, String>(0))
            .optional()?
            .ok_or_else(|| OryokiError::EntryNotFound(entry_id.to_string()))?
            .parse()?;

        let image_paths: Vec<String> = {
            let mut stmt =
                tx.prepare("SELECT file_path FROM entry_images WHERE entry_id = ? ORDER BY created_at, rowid")?;
            let paths = stmt
                .query_map([entry_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            paths
        };

        tx.execute(&format!("DELETE FROM {} WHERE id = ?", payload_table(kind)), [entry_id])?;
        let removed_topic_links = tx.execute("DELETE FROM entry_topics WHERE entry_id = ?", [entry_id])?;
        tx.execute("DELETE FROM entry_images WHERE entry_id = ?", [entry_id])?;
        tx.execute("DELETE FROM entries WHERE id = ?", [entry_id])?;

        self.operation_log.log(
            &tx,
            &Operation::DeleteEntry {
                operation_id: new_operation_id(),
                timestamp: now_millis(),
                user_id: Some(session.user_id().to_string()),
                entry_id: entry_id.to_string(),
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        let mut orphaned_images = Vec::new();
        for path in &image_paths {
            if let Err(e) = self.images.remove(path) {
                log::warn!("entry {entry_id} deleted but image {path} could not be removed: {e}");
                orphaned_images.push(path.clone());
            }
        }

        log::info!("deleted entry {entry_id}");
        Ok(DeleteResult {
            entry_id: entry_id.to_string(),
            removed_topic_links,
            removed_images: image_paths,
            orphaned_images,
        })
    }

    // ── Topics ───────────────────────────────────────────────────────

    /// The topic catalogue, sorted by name.
    pub fn list_topics(&self) -> Result<Vec<Topic>> {
        self.query_topics()
            .inspect_err(|e| log::error!("failed to load topics: {e}"))
    }

    fn query_topics(&self) -> Result<Vec<Topic>> {
        let mut stmt = self.connection().prepare("SELECT id, name FROM topics ORDER BY name")?;
        let topics = stmt
            .query_map([], |row| {
                Ok(Topic {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(topics)
    }

    /// Returns the topic named `name` ignoring case, creating it if needed.
    pub fn find_or_create_topic(&mut self, name: &str) -> Result<Topic> {
        self.ensure_topic(name)
            .inspect_err(|e| log::error!("failed to find or create topic '{name}': {e}"))
    }

    fn ensure_topic(&mut self, name: &str) -> Result<Topic> {
        let tx = self.storage.connection_mut().transaction()?;
        let topic = Self::find_or_create_topic_in_tx(&tx, &self.operation_log, None, name, now_millis())?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        Ok(topic)
    }

    fn find_or_create_topic_in_tx(
        tx: &Transaction,
        operation_log: &OperationLog,
        user_id: Option<&str>,
        name: &str,
        now: i64,
    ) -> Result<Topic> {
        let name = normalize_topic_name(name);
        if name.is_empty() {
            return Err(OryokiError::ValidationFailed("Topic name is required".to_string()));
        }

        let existing = tx
            .query_row("SELECT id, name FROM topics WHERE name = ?", [&name], |row| {
                Ok(Topic {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?;
        if let Some(topic) = existing {
            return Ok(topic);
        }

        let topic = Topic {
            id: Uuid::new_v4().to_string(),
            name,
        };
        tx.execute(
            "INSERT INTO topics (id, name) VALUES (?, ?)",
            rusqlite::params![topic.id, topic.name],
        )?;
        operation_log.log(
            tx,
            &Operation::CreateTopic {
                operation_id: new_operation_id(),
                timestamp: now,
                user_id: user_id.map(str::to_string),
                topic_id: topic.id.clone(),
                name: topic.name.clone(),
            },
        )?;
        Ok(topic)
    }

    /// Links `entry_id` to each of `names`, creating missing topics.
    ///
    /// Returns the stored topic names, sorted.
    fn link_topics_in_tx(
        tx: &Transaction,
        operation_log: &OperationLog,
        session: &Session,
        entry_id: &str,
        names: &[String],
        now: i64,
    ) -> Result<Vec<String>> {
        let mut linked = Vec::new();
        for name in normalize_topic_list(names) {
            let topic = Self::find_or_create_topic_in_tx(tx, operation_log, Some(session.user_id()), &name, now)?;
            tx.execute(
                "INSERT OR IGNORE INTO entry_topics (entry_id, topic_id) VALUES (?, ?)",
                rusqlite::params![entry_id, topic.id],
            )?;
            linked.push(topic.name);
        }
        linked.sort();
        Ok(linked)
    }

    // ── Export ───────────────────────────────────────────────────────

    /// The export snapshot: published entries not flagged for improvement,
    /// newest first, read in a single statement.
    pub fn export_records(&self) -> Result<Vec<ExportRecord>> {
        self.query_export_records()
            .inspect_err(|e| log::error!("failed to read export snapshot: {e}"))
    }

    fn query_export_records(&self) -> Result<Vec<ExportRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "{ENTRY_SELECT} WHERE e.status = 'published' AND e.needs_improvement = 0 {NEWEST_FIRST}"
        ))?;
        let rows = stmt
            .query_map([], map_entry_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(record_from_row).collect()
    }

    /// Serialises the export snapshot in `format`, named for today's date.
    pub fn export(&self, format: ExportFormat) -> Result<ExportFile> {
        self.export_at(format, Utc::now())
    }

    /// Like [`export`](Self::export), with an explicit generation time.
    pub fn export_at(&self, format: ExportFormat, now: DateTime<Utc>) -> Result<ExportFile> {
        let records = self.export_records()?;
        let file = export_snapshot(format, &records, now)
            .inspect_err(|e| log::error!("failed to render {} export: {e}", format.label()))?;
        log::info!("exported {} entries as {}", records.len(), format.label());
        Ok(file)
    }

    /// Exports into `dir` and returns the written file's path.
    pub fn export_to_dir(&self, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
        let file = self.export(format)?;
        write_export(dir, &file).inspect_err(|e| log::error!("failed to write export to {}: {e}", dir.display()))
    }

    // ── Operations log ───────────────────────────────────────────────

    /// Up to `limit` audit records, newest first.
    pub fn list_operations(&self, limit: usize) -> Result<Vec<OperationSummary>> {
        OperationLog::list(self.connection(), limit)
            .inspect_err(|e| log::error!("failed to load operations: {e}"))
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn new_operation_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| OryokiError::InvalidKnowledgeBase(format!("timestamp out of range: {millis}")))
}

fn payload_table(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::SupportCase => "support_case",
        EntryKind::ProductKnowledge => "product_knowledge",
        EntryKind::Process => "process",
    }
}

fn insert_payload(tx: &Transaction, entry_id: &str, details: &EntryDetails) -> Result<()> {
    match details {
        EntryDetails::SupportCase { problem, solution, customer_satisfaction } => tx.execute(
            "INSERT INTO support_case (id, problem, solution, customer_satisfaction) VALUES (?, ?, ?, ?)",
            rusqlite::params![entry_id, problem, solution, customer_satisfaction],
        )?,
        EntryDetails::ProductKnowledge { knowledge_content } => tx.execute(
            "INSERT INTO product_knowledge (id, knowledge_content) VALUES (?, ?)",
            rusqlite::params![entry_id, knowledge_content],
        )?,
        EntryDetails::Process { description } => tx.execute(
            "INSERT INTO process (id, description) VALUES (?, ?)",
            rusqlite::params![entry_id, description],
        )?,
    };
    Ok(())
}

/// Updates the payload row, recreating it if it went missing.
fn write_payload(tx: &Transaction, entry_id: &str, details: &EntryDetails) -> Result<()> {
    match details {
        EntryDetails::SupportCase { problem, solution, customer_satisfaction } => tx.execute(
            "UPDATE support_case SET problem = ?1, solution = ?2, customer_satisfaction = ?3 WHERE id = ?4",
            rusqlite::params![problem, solution, customer_satisfaction, entry_id],
        )?,
        EntryDetails::ProductKnowledge { knowledge_content } => tx.execute(
            "UPDATE product_knowledge SET knowledge_content = ?1 WHERE id = ?2",
            rusqlite::params![knowledge_content, entry_id],
        )?,
        EntryDetails::Process { description } => tx.execute(
            "UPDATE process SET description = ?1 WHERE id = ?2",
            rusqlite::params![description, entry_id],
        )?,
    };
    if tx.changes() == 0 {
        log::warn!("entry {entry_id} had no payload row; recreating it");
        insert_payload(tx, entry_id, details)?;
    }
    Ok(())
}

/// Raw columns of one [`ENTRY_SELECT`] row.
struct EntryRow {
    id: String,
    kind: String,
    heading: String,
    created_at: i64,
    updated_at: i64,
    last_modified_at: Option<i64>,
    is_frequent: bool,
    needs_improvement: bool,
    status: String,
    author_id: String,
    author_name: String,
    modifier_id: Option<String>,
    modifier_name: Option<String>,
    has_payload: bool,
    problem: Option<String>,
    solution: Option<String>,
    customer_satisfaction: Option<i64>,
    knowledge_content: Option<String>,
    description: Option<String>,
    topic_names: Option<String>,
}

fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        heading: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        last_modified_at: row.get(5)?,
        is_frequent: row.get(6)?,
        needs_improvement: row.get(7)?,
        status: row.get(8)?,
        author_id: row.get(9)?,
        author_name: row.get(10)?,
        modifier_id: row.get(11)?,
        modifier_name: row.get(12)?,
        has_payload: row.get(13)?,
        problem: row.get(14)?,
        solution: row.get(15)?,
        customer_satisfaction: row.get(16)?,
        knowledge_content: row.get(17)?,
        description: row.get(18)?,
        topic_names: row.get(19)?,
    })
}

impl EntryRow {
    /// The payload, or `None` if the entry's payload row is missing.
    fn take_details(&mut self, kind: EntryKind) -> Result<Option<EntryDetails>> {
        if !self.has_payload {
            return Ok(None);
        }
        let details = match kind {
            EntryKind::SupportCase => {
                let rating = self.customer_satisfaction.unwrap_or(0);
                EntryDetails::SupportCase {
                    problem: self.problem.take().unwrap_or_default(),
                    solution: self.solution.take().unwrap_or_default(),
                    customer_satisfaction: u8::try_from(rating).map_err(|_| {
                        OryokiError::InvalidKnowledgeBase(format!("rating out of range: {rating}"))
                    })?,
                }
            }
            EntryKind::ProductKnowledge => EntryDetails::ProductKnowledge {
                knowledge_content: self.knowledge_content.take().unwrap_or_default(),
            },
            EntryKind::Process => EntryDetails::Process {
                description: self.description.take().unwrap_or_default(),
            },
        };
        Ok(Some(details))
    }

    fn topics(&mut self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .topic_names
            .take()
            .unwrap_or_default()
            .split(TOPIC_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        topics.sort();
        topics
    }
}

fn empty_details(kind: EntryKind) -> EntryDetails {
    match kind {
        EntryKind::SupportCase => EntryDetails::SupportCase {
            problem: String::new(),
            solution: String::new(),
            customer_satisfaction: 0,
        },
        EntryKind::ProductKnowledge => EntryDetails::ProductKnowledge {
            knowledge_content: String::new(),
        },
        EntryKind::Process => EntryDetails::Process {
            description: String::new(),
        },
    }
}

fn entry_from_row(mut row: EntryRow) -> Result<Entry> {
    let kind: EntryKind = row.kind.parse()?;
    let details = match row.take_details(kind)? {
        Some(details) => details,
        None => {
            log::warn!("entry {} has no {} payload row", row.id, kind.as_str());
            empty_details(kind)
        }
    };
    let topics = row.topics();
    let last_modified_by = row.modifier_id.take().map(|id| UserRef {
        id,
        username: row.modifier_name.take().unwrap_or_else(|| "Unknown".to_string()),
    });

    Ok(Entry {
        details,
        created_at: millis_to_utc(row.created_at)?,
        updated_at: millis_to_utc(row.updated_at)?,
        last_modified_at: row.last_modified_at.map(millis_to_utc).transpose()?,
        is_frequent: row.is_frequent,
        needs_improvement: row.needs_improvement,
        status: row.status.parse()?,
        author: UserRef {
            id: row.author_id,
            username: row.author_name,
        },
        last_modified_by,
        topics,
        images: Vec::new(),
        id: row.id,
        heading: row.heading,
    })
}

fn record_from_row(mut row: EntryRow) -> Result<ExportRecord> {
    let kind: EntryKind = row.kind.parse()?;
    let details = row.take_details(kind)?;
    if details.is_none() {
        log::warn!("exporting entry {} without its {} details", row.id, kind.as_str());
    }
    let topics = row.topics();
    Ok(ExportRecord {
        kind,
        created_at: millis_to_utc(row.created_at)?,
        updated_at: millis_to_utc(row.updated_at)?,
        topics,
        details,
        id: row.id,
        heading: row.heading,
    })
}
