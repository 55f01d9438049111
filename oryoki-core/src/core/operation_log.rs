//! Durable operation log and purge strategies for the knowledge base.

use crate::{Operation, Result};
use rusqlite::{Connection, Transaction};
use serde::Serialize;

/// Milliseconds in one day; used to convert `days` to a timestamp cutoff.
const MILLIS_PER_DAY: i64 = 86_400_000;

/// Controls which old operations are removed from the log.
pub enum PurgeStrategy {
    /// Retain only the most recent `keep_last` operations.
    KeepLast { keep_last: usize },
    /// Retain operations for up to `days` before removing them.
    RetainDays { days: u32 },
}

/// A row of the `operations` table without its JSON payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub operation_id: String,
    pub timestamp: i64,
    pub user_id: Option<String>,
    pub operation_type: String,
}

/// Records mutations to the `operations` table and purges stale entries.
pub struct OperationLog {
    strategy: PurgeStrategy,
}

impl OperationLog {
    pub fn new(strategy: PurgeStrategy) -> Self {
        Self { strategy }
    }

    /// Serialises `op` and appends it to the `operations` table within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OryokiError::Database`] if the INSERT fails, or
    /// [`crate::OryokiError::Json`] if `op` cannot be serialised.
    pub fn log(&self, tx: &Transaction, op: &Operation) -> Result<()> {
        let op_json = serde_json::to_string(op)?;

        tx.execute(
            "INSERT INTO operations (operation_id, timestamp, user_id, operation_type, operation_data)
             VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![
                op.operation_id(),
                op.timestamp(),
                op.user_id(),
                op.type_name(),
                op_json,
            ],
        )?;

        Ok(())
    }

    /// Deletes old operations according to the purge strategy.
    ///
    /// Call this after every [`log`](Self::log) call to keep the table bounded in size.
    pub fn purge_if_needed(&self, tx: &Transaction) -> Result<()> {
        match self.strategy {
            PurgeStrategy::KeepLast { keep_last } => {
                tx.execute(
                    "DELETE FROM operations WHERE id NOT IN (
                        SELECT id FROM operations ORDER BY id DESC LIMIT ?
                    )",
                    [keep_last as i64],
                )?;
            }
            PurgeStrategy::RetainDays { days } => {
                let cutoff = chrono::Utc::now().timestamp_millis() - (days as i64 * MILLIS_PER_DAY);
                tx.execute("DELETE FROM operations WHERE timestamp < ?", [cutoff])?;
            }
        }
        Ok(())
    }

    /// Returns up to `limit` operations, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<OperationSummary>> {
        let mut stmt = conn.prepare(
            "SELECT operation_id, timestamp, user_id, operation_type
             FROM operations ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(OperationSummary {
                    operation_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    user_id: row.get(2)?,
                    operation_type: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Storage;
    use tempfile::NamedTempFile;

    fn delete_op(i: i64, timestamp: i64) -> Operation {
        Operation::DeleteEntry {
            operation_id: format!("op-{i}"),
            timestamp,
            user_id: None,
            entry_id: format!("entry-{i}"),
        }
    }

    #[test]
    fn test_log_and_purge() {
        let temp = NamedTempFile::new().unwrap();
        let mut storage = Storage::create(temp.path()).unwrap();
        let log = OperationLog::new(PurgeStrategy::KeepLast { keep_last: 5 });

        let tx = storage.connection_mut().transaction().unwrap();
        for i in 0..10 {
            log.log(&tx, &delete_op(i, 1000 + i)).unwrap();
        }
        log.purge_if_needed(&tx).unwrap();
        tx.commit().unwrap();

        let ops = OperationLog::list(storage.connection(), 100).unwrap();
        assert_eq!(ops.len(), 5);
        assert_eq!(ops[0].operation_id, "op-9");
        assert_eq!(ops[0].operation_type, "DeleteEntry");
    }

    #[test]
    fn test_retain_days_drops_old_operations() {
        let temp = NamedTempFile::new().unwrap();
        let mut storage = Storage::create(temp.path()).unwrap();
        let log = OperationLog::new(PurgeStrategy::RetainDays { days: 30 });
        let now = chrono::Utc::now().timestamp_millis();

        let tx = storage.connection_mut().transaction().unwrap();
        log.log(&tx, &delete_op(1, now - 31 * MILLIS_PER_DAY)).unwrap();
        log.log(&tx, &delete_op(2, now)).unwrap();
        log.purge_if_needed(&tx).unwrap();
        tx.commit().unwrap();

        let ops = OperationLog::list(storage.connection(), 10).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_id, "op-2");
    }
}
