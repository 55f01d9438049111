//! Improvement suggestions: question/answer pairs collected outside the
//! editorial flow, later turned into draft entries by an editor.

use crate::core::knowledge_base::{millis_to_utc, new_operation_id, now_millis};
use crate::{EntryDetails, KnowledgeBase, NewEntry, Operation, OryokiError, Result, Session};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Improvement {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeBase {
    pub fn add_improvement(&mut self, question: &str, answer: &str) -> Result<Improvement> {
        self.insert_improvement(question, answer)
            .inspect_err(|e| log::error!("failed to add improvement: {e}"))
    }

    fn insert_improvement(&mut self, question: &str, answer: &str) -> Result<Improvement> {
        if question.trim().is_empty() {
            return Err(OryokiError::ValidationFailed("Question is required".to_string()));
        }
        if answer.trim().is_empty() {
            return Err(OryokiError::ValidationFailed("Answer is required".to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO improvements (id, question, answer, created_at) VALUES (?, ?, ?, ?)",
            rusqlite::params![id, question, answer, now],
        )?;
        self.operation_log.log(
            &tx,
            &Operation::CreateImprovement {
                operation_id: new_operation_id(),
                timestamp: now,
                user_id: None,
                improvement_id: id.clone(),
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        Ok(Improvement {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            created_at: millis_to_utc(now)?,
        })
    }

    /// Pending suggestions, newest first.
    pub fn list_improvements(&self) -> Result<Vec<Improvement>> {
        self.query_improvements()
            .inspect_err(|e| log::error!("failed to load improvements: {e}"))
    }

    fn query_improvements(&self) -> Result<Vec<Improvement>> {
        let mut stmt = self.storage.connection().prepare(
            "SELECT id, question, answer, created_at FROM improvements
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(id, question, answer, created_at)| {
                Ok(Improvement {
                    id,
                    question,
                    answer,
                    created_at: millis_to_utc(created_at)?,
                })
            })
            .collect()
    }

    pub fn delete_improvement(&mut self, session: &Session, improvement_id: &str) -> Result<()> {
        self.remove_improvement(session, improvement_id)
            .inspect_err(|e| log::error!("failed to delete improvement {improvement_id}: {e}"))
    }

    fn remove_improvement(&mut self, session: &Session, improvement_id: &str) -> Result<()> {
        let tx = self.storage.connection_mut().transaction()?;
        tx.execute("DELETE FROM improvements WHERE id = ?", [improvement_id])?;
        if tx.changes() == 0 {
            return Err(OryokiError::ImprovementNotFound(improvement_id.to_string()));
        }
        self.operation_log.log(
            &tx,
            &Operation::DeleteImprovement {
                operation_id: new_operation_id(),
                timestamp: now_millis(),
                user_id: Some(session.user_id().to_string()),
                improvement_id: improvement_id.to_string(),
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Turns a suggestion into a draft product-knowledge entry and removes it.
    ///
    /// Returns the new entry's ID.
    pub fn convert_improvement(&mut self, session: &Session, improvement_id: &str) -> Result<String> {
        self.draft_from_improvement(session, improvement_id)
            .inspect_err(|e| log::error!("failed to convert improvement {improvement_id}: {e}"))
    }

    fn draft_from_improvement(&mut self, session: &Session, improvement_id: &str) -> Result<String> {
        let tx = self.storage.connection_mut().transaction()?;
        let (question, answer): (String, String) = tx
            .query_row(
                "SELECT question, answer FROM improvements WHERE id = ?",
                [improvement_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| OryokiError::ImprovementNotFound(improvement_id.to_string()))?;

        let draft = NewEntry::draft(
            question,
            EntryDetails::ProductKnowledge {
                knowledge_content: answer,
            },
        );
        draft.validate()?;

        let now = now_millis();
        let entry_id = Self::insert_entry_in_tx(&tx, &self.operation_log, session, &draft, now)?;
        tx.execute("DELETE FROM improvements WHERE id = ?", [improvement_id])?;
        self.operation_log.log(
            &tx,
            &Operation::ConvertImprovement {
                operation_id: new_operation_id(),
                timestamp: now,
                user_id: Some(session.user_id().to_string()),
                improvement_id: improvement_id.to_string(),
                entry_id: entry_id.clone(),
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        log::info!("converted improvement {improvement_id} into draft {entry_id}");
        Ok(entry_id)
    }
}
