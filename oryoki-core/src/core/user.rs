//! Knowledge-base users and their administration.

use crate::core::knowledge_base::{millis_to_utc, new_operation_id, now_millis};
use crate::{KnowledgeBase, Operation, OryokiError, Result, UserRef};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = OryokiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(OryokiError::InvalidKnowledgeBase(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

type UserRow = (String, String, String, bool, i64, Option<i64>);

const USER_COLUMNS: &str = "id, username, role, is_active, created_at, last_login";

fn map_user_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn user_from_row((id, username, role, is_active, created_at, last_login): UserRow) -> Result<User> {
    Ok(User {
        id,
        username,
        role: role.parse()?,
        is_active,
        created_at: millis_to_utc(created_at)?,
        last_login: last_login.map(millis_to_utc).transpose()?,
    })
}

impl KnowledgeBase {
    /// Adds a user. Usernames are unique regardless of case.
    pub fn create_user(&mut self, username: &str, role: Role) -> Result<User> {
        self.insert_user(username, role)
            .inspect_err(|e| log::error!("failed to create user '{username}': {e}"))
    }

    fn insert_user(&mut self, username: &str, role: Role) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(OryokiError::ValidationFailed("Username is required".to_string()));
        }
        if self.query_user_by_username(username)?.is_some() {
            return Err(OryokiError::ValidationFailed(format!(
                "Username {username} is already taken"
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_millis();
        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO kb_users (id, username, role, is_active, created_at) VALUES (?, ?, ?, 1, ?)",
            rusqlite::params![id, username, role.as_str(), now],
        )?;
        self.operation_log.log(
            &tx,
            &Operation::CreateUser {
                operation_id: new_operation_id(),
                timestamp: now,
                user_id: None,
                new_user_id: id.clone(),
                username: username.to_string(),
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;

        log::info!("created {role} user {username}");
        Ok(User {
            id,
            username: username.to_string(),
            role,
            is_active: true,
            created_at: millis_to_utc(now)?,
            last_login: None,
        })
    }

    /// All users, newest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.query_users()
            .inspect_err(|e| log::error!("failed to load users: {e}"))
    }

    fn query_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .storage
            .connection()
            .prepare(&format!("SELECT {USER_COLUMNS} FROM kb_users ORDER BY created_at DESC, rowid DESC"))?;
        let rows = stmt
            .query_map([], map_user_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(user_from_row).collect()
    }

    pub fn get_user(&self, user_id: &str) -> Result<User> {
        self.query_user(user_id)
            .inspect_err(|e| log::error!("failed to load user {user_id}: {e}"))
    }

    fn query_user(&self, user_id: &str) -> Result<User> {
        let row = self
            .storage
            .connection()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM kb_users WHERE id = ?"),
                [user_id],
                map_user_row,
            )
            .optional()?
            .ok_or_else(|| OryokiError::UserNotFound(user_id.to_string()))?;
        user_from_row(row)
    }

    /// Case-insensitive lookup.
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.query_user_by_username(username)
            .inspect_err(|e| log::error!("failed to look up user '{username}': {e}"))
    }

    fn query_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.storage
            .connection()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM kb_users WHERE username = ?"),
                [username.trim()],
                map_user_row,
            )
            .optional()?
            .map(user_from_row)
            .transpose()
    }

    pub fn set_user_active(&mut self, user_id: &str, is_active: bool) -> Result<()> {
        self.write_user_active(user_id, is_active)
            .inspect_err(|e| log::error!("failed to change activation of user {user_id}: {e}"))
    }

    fn write_user_active(&mut self, user_id: &str, is_active: bool) -> Result<()> {
        let tx = self.storage.connection_mut().transaction()?;
        tx.execute(
            "UPDATE kb_users SET is_active = ? WHERE id = ?",
            rusqlite::params![is_active, user_id],
        )?;
        if tx.changes() == 0 {
            return Err(OryokiError::UserNotFound(user_id.to_string()));
        }
        self.operation_log.log(
            &tx,
            &Operation::SetUserActive {
                operation_id: new_operation_id(),
                timestamp: now_millis(),
                user_id: None,
                target_user_id: user_id.to_string(),
                is_active,
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Removes a user who has never authored or modified an entry.
    ///
    /// Users with history should be deactivated instead, so their name stays
    /// attached to the entries they wrote.
    pub fn delete_user(&mut self, user_id: &str) -> Result<()> {
        self.remove_user(user_id)
            .inspect_err(|e| log::error!("failed to delete user {user_id}: {e}"))
    }

    fn remove_user(&mut self, user_id: &str) -> Result<()> {
        let tx = self.storage.connection_mut().transaction()?;
        let referenced: i64 = tx.query_row(
            "SELECT COUNT(*) FROM entries WHERE author_id = ?1 OR last_modified_by = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(OryokiError::ValidationFailed(
                "User has entries and can only be deactivated".to_string(),
            ));
        }
        tx.execute("DELETE FROM kb_users WHERE id = ?", [user_id])?;
        if tx.changes() == 0 {
            return Err(OryokiError::UserNotFound(user_id.to_string()));
        }
        self.operation_log.log(
            &tx,
            &Operation::DeleteUser {
                operation_id: new_operation_id(),
                timestamp: now_millis(),
                user_id: None,
                target_user_id: user_id.to_string(),
            },
        )?;
        self.operation_log.purge_if_needed(&tx)?;
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn record_login(&mut self, user_id: &str) -> Result<()> {
        self.storage.connection().execute(
            "UPDATE kb_users SET last_login = ? WHERE id = ?",
            rusqlite::params![now_millis(), user_id],
        )
        .inspect_err(|e| log::error!("failed to record login of user {user_id}: {e}"))?;
        Ok(())
    }
}
