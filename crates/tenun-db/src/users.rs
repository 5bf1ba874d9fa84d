use anyhow::Result;
use rusqlite::Connection;

use crate::models::UserRow;
use crate::{Database, OptionalExt, unique_violation};

/// Result of inserting a user row.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertUser {
    Created,
    EmailTaken,
    IdTaken,
}

impl Database {
    pub fn create_user(
        &self,
        user_id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertUser> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (user_id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (user_id, name, email, password_hash),
            );
            match inserted {
                Ok(_) => Ok(InsertUser::Created),
                Err(e) => match unique_violation(&e) {
                    Some("users.email") => Ok(InsertUser::EmailTaken),
                    Some("users.user_id") => Ok(InsertUser::IdTaken),
                    _ => Err(e.into()),
                },
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, user_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "user_id", user_id))
    }

    pub fn user_exists(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE user_id = ?1", [user_id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Returns false when no such user exists.
    pub fn update_user_name(&self, user_id: &str, name: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET name = ?1 WHERE user_id = ?2",
                (name, user_id),
            )?;
            Ok(changed == 1)
        })
    }

    /// Returns false when no such user exists.
    pub fn update_user_password(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE user_id = ?2",
                (password_hash, user_id),
            )?;
            Ok(changed == 1)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT user_id, name, email, password FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                user_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}
