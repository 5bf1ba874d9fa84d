use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};
use tracing::debug;

use crate::models::{CharacterRow, ConversationRow, ConversationSummaryRow, MessageRow, NewExchange};
use crate::{Database, OptionalExt, now_timestamp};

/// What `append_exchange` did with a chat turn.
#[derive(Debug, PartialEq, Eq)]
pub struct AppendedExchange {
    pub conversation_id: i64,
    pub bot_text: String,
    /// The request id had already been answered; nothing was written and
    /// `bot_text` is the stored reply.
    pub replayed: bool,
}

impl Database {
    // -- Characters --

    pub fn get_character(&self, character_id: &str) -> Result<Option<CharacterRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT character_id, name, bio, region FROM characters WHERE character_id = ?1",
                [character_id],
                |row| {
                    Ok(CharacterRow {
                        character_id: row.get(0)?,
                        name: row.get(1)?,
                        bio: row.get(2)?,
                        region: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Conversations --

    pub fn get_conversation(&self, conversation_id: i64) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT conversation_id, user_id, character_id FROM conversations
                 WHERE conversation_id = ?1",
                [conversation_id],
                map_conversation,
            )
            .optional()
        })
    }

    pub fn find_conversation(
        &self,
        user_id: &str,
        character_id: &str,
    ) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT conversation_id, user_id, character_id FROM conversations
                 WHERE user_id = ?1 AND character_id = ?2",
                (user_id, character_id),
                map_conversation,
            )
            .optional()
        })
    }

    /// Conversations of a user with one character, each with its latest message.
    pub fn list_user_conversations(
        &self,
        user_id: &str,
        character_id: &str,
    ) -> Result<Vec<ConversationSummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.conversation_id, c.character_id, ch.name,
                        (SELECT m.message FROM messages m WHERE m.conversation_id = c.conversation_id
                         ORDER BY m.timestamp DESC, m.message_id DESC LIMIT 1),
                        (SELECT m.timestamp FROM messages m WHERE m.conversation_id = c.conversation_id
                         ORDER BY m.timestamp DESC, m.message_id DESC LIMIT 1)
                 FROM conversations c
                 JOIN characters ch ON ch.character_id = c.character_id
                 WHERE c.user_id = ?1 AND c.character_id = ?2
                 ORDER BY c.conversation_id",
            )?;

            let rows = stmt
                .query_map((user_id, character_id), |row| {
                    Ok(ConversationSummaryRow {
                        conversation_id: row.get(0)?,
                        character_id: row.get(1)?,
                        character_name: row.get(2)?,
                        last_message: row.get(3)?,
                        last_timestamp: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Deletes the messages and then the conversation in one transaction.
    /// Returns false when the conversation does not exist.
    pub fn delete_conversation(&self, conversation_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: Option<i64> = tx
                .query_row(
                    "SELECT conversation_id FROM conversations WHERE conversation_id = ?1",
                    [conversation_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(false);
            }

            let removed = tx.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                [conversation_id],
            )?;
            tx.execute(
                "DELETE FROM conversations WHERE conversation_id = ?1",
                [conversation_id],
            )?;
            tx.commit()?;

            debug!(
                "Deleted conversation {} with {} messages",
                conversation_id, removed
            );
            Ok(true)
        })
    }

    // -- Messages --

    /// Full history, oldest first.
    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, conversation_id, sender, message, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY timestamp ASC, message_id ASC",
            )?;

            let rows = stmt
                .query_map([conversation_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The `limit` most recent messages, returned oldest first.
    pub fn recent_messages(&self, conversation_id: i64, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, conversation_id, sender, message, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY timestamp DESC, message_id DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt
                .query_map(rusqlite::params![conversation_id, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();

            Ok(rows)
        })
    }

    /// Stored reply for an already-answered request id, if any.
    pub fn find_reply(
        &self,
        user_id: &str,
        character_id: &str,
        request_id: &str,
    ) -> Result<Option<(i64, String)>> {
        self.with_conn(|conn| query_reply(conn, user_id, character_id, request_id))
    }

    /// Commits one chat turn: creates the (user, character) conversation if
    /// needed and inserts the user line and the reply together.
    pub fn append_exchange(&self, exchange: &NewExchange<'_>) -> Result<AppendedExchange> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(request_id) = exchange.request_id {
                if let Some((conversation_id, bot_text)) =
                    query_reply(&tx, exchange.user_id, exchange.character_id, request_id)?
                {
                    return Ok(AppendedExchange {
                        conversation_id,
                        bot_text,
                        replayed: true,
                    });
                }
            }

            tx.execute(
                "INSERT INTO conversations (user_id, character_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id, character_id) DO NOTHING",
                (exchange.user_id, exchange.character_id),
            )?;
            let conversation_id: i64 = tx.query_row(
                "SELECT conversation_id FROM conversations WHERE user_id = ?1 AND character_id = ?2",
                (exchange.user_id, exchange.character_id),
                |row| row.get(0),
            )?;

            let user_ts = now_timestamp();
            // Wall clocks can step backwards; the reply must never sort before its prompt.
            let bot_ts = now_timestamp().max(user_ts.clone());

            tx.execute(
                "INSERT INTO messages (conversation_id, sender, message, request_id, timestamp)
                 VALUES (?1, 'user', ?2, ?3, ?4)",
                rusqlite::params![conversation_id, exchange.user_text, exchange.request_id, user_ts],
            )?;
            tx.execute(
                "INSERT INTO messages (conversation_id, sender, message, request_id, timestamp)
                 VALUES (?1, 'bot', ?2, ?3, ?4)",
                rusqlite::params![conversation_id, exchange.bot_text, exchange.request_id, bot_ts],
            )?;
            tx.commit()?;

            Ok(AppendedExchange {
                conversation_id,
                bot_text: exchange.bot_text.to_string(),
                replayed: false,
            })
        })
    }
}

fn query_reply(
    conn: &Connection,
    user_id: &str,
    character_id: &str,
    request_id: &str,
) -> Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT m.conversation_id, m.message
         FROM messages m
         JOIN conversations c ON c.conversation_id = m.conversation_id
         WHERE c.user_id = ?1 AND c.character_id = ?2
           AND m.sender = 'bot' AND m.request_id = ?3",
        (user_id, character_id, request_id),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        conversation_id: row.get(0)?,
        user_id: row.get(1)?,
        character_id: row.get(2)?,
    })
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        message_id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender: row.get(2)?,
        message: row.get(3)?,
        timestamp: row.get(4)?,
    })
}
