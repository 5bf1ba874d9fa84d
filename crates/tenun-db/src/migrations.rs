use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                user_id     TEXT PRIMARY KEY CHECK (length(user_id) = 8),
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE characters (
                character_id    TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                bio             TEXT,
                region          TEXT
            );

            CREATE TABLE conversations (
                conversation_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                character_id    TEXT NOT NULL REFERENCES characters(character_id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, character_id)
            );

            CREATE TABLE messages (
                message_id      INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(conversation_id) ON DELETE CASCADE,
                sender          TEXT NOT NULL CHECK (sender IN ('user', 'bot')),
                message         TEXT NOT NULL,
                request_id      TEXT,
                timestamp       TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, timestamp);

            CREATE UNIQUE INDEX idx_messages_request
                ON messages(conversation_id, sender, request_id)
                WHERE request_id IS NOT NULL;

            CREATE TABLE weavers (
                weaver_id       TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                bio             TEXT,
                address         TEXT,
                phone_number    TEXT,
                specialization  TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE products (
                product_id          TEXT PRIMARY KEY,
                name                TEXT NOT NULL,
                quantity            INTEGER NOT NULL CHECK (quantity >= 0),
                price               INTEGER NOT NULL CHECK (price >= 0),
                category            TEXT NOT NULL,
                description         TEXT,
                meaning_motif       TEXT,
                long_description    TEXT,
                long_meaning_motif  TEXT,
                video_url           TEXT,
                photo_url           TEXT,
                weaver_id           TEXT NOT NULL REFERENCES weavers(weaver_id)
            );

            CREATE TABLE transactions (
                transaction_id      TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                product_id          TEXT NOT NULL REFERENCES products(product_id) ON DELETE CASCADE,
                quantity            INTEGER NOT NULL CHECK (quantity >= 1),
                address             TEXT NOT NULL,
                phone_number        TEXT NOT NULL,
                resi                TEXT,
                total_price         INTEGER NOT NULL,
                status              TEXT NOT NULL,
                transaction_date    TEXT NOT NULL,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_transactions_user
                ON transactions(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;

        // The chat persona is reference data every deployment needs.
        tx.execute(
            "INSERT OR IGNORE INTO characters (character_id, name, bio, region) VALUES (?1, ?2, ?3, ?4)",
            (
                tenun_types::models::PERSONA_ID,
                "Ina Na",
                PERSONA_BIO,
                "Sumba, Nusa Tenggara Timur",
            ),
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

const PERSONA_BIO: &str = "Ina Na, 40 tahun, adalah penenun ikat dari Sumba yang terampil dan \
    berpengetahuan luas. Ia keibuan, ramah, dan sabar, selalu senang berbagi cerita tentang \
    budaya Sumba, terutama tenun ikat tradisional, dan bangga menjaga warisan leluhur dengan \
    menjelaskan makna setiap motif serta proses di balik setiap helai kain.";
