use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (identities, codes, sessions)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                name          TEXT NOT NULL,
                password      TEXT NOT NULL,
                password_set  INTEGER NOT NULL DEFAULT 0,
                active        INTEGER NOT NULL DEFAULT 0,
                role          TEXT NOT NULL DEFAULT 'normal' CHECK (role IN ('normal', 'seller')),
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE confirmation_codes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                code        TEXT NOT NULL,
                expires_at  INTEGER NOT NULL,
                used        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_codes_lookup ON confirmation_codes(code, user_id);

            CREATE TABLE refresh_tokens (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_hash  TEXT NOT NULL UNIQUE,
                expires_at  INTEGER NOT NULL,
                revoked     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE identity_events (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                event       TEXT NOT NULL,
                from_state  TEXT,
                to_state    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (sellers, catalog, chats)");
        // No ON DELETE CASCADE towards users: deleting a referenced identity must fail.
        conn.execute_batch(
            "
            CREATE TABLE sellers (
                id             TEXT PRIMARY KEY,
                user_id        TEXT NOT NULL UNIQUE REFERENCES users(id),
                government_id  TEXT NOT NULL UNIQUE,
                birth_date     TEXT NOT NULL,
                address        TEXT NOT NULL,
                postal_code    TEXT NOT NULL,
                state          TEXT NOT NULL,
                city           TEXT NOT NULL,
                neighborhood   TEXT NOT NULL,
                created_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE seller_documents (
                id            TEXT PRIMARY KEY,
                seller_id     TEXT NOT NULL REFERENCES sellers(id) ON DELETE CASCADE,
                file_name     TEXT NOT NULL,
                content_type  TEXT NOT NULL,
                storage_key   TEXT NOT NULL,
                size          INTEGER NOT NULL,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE categories (
                id           TEXT PRIMARY KEY,
                name         TEXT NOT NULL UNIQUE,
                description  TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE products (
                id                      TEXT PRIMARY KEY,
                seller_id               TEXT NOT NULL REFERENCES sellers(id),
                category_id             TEXT NOT NULL REFERENCES categories(id),
                title                   TEXT NOT NULL,
                description             TEXT NOT NULL,
                original_price_cents    INTEGER NOT NULL,
                discounted_price_cents  INTEGER,
                state                   TEXT NOT NULL,
                city                    TEXT NOT NULL,
                neighborhood            TEXT NOT NULL,
                created_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE chats (
                id          TEXT PRIMARY KEY,
                buyer_id    TEXT NOT NULL REFERENCES users(id),
                seller_id   TEXT NOT NULL REFERENCES sellers(id),
                product_id  TEXT REFERENCES products(id),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE (buyer_id, seller_id)
            );

            CREATE TABLE messages (
                id         TEXT PRIMARY KEY,
                chat_id    TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                sender_id  TEXT NOT NULL REFERENCES users(id),
                body       TEXT NOT NULL,
                sent_at    TEXT NOT NULL
            );

            CREATE INDEX idx_messages_chat ON messages(chat_id, sent_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
