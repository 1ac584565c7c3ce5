//! Database migrations for the chat store
//!
//! Provides versioned migrations for the users/servers/members/messages
//! schema. Each migration is applied atomically and tracked in the
//! chat_schema_version table.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current schema version for core_store
pub const CURRENT_CHAT_SCHEMA_VERSION: i32 = 1;

/// Migration descriptor
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
    pub down_sql: Option<&'static str>,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial users, servers, members and messages schema",
            up_sql: r#"
                -- Schema version tracking for core_store
                CREATE TABLE IF NOT EXISTS chat_schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at INTEGER NOT NULL
                );

                -- Users (provisioned just-in-time from the identity provider;
                -- email is the stable key, external_id may be re-issued)
                CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    external_id TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_users_external ON users(external_id);

                -- Servers (chat groups, each owned by exactly one user)
                CREATE TABLE IF NOT EXISTS servers (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    invite_code TEXT NOT NULL UNIQUE,
                    is_restricted BOOLEAN NOT NULL DEFAULT 0,
                    owner_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_servers_owner ON servers(owner_id);

                -- Members (join table with roles; one membership per user per server)
                CREATE TABLE IF NOT EXISTS members (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    server_id TEXT NOT NULL,
                    role TEXT NOT NULL CHECK(role IN ('OWNER', 'MODERATOR', 'GUEST')),
                    created_at INTEGER NOT NULL,
                    UNIQUE (user_id, server_id),
                    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                    FOREIGN KEY (server_id) REFERENCES servers(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_members_user ON members(user_id);
                CREATE INDEX IF NOT EXISTS idx_members_role ON members(server_id, role);

                -- Messages (client_id is the global idempotency key; the
                -- timeline index matches the (sent_at, sequence, id) order)
                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    client_id TEXT NOT NULL UNIQUE,
                    content TEXT NOT NULL,
                    sent_at INTEGER NOT NULL,
                    sequence INTEGER NOT NULL,
                    member_id TEXT NOT NULL,
                    server_id TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE,
                    FOREIGN KEY (server_id) REFERENCES servers(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_messages_timeline
                    ON messages(server_id, sent_at, sequence, id);
                CREATE INDEX IF NOT EXISTS idx_messages_member ON messages(member_id);
            "#,
            down_sql: Some(
                r#"
                DROP INDEX IF EXISTS idx_messages_member;
                DROP INDEX IF EXISTS idx_messages_timeline;
                DROP TABLE IF EXISTS messages;

                DROP INDEX IF EXISTS idx_members_role;
                DROP INDEX IF EXISTS idx_members_user;
                DROP TABLE IF EXISTS members;

                DROP INDEX IF EXISTS idx_servers_owner;
                DROP TABLE IF EXISTS servers;

                DROP INDEX IF EXISTS idx_users_external;
                DROP TABLE IF EXISTS users;

                DROP TABLE IF EXISTS chat_schema_version;
            "#,
            ),
        },
    ]
}

/// Get current schema version from database
fn get_current_version(pool: &Pool<SqliteConnectionManager>) -> Result<i32, rusqlite::Error> {
    let conn = pool.get().map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to get connection: {}", e),
        )))
    })?;

    // Ensure schema_version table exists
    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Result<i32, _> = conn.query_row(
        "SELECT version FROM chat_schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    );

    Ok(version.unwrap_or(0))
}

/// Run all pending migrations
pub fn migrate(pool: &Pool<SqliteConnectionManager>) -> Result<(), rusqlite::Error> {
    let current_version = get_current_version(pool)?;
    let migrations = get_migrations();

    let pending_migrations: Vec<_> =
        migrations.into_iter().filter(|m| m.version > current_version).collect();

    if pending_migrations.is_empty() {
        return Ok(());
    }

    let conn = pool.get().map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to get connection: {}", e),
        )))
    })?;

    for migration in pending_migrations {
        let tx = conn.unchecked_transaction()?;

        // Run migration SQL
        tx.execute_batch(migration.up_sql)?;

        // Record migration
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as i64;

        tx.execute(
            "INSERT INTO chat_schema_version (version, applied_at) VALUES (?, ?)",
            params![migration.version, now],
        )?;

        tx.commit()?;

        eprintln!(
            "Applied migration v{}: {}",
            migration.version, migration.description
        );
    }

    Ok(())
}

/// Get the latest migration version available
pub fn get_latest_version() -> i32 {
    let migrations = get_migrations();
    migrations.iter().map(|m| m.version).max().unwrap_or(0)
}
