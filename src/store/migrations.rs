//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.
//! Reference data (codes, locations) is seeded afterwards with
//! `INSERT OR IGNORE`, so re-running is harmless.

use libsql::Connection;

use crate::codes::model::SEED_CODES;
use crate::error::DatabaseError;
use crate::locations::model::{LOCATIONS_CSV, parse_locations_csv};

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "accounts",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('company', 'worker')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

            CREATE TABLE IF NOT EXISTS locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                prefecture TEXT NOT NULL,
                city TEXT NOT NULL,
                UNIQUE (prefecture, city)
            );

            CREATE TABLE IF NOT EXISTS company_profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                company_name TEXT NOT NULL,
                representative_name TEXT NOT NULL,
                location_id INTEGER NOT NULL REFERENCES locations(id),
                address TEXT NOT NULL,
                phone TEXT NOT NULL,
                description TEXT,
                website TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS worker_profiles (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                nickname TEXT NOT NULL,
                gender TEXT,
                birth_year INTEGER,
                location_id INTEGER NOT NULL REFERENCES locations(id),
                self_introduction TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "job_posts",
        sql: r#"
            CREATE TABLE IF NOT EXISTS codes (
                id INTEGER PRIMARY KEY,
                type TEXT NOT NULL,
                name TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_codes_type ON codes(type);

            CREATE TABLE IF NOT EXISTS job_posts (
                id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                detail TEXT NOT NULL,
                purpose TEXT NOT NULL CHECK (purpose IN ('want_to_do', 'need_help')),
                start_date TEXT,
                end_date TEXT,
                location TEXT,
                want_you_ids TEXT NOT NULL DEFAULT '[]',
                can_do_ids TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_job_posts_company ON job_posts(company_id);
            CREATE INDEX IF NOT EXISTS idx_job_posts_created ON job_posts(created_at);

            CREATE TABLE IF NOT EXISTS job_post_suggestions (
                id TEXT PRIMARY KEY,
                job_post_id TEXT NOT NULL REFERENCES job_posts(id) ON DELETE CASCADE,
                category TEXT NOT NULL,
                phrase TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_suggestions_post ON job_post_suggestions(job_post_id);
            CREATE INDEX IF NOT EXISTS idx_suggestions_category ON job_post_suggestions(category);
        "#,
    },
    Migration {
        version: 3,
        name: "applications_and_chat",
        sql: r#"
            CREATE TABLE IF NOT EXISTS job_applications (
                id TEXT PRIMARY KEY,
                job_post_id TEXT NOT NULL REFERENCES job_posts(id) ON DELETE CASCADE,
                worker_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT 'applied'
                    CHECK (status IN ('applied', 'accepted', 'rejected')),
                reasons TEXT NOT NULL DEFAULT '[]',
                motive TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (job_post_id, worker_id)
            );
            CREATE INDEX IF NOT EXISTS idx_applications_worker ON job_applications(worker_id);
            CREATE INDEX IF NOT EXISTS idx_applications_status ON job_applications(status);

            CREATE TABLE IF NOT EXISTS chat_rooms (
                id TEXT PRIMARY KEY,
                job_application_id TEXT NOT NULL UNIQUE
                    REFERENCES job_applications(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                chat_room_id TEXT NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
                sender_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                body TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_room ON messages(chat_room_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(chat_room_id, is_read);
        "#,
    },
];

/// Run all pending migrations, then seed reference data.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            record_version(conn, migration.version, migration.name).await?;
        }
    }

    seed_reference_data(conn).await?;

    let version = get_current_version(conn).await?;
    tracing::info!(version, "Database migrations complete");
    Ok(())
}

/// Insert the bundled codes and locations. Existing rows are left alone.
async fn seed_reference_data(conn: &Connection) -> Result<(), DatabaseError> {
    for (sort_order, (id, code_type, name)) in SEED_CODES.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO codes (id, type, name, sort_order) VALUES (?1, ?2, ?3, ?4)",
            libsql::params![*id, code_type.as_str(), *name, sort_order as i64],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to seed code {id}: {e}")))?;
    }

    let locations = parse_locations_csv(LOCATIONS_CSV)
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    for location in &locations {
        conn.execute(
            "INSERT OR IGNORE INTO locations (prefecture, city) VALUES (?1, ?2)",
            libsql::params![location.prefecture.as_str(), location.city.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to seed location: {e}")))?;
    }

    tracing::debug!(
        codes = SEED_CODES.len(),
        locations = locations.len(),
        "Reference data seeded"
    );
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn record_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
