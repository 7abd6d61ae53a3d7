//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is shared
//! by all handlers. Writes hold `lock` exclusively and reads hold it shared, so
//! a transaction opened by one request never swallows statements issued by
//! another and no reader sees its uncommitted rows.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, SubsecRound, Utc};
use libsql::params::Params;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::accounts::model::{CompanyProfile, Gender, Role, User, WorkerProfile};
use crate::applications::model::{
    ApplicationFilter, ApplicationStatus, ApplicationView, JobApplication,
};
use crate::chat::model::{ChatRoom, Message, RoomContext};
use crate::codes::model::{Code, CodeType};
use crate::error::DatabaseError;
use crate::jobs::model::{JobFilter, JobPost, Purpose};
use crate::locations::model::Location;
use crate::store::migrations;
use crate::store::traits::Database;
use crate::suggestions::classifier::MinedPhrase;
use crate::suggestions::model::{JobPostSuggestion, SuggestionHit};

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    lock: RwLock<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            lock: RwLock::new(()),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().await
    }

    async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().await
    }

    /// Run a `SELECT COUNT(*)`-shaped query. Callers hold the lock.
    async fn query_count(&self, op: &str, sql: &str, params: Params) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::from_libsql(op, e))?;
        match rows.next().await.map_err(|e| DatabaseError::from_libsql(op, e))? {
            Some(row) => {
                let n: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("{op} count: {e}")))?;
                Ok(n.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical timestamp format: fixed-width microseconds, `Z` suffix, so that
/// text comparison in SQL matches chronological order.
fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Timestamp for a new message: now at stored precision, but always strictly
/// after the room's latest message so `created_at > cursor` polling never
/// skips or repeats one.
fn next_message_stamp(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(6);
    match last {
        Some(last) if last >= now => last + Duration::microseconds(1),
        _ => now,
    }
}

fn fmt_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn parse_uuid(s: &str, field: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("{field}: {e}")))
}

fn text(row: &libsql::Row, idx: i32, field: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("{field}: {e}")))
}

fn int(row: &libsql::Row, idx: i32, field: &str) -> Result<i64, DatabaseError> {
    row.get::<i64>(idx)
        .map_err(|e| DatabaseError::Query(format!("{field}: {e}")))
}

fn opt_col(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok().filter(|s| !s.is_empty())
}

fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn opt_int(n: Option<i64>) -> Value {
    match n {
        Some(n) => Value::Integer(n),
        None => Value::Null,
    }
}

fn ids_to_json(ids: &[i64]) -> Result<String, DatabaseError> {
    serde_json::to_string(ids).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn json_to_ids(s: &str) -> Vec<i64> {
    serde_json::from_str(s).unwrap_or_default()
}

/// Escape LIKE wildcards; pair with `ESCAPE '\'`.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn gender_to_str(g: Gender) -> &'static str {
    match g {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Other => "other",
    }
}

fn str_to_gender(s: &str) -> Option<Gender> {
    match s {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        "other" => Some(Gender::Other),
        _ => None,
    }
}

// ── Row mapping ─────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    let id: String = text(row, 0, "user.id")?;
    let role: String = text(row, 4, "user.role")?;
    Ok(User {
        id: parse_uuid(&id, "user.id")?,
        name: text(row, 1, "user.name")?,
        email: text(row, 2, "user.email")?,
        password_hash: text(row, 3, "user.password_hash")?,
        role: role
            .parse::<Role>()
            .map_err(DatabaseError::Serialization)?,
        created_at: parse_datetime(&text(row, 5, "user.created_at")?),
        updated_at: parse_datetime(&text(row, 6, "user.updated_at")?),
    })
}

const COMPANY_PROFILE_COLUMNS: &str = "user_id, company_name, representative_name, location_id, address, phone, description, website, created_at, updated_at";

fn row_to_company_profile(row: &libsql::Row) -> Result<CompanyProfile, DatabaseError> {
    let user_id: String = text(row, 0, "company_profile.user_id")?;
    Ok(CompanyProfile {
        user_id: parse_uuid(&user_id, "company_profile.user_id")?,
        company_name: text(row, 1, "company_profile.company_name")?,
        representative_name: text(row, 2, "company_profile.representative_name")?,
        location_id: int(row, 3, "company_profile.location_id")?,
        address: text(row, 4, "company_profile.address")?,
        phone: text(row, 5, "company_profile.phone")?,
        description: opt_col(row, 6),
        website: opt_col(row, 7),
        created_at: parse_datetime(&text(row, 8, "company_profile.created_at")?),
        updated_at: parse_datetime(&text(row, 9, "company_profile.updated_at")?),
    })
}

const WORKER_PROFILE_COLUMNS: &str = "user_id, nickname, gender, birth_year, location_id, self_introduction, created_at, updated_at";

fn row_to_worker_profile(row: &libsql::Row) -> Result<WorkerProfile, DatabaseError> {
    let user_id: String = text(row, 0, "worker_profile.user_id")?;
    Ok(WorkerProfile {
        user_id: parse_uuid(&user_id, "worker_profile.user_id")?,
        nickname: text(row, 1, "worker_profile.nickname")?,
        gender: opt_col(row, 2).and_then(|s| str_to_gender(&s)),
        birth_year: row.get::<i64>(3).ok().map(|y| y as i32),
        location_id: int(row, 4, "worker_profile.location_id")?,
        self_introduction: opt_col(row, 5),
        created_at: parse_datetime(&text(row, 6, "worker_profile.created_at")?),
        updated_at: parse_datetime(&text(row, 7, "worker_profile.updated_at")?),
    })
}

fn row_to_location(row: &libsql::Row) -> Result<Location, DatabaseError> {
    Ok(Location {
        id: int(row, 0, "location.id")?,
        prefecture: text(row, 1, "location.prefecture")?,
        city: text(row, 2, "location.city")?,
    })
}

fn row_to_code(row: &libsql::Row) -> Result<Code, DatabaseError> {
    let code_type: String = text(row, 1, "code.type")?;
    Ok(Code {
        id: int(row, 0, "code.id")?,
        code_type: code_type
            .parse::<CodeType>()
            .map_err(DatabaseError::Serialization)?,
        name: text(row, 2, "code.name")?,
        sort_order: int(row, 3, "code.sort_order")?,
    })
}

const JOB_POST_COLUMNS: &str = "id, company_id, title, detail, purpose, start_date, end_date, location, want_you_ids, can_do_ids, created_at, updated_at";

fn row_to_job_post(row: &libsql::Row) -> Result<JobPost, DatabaseError> {
    let id: String = text(row, 0, "job_post.id")?;
    let company_id: String = text(row, 1, "job_post.company_id")?;
    let purpose: String = text(row, 4, "job_post.purpose")?;
    Ok(JobPost {
        id: parse_uuid(&id, "job_post.id")?,
        company_id: parse_uuid(&company_id, "job_post.company_id")?,
        title: text(row, 2, "job_post.title")?,
        detail: text(row, 3, "job_post.detail")?,
        purpose: purpose
            .parse::<Purpose>()
            .map_err(DatabaseError::Serialization)?,
        start_date: parse_date(row.get(5).ok()),
        end_date: parse_date(row.get(6).ok()),
        location: opt_col(row, 7),
        want_you_ids: json_to_ids(&row.get::<String>(8).unwrap_or_default()),
        can_do_ids: json_to_ids(&row.get::<String>(9).unwrap_or_default()),
        created_at: parse_datetime(&text(row, 10, "job_post.created_at")?),
        updated_at: parse_datetime(&text(row, 11, "job_post.updated_at")?),
    })
}

const APPLICATION_COLUMNS: &str =
    "a.id, a.job_post_id, a.worker_id, a.status, a.reasons, a.motive, a.created_at, a.updated_at";

fn row_to_application(row: &libsql::Row) -> Result<JobApplication, DatabaseError> {
    let id: String = text(row, 0, "application.id")?;
    let post_id: String = text(row, 1, "application.job_post_id")?;
    let worker_id: String = text(row, 2, "application.worker_id")?;
    let status: String = text(row, 3, "application.status")?;
    let reasons: String = row.get(4).unwrap_or_default();
    Ok(JobApplication {
        id: parse_uuid(&id, "application.id")?,
        job_post_id: parse_uuid(&post_id, "application.job_post_id")?,
        worker_id: parse_uuid(&worker_id, "application.worker_id")?,
        status: status
            .parse::<ApplicationStatus>()
            .map_err(DatabaseError::Serialization)?,
        reasons: serde_json::from_str(&reasons).unwrap_or_default(),
        motive: opt_col(row, 5),
        created_at: parse_datetime(&text(row, 6, "application.created_at")?),
        updated_at: parse_datetime(&text(row, 7, "application.updated_at")?),
    })
}

/// Application columns followed by job title, worker display name, room id.
fn row_to_application_view(row: &libsql::Row) -> Result<ApplicationView, DatabaseError> {
    let application = row_to_application(row)?;
    Ok(ApplicationView {
        application,
        job_title: text(row, 8, "application.job_title")?,
        worker_name: text(row, 9, "application.worker_name")?,
        chat_room_id: opt_col(row, 10).and_then(|s| Uuid::parse_str(&s).ok()),
    })
}

const MESSAGE_COLUMNS: &str = "id, chat_room_id, sender_id, body, is_read, created_at";

fn row_to_message(row: &libsql::Row) -> Result<Message, DatabaseError> {
    let id: String = text(row, 0, "message.id")?;
    let room_id: String = text(row, 1, "message.chat_room_id")?;
    let sender_id: String = text(row, 2, "message.sender_id")?;
    Ok(Message {
        id: parse_uuid(&id, "message.id")?,
        chat_room_id: parse_uuid(&room_id, "message.chat_room_id")?,
        sender_id: parse_uuid(&sender_id, "message.sender_id")?,
        body: text(row, 3, "message.body")?,
        is_read: row.get::<i64>(4).unwrap_or(0) != 0,
        created_at: parse_datetime(&text(row, 5, "message.created_at")?),
    })
}

const ROOM_CONTEXT_SELECT: &str = "SELECT r.id, r.job_application_id, r.created_at, p.id, p.title, a.status, a.worker_id, COALESCE(wp.nickname, wu.name), p.company_id, COALESCE(cp.company_name, cu.name) \
     FROM chat_rooms r \
     JOIN job_applications a ON a.id = r.job_application_id \
     JOIN job_posts p ON p.id = a.job_post_id \
     JOIN users wu ON wu.id = a.worker_id \
     LEFT JOIN worker_profiles wp ON wp.user_id = a.worker_id \
     JOIN users cu ON cu.id = p.company_id \
     LEFT JOIN company_profiles cp ON cp.user_id = p.company_id";

fn row_to_room_context(row: &libsql::Row) -> Result<RoomContext, DatabaseError> {
    let room_id: String = text(row, 0, "room.id")?;
    let application_id: String = text(row, 1, "room.job_application_id")?;
    let post_id: String = text(row, 3, "room.job_post_id")?;
    let status: String = text(row, 5, "room.application_status")?;
    let worker_id: String = text(row, 6, "room.worker_id")?;
    let company_id: String = text(row, 8, "room.company_id")?;
    Ok(RoomContext {
        room: ChatRoom {
            id: parse_uuid(&room_id, "room.id")?,
            job_application_id: parse_uuid(&application_id, "room.job_application_id")?,
            created_at: parse_datetime(&text(row, 2, "room.created_at")?),
        },
        job_post_id: parse_uuid(&post_id, "room.job_post_id")?,
        job_title: text(row, 4, "room.job_title")?,
        application_status: status
            .parse::<ApplicationStatus>()
            .map_err(DatabaseError::Serialization)?,
        worker_id: parse_uuid(&worker_id, "room.worker_id")?,
        worker_name: text(row, 7, "room.worker_name")?,
        company_id: parse_uuid(&company_id, "room.company_id")?,
        company_name: text(row, 9, "room.company_name")?,
    })
}

fn row_to_suggestion(row: &libsql::Row) -> Result<JobPostSuggestion, DatabaseError> {
    let id: String = text(row, 0, "suggestion.id")?;
    let post_id: String = text(row, 1, "suggestion.job_post_id")?;
    Ok(JobPostSuggestion {
        id: parse_uuid(&id, "suggestion.id")?,
        job_post_id: parse_uuid(&post_id, "suggestion.job_post_id")?,
        category: text(row, 2, "suggestion.category")?,
        phrase: text(row, 3, "suggestion.phrase")?,
        created_at: parse_datetime(&text(row, 4, "suggestion.created_at")?),
    })
}

/// Drain all rows through `map`.
async fn collect_rows<T>(
    mut rows: libsql::Rows,
    op: &str,
    map: fn(&libsql::Row) -> Result<T, DatabaseError>,
) -> Result<Vec<T>, DatabaseError> {
    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::from_libsql(op, e))?
    {
        out.push(map(&row)?);
    }
    Ok(out)
}

/// First row through `map`, if any.
async fn first_row<T>(
    mut rows: libsql::Rows,
    op: &str,
    map: fn(&libsql::Row) -> Result<T, DatabaseError>,
) -> Result<Option<T>, DatabaseError> {
    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::from_libsql(op, e))?
    {
        Some(row) => Ok(Some(map(&row)?)),
        None => Ok(None),
    }
}

/// Build the WHERE clause and positional params for an application listing.
fn application_filter_sql(
    owner_clause: &str,
    owner_id: Uuid,
    filter: &ApplicationFilter,
) -> (String, Vec<Value>) {
    let mut values = vec![Value::Text(owner_id.to_string())];
    let mut clauses = vec![owner_clause.to_string()];
    if let Some(status) = filter.status {
        values.push(Value::Text(status.as_str().to_string()));
        clauses.push(format!("a.status = ?{}", values.len()));
    }
    if let Some(post_id) = filter.job_post_id {
        values.push(Value::Text(post_id.to_string()));
        clauses.push(format!("a.job_post_id = ?{}", values.len()));
    }
    (clauses.join(" AND "), values)
}

const APPLICATION_VIEW_FROM: &str = "FROM job_applications a \
     JOIN job_posts p ON p.id = a.job_post_id \
     JOIN users u ON u.id = a.worker_id \
     LEFT JOIN worker_profiles wp ON wp.user_id = a.worker_id \
     LEFT JOIN chat_rooms r ON r.job_application_id = a.id";

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Users & sessions ────────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        self.conn()
            .execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    user.id.to_string(),
                    user.name.as_str(),
                    user.email.as_str(),
                    user.password_hash.as_str(),
                    user.role.as_str(),
                    fmt_ts(&user.created_at),
                    fmt_ts(&user.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("create_user", e))?;
        debug!(user_id = %user.id, role = %user.role, "User created");
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_user", e))?;
        first_row(rows, "get_user", row_to_user).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_user_by_email", e))?;
        first_row(rows, "get_user_by_email", row_to_user).await
    }

    async fn create_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        self.conn()
            .execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    token_hash,
                    user_id.to_string(),
                    fmt_ts(&Utc::now()),
                    fmt_ts(&expires_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("create_session", e))?;
        Ok(())
    }

    async fn get_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                "SELECT u.id, u.name, u.email, u.password_hash, u.role, u.created_at, u.updated_at \
                 FROM sessions s JOIN users u ON u.id = s.user_id \
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2",
                params![token_hash, fmt_ts(&now)],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_session_user", e))?;
        first_row(rows, "get_session_user", row_to_user).await
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, DatabaseError> {
        let _guard = self.write().await;
        let count = self
            .conn()
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
            .await
            .map_err(|e| DatabaseError::from_libsql("delete_session", e))?;
        Ok(count > 0)
    }

    async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let _guard = self.write().await;
        let count = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![fmt_ts(&now)],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("prune_sessions", e))?;
        Ok(count as usize)
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn upsert_company_profile(&self, profile: &CompanyProfile) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO company_profiles ({COMPANY_PROFILE_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                       company_name = excluded.company_name, \
                       representative_name = excluded.representative_name, \
                       location_id = excluded.location_id, \
                       address = excluded.address, \
                       phone = excluded.phone, \
                       description = excluded.description, \
                       website = excluded.website, \
                       updated_at = excluded.updated_at"
                ),
                params![
                    profile.user_id.to_string(),
                    profile.company_name.as_str(),
                    profile.representative_name.as_str(),
                    profile.location_id,
                    profile.address.as_str(),
                    profile.phone.as_str(),
                    opt_text(profile.description.as_deref()),
                    opt_text(profile.website.as_deref()),
                    fmt_ts(&profile.created_at),
                    fmt_ts(&profile.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("upsert_company_profile", e))?;
        Ok(())
    }

    async fn get_company_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CompanyProfile>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!("SELECT {COMPANY_PROFILE_COLUMNS} FROM company_profiles WHERE user_id = ?1"),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_company_profile", e))?;
        first_row(rows, "get_company_profile", row_to_company_profile).await
    }

    async fn upsert_worker_profile(&self, profile: &WorkerProfile) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO worker_profiles ({WORKER_PROFILE_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                       nickname = excluded.nickname, \
                       gender = excluded.gender, \
                       birth_year = excluded.birth_year, \
                       location_id = excluded.location_id, \
                       self_introduction = excluded.self_introduction, \
                       updated_at = excluded.updated_at"
                ),
                params![
                    profile.user_id.to_string(),
                    profile.nickname.as_str(),
                    opt_text(profile.gender.map(gender_to_str)),
                    opt_int(profile.birth_year.map(i64::from)),
                    profile.location_id,
                    opt_text(profile.self_introduction.as_deref()),
                    fmt_ts(&profile.created_at),
                    fmt_ts(&profile.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("upsert_worker_profile", e))?;
        Ok(())
    }

    async fn get_worker_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<WorkerProfile>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!("SELECT {WORKER_PROFILE_COLUMNS} FROM worker_profiles WHERE user_id = ?1"),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_worker_profile", e))?;
        first_row(rows, "get_worker_profile", row_to_worker_profile).await
    }

    // ── Reference data ──────────────────────────────────────────────

    async fn list_prefectures(&self) -> Result<Vec<String>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                "SELECT prefecture FROM locations GROUP BY prefecture ORDER BY MIN(id)",
                (),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_prefectures", e))?;
        collect_rows(rows, "list_prefectures", |row| text(row, 0, "location.prefecture")).await
    }

    async fn list_locations(
        &self,
        prefecture: Option<&str>,
    ) -> Result<Vec<Location>, DatabaseError> {
        let _guard = self.read().await;
        let rows = match prefecture {
            Some(prefecture) => {
                self.conn()
                    .query(
                        "SELECT id, prefecture, city FROM locations WHERE prefecture = ?1 ORDER BY id",
                        params![prefecture],
                    )
                    .await
            }
            None => {
                self.conn()
                    .query("SELECT id, prefecture, city FROM locations ORDER BY id", ())
                    .await
            }
        }
        .map_err(|e| DatabaseError::from_libsql("list_locations", e))?;
        collect_rows(rows, "list_locations", row_to_location).await
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                "SELECT id, prefecture, city FROM locations WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_location", e))?;
        first_row(rows, "get_location", row_to_location).await
    }

    async fn list_codes(&self, code_type: Option<CodeType>) -> Result<Vec<Code>, DatabaseError> {
        let _guard = self.read().await;
        let rows = match code_type {
            Some(code_type) => {
                self.conn()
                    .query(
                        "SELECT id, type, name, sort_order FROM codes WHERE type = ?1 ORDER BY sort_order, id",
                        params![code_type.as_str()],
                    )
                    .await
            }
            None => {
                self.conn()
                    .query(
                        "SELECT id, type, name, sort_order FROM codes ORDER BY type, sort_order, id",
                        (),
                    )
                    .await
            }
        }
        .map_err(|e| DatabaseError::from_libsql("list_codes", e))?;
        collect_rows(rows, "list_codes", row_to_code).await
    }

    // ── Job posts ───────────────────────────────────────────────────

    async fn create_job_post(&self, post: &JobPost) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO job_posts ({JOB_POST_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    post.id.to_string(),
                    post.company_id.to_string(),
                    post.title.as_str(),
                    post.detail.as_str(),
                    post.purpose.as_str(),
                    post.start_date.as_ref().map(fmt_date),
                    post.end_date.as_ref().map(fmt_date),
                    opt_text(post.location.as_deref()),
                    ids_to_json(&post.want_you_ids)?,
                    ids_to_json(&post.can_do_ids)?,
                    fmt_ts(&post.created_at),
                    fmt_ts(&post.updated_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("create_job_post", e))?;
        debug!(job_post_id = %post.id, company_id = %post.company_id, "Job post created");
        Ok(())
    }

    async fn get_job_post(&self, id: Uuid) -> Result<Option<JobPost>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!("SELECT {JOB_POST_COLUMNS} FROM job_posts WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_job_post", e))?;
        first_row(rows, "get_job_post", row_to_job_post).await
    }

    async fn update_job_post(&self, post: &JobPost) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        let count = self
            .conn()
            .execute(
                "UPDATE job_posts SET title = ?1, detail = ?2, purpose = ?3, start_date = ?4, end_date = ?5, \
                 location = ?6, want_you_ids = ?7, can_do_ids = ?8, updated_at = ?9 WHERE id = ?10",
                params![
                    post.title.as_str(),
                    post.detail.as_str(),
                    post.purpose.as_str(),
                    post.start_date.as_ref().map(fmt_date),
                    post.end_date.as_ref().map(fmt_date),
                    opt_text(post.location.as_deref()),
                    ids_to_json(&post.want_you_ids)?,
                    ids_to_json(&post.can_do_ids)?,
                    fmt_ts(&post.updated_at),
                    post.id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("update_job_post", e))?;
        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "job_post".into(),
                id: post.id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_job_post(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let _guard = self.write().await;
        let id = id.to_string();
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::from_libsql("delete_job_post begin", e))?;

        tx.execute(
            "DELETE FROM messages WHERE chat_room_id IN ( \
                SELECT r.id FROM chat_rooms r JOIN job_applications a ON a.id = r.job_application_id \
                WHERE a.job_post_id = ?1)",
            params![id.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("delete_job_post messages", e))?;
        tx.execute(
            "DELETE FROM chat_rooms WHERE job_application_id IN ( \
                SELECT id FROM job_applications WHERE job_post_id = ?1)",
            params![id.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("delete_job_post rooms", e))?;
        tx.execute(
            "DELETE FROM job_applications WHERE job_post_id = ?1",
            params![id.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("delete_job_post applications", e))?;
        tx.execute(
            "DELETE FROM job_post_suggestions WHERE job_post_id = ?1",
            params![id.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("delete_job_post suggestions", e))?;
        let count = tx
            .execute("DELETE FROM job_posts WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(|e| DatabaseError::from_libsql("delete_job_post", e))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_libsql("delete_job_post commit", e))?;
        Ok(count > 0)
    }

    async fn list_job_posts(
        &self,
        filter: &JobFilter,
        today: NaiveDate,
    ) -> Result<(Vec<JobPost>, u64), DatabaseError> {
        let _guard = self.read().await;
        let mut values: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        if let Some(purpose) = filter.purpose {
            values.push(Value::Text(purpose.as_str().to_string()));
            clauses.push(format!("purpose = ?{}", values.len()));
        }
        if let Some(code) = filter.want_you {
            values.push(Value::Integer(code));
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(job_posts.want_you_ids) WHERE json_each.value = ?{})",
                values.len()
            ));
        }
        if let Some(code) = filter.can_do {
            values.push(Value::Integer(code));
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(job_posts.can_do_ids) WHERE json_each.value = ?{})",
                values.len()
            ));
        }
        if let Some(keyword) = filter.keyword() {
            values.push(Value::Text(like_pattern(keyword)));
            let n = values.len();
            clauses.push(format!(
                "(title LIKE ?{n} ESCAPE '\\' OR detail LIKE ?{n} ESCAPE '\\')"
            ));
        }
        if let Some(company_id) = filter.company_id {
            values.push(Value::Text(company_id.to_string()));
            clauses.push(format!("company_id = ?{}", values.len()));
        }
        if filter.open_only {
            values.push(Value::Text(fmt_date(&today)));
            clauses.push(format!("(end_date IS NULL OR end_date >= ?{})", values.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total = self
            .query_count(
                "list_job_posts count",
                &format!("SELECT COUNT(*) FROM job_posts{where_sql}"),
                Params::Positional(values.clone()),
            )
            .await?;

        values.push(Value::Integer(i64::from(filter.per_page())));
        let limit_idx = values.len();
        values.push(Value::Integer(
            i64::try_from(filter.offset()).unwrap_or(i64::MAX),
        ));
        let offset_idx = values.len();

        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {JOB_POST_COLUMNS} FROM job_posts{where_sql} \
                     ORDER BY created_at DESC, id DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
                ),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_job_posts", e))?;
        let posts = collect_rows(rows, "list_job_posts", row_to_job_post).await?;
        Ok((posts, total))
    }

    async fn company_display_name(&self, company_id: Uuid) -> Result<Option<String>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                "SELECT COALESCE(cp.company_name, u.name) FROM users u \
                 LEFT JOIN company_profiles cp ON cp.user_id = u.id WHERE u.id = ?1",
                params![company_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("company_display_name", e))?;
        first_row(rows, "company_display_name", |row| text(row, 0, "company_name")).await
    }

    // ── Suggestions ─────────────────────────────────────────────────

    async fn replace_suggestions(
        &self,
        job_post_id: Uuid,
        phrases: &[MinedPhrase],
    ) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        let post_id = job_post_id.to_string();
        let now = fmt_ts(&Utc::now());
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::from_libsql("replace_suggestions begin", e))?;

        tx.execute(
            "DELETE FROM job_post_suggestions WHERE job_post_id = ?1",
            params![post_id.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("replace_suggestions delete", e))?;

        for mined in phrases {
            tx.execute(
                "INSERT INTO job_post_suggestions (id, job_post_id, category, phrase, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    post_id.as_str(),
                    mined.category.as_str(),
                    mined.phrase.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("replace_suggestions insert", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_libsql("replace_suggestions commit", e))?;
        debug!(job_post_id = %job_post_id, count = phrases.len(), "Suggestions replaced");
        Ok(())
    }

    async fn list_suggestions_for_post(
        &self,
        job_post_id: Uuid,
    ) -> Result<Vec<JobPostSuggestion>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                "SELECT id, job_post_id, category, phrase, created_at FROM job_post_suggestions \
                 WHERE job_post_id = ?1 ORDER BY rowid",
                params![job_post_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_suggestions_for_post", e))?;
        collect_rows(rows, "list_suggestions_for_post", row_to_suggestion).await
    }

    async fn search_suggestions(
        &self,
        query: Option<&str>,
        category: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SuggestionHit>, DatabaseError> {
        let _guard = self.read().await;
        let mut values: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();
        if let Some(query) = query {
            values.push(Value::Text(like_pattern(query)));
            clauses.push(format!("phrase LIKE ?{} ESCAPE '\\'", values.len()));
        }
        if let Some(category) = category {
            values.push(Value::Text(category.to_string()));
            clauses.push(format!("category = ?{}", values.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        values.push(Value::Integer(i64::from(limit)));
        let limit_idx = values.len();

        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT phrase, category, COUNT(DISTINCT job_post_id) AS n \
                     FROM job_post_suggestions{where_sql} \
                     GROUP BY phrase, category ORDER BY n DESC, phrase ASC LIMIT ?{limit_idx}"
                ),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("search_suggestions", e))?;
        collect_rows(rows, "search_suggestions", |row| {
            let count: i64 = int(row, 2, "suggestion.count")?;
            Ok(SuggestionHit {
                phrase: text(row, 0, "suggestion.phrase")?,
                category: text(row, 1, "suggestion.category")?,
                count: count.max(0) as u64,
            })
        })
        .await
    }

    // ── Applications ────────────────────────────────────────────────

    async fn create_application(
        &self,
        application: &JobApplication,
        room: &ChatRoom,
        opening: Option<&Message>,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write().await;
        let reasons = serde_json::to_string(&application.reasons)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::from_libsql("create_application begin", e))?;

        tx.execute(
            "INSERT INTO job_applications (id, job_post_id, worker_id, status, reasons, motive, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                application.id.to_string(),
                application.job_post_id.to_string(),
                application.worker_id.to_string(),
                application.status.as_str(),
                reasons,
                opt_text(application.motive.as_deref()),
                fmt_ts(&application.created_at),
                fmt_ts(&application.updated_at),
            ],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("create_application", e))?;

        tx.execute(
            "INSERT INTO chat_rooms (id, job_application_id, created_at) VALUES (?1, ?2, ?3)",
            params![
                room.id.to_string(),
                room.job_application_id.to_string(),
                fmt_ts(&room.created_at),
            ],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("create_application room", e))?;

        if let Some(message) = opening {
            tx.execute(
                &format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    message.id.to_string(),
                    message.chat_room_id.to_string(),
                    message.sender_id.to_string(),
                    message.body.as_str(),
                    message.is_read as i64,
                    fmt_ts(&message.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("create_application message", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_libsql("create_application commit", e))?;
        debug!(application_id = %application.id, room_id = %room.id, "Application created");
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<JobApplication>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!("SELECT {APPLICATION_COLUMNS} FROM job_applications a WHERE a.id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_application", e))?;
        first_row(rows, "get_application", row_to_application).await
    }

    async fn find_application(
        &self,
        job_post_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<JobApplication>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICATION_COLUMNS} FROM job_applications a \
                     WHERE a.job_post_id = ?1 AND a.worker_id = ?2"
                ),
                params![job_post_id.to_string(), worker_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("find_application", e))?;
        first_row(rows, "find_application", row_to_application).await
    }

    async fn list_applications_for_worker(
        &self,
        worker_id: Uuid,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationView>, DatabaseError> {
        let _guard = self.read().await;
        let (where_sql, values) = application_filter_sql("a.worker_id = ?1", worker_id, filter);
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICATION_COLUMNS}, p.title, COALESCE(wp.nickname, u.name), r.id \
                     {APPLICATION_VIEW_FROM} WHERE {where_sql} ORDER BY a.created_at DESC"
                ),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_applications_for_worker", e))?;
        collect_rows(rows, "list_applications_for_worker", row_to_application_view).await
    }

    async fn list_applications_for_company(
        &self,
        company_id: Uuid,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationView>, DatabaseError> {
        let _guard = self.read().await;
        let (where_sql, values) = application_filter_sql("p.company_id = ?1", company_id, filter);
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {APPLICATION_COLUMNS}, p.title, COALESCE(wp.nickname, u.name), r.id \
                     {APPLICATION_VIEW_FROM} WHERE {where_sql} ORDER BY a.created_at DESC"
                ),
                Params::Positional(values),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_applications_for_company", e))?;
        collect_rows(rows, "list_applications_for_company", row_to_application_view).await
    }

    async fn update_application_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<bool, DatabaseError> {
        let _guard = self.write().await;
        let count = self
            .conn()
            .execute(
                "UPDATE job_applications SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                params![to.as_str(), fmt_ts(&Utc::now()), id.to_string(), from.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("update_application_status", e))?;
        Ok(count > 0)
    }

    async fn withdraw_application(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let _guard = self.write().await;
        let id = id.to_string();
        let applied = ApplicationStatus::Applied.as_str();
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::from_libsql("withdraw_application begin", e))?;

        tx.execute(
            "DELETE FROM messages WHERE chat_room_id IN ( \
                SELECT r.id FROM chat_rooms r JOIN job_applications a ON a.id = r.job_application_id \
                WHERE a.id = ?1 AND a.status = ?2)",
            params![id.as_str(), applied],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("withdraw_application messages", e))?;
        tx.execute(
            "DELETE FROM chat_rooms WHERE job_application_id IN ( \
                SELECT id FROM job_applications WHERE id = ?1 AND status = ?2)",
            params![id.as_str(), applied],
        )
        .await
        .map_err(|e| DatabaseError::from_libsql("withdraw_application room", e))?;
        let count = tx
            .execute(
                "DELETE FROM job_applications WHERE id = ?1 AND status = ?2",
                params![id.as_str(), applied],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("withdraw_application", e))?;

        if count == 0 {
            tx.rollback()
                .await
                .map_err(|e| DatabaseError::from_libsql("withdraw_application rollback", e))?;
            return Ok(false);
        }
        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_libsql("withdraw_application commit", e))?;
        Ok(true)
    }

    // ── Chat ────────────────────────────────────────────────────────

    async fn get_room_context(&self, room_id: Uuid) -> Result<Option<RoomContext>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!("{ROOM_CONTEXT_SELECT} WHERE r.id = ?1"),
                params![room_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_room_context", e))?;
        first_row(rows, "get_room_context", row_to_room_context).await
    }

    async fn get_room_by_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<ChatRoom>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                "SELECT id, job_application_id, created_at FROM chat_rooms WHERE job_application_id = ?1",
                params![application_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_room_by_application", e))?;
        first_row(rows, "get_room_by_application", |row| {
            let id: String = text(row, 0, "room.id")?;
            let application_id: String = text(row, 1, "room.job_application_id")?;
            Ok(ChatRoom {
                id: parse_uuid(&id, "room.id")?,
                job_application_id: parse_uuid(&application_id, "room.job_application_id")?,
                created_at: parse_datetime(&text(row, 2, "room.created_at")?),
            })
        })
        .await
    }

    async fn list_room_contexts_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RoomContext>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!(
                    "{ROOM_CONTEXT_SELECT} WHERE a.worker_id = ?1 OR p.company_id = ?1 \
                     ORDER BY COALESCE((SELECT MAX(m.created_at) FROM messages m WHERE m.chat_room_id = r.id), r.created_at) DESC"
                ),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_room_contexts_for_user", e))?;
        collect_rows(rows, "list_room_contexts_for_user", row_to_room_context).await
    }

    async fn insert_message(&self, mut message: Message) -> Result<Message, DatabaseError> {
        let _guard = self.write().await;
        let room_id = message.chat_room_id.to_string();

        let rows = self
            .conn()
            .query(
                "SELECT MAX(created_at) FROM messages WHERE chat_room_id = ?1",
                params![room_id.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("insert_message last", e))?;
        let last = first_row(rows, "insert_message last", |row| Ok(opt_col(row, 0)))
            .await?
            .flatten()
            .map(|s| parse_datetime(&s));
        message.created_at = next_message_stamp(Utc::now(), last);

        self.conn()
            .execute(
                &format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    message.id.to_string(),
                    room_id.as_str(),
                    message.sender_id.to_string(),
                    message.body.as_str(),
                    message.is_read as i64,
                    fmt_ts(&message.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("insert_message", e))?;
        Ok(message)
    }

    async fn list_messages(
        &self,
        room_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, DatabaseError> {
        let _guard = self.read().await;
        let rows = match after {
            Some(after) => {
                self.conn()
                    .query(
                        &format!(
                            "SELECT {MESSAGE_COLUMNS} FROM messages \
                             WHERE chat_room_id = ?1 AND created_at > ?2 ORDER BY created_at, rowid"
                        ),
                        params![room_id.to_string(), fmt_ts(&after)],
                    )
                    .await
            }
            None => {
                self.conn()
                    .query(
                        &format!(
                            "SELECT {MESSAGE_COLUMNS} FROM messages \
                             WHERE chat_room_id = ?1 ORDER BY created_at, rowid"
                        ),
                        params![room_id.to_string()],
                    )
                    .await
            }
        }
        .map_err(|e| DatabaseError::from_libsql("list_messages", e))?;
        collect_rows(rows, "list_messages", row_to_message).await
    }

    async fn last_message(&self, room_id: Uuid) -> Result<Option<Message>, DatabaseError> {
        let _guard = self.read().await;
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_room_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![room_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("last_message", e))?;
        first_row(rows, "last_message", row_to_message).await
    }

    async fn mark_room_read(
        &self,
        room_id: Uuid,
        reader_id: Uuid,
        through: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let _guard = self.write().await;
        let count = self
            .conn()
            .execute(
                "UPDATE messages SET is_read = 1 \
                 WHERE chat_room_id = ?1 AND sender_id != ?2 AND is_read = 0 AND created_at <= ?3",
                params![room_id.to_string(), reader_id.to_string(), fmt_ts(&through)],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("mark_room_read", e))?;
        Ok(count as usize)
    }

    async fn count_unread_in_room(
        &self,
        room_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, DatabaseError> {
        let _guard = self.read().await;
        self.query_count(
            "count_unread_in_room",
            "SELECT COUNT(*) FROM messages WHERE chat_room_id = ?1 AND sender_id != ?2 AND is_read = 0",
            Params::Positional(vec![
                Value::Text(room_id.to_string()),
                Value::Text(reader_id.to_string()),
            ]),
        )
        .await
    }

    async fn count_unread_total(&self, user_id: Uuid) -> Result<u64, DatabaseError> {
        let _guard = self.read().await;
        self.query_count(
            "count_unread_total",
            "SELECT COUNT(*) FROM messages m \
             JOIN chat_rooms r ON r.id = m.chat_room_id \
             JOIN job_applications a ON a.id = r.job_application_id \
             JOIN job_posts p ON p.id = a.job_post_id \
             WHERE (a.worker_id = ?1 OR p.company_id = ?1) AND m.sender_id != ?1 AND m.is_read = 0",
            Params::Positional(vec![Value::Text(user_id.to_string())]),
        )
        .await
    }
}
