//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::accounts::model::{CompanyProfile, User, WorkerProfile};
use crate::applications::model::{
    ApplicationFilter, ApplicationStatus, ApplicationView, JobApplication,
};
use crate::chat::model::{ChatRoom, Message, RoomContext};
use crate::codes::model::{Code, CodeType};
use crate::error::DatabaseError;
use crate::jobs::model::{JobFilter, JobPost};
use crate::locations::model::Location;
use crate::suggestions::classifier::MinedPhrase;
use crate::suggestions::model::{JobPostSuggestion, SuggestionHit};

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations and seed reference data.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Users & sessions ────────────────────────────────────────────

    /// Insert a user. A taken email yields `DatabaseError::Constraint`.
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Look up by (already normalized) email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn create_session(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// User owning a session that has not expired at `now`.
    async fn get_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, DatabaseError>;

    async fn delete_session(&self, token_hash: &str) -> Result<bool, DatabaseError>;

    /// Delete sessions expired at `now`. Returns how many were removed.
    async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<usize, DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    async fn upsert_company_profile(&self, profile: &CompanyProfile) -> Result<(), DatabaseError>;

    async fn get_company_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CompanyProfile>, DatabaseError>;

    async fn upsert_worker_profile(&self, profile: &WorkerProfile) -> Result<(), DatabaseError>;

    async fn get_worker_profile(&self, user_id: Uuid)
    -> Result<Option<WorkerProfile>, DatabaseError>;

    // ── Reference data ──────────────────────────────────────────────

    /// Distinct prefectures in seed order.
    async fn list_prefectures(&self) -> Result<Vec<String>, DatabaseError>;

    async fn list_locations(&self, prefecture: Option<&str>)
    -> Result<Vec<Location>, DatabaseError>;

    async fn get_location(&self, id: i64) -> Result<Option<Location>, DatabaseError>;

    async fn list_codes(&self, code_type: Option<CodeType>) -> Result<Vec<Code>, DatabaseError>;

    // ── Job posts ───────────────────────────────────────────────────

    async fn create_job_post(&self, post: &JobPost) -> Result<(), DatabaseError>;

    async fn get_job_post(&self, id: Uuid) -> Result<Option<JobPost>, DatabaseError>;

    async fn update_job_post(&self, post: &JobPost) -> Result<(), DatabaseError>;

    /// Delete a post with its applications, rooms, messages and suggestions.
    async fn delete_job_post(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// One page of posts matching `filter`, newest first, plus the total count.
    async fn list_job_posts(
        &self,
        filter: &JobFilter,
        today: NaiveDate,
    ) -> Result<(Vec<JobPost>, u64), DatabaseError>;

    /// Display name of a company: its profile name, falling back to the user name.
    async fn company_display_name(&self, company_id: Uuid) -> Result<Option<String>, DatabaseError>;

    // ── Suggestions ─────────────────────────────────────────────────

    /// Replace all suggestions of a post with `phrases`.
    async fn replace_suggestions(
        &self,
        job_post_id: Uuid,
        phrases: &[MinedPhrase],
    ) -> Result<(), DatabaseError>;

    async fn list_suggestions_for_post(
        &self,
        job_post_id: Uuid,
    ) -> Result<Vec<JobPostSuggestion>, DatabaseError>;

    /// Distinct phrases containing `query`, most frequent first.
    async fn search_suggestions(
        &self,
        query: Option<&str>,
        category: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SuggestionHit>, DatabaseError>;

    // ── Applications ────────────────────────────────────────────────

    /// Insert an application, its chat room and the optional opening message
    /// atomically. A duplicate (post, worker) yields `DatabaseError::Constraint`.
    async fn create_application(
        &self,
        application: &JobApplication,
        room: &ChatRoom,
        opening: Option<&Message>,
    ) -> Result<(), DatabaseError>;

    async fn get_application(&self, id: Uuid) -> Result<Option<JobApplication>, DatabaseError>;

    async fn find_application(
        &self,
        job_post_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<JobApplication>, DatabaseError>;

    async fn list_applications_for_worker(
        &self,
        worker_id: Uuid,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationView>, DatabaseError>;

    /// Applications to any post owned by `company_id`.
    async fn list_applications_for_company(
        &self,
        company_id: Uuid,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationView>, DatabaseError>;

    /// Compare-and-set the status. Returns false if the row was not in `from`.
    async fn update_application_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<bool, DatabaseError>;

    /// Delete an application with its room and messages, but only while it
    /// is still `applied`. Returns false when nothing was deleted.
    async fn withdraw_application(&self, id: Uuid) -> Result<bool, DatabaseError>;

    // ── Chat ────────────────────────────────────────────────────────

    async fn get_room_context(&self, room_id: Uuid) -> Result<Option<RoomContext>, DatabaseError>;

    async fn get_room_by_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<ChatRoom>, DatabaseError>;

    /// Rooms where `user_id` is the applicant or the post owner, most recent first.
    async fn list_room_contexts_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RoomContext>, DatabaseError>;

    /// Store a message. The store assigns `created_at`, strictly increasing
    /// within the room, and returns the stored message.
    async fn insert_message(&self, message: Message) -> Result<Message, DatabaseError>;

    /// Messages of a room in send order, optionally only those after `after`.
    async fn list_messages(
        &self,
        room_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, DatabaseError>;

    async fn last_message(&self, room_id: Uuid) -> Result<Option<Message>, DatabaseError>;

    /// Mark messages not sent by `reader_id`, created up to `through`, as
    /// read. Returns rows changed.
    async fn mark_room_read(
        &self,
        room_id: Uuid,
        reader_id: Uuid,
        through: DateTime<Utc>,
    ) -> Result<usize, DatabaseError>;

    /// Unread messages addressed to `reader_id` in one room.
    async fn count_unread_in_room(&self, room_id: Uuid, reader_id: Uuid)
    -> Result<u64, DatabaseError>;

    /// Unread messages addressed to `user_id` across all their rooms.
    async fn count_unread_total(&self, user_id: Uuid) -> Result<u64, DatabaseError>;
}
