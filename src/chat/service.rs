//! ChatManager — room listing, polling and sending.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{Message, MessageForm, MessagePage, RoomContext, RoomSummary};
use crate::accounts::model::User;
use crate::error::ApiError;
use crate::policy::{ChatRoomPolicy, authorize};
use crate::store::Database;

pub struct ChatManager {
    db: Arc<dyn Database>,
    poll_interval_secs: u64,
}

impl ChatManager {
    pub fn new(db: Arc<dyn Database>, poll_interval_secs: u64) -> Self {
        Self {
            db,
            poll_interval_secs,
        }
    }

    /// Rooms the user takes part in, most recently active first.
    pub async fn list_rooms(&self, user: &User) -> Result<Vec<RoomSummary>, ApiError> {
        let contexts = self.db.list_room_contexts_for_user(user.id).await?;
        let mut rooms = Vec::with_capacity(contexts.len());
        for ctx in contexts {
            rooms.push(self.summarize(user, ctx).await?);
        }
        Ok(rooms)
    }

    pub async fn room(&self, user: &User, room_id: Uuid) -> Result<RoomSummary, ApiError> {
        let ctx = self.context(user, room_id).await?;
        self.summarize(user, ctx).await
    }

    /// Poll a room. Returns messages newer than `after` (all when `None`) and
    /// marks the counterpart's messages as read.
    pub async fn messages(
        &self,
        user: &User,
        room_id: Uuid,
        after: Option<DateTime<Utc>>,
    ) -> Result<MessagePage, ApiError> {
        let ctx = self.context(user, room_id).await?;

        let mut messages = self.db.list_messages(room_id, after).await?;
        // only what this poll delivers; later arrivals stay unread
        if let Some(through) = messages.last().map(|m| m.created_at) {
            let marked = self.db.mark_room_read(room_id, user.id, through).await?;
            if marked > 0 {
                debug!(room_id = %room_id, reader_id = %user.id, marked, "Messages marked read");
            }
            for message in messages.iter_mut().filter(|m| m.sender_id != user.id) {
                message.is_read = true;
            }
        }

        Ok(MessagePage {
            room_id,
            application_status: ctx.application_status,
            can_send: ctx.application_status.allows_messages(),
            poll_interval_secs: self.poll_interval_secs,
            messages,
        })
    }

    /// Post a message. Rooms go read-only once the application is decided.
    pub async fn send(
        &self,
        user: &User,
        room_id: Uuid,
        form: MessageForm,
    ) -> Result<Message, ApiError> {
        let ctx = self.context(user, room_id).await?;
        authorize(ChatRoomPolicy::send(user, &ctx), "send to this room")?;

        if !ctx.application_status.allows_messages() {
            return Err(ApiError::Conflict(format!(
                "application is {}; the conversation is closed",
                ctx.application_status
            )));
        }
        form.validate()?;

        let message = self
            .db
            .insert_message(Message::new(room_id, user.id, form.body.trim()))
            .await?;
        info!(room_id = %room_id, sender_id = %user.id, message_id = %message.id, "Message sent");
        Ok(message)
    }

    /// Unread messages addressed to the user across all rooms.
    pub async fn unread_count(&self, user: &User) -> Result<u64, ApiError> {
        Ok(self.db.count_unread_total(user.id).await?)
    }

    /// Load a room and check the user may view it.
    async fn context(&self, user: &User, room_id: Uuid) -> Result<RoomContext, ApiError> {
        let ctx = self
            .db
            .get_room_context(room_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("chat room not found: {room_id}")))?;
        authorize(ChatRoomPolicy::view(user, &ctx), "view this room")?;
        Ok(ctx)
    }

    async fn summarize(&self, user: &User, ctx: RoomContext) -> Result<RoomSummary, ApiError> {
        let last_message = self.db.last_message(ctx.room.id).await?;
        let unread_count = self.db.count_unread_in_room(ctx.room.id, user.id).await?;
        Ok(RoomSummary {
            counterpart: ctx.counterpart_of(user.id),
            can_send: ctx.application_status.allows_messages(),
            room: ctx.room,
            job_post_id: ctx.job_post_id,
            job_title: ctx.job_title,
            application_status: ctx.application_status,
            last_message,
            unread_count,
            poll_interval_secs: self.poll_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::Role;
    use crate::applications::model::{ApplicationStatus, JobApplication};
    use crate::chat::model::ChatRoom;
    use crate::jobs::model::{JobPost, Purpose};
    use crate::store::LibSqlBackend;

    struct Fixture {
        db: Arc<LibSqlBackend>,
        chat: ChatManager,
        company: User,
        worker: User,
        application: JobApplication,
        room: ChatRoom,
    }

    async fn user(db: &LibSqlBackend, email: &str, role: Role) -> User {
        let user = User::new(email.split('@').next().unwrap(), email, "x", role);
        db.create_user(&user).await.unwrap();
        user
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let company = user(&db, "c@example.jp", Role::Company).await;
        let worker = user(&db, "w@example.jp", Role::Worker).await;
        let now = Utc::now();
        let post = JobPost {
            id: Uuid::new_v4(),
            company_id: company.id,
            title: "草取り".into(),
            detail: "草取り".into(),
            purpose: Purpose::NeedHelp,
            start_date: None,
            end_date: None,
            location: None,
            want_you_ids: vec![],
            can_do_ids: vec![],
            created_at: now,
            updated_at: now,
        };
        db.create_job_post(&post).await.unwrap();

        let application = JobApplication::new(post.id, worker.id, vec!["近所".into()], None);
        let room = ChatRoom::for_application(application.id);
        let opening = Message::new(room.id, worker.id, application.opening_message().unwrap());
        db.create_application(&application, &room, Some(&opening))
            .await
            .unwrap();

        let chat = ChatManager::new(db.clone(), 5);
        Fixture {
            db,
            chat,
            company,
            worker,
            application,
            room,
        }
    }

    fn body(text: &str) -> MessageForm {
        MessageForm { body: text.into() }
    }

    #[tokio::test]
    async fn rooms_show_counterpart_and_unread() {
        let f = fixture().await;

        let rooms = f.chat.list_rooms(&f.company).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].counterpart.user_id, f.worker.id);
        assert_eq!(rooms[0].unread_count, 1);
        assert!(rooms[0].can_send);
        assert_eq!(rooms[0].poll_interval_secs, 5);

        let rooms = f.chat.list_rooms(&f.worker).await.unwrap();
        assert_eq!(rooms[0].counterpart.user_id, f.company.id);
        assert_eq!(rooms[0].unread_count, 0);
    }

    #[tokio::test]
    async fn polling_marks_counterpart_messages_read() {
        let f = fixture().await;
        assert_eq!(f.chat.unread_count(&f.company).await.unwrap(), 1);

        let page = f.chat.messages(&f.company, f.room.id, None).await.unwrap();
        assert_eq!(page.messages.len(), 1);
        assert!(page.messages[0].is_read);
        assert!(page.can_send);
        assert_eq!(f.chat.unread_count(&f.company).await.unwrap(), 0);

        let cursor = page.messages[0].created_at;
        let reply = f.chat.send(&f.company, f.room.id, body("ありがとう")).await.unwrap();
        let page = f
            .chat
            .messages(&f.worker, f.room.id, Some(cursor))
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].id, reply.id);
    }

    #[tokio::test]
    async fn strangers_are_forbidden() {
        let f = fixture().await;
        let stranger = user(&f.db, "x@example.jp", Role::Worker).await;
        assert!(matches!(
            f.chat.messages(&stranger, f.room.id, None).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            f.chat.send(&stranger, f.room.id, body("hi")).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            f.chat.room(&f.worker, Uuid::new_v4()).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn decided_application_closes_room() {
        let f = fixture().await;
        f.db.update_application_status(
            f.application.id,
            ApplicationStatus::Applied,
            ApplicationStatus::Accepted,
        )
        .await
        .unwrap();

        let err = f.chat.send(&f.worker, f.room.id, body("hi")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let summary = f.chat.room(&f.worker, f.room.id).await.unwrap();
        assert!(!summary.can_send);
        assert_eq!(summary.application_status, ApplicationStatus::Accepted);
    }

    #[tokio::test]
    async fn empty_body_is_validation_error() {
        let f = fixture().await;
        let err = f.chat.send(&f.worker, f.room.id, body("  ")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn message_after_poll_stays_unread() {
        let f = fixture().await;
        let page = f.chat.messages(&f.company, f.room.id, None).await.unwrap();
        let cursor = page.messages.last().unwrap().created_at;

        let late = f.chat.send(&f.worker, f.room.id, body("追伸です")).await.unwrap();
        assert!(late.created_at > cursor);
        assert_eq!(f.chat.unread_count(&f.company).await.unwrap(), 1);

        let page = f
            .chat
            .messages(&f.company, f.room.id, Some(cursor))
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].id, late.id);
        assert_eq!(f.chat.unread_count(&f.company).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rapid_sends_are_all_delivered_in_order() {
        let f = fixture().await;
        let page = f.chat.messages(&f.worker, f.room.id, None).await.unwrap();
        let cursor = page.messages.last().unwrap().created_at;

        let mut sent = Vec::new();
        for i in 0..5 {
            let who = if i % 2 == 0 { &f.company } else { &f.worker };
            sent.push(f.chat.send(who, f.room.id, body(&format!("{i}"))).await.unwrap().id);
        }

        let page = f
            .chat
            .messages(&f.worker, f.room.id, Some(cursor))
            .await
            .unwrap();
        let got: Vec<Uuid> = page.messages.iter().map(|m| m.id).collect();
        assert_eq!(got, sent);
    }
}
