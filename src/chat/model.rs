//! Chat rooms and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::applications::model::ApplicationStatus;
use crate::validation::{ValidationErrors, Validator};

pub const MAX_MESSAGE_CHARS: usize = 1000;

/// One room per application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: Uuid,
    pub job_application_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ChatRoom {
    pub fn for_application(job_application_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_application_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_room_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(chat_room_id: Uuid, sender_id: Uuid, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_room_id,
            sender_id,
            body: body.into(),
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// Who is on the other side of a room, from the viewer's perspective.
#[derive(Debug, Clone, Serialize)]
pub struct Counterpart {
    pub user_id: Uuid,
    pub name: String,
}

/// Room row with everything the room list shows.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    #[serde(flatten)]
    pub room: ChatRoom,
    pub job_post_id: Uuid,
    pub job_title: String,
    pub application_status: ApplicationStatus,
    pub counterpart: Counterpart,
    pub last_message: Option<Message>,
    pub unread_count: u64,
    /// False once the application has been decided.
    pub can_send: bool,
    pub poll_interval_secs: u64,
}

/// Room participants and state, loaded for authorization.
#[derive(Debug, Clone)]
pub struct RoomContext {
    pub room: ChatRoom,
    pub job_post_id: Uuid,
    pub job_title: String,
    pub application_status: ApplicationStatus,
    pub worker_id: Uuid,
    pub worker_name: String,
    pub company_id: Uuid,
    pub company_name: String,
}

impl RoomContext {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        user_id == self.worker_id || user_id == self.company_id
    }

    pub fn counterpart_of(&self, user_id: Uuid) -> Counterpart {
        if user_id == self.worker_id {
            Counterpart {
                user_id: self.company_id,
                name: self.company_name.clone(),
            }
        } else {
            Counterpart {
                user_id: self.worker_id,
                name: self.worker_name.clone(),
            }
        }
    }
}

/// Payload of the polling endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub room_id: Uuid,
    pub application_status: ApplicationStatus,
    pub can_send: bool,
    pub poll_interval_secs: u64,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageForm {
    pub body: String,
}

impl MessageForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("body", &self.body)
            .max_chars("body", &self.body, MAX_MESSAGE_CHARS);
        v.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollQuery {
    /// Only messages strictly newer than this.
    #[serde(default)]
    pub after: Option<DateTime<Utc>>,
}
