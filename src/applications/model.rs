//! Application data model and status lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{ValidationErrors, Validator};

pub const MAX_REASONS: usize = 10;

/// Lifecycle: `Applied` → `Accepted` | `Rejected`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(&self, target: ApplicationStatus) -> bool {
        matches!(
            (self, target),
            (ApplicationStatus::Applied, ApplicationStatus::Accepted)
                | (ApplicationStatus::Applied, ApplicationStatus::Rejected)
        )
    }

    /// Chat stays writable only while the application is undecided.
    pub fn allows_messages(&self) -> bool {
        *self == ApplicationStatus::Applied
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "applied" => Ok(ApplicationStatus::Applied),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(format!("unknown application status: {other}")),
        }
    }
}

/// A worker's application to a job post. Unique per (post, worker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: Uuid,
    pub job_post_id: Uuid,
    pub worker_id: Uuid,
    pub status: ApplicationStatus,
    /// Reasons picked by the applicant.
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motive: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobApplication {
    pub fn new(job_post_id: Uuid, worker_id: Uuid, reasons: Vec<String>, motive: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_post_id,
            worker_id,
            status: ApplicationStatus::Applied,
            reasons,
            motive,
            created_at: now,
            updated_at: now,
        }
    }

    /// Opening chat line composed from the applicant's reasons and motive.
    /// `None` when the applicant gave neither.
    pub fn opening_message(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.reasons.is_empty() {
            let bullets: Vec<String> = self.reasons.iter().map(|r| format!("・{r}")).collect();
            parts.push(format!("【応募理由】\n{}", bullets.join("\n")));
        }
        if let Some(motive) = &self.motive {
            parts.push(format!("【志望動機】\n{motive}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// Application with the context a listing needs.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: JobApplication,
    pub job_title: String,
    pub worker_name: String,
    pub chat_room_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationForm {
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub motive: Option<String>,
}

impl ApplicationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.check(
            self.reasons.len() <= MAX_REASONS,
            "reasons",
            format!("The reasons field must not have more than {MAX_REASONS} items."),
        )
        .optional_max_chars("motive", self.motive.as_deref(), 1000);
        for (i, reason) in self.reasons.iter().enumerate() {
            let field = format!("reasons.{i}");
            v.required(&field, reason).max_chars(&field, reason, 100);
        }
        v.finish()
    }

    /// Trimmed reasons and motive; a blank motive becomes `None`.
    pub fn normalized(self) -> (Vec<String>, Option<String>) {
        let reasons = self.reasons.into_iter().map(|r| r.trim().to_string()).collect();
        let motive = self
            .motive
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        (reasons, motive)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub job_post_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_from_applied() {
        use ApplicationStatus::*;
        assert!(Applied.can_transition_to(Accepted));
        assert!(Applied.can_transition_to(Rejected));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Accepted));
        assert!(!Applied.can_transition_to(Applied));
    }

    #[test]
    fn messages_only_while_applied() {
        assert!(ApplicationStatus::Applied.allows_messages());
        assert!(!ApplicationStatus::Accepted.allows_messages());
        assert!(!ApplicationStatus::Rejected.allows_messages());
    }

    #[test]
    fn opening_message_variants() {
        let post = Uuid::new_v4();
        let worker = Uuid::new_v4();

        let empty = JobApplication::new(post, worker, vec![], None);
        assert!(empty.opening_message().is_none());

        let both = JobApplication::new(
            post,
            worker,
            vec!["農業に興味がある".into()],
            Some("週末に参加できます".into()),
        );
        let msg = both.opening_message().unwrap();
        assert!(msg.contains("・農業に興味がある"));
        assert!(msg.contains("週末に参加できます"));

        let motive_only = JobApplication::new(post, worker, vec![], Some("よろしくお願いします".into()));
        assert!(!motive_only.opening_message().unwrap().contains("応募理由"));
    }

    #[test]
    fn form_limits() {
        let form = ApplicationForm {
            reasons: vec!["x".into(); MAX_REASONS + 1],
            motive: None,
        };
        assert!(form.validate().unwrap_err().has("reasons"));

        let form = ApplicationForm {
            reasons: vec!["".into()],
            motive: Some("a".repeat(1001)),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("reasons.0"));
        assert!(errors.has("motive"));
    }

    #[test]
    fn normalized_drops_blank_motive() {
        let form = ApplicationForm {
            reasons: vec![" 近所だから ".into()],
            motive: Some("  ".into()),
        };
        let (reasons, motive) = form.normalized();
        assert_eq!(reasons, vec!["近所だから"]);
        assert!(motive.is_none());
    }
}
