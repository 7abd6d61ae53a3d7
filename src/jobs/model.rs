//! Job post data model, the post form and the listing filter.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codes::model::{Code, CodeType};
use crate::validation::{ValidationErrors, Validator};

/// Why the post exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// The host has something they want to try and is looking for company.
    WantToDo,
    /// The host needs a hand.
    NeedHelp,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::WantToDo => "want_to_do",
            Purpose::NeedHelp => "need_help",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "want_to_do" => Ok(Purpose::WantToDo),
            "need_help" => Ok(Purpose::NeedHelp),
            other => Err(format!("unknown purpose: {other}")),
        }
    }
}

/// A help-wanted listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPost {
    pub id: Uuid,
    /// Owning company user.
    pub company_id: Uuid,
    pub title: String,
    pub detail: String,
    pub purpose: Purpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Free-text place description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// `codes.id` values of type `want_you`.
    pub want_you_ids: Vec<i64>,
    /// `codes.id` values of type `can_do`.
    pub can_do_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobPost {
    /// Still accepting applicants on `today`.
    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        self.end_date.is_none_or(|end| end >= today)
    }
}

/// A post with its tag ids resolved for display.
#[derive(Debug, Clone, Serialize)]
pub struct JobPostView {
    #[serde(flatten)]
    pub post: JobPost,
    pub company_name: Option<String>,
    pub want_you: Vec<Code>,
    pub can_do: Vec<Code>,
}

/// Create/update form.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPostForm {
    pub title: String,
    pub detail: String,
    pub purpose: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub want_you_ids: Vec<i64>,
    #[serde(default)]
    pub can_do_ids: Vec<i64>,
}

impl JobPostForm {
    /// Validate against the known code table. Yields the parsed purpose.
    pub fn validate(&self, codes: &[Code]) -> Result<Purpose, ValidationErrors> {
        let purpose = self.purpose.parse::<Purpose>().ok();
        let mut v = Validator::new();
        v.required("title", &self.title)
            .max_chars("title", &self.title, 255)
            .required("detail", &self.detail)
            .max_chars("detail", &self.detail, 5000)
            .check(
                purpose.is_some(),
                "purpose",
                "The selected purpose is invalid.",
            )
            .optional_max_chars("location", self.location.as_deref(), 255);

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            v.check(
                end >= start,
                "end_date",
                "The end_date field must be a date after or equal to start_date.",
            );
        }

        let mut errors = v.into_errors();
        check_tag_ids(&mut errors, "want_you_ids", &self.want_you_ids, CodeType::WantYou, codes);
        check_tag_ids(&mut errors, "can_do_ids", &self.can_do_ids, CodeType::CanDo, codes);
        match purpose {
            Some(purpose) if errors.is_empty() => Ok(purpose),
            _ => Err(errors),
        }
    }

    /// Build a new post from a validated form.
    pub fn into_post(self, company_id: Uuid, purpose: Purpose) -> JobPost {
        let now = Utc::now();
        JobPost {
            id: Uuid::new_v4(),
            company_id,
            title: self.title.trim().to_string(),
            detail: self.detail.trim().to_string(),
            purpose,
            start_date: self.start_date,
            end_date: self.end_date,
            location: self
                .location
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            want_you_ids: self.want_you_ids,
            can_do_ids: self.can_do_ids,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply onto an existing post, keeping identity and ownership.
    pub fn apply_to(self, existing: &JobPost, purpose: Purpose) -> JobPost {
        let mut post = self.into_post(existing.company_id, purpose);
        post.id = existing.id;
        post.created_at = existing.created_at;
        post
    }
}

fn check_tag_ids(
    errors: &mut ValidationErrors,
    field: &str,
    ids: &[i64],
    code_type: CodeType,
    codes: &[Code],
) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(*id) {
            errors.add(field, format!("The {field} field has a duplicate value: {id}."));
            continue;
        }
        let known = codes
            .iter()
            .any(|c| c.id == *id && c.code_type == code_type);
        if !known {
            errors.add(field, format!("The selected {field} value {id} is invalid."));
        }
    }
}

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Query string of `GET /api/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub purpose: Option<Purpose>,
    #[serde(default)]
    pub want_you: Option<i64>,
    #[serde(default)]
    pub can_do: Option<i64>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    #[serde(default)]
    pub open_only: bool,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl JobFilter {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// Rows to skip. Widened so the largest page number cannot overflow.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.per_page())
    }

    /// Trimmed, non-empty keyword.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One page of listings.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes() -> Vec<Code> {
        vec![
            Code {
                id: 1,
                code_type: CodeType::WantYou,
                name: "経験不問".into(),
                sort_order: 1,
            },
            Code {
                id: 101,
                code_type: CodeType::CanDo,
                name: "まかない付き".into(),
                sort_order: 1,
            },
        ]
    }

    fn form() -> JobPostForm {
        JobPostForm {
            title: "稲刈りのお手伝い".into(),
            detail: "田んぼで稲刈りを手伝ってください。".into(),
            purpose: "need_help".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 9, 20),
            end_date: NaiveDate::from_ymd_opt(2024, 9, 30),
            location: Some("平泉町".into()),
            want_you_ids: vec![1],
            can_do_ids: vec![101],
        }
    }

    #[test]
    fn valid_form() {
        assert_eq!(form().validate(&codes()), Ok(Purpose::NeedHelp));
    }

    #[test]
    fn purpose_comes_from_validation() {
        let mut f = form();
        f.purpose = "want_to_do".into();
        let purpose = f.validate(&codes()).unwrap();
        assert_eq!(purpose, Purpose::WantToDo);
        assert_eq!(f.into_post(Uuid::new_v4(), purpose).purpose, Purpose::WantToDo);
    }

    #[test]
    fn end_before_start_rejected() {
        let mut f = form();
        f.end_date = NaiveDate::from_ymd_opt(2024, 9, 1);
        assert!(f.validate(&codes()).unwrap_err().has("end_date"));
    }

    #[test]
    fn tag_of_wrong_type_rejected() {
        let mut f = form();
        f.want_you_ids = vec![101];
        let errors = f.validate(&codes()).unwrap_err();
        assert!(errors.has("want_you_ids"));
        assert!(!errors.has("can_do_ids"));
    }

    #[test]
    fn duplicate_tag_rejected() {
        let mut f = form();
        f.can_do_ids = vec![101, 101];
        assert!(f.validate(&codes()).unwrap_err().has("can_do_ids"));
    }

    #[test]
    fn unknown_purpose_rejected() {
        let mut f = form();
        f.purpose = "hire".into();
        assert!(f.validate(&codes()).unwrap_err().has("purpose"));
    }

    #[test]
    fn apply_to_keeps_identity() {
        let original = form().into_post(Uuid::new_v4(), Purpose::NeedHelp);
        let mut edit = form();
        edit.title = "新しいタイトル".into();
        let updated = edit.apply_to(&original, Purpose::NeedHelp);
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.company_id, original.company_id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.title, "新しいタイトル");
    }

    #[test]
    fn open_on_date() {
        let mut post = form().into_post(Uuid::new_v4(), Purpose::NeedHelp);
        let day = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
        assert!(post.is_open_on(day));
        assert!(!post.is_open_on(day.succ_opt().unwrap()));
        post.end_date = None;
        assert!(post.is_open_on(day.succ_opt().unwrap()));
    }

    #[test]
    fn filter_pagination_bounds() {
        let filter = JobFilter {
            page: Some(0),
            per_page: Some(1000),
            ..Default::default()
        };
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.per_page(), MAX_PER_PAGE);
        assert_eq!(filter.offset(), 0);

        let filter = JobFilter {
            page: Some(3),
            per_page: Some(10),
            keyword: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(filter.offset(), 20);
        assert!(filter.keyword().is_none());
    }

    #[test]
    fn last_page_offset_does_not_overflow() {
        let filter = JobFilter {
            page: Some(u32::MAX),
            per_page: Some(MAX_PER_PAGE),
            ..Default::default()
        };
        assert_eq!(filter.offset(), u64::from(u32::MAX - 1) * 100);

        let filter = JobFilter {
            page: Some(u32::MAX),
            per_page: Some(0),
            ..Default::default()
        };
        assert_eq!(filter.per_page(), 1);
        assert_eq!(filter.offset(), u64::from(u32::MAX - 1));
    }
}
