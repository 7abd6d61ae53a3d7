//! Account data model — users, roles, role-specific profiles and the
//! registration/onboarding forms.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{ValidationErrors, Validator};

/// Role discriminator on the user table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Hosts that post listings.
    Company,
    /// Residents and volunteers that apply.
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Company => "company",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(Role::Company),
            "worker" => Ok(Role::Worker),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: normalize_email(&email.into()),
            password_hash: password_hash.into(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_company(&self) -> bool {
        self.role == Role::Company
    }

    pub fn is_worker(&self) -> bool {
        self.role == Role::Worker
    }
}

/// Emails are unique case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Satellite profile for `Role::Company`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub user_id: Uuid,
    pub company_name: String,
    pub representative_name: String,
    pub location_id: i64,
    pub address: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Satellite profile for `Role::Worker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub user_id: Uuid,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    pub location_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_introduction: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Either profile kind, tagged by role.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Company(CompanyProfile),
    Worker(WorkerProfile),
}

/// Payload of `GET /api/me`.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub user: User,
    /// True until the role's profile has been filled in.
    pub needs_onboarding: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

/// Another user's profile as shown to visitors. No email.
#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub profile: Option<Profile>,
}

/// Returned from register/login.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

// ── Forms ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub password_confirmation: SecretString,
    pub role: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let password = self.password.expose_secret();
        let mut v = Validator::new();
        v.required("name", &self.name)
            .max_chars("name", &self.name, 255)
            .required("email", &self.email)
            .max_chars("email", &self.email, 255)
            .email("email", &self.email)
            .min_chars("password", password, 8)
            .max_chars("password", password, 255)
            .check(
                password == self.password_confirmation.expose_secret(),
                "password",
                "The password field confirmation does not match.",
            )
            .check(
                self.role.parse::<Role>().is_ok(),
                "role",
                "The selected role is invalid.",
            );
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("email", &self.email)
            .email("email", &self.email)
            .required("password", self.password.expose_secret());
        v.finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyProfileForm {
    pub company_name: String,
    pub representative_name: String,
    pub location_id: i64,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl CompanyProfileForm {
    /// Field rules only; `location_id` existence is checked against the store.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();
        v.required("company_name", &self.company_name)
            .max_chars("company_name", &self.company_name, 255)
            .required("representative_name", &self.representative_name)
            .max_chars("representative_name", &self.representative_name, 255)
            .required("address", &self.address)
            .max_chars("address", &self.address, 255)
            .required("phone", &self.phone)
            .check(is_phone(&self.phone), "phone", "The phone field format is invalid.")
            .optional_max_chars("description", self.description.as_deref(), 2000)
            .optional_max_chars("website", self.website.as_deref(), 255);
        if let Some(url) = self.website.as_deref().filter(|s| !s.is_empty()) {
            v.check(
                url.starts_with("http://") || url.starts_with("https://"),
                "website",
                "The website field must be a valid URL.",
            );
        }
        v.finish()
    }

    pub fn into_profile(self, user_id: Uuid, created_at: Option<DateTime<Utc>>) -> CompanyProfile {
        let now = Utc::now();
        CompanyProfile {
            user_id,
            company_name: self.company_name.trim().to_string(),
            representative_name: self.representative_name.trim().to_string(),
            location_id: self.location_id,
            address: self.address.trim().to_string(),
            phone: self.phone.trim().to_string(),
            description: non_empty(self.description),
            website: non_empty(self.website),
            created_at: created_at.unwrap_or(now),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerProfileForm {
    pub nickname: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    pub location_id: i64,
    #[serde(default)]
    pub self_introduction: Option<String>,
}

impl WorkerProfileForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let this_year = Utc::now().year();
        let mut v = Validator::new();
        v.required("nickname", &self.nickname)
            .max_chars("nickname", &self.nickname, 50)
            .optional_max_chars("self_introduction", self.self_introduction.as_deref(), 2000);
        if let Some(year) = self.birth_year {
            v.check(
                (1900..=this_year).contains(&year),
                "birth_year",
                format!("The birth_year field must be between 1900 and {this_year}."),
            );
        }
        v.finish()
    }

    pub fn into_profile(self, user_id: Uuid, created_at: Option<DateTime<Utc>>) -> WorkerProfile {
        let now = Utc::now();
        WorkerProfile {
            user_id,
            nickname: self.nickname.trim().to_string(),
            gender: self.gender,
            birth_year: self.birth_year,
            location_id: self.location_id,
            self_introduction: non_empty(self.self_introduction),
            created_at: created_at.unwrap_or(now),
            updated_at: now,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Digits with optional hyphens, 10–11 digits (Japanese numbering).
fn is_phone(value: &str) -> bool {
    let value = value.trim();
    let digits = value.chars().filter(char::is_ascii_digit).count();
    value.chars().all(|c| c.is_ascii_digit() || c == '-') && (10..=11).contains(&digits)
}
