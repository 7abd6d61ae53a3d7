//! AccountManager — registration, sessions and onboarding profiles.

use std::sync::Arc;

use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{
    CompanyProfileForm, CurrentUser, IssuedToken, LoginForm, Profile, PublicProfile,
    RegisterForm, Role, User, WorkerProfileForm, normalize_email,
};
use super::password::{generate_token, hash_password, hash_token, verify_password};
use crate::error::{ApiError, DatabaseError};
use crate::policy::{ProfilePolicy, authorize};
use crate::store::Database;
use crate::validation::ValidationErrors;

pub struct AccountManager {
    db: Arc<dyn Database>,
    session_ttl: Duration,
}

impl AccountManager {
    pub fn new(db: Arc<dyn Database>, session_ttl: std::time::Duration) -> Self {
        Self {
            db,
            session_ttl: Duration::from_std(session_ttl).unwrap_or_else(|_| Duration::days(7)),
        }
    }

    /// Create an account and log it in.
    pub async fn register(&self, form: RegisterForm) -> Result<IssuedToken, ApiError> {
        form.validate()?;

        let email = normalize_email(&form.email);
        if self.db.get_user_by_email(&email).await?.is_some() {
            return Err(email_taken());
        }

        let role: Role = form.role.parse().map_err(ApiError::BadRequest)?;
        let user = User::new(
            form.name.trim(),
            email,
            hash_password(form.password.expose_secret()),
            role,
        );

        match self.db.create_user(&user).await {
            Ok(()) => {}
            // lost a race with a concurrent registration
            Err(DatabaseError::Constraint(_)) => return Err(email_taken()),
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, role = %user.role, "User registered");
        self.issue_token(user).await
    }

    /// Exchange credentials for a token. Unknown email and wrong password
    /// are indistinguishable to the caller.
    pub async fn login(&self, form: LoginForm) -> Result<IssuedToken, ApiError> {
        form.validate()?;

        let email = normalize_email(&form.email);
        let user = self.db.get_user_by_email(&email).await?;
        let Some(user) = user.filter(|u| verify_password(form.password.expose_secret(), &u.password_hash))
        else {
            warn!(email = %email, "Failed login");
            return Err(ApiError::Unauthorized("invalid credentials".into()));
        };

        info!(user_id = %user.id, "User logged in");
        self.issue_token(user).await
    }

    pub async fn logout(&self, token_hash: &str) -> Result<(), ApiError> {
        self.db.delete_session(token_hash).await?;
        Ok(())
    }

    async fn issue_token(&self, user: User) -> Result<IssuedToken, ApiError> {
        let token = generate_token();
        let expires_at = Utc::now() + self.session_ttl;
        self.db
            .create_session(&hash_token(&token), user.id, expires_at)
            .await?;
        Ok(IssuedToken {
            token,
            expires_at,
            user,
        })
    }

    /// Drop expired sessions. Run periodically.
    pub async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError> {
        let removed = self.db.prune_sessions(Utc::now()).await?;
        if removed > 0 {
            debug!(removed, "Expired sessions pruned");
        }
        Ok(removed)
    }

    // ── Profiles ────────────────────────────────────────────────────

    /// The profile matching the user's role, if filled in.
    pub async fn load_profile(&self, user: &User) -> Result<Option<Profile>, ApiError> {
        let profile = match user.role {
            Role::Company => self
                .db
                .get_company_profile(user.id)
                .await?
                .map(Profile::Company),
            Role::Worker => self
                .db
                .get_worker_profile(user.id)
                .await?
                .map(Profile::Worker),
        };
        Ok(profile)
    }

    pub async fn current_user(&self, user: User) -> Result<CurrentUser, ApiError> {
        let profile = self.load_profile(&user).await?;
        Ok(CurrentUser {
            user,
            needs_onboarding: profile.is_none(),
            profile,
        })
    }

    /// Own profile, or 404 until onboarding is done.
    pub async fn get_profile(&self, user: &User) -> Result<Profile, ApiError> {
        self.load_profile(user)
            .await?
            .ok_or_else(|| ApiError::NotFound("profile not found".into()))
    }

    /// Another user's public profile.
    pub async fn show_profile(&self, user_id: Uuid) -> Result<PublicProfile, ApiError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user not found: {user_id}")))?;
        let profile = self.load_profile(&user).await?;
        Ok(PublicProfile {
            user_id: user.id,
            name: user.name,
            role: user.role,
            profile,
        })
    }

    /// Create or replace the profile of `owner_id`. The body is read as the
    /// form matching the owner's role.
    pub async fn update_profile(
        &self,
        actor: &User,
        owner_id: Uuid,
        body: serde_json::Value,
    ) -> Result<Profile, ApiError> {
        authorize(ProfilePolicy::edit(actor, owner_id), "edit this profile")?;

        match actor.role {
            Role::Company => {
                let form: CompanyProfileForm = parse_form(body)?;
                self.upsert_company_profile(actor, form).await
            }
            Role::Worker => {
                let form: WorkerProfileForm = parse_form(body)?;
                self.upsert_worker_profile(actor, form).await
            }
        }
    }

    pub async fn upsert_company_profile(
        &self,
        user: &User,
        form: CompanyProfileForm,
    ) -> Result<Profile, ApiError> {
        if !user.is_company() {
            return Err(ApiError::Forbidden("only companies have a company profile".into()));
        }
        let mut errors = form.validate().err().unwrap_or_default();
        self.check_location(&mut errors, form.location_id).await?;
        errors.into_result()?;

        let existing = self.db.get_company_profile(user.id).await?;
        let profile = form.into_profile(user.id, existing.map(|p| p.created_at));
        self.db.upsert_company_profile(&profile).await?;
        info!(user_id = %user.id, "Company profile saved");
        Ok(Profile::Company(profile))
    }

    pub async fn upsert_worker_profile(
        &self,
        user: &User,
        form: WorkerProfileForm,
    ) -> Result<Profile, ApiError> {
        if !user.is_worker() {
            return Err(ApiError::Forbidden("only workers have a worker profile".into()));
        }
        let mut errors = form.validate().err().unwrap_or_default();
        self.check_location(&mut errors, form.location_id).await?;
        errors.into_result()?;

        let existing = self.db.get_worker_profile(user.id).await?;
        let profile = form.into_profile(user.id, existing.map(|p| p.created_at));
        self.db.upsert_worker_profile(&profile).await?;
        info!(user_id = %user.id, "Worker profile saved");
        Ok(Profile::Worker(profile))
    }

    async fn check_location(
        &self,
        errors: &mut ValidationErrors,
        location_id: i64,
    ) -> Result<(), ApiError> {
        if self.db.get_location(location_id).await?.is_none() {
            errors.add("location_id", "The selected location_id is invalid.");
        }
        Ok(())
    }
}

fn email_taken() -> ApiError {
    let mut errors = ValidationErrors::default();
    errors.add("email", "The email has already been taken.");
    ApiError::Validation(errors)
}

fn parse_form<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("invalid profile: {e}")))
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::store::LibSqlBackend;

    async fn manager() -> AccountManager {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        AccountManager::new(db, std::time::Duration::from_secs(3600))
    }

    fn register_form(email: &str, role: &str) -> RegisterForm {
        RegisterForm {
            name: "平泉 太郎".into(),
            email: email.into(),
            password: SecretString::from("password1".to_string()),
            password_confirmation: SecretString::from("password1".to_string()),
            role: role.into(),
        }
    }

    fn login_form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.into(),
            password: SecretString::from(password.to_string()),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let m = manager().await;
        let issued = m.register(register_form("Taro@Example.jp", "worker")).await.unwrap();
        assert_eq!(issued.token.len(), 48);
        assert_eq!(issued.user.email, "taro@example.jp");

        let again = m.login(login_form("taro@example.jp", "password1")).await.unwrap();
        assert_eq!(again.user.id, issued.user.id);
        assert_ne!(again.token, issued.token);
    }

    #[tokio::test]
    async fn duplicate_email_is_validation_error() {
        let m = manager().await;
        m.register(register_form("a@example.jp", "worker")).await.unwrap();
        let err = m
            .register(register_form("A@example.jp", "company"))
            .await
            .unwrap_err();
        match err {
            ApiError::Validation(errors) => assert!(errors.has("email")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let m = manager().await;
        m.register(register_form("a@example.jp", "worker")).await.unwrap();
        let err = m.login(login_form("a@example.jp", "nope-nope")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        let err = m.login(login_form("b@example.jp", "password1")).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn onboarding_flow() {
        let m = manager().await;
        let user = m.register(register_form("w@example.jp", "worker")).await.unwrap().user;

        assert!(m.current_user(user.clone()).await.unwrap().needs_onboarding);
        assert!(matches!(m.get_profile(&user).await, Err(ApiError::NotFound(_))));

        let body = json!({"nickname": "たろう", "location_id": 1, "birth_year": 1990});
        let profile = m.update_profile(&user, user.id, body).await.unwrap();
        assert!(matches!(profile, Profile::Worker(ref p) if p.nickname == "たろう"));

        let me = m.current_user(user.clone()).await.unwrap();
        assert!(!me.needs_onboarding);

        let public = m.show_profile(user.id).await.unwrap();
        assert_eq!(public.role, Role::Worker);
        assert!(public.profile.is_some());
    }

    #[tokio::test]
    async fn profile_rejects_unknown_location() {
        let m = manager().await;
        let user = m.register(register_form("c@example.jp", "company")).await.unwrap().user;
        let body = json!({
            "company_name": "平泉農園",
            "representative_name": "代表",
            "location_id": 99999,
            "address": "平泉町",
            "phone": "0191-46-2111"
        });
        match m.update_profile(&user, user.id, body).await.unwrap_err() {
            ApiError::Validation(errors) => assert!(errors.has("location_id")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cannot_edit_someone_elses_profile() {
        let m = manager().await;
        let a = m.register(register_form("a@example.jp", "worker")).await.unwrap().user;
        let b = m.register(register_form("b@example.jp", "worker")).await.unwrap().user;
        let body = json!({"nickname": "x", "location_id": 1});
        let err = m.update_profile(&a, b.id, body).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn profile_kind_must_match_role() {
        let m = manager().await;
        let user = m.register(register_form("w@example.jp", "worker")).await.unwrap().user;
        let form = CompanyProfileForm {
            company_name: "x".into(),
            representative_name: "x".into(),
            location_id: 1,
            address: "x".into(),
            phone: "0191-46-2111".into(),
            description: None,
            website: None,
        };
        let err = m.upsert_company_profile(&user, form).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
