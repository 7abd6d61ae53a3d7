//! ApplicationManager — apply, decide and withdraw.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::model::{
    ApplicationFilter, ApplicationForm, ApplicationStatus, ApplicationView, JobApplication,
};
use crate::accounts::model::User;
use crate::chat::model::{ChatRoom, Message};
use crate::error::{ApiError, DatabaseError};
use crate::jobs::model::JobPost;
use crate::jobs::service::today_jst;
use crate::policy::{JobApplicationPolicy, authorize};
use crate::store::Database;

pub struct ApplicationManager {
    db: Arc<dyn Database>,
}

impl ApplicationManager {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Apply to a post. The application, its chat room and the opening
    /// message (when reasons or a motive were given) are stored together.
    pub async fn apply(
        &self,
        user: &User,
        job_post_id: Uuid,
        form: ApplicationForm,
    ) -> Result<ApplicationView, ApiError> {
        let post = self.post(job_post_id).await?;

        let profile = self.db.get_worker_profile(user.id).await?;
        if user.is_worker() && profile.is_none() {
            return Err(ApiError::Forbidden(
                "complete your profile before applying".into(),
            ));
        }
        authorize(
            JobApplicationPolicy::create(user, profile.is_some(), &post),
            "apply to this job post",
        )?;

        if !post.is_open_on(today_jst()) {
            return Err(ApiError::Conflict("this job post is closed".into()));
        }
        if self.db.find_application(post.id, user.id).await?.is_some() {
            return Err(already_applied());
        }

        form.validate()?;
        let (reasons, motive) = form.normalized();
        let application = JobApplication::new(post.id, user.id, reasons, motive);
        let room = ChatRoom::for_application(application.id);
        let opening = application
            .opening_message()
            .map(|body| Message::new(room.id, user.id, body));

        match self
            .db
            .create_application(&application, &room, opening.as_ref())
            .await
        {
            Ok(()) => {}
            Err(DatabaseError::Constraint(_)) => return Err(already_applied()),
            Err(e) => return Err(e.into()),
        }
        info!(
            application_id = %application.id,
            job_post_id = %post.id,
            worker_id = %user.id,
            "Application submitted"
        );

        let worker_name = profile.map(|p| p.nickname).unwrap_or_else(|| user.name.clone());
        Ok(ApplicationView {
            application,
            job_title: post.title,
            worker_name,
            chat_room_id: Some(room.id),
        })
    }

    /// Workers see their own applications; companies see those to their posts.
    pub async fn list(
        &self,
        user: &User,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationView>, ApiError> {
        let views = if user.is_company() {
            self.db.list_applications_for_company(user.id, filter).await?
        } else {
            self.db.list_applications_for_worker(user.id, filter).await?
        };
        Ok(views)
    }

    pub async fn show(&self, user: &User, id: Uuid) -> Result<ApplicationView, ApiError> {
        let (application, post) = self.load(id).await?;
        authorize(
            JobApplicationPolicy::view(user, &application, &post),
            "view this application",
        )?;
        self.view(application, post).await
    }

    pub async fn accept(&self, user: &User, id: Uuid) -> Result<ApplicationView, ApiError> {
        self.decide(user, id, ApplicationStatus::Accepted).await
    }

    pub async fn reject(&self, user: &User, id: Uuid) -> Result<ApplicationView, ApiError> {
        self.decide(user, id, ApplicationStatus::Rejected).await
    }

    async fn decide(
        &self,
        user: &User,
        id: Uuid,
        to: ApplicationStatus,
    ) -> Result<ApplicationView, ApiError> {
        let (application, post) = self.load(id).await?;
        authorize(
            JobApplicationPolicy::decide(user, &post),
            "decide on this application",
        )?;

        let from = application.status;
        if !from.can_transition_to(to) {
            return Err(ApiError::Conflict(format!(
                "application is already {from}"
            )));
        }
        // status may have moved since it was read
        if !self.db.update_application_status(id, from, to).await? {
            return Err(ApiError::Conflict("application was already decided".into()));
        }
        info!(application_id = %id, from = %from, to = %to, "Application decided");

        let (application, post) = self.load(id).await?;
        self.view(application, post).await
    }

    /// Applicant takes back an undecided application; its chat goes with it.
    pub async fn withdraw(&self, user: &User, id: Uuid) -> Result<(), ApiError> {
        let (application, _) = self.load(id).await?;
        authorize(
            JobApplicationPolicy::withdraw(user, &application),
            "withdraw this application",
        )?;
        if application.status != ApplicationStatus::Applied {
            return Err(ApiError::Conflict(format!(
                "application is already {}",
                application.status
            )));
        }
        // decided between the read above and the delete
        if !self.db.withdraw_application(id).await? {
            return Err(ApiError::Conflict("application was already decided".into()));
        }
        info!(application_id = %id, "Application withdrawn");
        Ok(())
    }

    async fn post(&self, id: Uuid) -> Result<JobPost, ApiError> {
        self.db
            .get_job_post(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("job post not found: {id}")))
    }

    async fn load(&self, id: Uuid) -> Result<(JobApplication, JobPost), ApiError> {
        let application = self
            .db
            .get_application(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("application not found: {id}")))?;
        let post = self.post(application.job_post_id).await?;
        Ok((application, post))
    }

    async fn view(
        &self,
        application: JobApplication,
        post: JobPost,
    ) -> Result<ApplicationView, ApiError> {
        let worker_name = match self.db.get_worker_profile(application.worker_id).await? {
            Some(profile) => profile.nickname,
            None => self
                .db
                .get_user(application.worker_id)
                .await?
                .map(|u| u.name)
                .unwrap_or_default(),
        };
        let chat_room_id = self
            .db
            .get_room_by_application(application.id)
            .await?
            .map(|room| room.id);
        Ok(ApplicationView {
            application,
            job_title: post.title,
            worker_name,
            chat_room_id,
        })
    }
}

fn already_applied() -> ApiError {
    ApiError::Conflict("already applied to this job post".into())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::accounts::model::{Role, WorkerProfile};
    use crate::jobs::model::Purpose;
    use crate::store::LibSqlBackend;

    struct Fixture {
        db: Arc<LibSqlBackend>,
        apps: ApplicationManager,
        company: User,
        worker: User,
        post: JobPost,
    }

    async fn user(db: &LibSqlBackend, email: &str, role: Role) -> User {
        let user = User::new(email.split('@').next().unwrap(), email, "x", role);
        db.create_user(&user).await.unwrap();
        user
    }

    async fn worker_profile(db: &LibSqlBackend, user: &User) {
        let now = Utc::now();
        db.upsert_worker_profile(&WorkerProfile {
            user_id: user.id,
            nickname: "たろう".into(),
            gender: None,
            birth_year: None,
            location_id: 1,
            self_introduction: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let company = user(&db, "c@example.jp", Role::Company).await;
        let worker = user(&db, "w@example.jp", Role::Worker).await;
        worker_profile(&db, &worker).await;

        let now = Utc::now();
        let post = JobPost {
            id: Uuid::new_v4(),
            company_id: company.id,
            title: "草取り".into(),
            detail: "田んぼの草取り".into(),
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

        let apps = ApplicationManager::new(db.clone());
        Fixture {
            db,
            apps,
            company,
            worker,
            post,
        }
    }

    fn form(reasons: &[&str], motive: Option<&str>) -> ApplicationForm {
        ApplicationForm {
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
            motive: motive.map(String::from),
        }
    }

    #[tokio::test]
    async fn apply_creates_room_with_opening_message() {
        let f = fixture().await;
        let view = f
            .apps
            .apply(&f.worker, f.post.id, form(&["近所に住んでいる"], Some("手伝いたい")))
            .await
            .unwrap();
        assert_eq!(view.application.status, ApplicationStatus::Applied);
        assert_eq!(view.worker_name, "たろう");

        let room_id = view.chat_room_id.unwrap();
        let messages = f.db.list_messages(room_id, None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].body.contains("・近所に住んでいる"));
        assert!(messages[0].body.contains("手伝いたい"));
    }

    #[tokio::test]
    async fn apply_without_text_opens_empty_room() {
        let f = fixture().await;
        let view = f.apps.apply(&f.worker, f.post.id, form(&[], None)).await.unwrap();
        let room_id = view.chat_room_id.unwrap();
        assert!(f.db.list_messages(room_id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_application_conflicts() {
        let f = fixture().await;
        f.apps.apply(&f.worker, f.post.id, form(&[], None)).await.unwrap();
        let err = f
            .apps
            .apply(&f.worker, f.post.id, form(&[], None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn companies_and_profileless_workers_cannot_apply() {
        let f = fixture().await;
        let err = f
            .apps
            .apply(&f.company, f.post.id, form(&[], None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let fresh = user(&f.db, "new@example.jp", Role::Worker).await;
        let err = f.apps.apply(&fresh, f.post.id, form(&[], None)).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn closed_post_rejects_applications() {
        let f = fixture().await;
        let mut post = f.post.clone();
        post.end_date = NaiveDate::from_ymd_opt(2000, 1, 1);
        f.db.update_job_post(&post).await.unwrap();
        let err = f.apps.apply(&f.worker, post.id, form(&[], None)).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn invalid_form_is_validation_error() {
        let f = fixture().await;
        let reasons: Vec<&str> = vec!["理由"; 11];
        let err = f
            .apps
            .apply(&f.worker, f.post.id, form(&reasons, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn accept_once_then_conflict() {
        let f = fixture().await;
        let view = f.apps.apply(&f.worker, f.post.id, form(&[], None)).await.unwrap();
        let id = view.application.id;

        let err = f.apps.accept(&f.worker, id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let accepted = f.apps.accept(&f.company, id).await.unwrap();
        assert_eq!(accepted.application.status, ApplicationStatus::Accepted);

        let err = f.apps.reject(&f.company, id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_and_show_by_side() {
        let f = fixture().await;
        let view = f.apps.apply(&f.worker, f.post.id, form(&[], None)).await.unwrap();

        let filter = ApplicationFilter::default();
        assert_eq!(f.apps.list(&f.worker, &filter).await.unwrap().len(), 1);
        assert_eq!(f.apps.list(&f.company, &filter).await.unwrap().len(), 1);

        let shown = f.apps.show(&f.company, view.application.id).await.unwrap();
        assert_eq!(shown.chat_room_id, view.chat_room_id);

        let stranger = user(&f.db, "x@example.jp", Role::Worker).await;
        let err = f.apps.show(&stranger, view.application.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn withdraw_only_while_applied() {
        let f = fixture().await;
        let view = f.apps.apply(&f.worker, f.post.id, form(&[], None)).await.unwrap();
        let id = view.application.id;

        assert!(matches!(
            f.apps.withdraw(&f.company, id).await,
            Err(ApiError::Forbidden(_))
        ));
        f.apps.withdraw(&f.worker, id).await.unwrap();
        assert!(matches!(
            f.apps.show(&f.worker, id).await,
            Err(ApiError::NotFound(_))
        ));

        let view = f.apps.apply(&f.worker, f.post.id, form(&[], None)).await.unwrap();
        f.apps.reject(&f.company, view.application.id).await.unwrap();
        assert!(matches!(
            f.apps.withdraw(&f.worker, view.application.id).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn withdraw_after_late_decision_keeps_conversation() {
        let f = fixture().await;
        let view = f.apps.apply(&f.worker, f.post.id, form(&[], None)).await.unwrap();
        let id = view.application.id;

        // the company accepts after the worker's withdraw request loaded the row
        assert!(f
            .db
            .update_application_status(id, ApplicationStatus::Applied, ApplicationStatus::Accepted)
            .await
            .unwrap());
        assert!(!f.db.withdraw_application(id).await.unwrap());
        assert!(matches!(
            f.apps.withdraw(&f.worker, id).await,
            Err(ApiError::Conflict(_))
        ));

        let shown = f.apps.show(&f.worker, id).await.unwrap();
        assert_eq!(shown.application.status, ApplicationStatus::Accepted);
        assert!(f.db.get_room_by_application(id).await.unwrap().is_some());
    }
}
