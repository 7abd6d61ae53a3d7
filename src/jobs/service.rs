//! JobManager — listing, authoring and removal of job posts.
//!
//! Every successful create/update re-mines the post detail so the
//! suggestion table always mirrors the current text.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::model::{JobFilter, JobPost, JobPostForm, JobPostView, Page};
use crate::accounts::model::User;
use crate::codes::model::{Code, CodeType, resolve};
use crate::error::ApiError;
use crate::policy::{JobPostPolicy, authorize};
use crate::store::Database;
use crate::suggestions::classifier::Classifier;

/// Calendar date in Japan, used for `open_only`.
pub fn today_jst() -> NaiveDate {
    (Utc::now() + Duration::hours(9)).date_naive()
}

pub struct JobManager {
    db: Arc<dyn Database>,
    classifier: Arc<Classifier>,
}

impl JobManager {
    pub fn new(db: Arc<dyn Database>, classifier: Arc<Classifier>) -> Self {
        Self { db, classifier }
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<Page<JobPostView>, ApiError> {
        let (posts, total) = self.db.list_job_posts(filter, today_jst()).await?;
        let codes = self.db.list_codes(None).await?;

        let mut names: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            let company_name = match names.get(&post.company_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.db.company_display_name(post.company_id).await?;
                    names.insert(post.company_id, name.clone());
                    name
                }
            };
            items.push(build_view(post, company_name, &codes));
        }

        Ok(Page {
            items,
            page: filter.page(),
            per_page: filter.per_page(),
            total,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<JobPost, ApiError> {
        self.db
            .get_job_post(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("job post not found: {id}")))
    }

    pub async fn show(&self, id: Uuid) -> Result<JobPostView, ApiError> {
        let post = self.get(id).await?;
        self.view(post).await
    }

    pub async fn create(&self, user: &User, form: JobPostForm) -> Result<JobPostView, ApiError> {
        let has_profile = self.db.get_company_profile(user.id).await?.is_some();
        if user.is_company() && !has_profile {
            return Err(ApiError::Forbidden(
                "complete your company profile before posting".into(),
            ));
        }
        authorize(JobPostPolicy::create(user, has_profile), "create job posts")?;

        let codes = self.db.list_codes(None).await?;
        let purpose = form.validate(&codes)?;

        let post = form.into_post(user.id, purpose);
        self.db.create_job_post(&post).await?;
        info!(job_post_id = %post.id, company_id = %user.id, "Job post created");

        self.remine(&post).await;
        Ok(build_view(post, self.db.company_display_name(user.id).await?, &codes))
    }

    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        form: JobPostForm,
    ) -> Result<JobPostView, ApiError> {
        let existing = self.get(id).await?;
        authorize(JobPostPolicy::update(user, &existing), "update this job post")?;

        let codes = self.db.list_codes(None).await?;
        let purpose = form.validate(&codes)?;

        let post = form.apply_to(&existing, purpose);
        self.db.update_job_post(&post).await?;
        info!(job_post_id = %post.id, "Job post updated");

        self.remine(&post).await;
        Ok(build_view(
            post,
            self.db.company_display_name(existing.company_id).await?,
            &codes,
        ))
    }

    /// Remove a post with its applications, chat rooms and suggestions.
    pub async fn delete(&self, user: &User, id: Uuid) -> Result<(), ApiError> {
        let existing = self.get(id).await?;
        authorize(JobPostPolicy::delete(user, &existing), "delete this job post")?;

        if !self.db.delete_job_post(id).await? {
            return Err(ApiError::NotFound(format!("job post not found: {id}")));
        }
        info!(job_post_id = %id, "Job post deleted");
        Ok(())
    }

    async fn view(&self, post: JobPost) -> Result<JobPostView, ApiError> {
        let codes = self.db.list_codes(None).await?;
        let company_name = self.db.company_display_name(post.company_id).await?;
        Ok(build_view(post, company_name, &codes))
    }

    /// Replace the post's suggestions with freshly mined phrases. Failures
    /// are logged; the post itself is already saved.
    async fn remine(&self, post: &JobPost) {
        let phrases = self.classifier.mine(&post.detail);
        if let Err(e) = self.db.replace_suggestions(post.id, &phrases).await {
            warn!(job_post_id = %post.id, error = %e, "Failed to store suggestions");
        }
    }
}

fn build_view(post: JobPost, company_name: Option<String>, codes: &[Code]) -> JobPostView {
    let want_you = resolve(codes, &post.want_you_ids, CodeType::WantYou);
    let can_do = resolve(codes, &post.can_do_ids, CodeType::CanDo);
    JobPostView {
        post,
        company_name,
        want_you,
        can_do,
    }
}
