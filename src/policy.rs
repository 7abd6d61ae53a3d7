//! Authorization rules.
//!
//! Each policy answers a yes/no question about a user and a record. Handlers
//! turn a `false` into `ApiError::Forbidden` via [`authorize`].

use crate::accounts::model::User;
use crate::applications::model::JobApplication;
use crate::chat::model::RoomContext;
use crate::error::ApiError;
use crate::jobs::model::JobPost;

pub struct JobPostPolicy;

impl JobPostPolicy {
    pub fn create(user: &User, has_profile: bool) -> bool {
        user.is_company() && has_profile
    }

    pub fn update(user: &User, post: &JobPost) -> bool {
        user.is_company() && post.company_id == user.id
    }

    pub fn delete(user: &User, post: &JobPost) -> bool {
        Self::update(user, post)
    }
}

pub struct JobApplicationPolicy;

impl JobApplicationPolicy {
    pub fn create(user: &User, has_profile: bool, post: &JobPost) -> bool {
        user.is_worker() && has_profile && post.company_id != user.id
    }

    /// Applicant or owner of the post applied to.
    pub fn view(user: &User, application: &JobApplication, post: &JobPost) -> bool {
        application.worker_id == user.id || post.company_id == user.id
    }

    pub fn decide(user: &User, post: &JobPost) -> bool {
        user.is_company() && post.company_id == user.id
    }

    pub fn withdraw(user: &User, application: &JobApplication) -> bool {
        user.is_worker() && application.worker_id == user.id
    }
}

pub struct ChatRoomPolicy;

impl ChatRoomPolicy {
    pub fn view(user: &User, room: &RoomContext) -> bool {
        room.is_participant(user.id)
    }

    pub fn send(user: &User, room: &RoomContext) -> bool {
        room.is_participant(user.id)
    }
}

pub struct ProfilePolicy;

impl ProfilePolicy {
    pub fn edit(user: &User, profile_owner: uuid::Uuid) -> bool {
        user.id == profile_owner
    }
}

/// Map a policy decision to `Forbidden`.
pub fn authorize(allowed: bool, action: &str) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!("not allowed to {action}")))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::accounts::model::Role;
    use crate::applications::model::ApplicationStatus;
    use crate::chat::model::ChatRoom;
    use crate::jobs::model::Purpose;

    fn user(role: Role) -> User {
        User::new("u", format!("{}@example.jp", Uuid::new_v4()), "x", role)
    }

    fn post_of(company: &User) -> JobPost {
        let now = Utc::now();
        JobPost {
            id: Uuid::new_v4(),
            company_id: company.id,
            title: "t".into(),
            detail: "d".into(),
            purpose: Purpose::NeedHelp,
            start_date: None,
            end_date: None,
            location: None,
            want_you_ids: vec![],
            can_do_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn job_post_rules() {
        let owner = user(Role::Company);
        let other = user(Role::Company);
        let worker = user(Role::Worker);
        let post = post_of(&owner);

        assert!(JobPostPolicy::create(&owner, true));
        assert!(!JobPostPolicy::create(&owner, false));
        assert!(!JobPostPolicy::create(&worker, true));
        assert!(JobPostPolicy::update(&owner, &post));
        assert!(!JobPostPolicy::update(&other, &post));
        assert!(!JobPostPolicy::delete(&worker, &post));
    }

    #[test]
    fn application_rules() {
        let owner = user(Role::Company);
        let worker = user(Role::Worker);
        let stranger = user(Role::Worker);
        let post = post_of(&owner);
        let application = JobApplication::new(post.id, worker.id, vec![], None);

        assert!(JobApplicationPolicy::create(&worker, true, &post));
        assert!(!JobApplicationPolicy::create(&worker, false, &post));
        assert!(!JobApplicationPolicy::create(&owner, true, &post));

        assert!(JobApplicationPolicy::view(&worker, &application, &post));
        assert!(JobApplicationPolicy::view(&owner, &application, &post));
        assert!(!JobApplicationPolicy::view(&stranger, &application, &post));

        assert!(JobApplicationPolicy::decide(&owner, &post));
        assert!(!JobApplicationPolicy::decide(&worker, &post));
        assert!(JobApplicationPolicy::withdraw(&worker, &application));
        assert!(!JobApplicationPolicy::withdraw(&stranger, &application));
    }

    #[test]
    fn chat_rules() {
        let owner = user(Role::Company);
        let worker = user(Role::Worker);
        let stranger = user(Role::Worker);
        let room = RoomContext {
            room: ChatRoom::for_application(Uuid::new_v4()),
            job_post_id: Uuid::new_v4(),
            job_title: "t".into(),
            application_status: ApplicationStatus::Applied,
            worker_id: worker.id,
            worker_name: "w".into(),
            company_id: owner.id,
            company_name: "c".into(),
        };
        assert!(ChatRoomPolicy::view(&worker, &room));
        assert!(ChatRoomPolicy::send(&owner, &room));
        assert!(!ChatRoomPolicy::view(&stranger, &room));
    }

    #[test]
    fn authorize_maps_to_forbidden() {
        assert!(authorize(true, "x").is_ok());
        let err = authorize(false, "update this job post").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn profile_rules() {
        let a = user(Role::Worker);
        assert!(ProfilePolicy::edit(&a, a.id));
        assert!(!ProfilePolicy::edit(&a, Uuid::new_v4()));
    }
}
