use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::tokens;
use crate::database::models::{
    Project, ProjectInvite, ProjectMember, ProjectUpdate, ToolAccess, User, UserSummary,
};
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::services::access::{self, capability, Capability};
use crate::types::{is_valid_email, normalize_email, AccessLevel, MemberRole, ProjectStatus, ToolKey};

const MAX_PROJECT_NAME: usize = 120;

/// A project as seen by one of its members
#[derive(Debug, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub role: MemberRole,
    pub capabilities: BTreeMap<&'static str, Capability>,
    pub is_current: bool,
}

impl ProjectView {
    fn new(project: Project, member: &ProjectMember, current: Option<Uuid>) -> Self {
        let capabilities = ToolKey::ALL
            .iter()
            .map(|tool| (tool.as_str(), capability(Some(member), Some(*tool))))
            .collect();
        Self {
            is_current: current == Some(project.id),
            project,
            role: member.role,
            capabilities,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MemberView {
    pub user: UserSummary,
    pub role: MemberRole,
    #[serde(with = "crate::database::models::project::tool_access_serde")]
    pub tool_access: ToolAccess,
    pub joined_at: chrono::DateTime<Utc>,
}

/// Returned once on creation; the raw token is never stored
#[derive(Debug, Serialize)]
pub struct CreatedInvite {
    pub invite: ProjectInvite,
    pub token: String,
    pub url: String,
}

pub struct ProjectService<'a> {
    state: &'a AppState,
}

impl<'a> ProjectService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// The stored current project when still usable, else the most recently updated
    /// active membership, else a freshly created default project
    pub async fn resolve_current(&self, user: &User) -> Result<Project, ApiError> {
        let store = &self.state.store;

        if let Some(current_id) = user.current_project_id {
            if let Some(project) = store.find_project(current_id).await? {
                if project.is_active() && store.find_member(project.id, user.id).await?.is_some() {
                    return Ok(project);
                }
            }
        }

        let memberships = store.list_projects_for_user(user.id).await?;
        if let Some((project, _)) = memberships.into_iter().find(|(p, _)| p.is_active()) {
            store.set_current_project(user.id, Some(project.id)).await?;
            return Ok(project);
        }

        let name = self.state.config.projects.default_project_name.clone();
        let project = store.create_project(user.id, &name).await?;
        store.set_current_project(user.id, Some(project.id)).await?;
        info!("Created default project {} for {}", project.id, user.email);
        Ok(project)
    }

    /// Explicit project id, or the user's current project
    pub async fn resolve_project_id(&self, user: &User, requested: Option<Uuid>) -> Result<Uuid, ApiError> {
        match requested {
            Some(id) => Ok(id),
            None => Ok(self.resolve_current(user).await?.id),
        }
    }

    pub async fn set_current(&self, user: &User, project_id: Uuid) -> Result<ProjectView, ApiError> {
        let access = access::authorize(
            self.state.store.as_ref(),
            user.id,
            project_id,
            None,
            Capability::View,
        )
        .await?;
        if !access.project.is_active() {
            return Err(ApiError::project_archived());
        }
        self.state.store.set_current_project(user.id, Some(project_id)).await?;
        Ok(ProjectView::new(access.project, &access.member, Some(project_id)))
    }

    pub async fn current_view(&self, user: &User) -> Result<ProjectView, ApiError> {
        let project = self.resolve_current(user).await?;
        let member = self
            .state
            .store
            .find_member(project.id, user.id)
            .await?
            .ok_or_else(|| ApiError::not_found("Project not found"))?;
        let id = project.id;
        Ok(ProjectView::new(project, &member, Some(id)))
    }

    pub async fn create(&self, user: &User, name: &str) -> Result<ProjectView, ApiError> {
        let name = validate_name(name)?;
        let project = self.state.store.create_project(user.id, &name).await?;
        let member = self
            .state
            .store
            .find_member(project.id, user.id)
            .await?
            .ok_or_else(|| ApiError::internal_server_error("Owner membership missing"))?;
        info!("Project {} created by {}", project.id, user.email);
        Ok(ProjectView::new(project, &member, user.current_project_id))
    }

    pub async fn list(&self, user: &User) -> Result<Vec<ProjectView>, ApiError> {
        let memberships = self.state.store.list_projects_for_user(user.id).await?;
        Ok(memberships
            .into_iter()
            .map(|(project, member)| ProjectView::new(project, &member, user.current_project_id))
            .collect())
    }

    pub async fn get(&self, user: &User, project_id: Uuid) -> Result<ProjectView, ApiError> {
        let access = access::authorize(
            self.state.store.as_ref(),
            user.id,
            project_id,
            None,
            Capability::View,
        )
        .await?;
        Ok(ProjectView::new(access.project, &access.member, user.current_project_id))
    }

    /// Rename, archive or unarchive. Owner only; archived projects may still be unarchived.
    pub async fn update(
        &self,
        user: &User,
        project_id: Uuid,
        name: Option<String>,
        status: Option<ProjectStatus>,
    ) -> Result<ProjectView, ApiError> {
        let access = access::authorize(
            self.state.store.as_ref(),
            user.id,
            project_id,
            None,
            Capability::View,
        )
        .await?;
        if access.capability != Capability::Owner {
            return Err(ApiError::forbidden("Only the project owner can change the project"));
        }
        let reactivating = status == Some(ProjectStatus::Active);
        if !access.project.is_active() && !reactivating {
            return Err(ApiError::project_archived());
        }

        let name = name.as_deref().map(validate_name).transpose()?;
        let project = self
            .state
            .store
            .update_project(project_id, ProjectUpdate { name, status })
            .await?;
        if let Some(status) = status {
            info!("Project {} set to {} by {}", project_id, status, user.email);
        }
        Ok(ProjectView::new(project, &access.member, user.current_project_id))
    }

    pub async fn members(&self, user: &User, project_id: Uuid) -> Result<Vec<MemberView>, ApiError> {
        access::authorize(self.state.store.as_ref(), user.id, project_id, None, Capability::View).await?;
        let members = self.state.store.list_members(project_id).await?;
        Ok(members
            .into_iter()
            .map(|(member, user)| MemberView {
                user: UserSummary::from(&user),
                role: member.role,
                tool_access: member.tool_access,
                joined_at: member.created_at,
            })
            .collect())
    }

    pub async fn update_member_access(
        &self,
        user: &User,
        project_id: Uuid,
        target: Uuid,
        tool_access: ToolAccess,
    ) -> Result<ProjectMember, ApiError> {
        access::authorize(self.state.store.as_ref(), user.id, project_id, None, Capability::Owner).await?;
        let member = self
            .state
            .store
            .find_member(project_id, target)
            .await?
            .ok_or_else(|| ApiError::not_found("Member not found"))?;
        if member.role == MemberRole::Owner {
            return Err(ApiError::bad_request("The owner's access cannot be changed"));
        }
        let updated = self
            .state
            .store
            .update_member_access(project_id, target, tool_access)
            .await?;
        info!("Tool access of {} in project {} updated by {}", target, project_id, user.email);
        Ok(updated)
    }

    /// Owners remove members; members may remove themselves. Owners cannot leave.
    pub async fn remove_member(&self, user: &User, project_id: Uuid, target: Uuid) -> Result<(), ApiError> {
        let required = if target == user.id { Capability::View } else { Capability::Owner };
        access::authorize(self.state.store.as_ref(), user.id, project_id, None, required).await?;

        let member = self
            .state
            .store
            .find_member(project_id, target)
            .await?
            .ok_or_else(|| ApiError::not_found("Member not found"))?;
        if member.role == MemberRole::Owner {
            return Err(ApiError::bad_request("The project owner cannot leave or be removed"));
        }

        self.state.store.remove_member(project_id, target).await?;
        if target == user.id {
            info!("{} left project {}", user.email, project_id);
        } else {
            info!("{} removed {} from project {}", user.email, target, project_id);
        }
        Ok(())
    }

    pub async fn create_invite(
        &self,
        user: &User,
        project_id: Uuid,
        email: &str,
        tool_access: Option<ToolAccess>,
    ) -> Result<CreatedInvite, ApiError> {
        let store = self.state.store.as_ref();
        access::authorize(store, user.id, project_id, None, Capability::Owner).await?;

        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ApiError::field("email", "must be a valid email address"));
        }

        let members = store.list_members(project_id).await?;
        if members.iter().any(|(_, u)| u.email == email) {
            return Err(ApiError::rule(
                StatusCode::CONFLICT,
                "ALREADY_MEMBER",
                "That person is already a member of this project",
            ));
        }

        let now = Utc::now();

        let tool_access = tool_access
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| ToolKey::ALL.iter().map(|t| (*t, AccessLevel::View)).collect());

        let token = tokens::generate_token();
        let invite = store
            .insert_invite(
                ProjectInvite {
                    id: Uuid::new_v4(),
                    project_id,
                    email,
                    token_hash: tokens::hash_token(&token),
                    tool_access,
                    invited_by: user.id,
                    created_at: now,
                    expires_at: now + Duration::days(self.state.config.projects.invite_expiry_days),
                    accepted_at: None,
                    accepted_by: None,
                    revoked_at: None,
                },
                self.state.config.projects.max_members,
            )
            .await
            .map_err(limit_as_member_cap)?;

        info!("Invite {} to project {} created by {}", invite.id, project_id, user.email);
        let url = format!("{}/invite/{}", self.state.config.api.public_base_url, token);
        Ok(CreatedInvite { invite, token, url })
    }

    /// Pending invites only
    pub async fn invites(&self, user: &User, project_id: Uuid) -> Result<Vec<ProjectInvite>, ApiError> {
        access::authorize(self.state.store.as_ref(), user.id, project_id, None, Capability::Owner).await?;
        let now = Utc::now();
        let invites = self.state.store.list_invites(project_id).await?;
        Ok(invites.into_iter().filter(|i| i.is_pending(now)).collect())
    }

    pub async fn revoke_invite(&self, user: &User, project_id: Uuid, invite_id: Uuid) -> Result<(), ApiError> {
        access::authorize(self.state.store.as_ref(), user.id, project_id, None, Capability::Owner).await?;
        let invite = self
            .state
            .store
            .find_invite(invite_id)
            .await?
            .filter(|i| i.project_id == project_id)
            .ok_or_else(|| ApiError::not_found("Invite not found"))?;
        self.state.store.revoke_invite(invite.id, Utc::now()).await?;
        info!("Invite {} revoked by {}", invite.id, user.email);
        Ok(())
    }

    pub async fn accept_invite(&self, user: &User, token: &str) -> Result<ProjectView, ApiError> {
        let store = self.state.store.as_ref();
        let not_found = || ApiError::not_found("Invite not found");

        if !tokens::is_well_formed(token) {
            return Err(not_found());
        }
        let invite = store
            .find_invite_by_hash(&tokens::hash_token(token))
            .await?
            .ok_or_else(not_found)?;
        let now = Utc::now();

        if invite.revoked_at.is_some() {
            return Err(not_found());
        }
        if invite.accepted_at.is_some() {
            return Err(ApiError::rule(
                StatusCode::CONFLICT,
                "INVITE_USED",
                "This invite has already been used",
            ));
        }
        if invite.expires_at <= now {
            return Err(ApiError::rule(StatusCode::CONFLICT, "INVITE_EXPIRED", "This invite has expired"));
        }
        if normalize_email(&invite.email) != normalize_email(&user.email) {
            tracing::warn!("Invite {} presented by {}", invite.id, user.email);
            return Err(ApiError::forbidden("This invite was sent to a different email address"));
        }

        let project = store.find_project(invite.project_id).await?.ok_or_else(not_found)?;
        if !project.is_active() {
            return Err(ApiError::project_archived());
        }

        let max = self.state.config.projects.max_members;
        if let Some(existing) = store.find_member(project.id, user.id).await? {
            store.accept_invite(invite.id, user.id, None, max, now).await?;
            return Ok(ProjectView::new(project, &existing, user.current_project_id));
        }

        let member = ProjectMember {
            project_id: project.id,
            user_id: user.id,
            role: MemberRole::Member,
            tool_access: invite.tool_access.clone(),
            created_at: now,
        };
        store
            .accept_invite(invite.id, user.id, Some(member.clone()), max, now)
            .await
            .map_err(limit_as_member_cap)?;
        store.set_current_project(user.id, Some(project.id)).await?;
        info!("{} joined project {} through invite {}", user.email, project.id, invite.id);

        let id = project.id;
        Ok(ProjectView::new(project, &member, Some(id)))
    }
}

fn limit_as_member_cap(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::LimitReached(max) => ApiError::rule(
            StatusCode::CONFLICT,
            "MEMBER_LIMIT",
            format!("Projects are limited to {} members including pending invites", max),
        ),
        other => other.into(),
    }
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::field("name", "is required"));
    }
    if name.chars().count() > MAX_PROJECT_NAME {
        return Err(ApiError::field(
            "name",
            format!("must be at most {} characters", MAX_PROJECT_NAME),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::StaticIdentity;
    use crate::config::AppConfig;
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticIdentity::new()),
            AppConfig::development(),
        )
    }

    async fn user(state: &AppState, email: &str) -> User {
        state
            .store
            .upsert_user_on_sign_in(NewUser {
                email: email.into(),
                name: None,
                image: None,
                role: crate::types::UserRole::User,
            })
            .await
            .unwrap()
    }

    async fn reload(state: &AppState, user: &User) -> User {
        state.store.find_user(user.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn first_resolution_creates_default_project() {
        let state = state();
        let kai = user(&state, "kai@example.com").await;
        let service = ProjectService::new(&state);

        let project = service.resolve_current(&kai).await.unwrap();
        assert_eq!(project.name, "My Home");
        assert_eq!(reload(&state, &kai).await.current_project_id, Some(project.id));

        let again = service.resolve_current(&reload(&state, &kai).await).await.unwrap();
        assert_eq!(again.id, project.id);
    }

    #[tokio::test]
    async fn archived_current_project_falls_back() {
        let state = state();
        let kai = user(&state, "kai@example.com").await;
        let service = ProjectService::new(&state);

        let first = service.create(&kai, "Kailua rental").await.unwrap().project;
        let second = service.create(&kai, "Manoa house").await.unwrap().project;
        service.set_current(&kai, first.id).await.unwrap();
        let kai = reload(&state, &kai).await;
        service
            .update(&kai, first.id, None, Some(ProjectStatus::Archived))
            .await
            .unwrap();

        let resolved = service.resolve_current(&kai).await.unwrap();
        assert_eq!(resolved.id, second.id);
    }

    #[tokio::test]
    async fn invite_flow() {
        let state = state();
        let owner = user(&state, "owner@example.com").await;
        let guest = user(&state, "guest@example.com").await;
        let service = ProjectService::new(&state);
        let project = service.create(&owner, "Hilo build").await.unwrap().project;

        let mut access = ToolAccess::new();
        access.insert(ToolKey::PunchList, AccessLevel::Edit);
        let created = service
            .create_invite(&owner, project.id, " Guest@Example.com ", Some(access))
            .await
            .unwrap();
        assert_eq!(created.invite.email, "guest@example.com");
        assert!(tokens::is_well_formed(&created.token));

        let stranger = user(&state, "stranger@example.com").await;
        let err = service.accept_invite(&stranger, &created.token).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let view = service.accept_invite(&guest, &created.token).await.unwrap();
        assert_eq!(view.role, MemberRole::Member);
        assert_eq!(view.capabilities["punch_list"], Capability::Edit);
        assert_eq!(view.capabilities["mood_boards"], Capability::None);
        assert_eq!(reload(&state, &guest).await.current_project_id, Some(project.id));

        let err = service.accept_invite(&guest, &created.token).await.unwrap_err();
        assert_eq!(err.error_code(), "INVITE_USED");
    }

    #[tokio::test]
    async fn revoked_and_unknown_invites_look_missing() {
        let state = state();
        let owner = user(&state, "owner@example.com").await;
        let guest = user(&state, "guest@example.com").await;
        let service = ProjectService::new(&state);
        let project = service.create(&owner, "Kona").await.unwrap().project;

        let created = service
            .create_invite(&owner, project.id, "guest@example.com", None)
            .await
            .unwrap();
        service
            .revoke_invite(&owner, project.id, created.invite.id)
            .await
            .unwrap();
        assert_eq!(service.accept_invite(&guest, &created.token).await.unwrap_err().status_code(), 404);
        assert_eq!(service.accept_invite(&guest, "abc").await.unwrap_err().status_code(), 404);
        assert_eq!(
            service
                .accept_invite(&guest, &tokens::generate_token())
                .await
                .unwrap_err()
                .status_code(),
            404
        );
    }

    #[tokio::test]
    async fn member_cap_counts_pending_invites() {
        let mut config = AppConfig::development();
        config.projects.max_members = 2;
        let state = AppState::new(Arc::new(MemoryStore::new()), Arc::new(StaticIdentity::new()), config);
        let owner = user(&state, "owner@example.com").await;
        let service = ProjectService::new(&state);
        let project = service.create(&owner, "Tiny").await.unwrap().project;

        service.create_invite(&owner, project.id, "a@example.com", None).await.unwrap();
        let err = service
            .create_invite(&owner, project.id, "b@example.com", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "MEMBER_LIMIT");
    }

    #[tokio::test]
    async fn owners_cannot_leave_but_members_can() {
        let state = state();
        let owner = user(&state, "owner@example.com").await;
        let guest = user(&state, "guest@example.com").await;
        let service = ProjectService::new(&state);
        let project = service.create(&owner, "Waimea").await.unwrap().project;
        let created = service
            .create_invite(&owner, project.id, "guest@example.com", None)
            .await
            .unwrap();
        service.accept_invite(&guest, &created.token).await.unwrap();

        assert_eq!(
            service.remove_member(&owner, project.id, owner.id).await.unwrap_err().status_code(),
            400
        );
        assert_eq!(
            service.remove_member(&guest, project.id, owner.id).await.unwrap_err().status_code(),
            403
        );
        service.remove_member(&guest, project.id, guest.id).await.unwrap();
        assert!(state.store.find_member(project.id, guest.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn project_names_are_validated() {
        let state = state();
        let kai = user(&state, "kai@example.com").await;
        let service = ProjectService::new(&state);
        assert_eq!(service.create(&kai, "   ").await.unwrap_err().status_code(), 400);
        let long = "x".repeat(MAX_PROJECT_NAME + 1);
        assert_eq!(service.create(&kai, &long).await.unwrap_err().status_code(), 400);
    }
}
