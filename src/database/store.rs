//! Repository interface the application talks to.
//!
//! Handlers receive an `Arc<dyn Store>` through request state; PostgreSQL and
//! in-memory implementations live next to this module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AllowListEntry, Collection, Content, ContentFilter, Feedback, IdeaPack, NewUser, Project,
    ProjectInvite, ProjectMember, ProjectUpdate, ShareToken, SiteSettings, Tag, ToolAccess,
    ToolInstance, User,
};
use crate::types::{ToolKey, UserRole};

pub type StoreResult<T> = Result<T, DatabaseError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Create the user, or refresh name/image/last sign-in of an existing one
    async fn upsert_user_on_sign_in(&self, new_user: NewUser) -> StoreResult<User>;
    async fn set_current_project(&self, user_id: Uuid, project_id: Option<Uuid>) -> StoreResult<()>;
    async fn set_user_role(&self, user_id: Uuid, role: UserRole) -> StoreResult<User>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Creates the project and its OWNER membership together
    async fn create_project(&self, owner_id: Uuid, name: &str) -> StoreResult<Project>;
    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>>;
    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> StoreResult<Project>;
    /// Memberships of the user, most recently updated project first
    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<(Project, ProjectMember)>>;

    async fn find_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<Option<ProjectMember>>;
    async fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<(ProjectMember, User)>>;
    async fn insert_member(&self, member: ProjectMember) -> StoreResult<ProjectMember>;
    async fn update_member_access(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        access: ToolAccess,
    ) -> StoreResult<ProjectMember>;
    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    async fn count_members(&self, project_id: Uuid) -> StoreResult<usize>;

    /// LimitReached when members plus pending invites already fill `max_members`.
    /// The count and the insert are serialized per project.
    async fn insert_invite(&self, invite: ProjectInvite, max_members: usize) -> StoreResult<ProjectInvite>;
    async fn find_invite(&self, id: Uuid) -> StoreResult<Option<ProjectInvite>>;
    async fn find_invite_by_hash(&self, token_hash: &str) -> StoreResult<Option<ProjectInvite>>;
    async fn list_invites(&self, project_id: Uuid) -> StoreResult<Vec<ProjectInvite>>;
    async fn count_pending_invites(&self, project_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize>;
    /// Marks the invite accepted and, when given, inserts the membership in the same unit of work.
    /// Conflict when the invite was already accepted; LimitReached when the membership would
    /// exceed `max_members`.
    async fn accept_invite(
        &self,
        invite_id: Uuid,
        accepted_by: Uuid,
        member: Option<ProjectMember>,
        max_members: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn revoke_invite(&self, invite_id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;
}

#[async_trait]
pub trait ToolStore: Send + Sync {
    async fn find_tool(&self, project_id: Uuid, tool: ToolKey) -> StoreResult<Option<ToolInstance>>;
    /// Conflict when `expected_revision` is given and differs from the stored one (absent row = 0)
    async fn save_tool(
        &self,
        project_id: Uuid,
        tool: ToolKey,
        payload: Value,
        updated_by: Uuid,
        expected_revision: Option<i64>,
    ) -> StoreResult<ToolInstance>;
}

#[async_trait]
pub trait ShareStore: Send + Sync {
    /// LimitReached when the project+tool already has `max_active` active links at `share.created_at`
    async fn insert_share(&self, share: ShareToken, max_active: usize) -> StoreResult<ShareToken>;
    async fn find_share(&self, id: Uuid) -> StoreResult<Option<ShareToken>>;
    async fn find_share_by_hash(&self, token_hash: &str) -> StoreResult<Option<ShareToken>>;
    async fn list_shares(&self, project_id: Uuid, tool: ToolKey) -> StoreResult<Vec<ShareToken>>;
    async fn count_active_shares(&self, project_id: Uuid, tool: ToolKey, now: DateTime<Utc>) -> StoreResult<usize>;
    async fn revoke_share(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;
    async fn record_share_view(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_content(&self, content: Content) -> StoreResult<Content>;
    async fn update_content(&self, content: Content) -> StoreResult<Content>;
    /// Also drops its feedback and collection entries
    async fn delete_content(&self, id: Uuid) -> StoreResult<()>;
    async fn find_content(&self, id: Uuid) -> StoreResult<Option<Content>>;
    async fn find_content_by_slug(&self, slug: &str) -> StoreResult<Option<Content>>;
    async fn list_content(&self, filter: &ContentFilter) -> StoreResult<Vec<Content>>;

    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;
    async fn upsert_tag(&self, slug: &str, name: &str) -> StoreResult<Tag>;
    /// Also detaches the tag from content
    async fn delete_tag(&self, slug: &str) -> StoreResult<()>;

    async fn insert_collection(&self, collection: Collection) -> StoreResult<Collection>;
    async fn update_collection(&self, collection: Collection) -> StoreResult<Collection>;
    async fn delete_collection(&self, id: Uuid) -> StoreResult<()>;
    async fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>>;
    async fn find_collection_by_slug(&self, slug: &str) -> StoreResult<Option<Collection>>;
    async fn list_collections(&self) -> StoreResult<Vec<Collection>>;

    async fn insert_idea_pack(&self, pack: IdeaPack) -> StoreResult<IdeaPack>;
    async fn update_idea_pack(&self, pack: IdeaPack) -> StoreResult<IdeaPack>;
    async fn delete_idea_pack(&self, id: Uuid) -> StoreResult<()>;
    async fn find_idea_pack(&self, id: Uuid) -> StoreResult<Option<IdeaPack>>;
    async fn find_idea_pack_by_slug(&self, slug: &str) -> StoreResult<Option<IdeaPack>>;
    async fn list_idea_packs(&self) -> StoreResult<Vec<IdeaPack>>;

    async fn insert_feedback(&self, feedback: Feedback) -> StoreResult<Feedback>;
    /// Newest first
    async fn list_feedback(&self, content_id: Option<Uuid>) -> StoreResult<Vec<Feedback>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Defaults when nothing has been saved yet
    async fn get_settings(&self) -> StoreResult<SiteSettings>;
    async fn save_settings(&self, settings: SiteSettings) -> StoreResult<SiteSettings>;

    async fn list_allowlist(&self) -> StoreResult<Vec<AllowListEntry>>;
    async fn add_allowlist(&self, entry: AllowListEntry) -> StoreResult<AllowListEntry>;
    async fn remove_allowlist(&self, email: &str) -> StoreResult<()>;
    async fn is_allowlisted(&self, email: &str) -> StoreResult<bool>;
}

/// Everything the application needs from persistence
#[async_trait]
pub trait Store:
    UserStore + ProjectStore + ToolStore + ShareStore + ContentStore + SettingsStore + Send + Sync
{
    fn backend_name(&self) -> &'static str;

    async fn health_check(&self) -> StoreResult<()>;
}
