use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    AllowListEntry, Collection, Content, ContentFilter, Feedback, IdeaPack, NewUser, Project,
    ProjectInvite, ProjectMember, ProjectUpdate, ShareToken, SiteSettings, Tag, ToolAccess,
    ToolInstance, User,
};
use crate::database::store::{
    ContentStore, ProjectStore, SettingsStore, ShareStore, Store, StoreResult, ToolStore, UserStore,
};
use crate::types::{MemberRole, ProjectStatus, ToolKey, UserRole};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    members: Vec<ProjectMember>,
    invites: HashMap<Uuid, ProjectInvite>,
    tools: HashMap<(Uuid, ToolKey), ToolInstance>,
    shares: HashMap<Uuid, ShareToken>,
    content: HashMap<Uuid, Content>,
    tags: HashMap<String, Tag>,
    collections: HashMap<Uuid, Collection>,
    idea_packs: HashMap<Uuid, IdeaPack>,
    feedback: Vec<Feedback>,
    settings: Option<SiteSettings>,
    allowlist: HashMap<String, AllowListEntry>,
}

/// Process-local store. Used by tests and `HHC_STORE=memory` development runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn upsert_user_on_sign_in(&self, new_user: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = t.users.values_mut().find(|u| u.email == new_user.email) {
            if new_user.name.is_some() {
                existing.name = new_user.name;
            }
            if new_user.image.is_some() {
                existing.image = new_user.image;
            }
            existing.last_sign_in_at = Some(now);
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            name: new_user.name,
            image: new_user.image,
            role: new_user.role,
            current_project_id: None,
            created_at: now,
            updated_at: now,
            last_sign_in_at: Some(now),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_current_project(&self, user_id: Uuid, project_id: Option<Uuid>) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let user = t
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::not_found("user"))?;
        user.current_project_id = project_id;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn set_user_role(&self, user_id: Uuid, role: UserRole) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        let user = t
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DatabaseError::not_found("user"))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        Ok(users)
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(&self, owner_id: Uuid, name: &str) -> StoreResult<Project> {
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        };
        t.projects.insert(project.id, project.clone());
        t.members.push(ProjectMember {
            project_id: project.id,
            user_id: owner_id,
            role: MemberRole::Owner,
            tool_access: ToolAccess::new(),
            created_at: now,
        });
        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> StoreResult<Project> {
        let mut t = self.tables.write().await;
        let project = t
            .projects
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("project"))?;
        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<(Project, ProjectMember)>> {
        let t = self.tables.read().await;
        let mut out: Vec<(Project, ProjectMember)> = t
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| t.projects.get(&m.project_id).map(|p| (p.clone(), m.clone())))
            .collect();
        out.sort_by(|a, b| b.0.updated_at.cmp(&a.0.updated_at));
        Ok(out)
    }

    async fn find_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<Option<ProjectMember>> {
        let t = self.tables.read().await;
        Ok(t.members
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<(ProjectMember, User)>> {
        let t = self.tables.read().await;
        let mut out: Vec<(ProjectMember, User)> = t
            .members
            .iter()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| t.users.get(&m.user_id).map(|u| (m.clone(), u.clone())))
            .collect();
        out.sort_by(|a, b| a.0.created_at.cmp(&b.0.created_at));
        Ok(out)
    }

    async fn insert_member(&self, member: ProjectMember) -> StoreResult<ProjectMember> {
        let mut t = self.tables.write().await;
        if t.members
            .iter()
            .any(|m| m.project_id == member.project_id && m.user_id == member.user_id)
        {
            return Err(DatabaseError::conflict("already a member of this project"));
        }
        t.members.push(member.clone());
        Ok(member)
    }

    async fn update_member_access(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        access: ToolAccess,
    ) -> StoreResult<ProjectMember> {
        let mut t = self.tables.write().await;
        let member = t
            .members
            .iter_mut()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .ok_or_else(|| DatabaseError::not_found("member"))?;
        member.tool_access = access;
        Ok(member.clone())
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let before = t.members.len();
        t.members
            .retain(|m| !(m.project_id == project_id && m.user_id == user_id));
        if t.members.len() == before {
            return Err(DatabaseError::not_found("member"));
        }
        for user in t.users.values_mut() {
            if user.id == user_id && user.current_project_id == Some(project_id) {
                user.current_project_id = None;
            }
        }
        Ok(())
    }

    async fn count_members(&self, project_id: Uuid) -> StoreResult<usize> {
        let t = self.tables.read().await;
        Ok(t.members.iter().filter(|m| m.project_id == project_id).count())
    }

    async fn insert_invite(&self, invite: ProjectInvite, max_members: usize) -> StoreResult<ProjectInvite> {
        let mut t = self.tables.write().await;
        let seats = t.members.iter().filter(|m| m.project_id == invite.project_id).count()
            + t.invites
                .values()
                .filter(|i| i.project_id == invite.project_id && i.is_pending(invite.created_at))
                .count();
        if seats >= max_members {
            return Err(DatabaseError::LimitReached(max_members));
        }
        t.invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    async fn find_invite(&self, id: Uuid) -> StoreResult<Option<ProjectInvite>> {
        Ok(self.tables.read().await.invites.get(&id).cloned())
    }

    async fn find_invite_by_hash(&self, token_hash: &str) -> StoreResult<Option<ProjectInvite>> {
        let t = self.tables.read().await;
        Ok(t.invites.values().find(|i| i.token_hash == token_hash).cloned())
    }

    async fn list_invites(&self, project_id: Uuid) -> StoreResult<Vec<ProjectInvite>> {
        let t = self.tables.read().await;
        let mut out: Vec<ProjectInvite> = t
            .invites
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn count_pending_invites(&self, project_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize> {
        let t = self.tables.read().await;
        Ok(t.invites
            .values()
            .filter(|i| i.project_id == project_id && i.is_pending(now))
            .count())
    }

    async fn accept_invite(
        &self,
        invite_id: Uuid,
        accepted_by: Uuid,
        member: Option<ProjectMember>,
        max_members: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let invite = t
            .invites
            .get(&invite_id)
            .ok_or_else(|| DatabaseError::not_found("invite"))?;
        if invite.accepted_at.is_some() {
            return Err(DatabaseError::conflict("invite already accepted"));
        }
        if let Some(member) = member {
            if t.members
                .iter()
                .any(|m| m.project_id == member.project_id && m.user_id == member.user_id)
            {
                return Err(DatabaseError::conflict("already a member of this project"));
            }
            if t.members.iter().filter(|m| m.project_id == member.project_id).count() >= max_members {
                return Err(DatabaseError::LimitReached(max_members));
            }
            t.members.push(member);
        }
        if let Some(invite) = t.invites.get_mut(&invite_id) {
            invite.accepted_at = Some(now);
            invite.accepted_by = Some(accepted_by);
        }
        Ok(())
    }

    async fn revoke_invite(&self, invite_id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let invite = t
            .invites
            .get_mut(&invite_id)
            .ok_or_else(|| DatabaseError::not_found("invite"))?;
        if invite.revoked_at.is_none() {
            invite.revoked_at = Some(now);
        }
        Ok(())
    }
}

#[async_trait]
impl ToolStore for MemoryStore {
    async fn find_tool(&self, project_id: Uuid, tool: ToolKey) -> StoreResult<Option<ToolInstance>> {
        Ok(self.tables.read().await.tools.get(&(project_id, tool)).cloned())
    }

    async fn save_tool(
        &self,
        project_id: Uuid,
        tool: ToolKey,
        payload: Value,
        updated_by: Uuid,
        expected_revision: Option<i64>,
    ) -> StoreResult<ToolInstance> {
        let mut t = self.tables.write().await;
        let current = t.tools.get(&(project_id, tool)).map(|i| i.revision).unwrap_or(0);
        if let Some(expected) = expected_revision {
            if expected != current {
                return Err(DatabaseError::conflict(format!(
                    "tool state is at revision {}, not {}",
                    current, expected
                )));
            }
        }
        let now = Utc::now();
        let instance = ToolInstance {
            project_id,
            tool_key: tool,
            payload,
            revision: current + 1,
            updated_by: Some(updated_by),
            updated_at: now,
        };
        t.tools.insert((project_id, tool), instance.clone());
        if let Some(project) = t.projects.get_mut(&project_id) {
            project.updated_at = now;
        }
        Ok(instance)
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn insert_share(&self, share: ShareToken, max_active: usize) -> StoreResult<ShareToken> {
        let mut t = self.tables.write().await;
        let active = t
            .shares
            .values()
            .filter(|s| {
                s.project_id == share.project_id && s.tool_key == share.tool_key && s.is_active(share.created_at)
            })
            .count();
        if active >= max_active {
            return Err(DatabaseError::LimitReached(max_active));
        }
        t.shares.insert(share.id, share.clone());
        Ok(share)
    }

    async fn find_share(&self, id: Uuid) -> StoreResult<Option<ShareToken>> {
        Ok(self.tables.read().await.shares.get(&id).cloned())
    }

    async fn find_share_by_hash(&self, token_hash: &str) -> StoreResult<Option<ShareToken>> {
        let t = self.tables.read().await;
        Ok(t.shares.values().find(|s| s.token_hash == token_hash).cloned())
    }

    async fn list_shares(&self, project_id: Uuid, tool: ToolKey) -> StoreResult<Vec<ShareToken>> {
        let t = self.tables.read().await;
        let mut out: Vec<ShareToken> = t
            .shares
            .values()
            .filter(|s| s.project_id == project_id && s.tool_key == tool)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn count_active_shares(&self, project_id: Uuid, tool: ToolKey, now: DateTime<Utc>) -> StoreResult<usize> {
        let t = self.tables.read().await;
        Ok(t.shares
            .values()
            .filter(|s| s.project_id == project_id && s.tool_key == tool && s.is_active(now))
            .count())
    }

    async fn revoke_share(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let share = t
            .shares
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("share link"))?;
        if share.revoked_at.is_none() {
            share.revoked_at = Some(now);
        }
        Ok(())
    }

    async fn record_share_view(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if let Some(share) = t.shares.get_mut(&id) {
            share.view_count += 1;
            share.last_viewed_at = Some(now);
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_content(&self, content: Content) -> StoreResult<Content> {
        let mut t = self.tables.write().await;
        if t.content.values().any(|c| c.slug == content.slug) {
            return Err(DatabaseError::conflict(format!("slug '{}' is taken", content.slug)));
        }
        t.content.insert(content.id, content.clone());
        Ok(content)
    }

    async fn update_content(&self, content: Content) -> StoreResult<Content> {
        let mut t = self.tables.write().await;
        if !t.content.contains_key(&content.id) {
            return Err(DatabaseError::not_found("content"));
        }
        if t.content
            .values()
            .any(|c| c.slug == content.slug && c.id != content.id)
        {
            return Err(DatabaseError::conflict(format!("slug '{}' is taken", content.slug)));
        }
        t.content.insert(content.id, content.clone());
        Ok(content)
    }

    async fn delete_content(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.content.remove(&id).is_none() {
            return Err(DatabaseError::not_found("content"));
        }
        t.feedback.retain(|f| f.content_id != id);
        for collection in t.collections.values_mut() {
            collection.content_ids.retain(|c| *c != id);
        }
        Ok(())
    }

    async fn find_content(&self, id: Uuid) -> StoreResult<Option<Content>> {
        Ok(self.tables.read().await.content.get(&id).cloned())
    }

    async fn find_content_by_slug(&self, slug: &str) -> StoreResult<Option<Content>> {
        let t = self.tables.read().await;
        Ok(t.content.values().find(|c| c.slug == slug).cloned())
    }

    async fn list_content(&self, filter: &ContentFilter) -> StoreResult<Vec<Content>> {
        let t = self.tables.read().await;
        let mut out: Vec<Content> = t
            .content
            .values()
            .filter(|c| filter.kind.map_or(true, |k| c.kind == k))
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.tag.as_ref().map_or(true, |tag| c.tags.contains(tag)))
            .cloned()
            .collect();
        // Newest publication first, drafts by last edit
        out.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        Ok(out
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let t = self.tables.read().await;
        let mut tags: Vec<Tag> = t.tags.values().cloned().collect();
        tags.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(tags)
    }

    async fn upsert_tag(&self, slug: &str, name: &str) -> StoreResult<Tag> {
        let mut t = self.tables.write().await;
        let tag = t.tags.entry(slug.to_string()).or_insert_with(|| Tag {
            slug: slug.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        });
        Ok(tag.clone())
    }

    async fn delete_tag(&self, slug: &str) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.tags.remove(slug).is_none() {
            return Err(DatabaseError::not_found("tag"));
        }
        for content in t.content.values_mut() {
            content.tags.retain(|s| s != slug);
        }
        Ok(())
    }

    async fn insert_collection(&self, collection: Collection) -> StoreResult<Collection> {
        let mut t = self.tables.write().await;
        if t.collections.values().any(|c| c.slug == collection.slug) {
            return Err(DatabaseError::conflict(format!("slug '{}' is taken", collection.slug)));
        }
        t.collections.insert(collection.id, collection.clone());
        Ok(collection)
    }

    async fn update_collection(&self, collection: Collection) -> StoreResult<Collection> {
        let mut t = self.tables.write().await;
        if !t.collections.contains_key(&collection.id) {
            return Err(DatabaseError::not_found("collection"));
        }
        if t.collections
            .values()
            .any(|c| c.slug == collection.slug && c.id != collection.id)
        {
            return Err(DatabaseError::conflict(format!("slug '{}' is taken", collection.slug)));
        }
        t.collections.insert(collection.id, collection.clone());
        Ok(collection)
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.collections
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::not_found("collection"))
    }

    async fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        Ok(self.tables.read().await.collections.get(&id).cloned())
    }

    async fn find_collection_by_slug(&self, slug: &str) -> StoreResult<Option<Collection>> {
        let t = self.tables.read().await;
        Ok(t.collections.values().find(|c| c.slug == slug).cloned())
    }

    async fn list_collections(&self) -> StoreResult<Vec<Collection>> {
        let t = self.tables.read().await;
        let mut out: Vec<Collection> = t.collections.values().cloned().collect();
        out.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(out)
    }

    async fn insert_idea_pack(&self, pack: IdeaPack) -> StoreResult<IdeaPack> {
        let mut t = self.tables.write().await;
        if t.idea_packs.values().any(|p| p.slug == pack.slug) {
            return Err(DatabaseError::conflict(format!("slug '{}' is taken", pack.slug)));
        }
        t.idea_packs.insert(pack.id, pack.clone());
        Ok(pack)
    }

    async fn update_idea_pack(&self, pack: IdeaPack) -> StoreResult<IdeaPack> {
        let mut t = self.tables.write().await;
        if !t.idea_packs.contains_key(&pack.id) {
            return Err(DatabaseError::not_found("idea pack"));
        }
        if t.idea_packs
            .values()
            .any(|p| p.slug == pack.slug && p.id != pack.id)
        {
            return Err(DatabaseError::conflict(format!("slug '{}' is taken", pack.slug)));
        }
        t.idea_packs.insert(pack.id, pack.clone());
        Ok(pack)
    }

    async fn delete_idea_pack(&self, id: Uuid) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.idea_packs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::not_found("idea pack"))
    }

    async fn find_idea_pack(&self, id: Uuid) -> StoreResult<Option<IdeaPack>> {
        Ok(self.tables.read().await.idea_packs.get(&id).cloned())
    }

    async fn find_idea_pack_by_slug(&self, slug: &str) -> StoreResult<Option<IdeaPack>> {
        let t = self.tables.read().await;
        Ok(t.idea_packs.values().find(|p| p.slug == slug).cloned())
    }

    async fn list_idea_packs(&self) -> StoreResult<Vec<IdeaPack>> {
        let t = self.tables.read().await;
        let mut out: Vec<IdeaPack> = t.idea_packs.values().cloned().collect();
        out.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(out)
    }

    async fn insert_feedback(&self, feedback: Feedback) -> StoreResult<Feedback> {
        let mut t = self.tables.write().await;
        t.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn list_feedback(&self, content_id: Option<Uuid>) -> StoreResult<Vec<Feedback>> {
        let t = self.tables.read().await;
        let mut out: Vec<Feedback> = t
            .feedback
            .iter()
            .filter(|f| content_id.map_or(true, |id| f.content_id == id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_settings(&self) -> StoreResult<SiteSettings> {
        Ok(self.tables.read().await.settings.clone().unwrap_or_default())
    }

    async fn save_settings(&self, mut settings: SiteSettings) -> StoreResult<SiteSettings> {
        settings.updated_at = Some(Utc::now());
        self.tables.write().await.settings = Some(settings.clone());
        Ok(settings)
    }

    async fn list_allowlist(&self) -> StoreResult<Vec<AllowListEntry>> {
        let t = self.tables.read().await;
        let mut out: Vec<AllowListEntry> = t.allowlist.values().cloned().collect();
        out.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(out)
    }

    async fn add_allowlist(&self, entry: AllowListEntry) -> StoreResult<AllowListEntry> {
        let mut t = self.tables.write().await;
        t.allowlist.insert(entry.email.clone(), entry.clone());
        Ok(entry)
    }

    async fn remove_allowlist(&self, email: &str) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.allowlist
            .remove(email)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::not_found("allowlist entry"))
    }

    async fn is_allowlisted(&self, email: &str) -> StoreResult<bool> {
        Ok(self.tables.read().await.allowlist.contains_key(email))
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .upsert_user_on_sign_in(NewUser {
                email: "kai@example.com".into(),
                name: Some("Kai".into()),
                image: None,
                role: UserRole::User,
            })
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn sign_in_upsert_keeps_role_and_id() {
        let (store, user) = seeded().await;
        let again = store
            .upsert_user_on_sign_in(NewUser {
                email: "kai@example.com".into(),
                name: None,
                image: Some("https://example.com/kai.png".into()),
                role: UserRole::Admin,
            })
            .await
            .unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(again.role, UserRole::User);
        assert_eq!(again.name.as_deref(), Some("Kai"));
        assert!(again.image.is_some());
    }

    #[tokio::test]
    async fn save_tool_enforces_expected_revision() {
        let (store, user) = seeded().await;
        let project = store.create_project(user.id, "Lanai").await.unwrap();

        let first = store
            .save_tool(project.id, ToolKey::PunchList, serde_json::json!({}), user.id, Some(0))
            .await
            .unwrap();
        assert_eq!(first.revision, 1);

        let stale = store
            .save_tool(project.id, ToolKey::PunchList, serde_json::json!({}), user.id, Some(0))
            .await;
        assert!(matches!(stale, Err(DatabaseError::Conflict(_))));

        let blind = store
            .save_tool(project.id, ToolKey::PunchList, serde_json::json!({}), user.id, None)
            .await
            .unwrap();
        assert_eq!(blind.revision, 2);
    }

    #[tokio::test]
    async fn create_project_adds_owner_membership() {
        let (store, user) = seeded().await;
        let project = store.create_project(user.id, "Kitchen").await.unwrap();
        let member = store.find_member(project.id, user.id).await.unwrap().unwrap();
        assert_eq!(member.role, MemberRole::Owner);
        assert_eq!(store.count_members(project.id).await.unwrap(), 1);

        let dup = store.insert_member(member.clone()).await;
        assert!(matches!(dup, Err(DatabaseError::Conflict(_))));
    }
}
