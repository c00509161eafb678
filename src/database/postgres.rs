use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::project::tool_access_serde;
use crate::database::models::{
    AllowListEntry, Collection, Content, ContentFilter, Feedback, IdeaPack, NewUser, Project,
    ProjectInvite, ProjectMember, ProjectUpdate, ShareSettings, ShareToken, SiteSettings, Tag,
    ToolAccess, ToolInstance, User,
};
use crate::database::store::{
    ContentStore, ProjectStore, SettingsStore, ShareStore, Store, StoreResult, ToolStore, UserStore,
};
use crate::types::{MemberRole, ProjectStatus, ToolKey, UserRole};

const USER_COLUMNS: &str =
    "id, email, name, image, role, current_project_id, created_at, updated_at, last_sign_in_at";
const PROJECT_COLUMNS: &str = "id, name, owner_id, status, created_at, updated_at";
const INVITE_COLUMNS: &str = "id, project_id, email, token_hash, tool_access, invited_by, created_at, \
     expires_at, accepted_at, accepted_by, revoked_at";
const SHARE_COLUMNS: &str = "id, token_hash, token_hint, project_id, tool_key, settings, created_by, \
     created_at, expires_at, revoked_at, view_count, last_viewed_at";
const CONTENT_COLUMNS: &str = "id, slug, kind, title, summary, body, status, tags, author_id, \
     published_at, created_at, updated_at";
const COLLECTION_COLUMNS: &str =
    "id, slug, title, description, content_ids, published, created_at, updated_at";
const IDEA_PACK_COLUMNS: &str =
    "id, slug, title, description, ideas, published, created_at, updated_at";

const SITE_SETTINGS_KEY: &str = "site";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|e| DatabaseError::CorruptRow(format!("{}: {}", column, e)))
}

/// Translate unique-constraint violations into Conflict
fn unique_conflict(err: sqlx::Error, what: &str) -> DatabaseError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::conflict(what.to_string()),
        _ => DatabaseError::Sqlx(err),
    }
}

fn user_from_row(row: &PgRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        image: row.try_get("image")?,
        role: parse_column::<UserRole>(row, "role")?,
        current_project_id: row.try_get("current_project_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_sign_in_at: row.try_get("last_sign_in_at")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<Project, DatabaseError> {
    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        owner_id: row.try_get("owner_id")?,
        status: parse_column::<ProjectStatus>(row, "status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Member columns are read with an `m_` prefix so they can be joined with projects or users
fn member_from_row(row: &PgRow) -> Result<ProjectMember, DatabaseError> {
    let access: Value = row.try_get("m_tool_access")?;
    Ok(ProjectMember {
        project_id: row.try_get("m_project_id")?,
        user_id: row.try_get("m_user_id")?,
        role: parse_column::<MemberRole>(row, "m_role")?,
        tool_access: tool_access_serde::from_value(&access),
        created_at: row.try_get("m_created_at")?,
    })
}

fn invite_from_row(row: &PgRow) -> Result<ProjectInvite, DatabaseError> {
    let access: Value = row.try_get("tool_access")?;
    Ok(ProjectInvite {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        email: row.try_get("email")?,
        token_hash: row.try_get("token_hash")?,
        tool_access: tool_access_serde::from_value(&access),
        invited_by: row.try_get("invited_by")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        accepted_at: row.try_get("accepted_at")?,
        accepted_by: row.try_get("accepted_by")?,
        revoked_at: row.try_get("revoked_at")?,
    })
}

fn tool_from_row(row: &PgRow) -> Result<ToolInstance, DatabaseError> {
    Ok(ToolInstance {
        project_id: row.try_get("project_id")?,
        tool_key: parse_column::<ToolKey>(row, "tool_key")?,
        payload: row.try_get("payload")?,
        revision: row.try_get("revision")?,
        updated_by: row.try_get("updated_by")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn share_from_row(row: &PgRow) -> Result<ShareToken, DatabaseError> {
    let settings: Value = row.try_get("settings")?;
    Ok(ShareToken {
        id: row.try_get("id")?,
        token_hash: row.try_get("token_hash")?,
        token_hint: row.try_get("token_hint")?,
        project_id: row.try_get("project_id")?,
        tool_key: parse_column::<ToolKey>(row, "tool_key")?,
        settings: serde_json::from_value::<ShareSettings>(settings).unwrap_or_default(),
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        revoked_at: row.try_get("revoked_at")?,
        view_count: row.try_get("view_count")?,
        last_viewed_at: row.try_get("last_viewed_at")?,
    })
}

fn content_from_row(row: &PgRow) -> Result<Content, DatabaseError> {
    Ok(Content {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        kind: parse_column(row, "kind")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        body: row.try_get("body")?,
        status: parse_column(row, "status")?,
        tags: row.try_get("tags")?,
        author_id: row.try_get("author_id")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collection_from_row(row: &PgRow) -> Result<Collection, DatabaseError> {
    Ok(Collection {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        content_ids: row.try_get("content_ids")?,
        published: row.try_get("published")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn idea_pack_from_row(row: &PgRow) -> Result<IdeaPack, DatabaseError> {
    Ok(IdeaPack {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        ideas: row.try_get("ideas")?,
        published: row.try_get("published")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn feedback_from_row(row: &PgRow) -> Result<Feedback, DatabaseError> {
    Ok(Feedback {
        id: row.try_get("id")?,
        content_id: row.try_get("content_id")?,
        user_id: row.try_get("user_id")?,
        helpful: row.try_get("helpful")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

fn allowlist_from_row(row: &PgRow) -> Result<AllowListEntry, DatabaseError> {
    Ok(AllowListEntry {
        email: row.try_get("email")?,
        note: row.try_get("note")?,
        added_by: row.try_get("added_by")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Row lock on the project; cap checks that follow in the same transaction are serialized
async fn lock_project(conn: &mut PgConnection, project_id: Uuid) -> StoreResult<()> {
    sqlx::query("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
        .bind(project_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("project"))?;
    Ok(())
}

fn collect<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> Result<T, DatabaseError>) -> StoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn upsert_user_on_sign_in(&self, new_user: NewUser) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, email, name, image, role, last_sign_in_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, users.name),
                image = COALESCE(EXCLUDED.image, users.image),
                last_sign_in_at = now(),
                updated_at = now()
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.image)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn set_current_project(&self, user_id: Uuid, project_id: Option<Uuid>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET current_project_id = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("user"));
        }
        Ok(())
    }

    async fn set_user_role(&self, user_id: Uuid, role: UserRole) -> StoreResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(user_from_row)
            .transpose()?
            .ok_or_else(|| DatabaseError::not_found("user"))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY created_at, email", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        collect(rows, user_from_row)
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project(&self, owner_id: Uuid, name: &str) -> StoreResult<Project> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "INSERT INTO projects (id, name, owner_id, status) VALUES ($1, $2, $3, 'ACTIVE') RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;
        let project = project_from_row(&row)?;

        sqlx::query(
            "INSERT INTO project_members (project_id, user_id, role, tool_access) VALUES ($1, $2, 'OWNER', '{}'::jsonb)",
        )
        .bind(project.id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let row = sqlx::query(&format!("SELECT {} FROM projects WHERE id = $1", PROJECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn update_project(&self, id: Uuid, update: ProjectUpdate) -> StoreResult<Project> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE projects SET
                name = COALESCE($2, name),
                status = COALESCE($3, status),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(project_from_row)
            .transpose()?
            .ok_or_else(|| DatabaseError::not_found("project"))
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<(Project, ProjectMember)>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.owner_id, p.status, p.created_at, p.updated_at,
                   m.project_id AS m_project_id, m.user_id AS m_user_id, m.role AS m_role,
                   m.tool_access AS m_tool_access, m.created_at AS m_created_at
            FROM project_members m
            JOIN projects p ON p.id = m.project_id
            WHERE m.user_id = $1
            ORDER BY p.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok((project_from_row(row)?, member_from_row(row)?)))
            .collect()
    }

    async fn find_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<Option<ProjectMember>> {
        let row = sqlx::query(
            r#"
            SELECT project_id AS m_project_id, user_id AS m_user_id, role AS m_role,
                   tool_access AS m_tool_access, created_at AS m_created_at
            FROM project_members
            WHERE project_id = $1 AND user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(member_from_row).transpose()
    }

    async fn list_members(&self, project_id: Uuid) -> StoreResult<Vec<(ProjectMember, User)>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.email, u.name, u.image, u.role, u.current_project_id,
                   u.created_at, u.updated_at, u.last_sign_in_at,
                   m.project_id AS m_project_id, m.user_id AS m_user_id, m.role AS m_role,
                   m.tool_access AS m_tool_access, m.created_at AS m_created_at
            FROM project_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = $1
            ORDER BY m.created_at
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok((member_from_row(row)?, user_from_row(row)?)))
            .collect()
    }

    async fn insert_member(&self, member: ProjectMember) -> StoreResult<ProjectMember> {
        sqlx::query(
            "INSERT INTO project_members (project_id, user_id, role, tool_access, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(member.project_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(tool_access_serde::to_value(&member.tool_access))
        .bind(member.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, "already a member of this project"))?;
        Ok(member)
    }

    async fn update_member_access(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        access: ToolAccess,
    ) -> StoreResult<ProjectMember> {
        let row = sqlx::query(
            r#"
            UPDATE project_members SET tool_access = $3
            WHERE project_id = $1 AND user_id = $2
            RETURNING project_id AS m_project_id, user_id AS m_user_id, role AS m_role,
                      tool_access AS m_tool_access, created_at AS m_created_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(tool_access_serde::to_value(&access))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(member_from_row)
            .transpose()?
            .ok_or_else(|| DatabaseError::not_found("member"))
    }

    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("member"));
        }
        sqlx::query("UPDATE users SET current_project_id = NULL WHERE id = $1 AND current_project_id = $2")
            .bind(user_id)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count_members(&self, project_id: Uuid) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_members WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn insert_invite(&self, invite: ProjectInvite, max_members: usize) -> StoreResult<ProjectInvite> {
        let mut tx = self.pool.begin().await?;
        lock_project(&mut tx, invite.project_id).await?;

        let seats: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM project_members WHERE project_id = $1)
                 + (SELECT COUNT(*) FROM project_invites
                    WHERE project_id = $1 AND accepted_at IS NULL AND revoked_at IS NULL AND expires_at > $2)
            "#,
        )
        .bind(invite.project_id)
        .bind(invite.created_at)
        .fetch_one(&mut *tx)
        .await?;
        if seats.max(0) as usize >= max_members {
            return Err(DatabaseError::LimitReached(max_members));
        }

        sqlx::query(
            r#"
            INSERT INTO project_invites
                (id, project_id, email, token_hash, tool_access, invited_by, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invite.id)
        .bind(invite.project_id)
        .bind(&invite.email)
        .bind(&invite.token_hash)
        .bind(tool_access_serde::to_value(&invite.tool_access))
        .bind(invite.invited_by)
        .bind(invite.created_at)
        .bind(invite.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "invite token collision"))?;

        tx.commit().await?;
        Ok(invite)
    }

    async fn find_invite(&self, id: Uuid) -> StoreResult<Option<ProjectInvite>> {
        let row = sqlx::query(&format!("SELECT {} FROM project_invites WHERE id = $1", INVITE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(invite_from_row).transpose()
    }

    async fn find_invite_by_hash(&self, token_hash: &str) -> StoreResult<Option<ProjectInvite>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM project_invites WHERE token_hash = $1",
            INVITE_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(invite_from_row).transpose()
    }

    async fn list_invites(&self, project_id: Uuid) -> StoreResult<Vec<ProjectInvite>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM project_invites WHERE project_id = $1 ORDER BY created_at DESC",
            INVITE_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, invite_from_row)
    }

    async fn count_pending_invites(&self, project_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM project_invites
            WHERE project_id = $1 AND accepted_at IS NULL AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(project_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as usize)
    }

    async fn accept_invite(
        &self,
        invite_id: Uuid,
        accepted_by: Uuid,
        member: Option<ProjectMember>,
        max_members: usize,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let marked = sqlx::query(
            "UPDATE project_invites SET accepted_at = $2, accepted_by = $3 WHERE id = $1 AND accepted_at IS NULL",
        )
        .bind(invite_id)
        .bind(now)
        .bind(accepted_by)
        .execute(&mut *tx)
        .await?;
        if marked.rows_affected() == 0 {
            return Err(DatabaseError::conflict("invite already accepted"));
        }

        if let Some(member) = member {
            lock_project(&mut tx, member.project_id).await?;
            let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_members WHERE project_id = $1")
                .bind(member.project_id)
                .fetch_one(&mut *tx)
                .await?;
            if members.max(0) as usize >= max_members {
                return Err(DatabaseError::LimitReached(max_members));
            }

            sqlx::query(
                "INSERT INTO project_members (project_id, user_id, role, tool_access, created_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(member.project_id)
            .bind(member.user_id)
            .bind(member.role.as_str())
            .bind(tool_access_serde::to_value(&member.tool_access))
            .bind(member.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_conflict(e, "already a member of this project"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn revoke_invite(&self, invite_id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE project_invites SET revoked_at = COALESCE(revoked_at, $2) WHERE id = $1",
        )
        .bind(invite_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("invite"));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolStore for PgStore {
    async fn find_tool(&self, project_id: Uuid, tool: ToolKey) -> StoreResult<Option<ToolInstance>> {
        let row = sqlx::query(
            r#"
            SELECT project_id, tool_key, payload, revision, updated_by, updated_at
            FROM tool_instances WHERE project_id = $1 AND tool_key = $2
            "#,
        )
        .bind(project_id)
        .bind(tool.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(tool_from_row).transpose()
    }

    async fn save_tool(
        &self,
        project_id: Uuid,
        tool: ToolKey,
        payload: Value,
        updated_by: Uuid,
        expected_revision: Option<i64>,
    ) -> StoreResult<ToolInstance> {
        let mut tx = self.pool.begin().await?;

        let row = match expected_revision {
            // Blind write: last writer wins
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO tool_instances (project_id, tool_key, payload, revision, updated_by, updated_at)
                    VALUES ($1, $2, $3, 1, $4, now())
                    ON CONFLICT (project_id, tool_key) DO UPDATE SET
                        payload = EXCLUDED.payload,
                        revision = tool_instances.revision + 1,
                        updated_by = EXCLUDED.updated_by,
                        updated_at = now()
                    RETURNING project_id, tool_key, payload, revision, updated_by, updated_at
                    "#,
                )
                .bind(project_id)
                .bind(tool.as_str())
                .bind(&payload)
                .bind(updated_by)
                .fetch_optional(&mut *tx)
                .await?
            }
            // First write: only succeeds while no row exists
            Some(0) => {
                sqlx::query(
                    r#"
                    INSERT INTO tool_instances (project_id, tool_key, payload, revision, updated_by, updated_at)
                    VALUES ($1, $2, $3, 1, $4, now())
                    ON CONFLICT (project_id, tool_key) DO NOTHING
                    RETURNING project_id, tool_key, payload, revision, updated_by, updated_at
                    "#,
                )
                .bind(project_id)
                .bind(tool.as_str())
                .bind(&payload)
                .bind(updated_by)
                .fetch_optional(&mut *tx)
                .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE tool_instances SET
                        payload = $3,
                        revision = revision + 1,
                        updated_by = $4,
                        updated_at = now()
                    WHERE project_id = $1 AND tool_key = $2 AND revision = $5
                    RETURNING project_id, tool_key, payload, revision, updated_by, updated_at
                    "#,
                )
                .bind(project_id)
                .bind(tool.as_str())
                .bind(&payload)
                .bind(updated_by)
                .bind(expected)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let Some(row) = row else {
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT revision FROM tool_instances WHERE project_id = $1 AND tool_key = $2",
            )
            .bind(project_id)
            .bind(tool.as_str())
            .fetch_optional(&mut *tx)
            .await?;
            return Err(DatabaseError::conflict(format!(
                "tool state is at revision {}, not {}",
                current.unwrap_or(0),
                expected_revision.unwrap_or(0)
            )));
        };
        let instance = tool_from_row(&row)?;

        sqlx::query("UPDATE projects SET updated_at = now() WHERE id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(instance)
    }
}

#[async_trait]
impl ShareStore for PgStore {
    async fn insert_share(&self, share: ShareToken, max_active: usize) -> StoreResult<ShareToken> {
        let mut tx = self.pool.begin().await?;
        lock_project(&mut tx, share.project_id).await?;

        let active: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM share_tokens
            WHERE project_id = $1 AND tool_key = $2 AND revoked_at IS NULL AND expires_at > $3
            "#,
        )
        .bind(share.project_id)
        .bind(share.tool_key.as_str())
        .bind(share.created_at)
        .fetch_one(&mut *tx)
        .await?;
        if active.max(0) as usize >= max_active {
            return Err(DatabaseError::LimitReached(max_active));
        }

        sqlx::query(
            r#"
            INSERT INTO share_tokens
                (id, token_hash, token_hint, project_id, tool_key, settings, created_by, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(share.id)
        .bind(&share.token_hash)
        .bind(&share.token_hint)
        .bind(share.project_id)
        .bind(share.tool_key.as_str())
        .bind(serde_json::to_value(&share.settings)?)
        .bind(share.created_by)
        .bind(share.created_at)
        .bind(share.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, "share token collision"))?;

        tx.commit().await?;
        Ok(share)
    }

    async fn find_share(&self, id: Uuid) -> StoreResult<Option<ShareToken>> {
        let row = sqlx::query(&format!("SELECT {} FROM share_tokens WHERE id = $1", SHARE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(share_from_row).transpose()
    }

    async fn find_share_by_hash(&self, token_hash: &str) -> StoreResult<Option<ShareToken>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM share_tokens WHERE token_hash = $1",
            SHARE_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(share_from_row).transpose()
    }

    async fn list_shares(&self, project_id: Uuid, tool: ToolKey) -> StoreResult<Vec<ShareToken>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM share_tokens WHERE project_id = $1 AND tool_key = $2 ORDER BY created_at DESC",
            SHARE_COLUMNS
        ))
        .bind(project_id)
        .bind(tool.as_str())
        .fetch_all(&self.pool)
        .await?;
        collect(rows, share_from_row)
    }

    async fn count_active_shares(&self, project_id: Uuid, tool: ToolKey, now: DateTime<Utc>) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM share_tokens
            WHERE project_id = $1 AND tool_key = $2 AND revoked_at IS NULL AND expires_at > $3
            "#,
        )
        .bind(project_id)
        .bind(tool.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as usize)
    }

    async fn revoke_share(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE share_tokens SET revoked_at = COALESCE(revoked_at, $2) WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("share link"));
        }
        Ok(())
    }

    async fn record_share_view(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE share_tokens SET view_count = view_count + 1, last_viewed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn insert_content(&self, content: Content) -> StoreResult<Content> {
        sqlx::query(
            r#"
            INSERT INTO content
                (id, slug, kind, title, summary, body, status, tags, author_id, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(content.id)
        .bind(&content.slug)
        .bind(content.kind.as_str())
        .bind(&content.title)
        .bind(&content.summary)
        .bind(&content.body)
        .bind(content.status.as_str())
        .bind(&content.tags)
        .bind(content.author_id)
        .bind(content.published_at)
        .bind(content.created_at)
        .bind(content.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, &format!("slug '{}' is taken", content.slug)))?;
        Ok(content)
    }

    async fn update_content(&self, content: Content) -> StoreResult<Content> {
        let result = sqlx::query(
            r#"
            UPDATE content SET
                slug = $2, kind = $3, title = $4, summary = $5, body = $6, status = $7,
                tags = $8, published_at = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(content.id)
        .bind(&content.slug)
        .bind(content.kind.as_str())
        .bind(&content.title)
        .bind(&content.summary)
        .bind(&content.body)
        .bind(content.status.as_str())
        .bind(&content.tags)
        .bind(content.published_at)
        .bind(content.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, &format!("slug '{}' is taken", content.slug)))?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("content"));
        }
        Ok(content)
    }

    async fn delete_content(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM content WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("content"));
        }
        sqlx::query("UPDATE collections SET content_ids = array_remove(content_ids, $1) WHERE $1 = ANY(content_ids)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_content(&self, id: Uuid) -> StoreResult<Option<Content>> {
        let row = sqlx::query(&format!("SELECT {} FROM content WHERE id = $1", CONTENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(content_from_row).transpose()
    }

    async fn find_content_by_slug(&self, slug: &str) -> StoreResult<Option<Content>> {
        let row = sqlx::query(&format!("SELECT {} FROM content WHERE slug = $1", CONTENT_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(content_from_row).transpose()
    }

    async fn list_content(&self, filter: &ContentFilter) -> StoreResult<Vec<Content>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM content
            WHERE ($1::TEXT IS NULL OR kind = $1)
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR $3 = ANY(tags))
            ORDER BY published_at DESC NULLS LAST, updated_at DESC
            LIMIT $4 OFFSET $5
            "#,
            CONTENT_COLUMNS
        ))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.tag.as_deref())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, content_from_row)
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let rows = sqlx::query("SELECT slug, name, created_at FROM tags ORDER BY lower(name)")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Tag {
                    slug: row.try_get("slug")?,
                    name: row.try_get("name")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn upsert_tag(&self, slug: &str, name: &str) -> StoreResult<Tag> {
        // DO UPDATE with a no-op so RETURNING yields the existing row
        let row = sqlx::query(
            r#"
            INSERT INTO tags (slug, name) VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING slug, name, created_at
            "#,
        )
        .bind(slug)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(Tag {
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn delete_tag(&self, slug: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM tags WHERE slug = $1")
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("tag"));
        }
        sqlx::query("UPDATE content SET tags = array_remove(tags, $1) WHERE $1 = ANY(tags)")
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_collection(&self, collection: Collection) -> StoreResult<Collection> {
        sqlx::query(
            r#"
            INSERT INTO collections (id, slug, title, description, content_ids, published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(collection.id)
        .bind(&collection.slug)
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(&collection.content_ids)
        .bind(collection.published)
        .bind(collection.created_at)
        .bind(collection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, &format!("slug '{}' is taken", collection.slug)))?;
        Ok(collection)
    }

    async fn update_collection(&self, collection: Collection) -> StoreResult<Collection> {
        let result = sqlx::query(
            r#"
            UPDATE collections SET
                slug = $2, title = $3, description = $4, content_ids = $5, published = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(collection.id)
        .bind(&collection.slug)
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(&collection.content_ids)
        .bind(collection.published)
        .bind(collection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, &format!("slug '{}' is taken", collection.slug)))?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("collection"));
        }
        Ok(collection)
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("collection"));
        }
        Ok(())
    }

    async fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        let row = sqlx::query(&format!("SELECT {} FROM collections WHERE id = $1", COLLECTION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(collection_from_row).transpose()
    }

    async fn find_collection_by_slug(&self, slug: &str) -> StoreResult<Option<Collection>> {
        let row = sqlx::query(&format!("SELECT {} FROM collections WHERE slug = $1", COLLECTION_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(collection_from_row).transpose()
    }

    async fn list_collections(&self) -> StoreResult<Vec<Collection>> {
        let rows = sqlx::query(&format!("SELECT {} FROM collections ORDER BY title", COLLECTION_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        collect(rows, collection_from_row)
    }

    async fn insert_idea_pack(&self, pack: IdeaPack) -> StoreResult<IdeaPack> {
        sqlx::query(
            r#"
            INSERT INTO idea_packs (id, slug, title, description, ideas, published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(pack.id)
        .bind(&pack.slug)
        .bind(&pack.title)
        .bind(&pack.description)
        .bind(&pack.ideas)
        .bind(pack.published)
        .bind(pack.created_at)
        .bind(pack.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, &format!("slug '{}' is taken", pack.slug)))?;
        Ok(pack)
    }

    async fn update_idea_pack(&self, pack: IdeaPack) -> StoreResult<IdeaPack> {
        let result = sqlx::query(
            r#"
            UPDATE idea_packs SET
                slug = $2, title = $3, description = $4, ideas = $5, published = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(pack.id)
        .bind(&pack.slug)
        .bind(&pack.title)
        .bind(&pack.description)
        .bind(&pack.ideas)
        .bind(pack.published)
        .bind(pack.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, &format!("slug '{}' is taken", pack.slug)))?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("idea pack"));
        }
        Ok(pack)
    }

    async fn delete_idea_pack(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM idea_packs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("idea pack"));
        }
        Ok(())
    }

    async fn find_idea_pack(&self, id: Uuid) -> StoreResult<Option<IdeaPack>> {
        let row = sqlx::query(&format!("SELECT {} FROM idea_packs WHERE id = $1", IDEA_PACK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(idea_pack_from_row).transpose()
    }

    async fn find_idea_pack_by_slug(&self, slug: &str) -> StoreResult<Option<IdeaPack>> {
        let row = sqlx::query(&format!("SELECT {} FROM idea_packs WHERE slug = $1", IDEA_PACK_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(idea_pack_from_row).transpose()
    }

    async fn list_idea_packs(&self) -> StoreResult<Vec<IdeaPack>> {
        let rows = sqlx::query(&format!("SELECT {} FROM idea_packs ORDER BY title", IDEA_PACK_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        collect(rows, idea_pack_from_row)
    }

    async fn insert_feedback(&self, feedback: Feedback) -> StoreResult<Feedback> {
        sqlx::query(
            "INSERT INTO feedback (id, content_id, user_id, helpful, comment, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(feedback.id)
        .bind(feedback.content_id)
        .bind(feedback.user_id)
        .bind(feedback.helpful)
        .bind(&feedback.comment)
        .bind(feedback.created_at)
        .execute(&self.pool)
        .await?;
        Ok(feedback)
    }

    async fn list_feedback(&self, content_id: Option<Uuid>) -> StoreResult<Vec<Feedback>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content_id, user_id, helpful, comment, created_at FROM feedback
            WHERE ($1::UUID IS NULL OR content_id = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, feedback_from_row)
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn get_settings(&self) -> StoreResult<SiteSettings> {
        let row = sqlx::query("SELECT value, updated_at FROM site_settings WHERE key = $1")
            .bind(SITE_SETTINGS_KEY)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(SiteSettings::default());
        };
        let value: Value = row.try_get("value")?;
        let mut settings: SiteSettings = serde_json::from_value(value)?;
        settings.updated_at = row.try_get("updated_at")?;
        Ok(settings)
    }

    async fn save_settings(&self, settings: SiteSettings) -> StoreResult<SiteSettings> {
        let row = sqlx::query(
            r#"
            INSERT INTO site_settings (key, value, updated_at) VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            RETURNING updated_at
            "#,
        )
        .bind(SITE_SETTINGS_KEY)
        .bind(serde_json::to_value(&settings)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(SiteSettings {
            updated_at: row.try_get("updated_at")?,
            ..settings
        })
    }

    async fn list_allowlist(&self) -> StoreResult<Vec<AllowListEntry>> {
        let rows = sqlx::query("SELECT email, note, added_by, created_at FROM allowlist ORDER BY email")
            .fetch_all(&self.pool)
            .await?;
        collect(rows, allowlist_from_row)
    }

    async fn add_allowlist(&self, entry: AllowListEntry) -> StoreResult<AllowListEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO allowlist (email, note, added_by, created_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE SET note = COALESCE(EXCLUDED.note, allowlist.note)
            RETURNING email, note, added_by, created_at
            "#,
        )
        .bind(&entry.email)
        .bind(&entry.note)
        .bind(entry.added_by)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;
        allowlist_from_row(&row)
    }

    async fn remove_allowlist(&self, email: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM allowlist WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("allowlist entry"));
        }
        Ok(())
    }

    async fn is_allowlisted(&self, email: &str) -> StoreResult<bool> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM allowlist WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
