//! Articles, tags, collections, idea packs and reader feedback.

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::database::models::{Collection, Content, ContentFilter, Feedback, IdeaPack, Tag};
use crate::database::Store;
use crate::error::ApiError;
use crate::slug::slugify;
use crate::tools::mood_boards;
use crate::types::{ContentKind, ContentStatus};

pub const DEFAULT_PAGE: i64 = 20;
pub const MAX_PAGE: i64 = 100;
pub const MAX_FEEDBACK_COMMENT: usize = 2_000;
const MAX_TITLE: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct ContentInput {
    pub slug: Option<String>,
    pub kind: ContentKind,
    pub title: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status: Option<ContentStatus>,
    /// Tag names; missing tags are created
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionInput {
    pub slug: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub content_ids: Vec<Uuid>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdeaPackInput {
    pub slug: Option<String>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub ideas: Value,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackInput {
    pub helpful: bool,
    pub comment: Option<String>,
}

/// A published collection with its published items, in collection order
#[derive(Debug, Serialize)]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub items: Vec<Content>,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub kind: Option<ContentKind>,
    pub tag: Option<String>,
    pub status: Option<ContentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    fn into_filter(self) -> ContentFilter {
        ContentFilter {
            kind: self.kind,
            status: self.status,
            tag: self.tag.map(|t| slugify(&t)).filter(|t| !t.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

// ---- public ----

pub async fn list_published(store: &dyn Store, query: ListQuery) -> Result<Vec<Content>, ApiError> {
    let filter = ListQuery {
        status: Some(ContentStatus::Published),
        ..query
    }
    .into_filter();
    Ok(store.list_content(&filter).await?)
}

pub async fn get_published(store: &dyn Store, slug: &str) -> Result<Content, ApiError> {
    store
        .find_content_by_slug(slug)
        .await?
        .filter(Content::is_published)
        .ok_or_else(|| ApiError::not_found("Content not found"))
}

pub async fn published_collections(store: &dyn Store) -> Result<Vec<Collection>, ApiError> {
    Ok(store
        .list_collections()
        .await?
        .into_iter()
        .filter(|c| c.published)
        .collect())
}

pub async fn published_collection(store: &dyn Store, slug: &str) -> Result<CollectionView, ApiError> {
    let collection = store
        .find_collection_by_slug(slug)
        .await?
        .filter(|c| c.published)
        .ok_or_else(|| ApiError::not_found("Collection not found"))?;

    let items = try_join_all(collection.content_ids.iter().map(|id| store.find_content(*id)))
        .await?
        .into_iter()
        .flatten()
        .filter(Content::is_published)
        .collect();
    Ok(CollectionView { collection, items })
}

pub async fn published_idea_packs(store: &dyn Store) -> Result<Vec<IdeaPack>, ApiError> {
    Ok(store
        .list_idea_packs()
        .await?
        .into_iter()
        .filter(|p| p.published)
        .collect())
}

pub async fn submit_feedback(
    store: &dyn Store,
    slug: &str,
    user_id: Option<Uuid>,
    input: FeedbackInput,
) -> Result<Feedback, ApiError> {
    let content = get_published(store, slug).await?;
    let comment = input
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if comment.as_ref().is_some_and(|c| c.chars().count() > MAX_FEEDBACK_COMMENT) {
        return Err(ApiError::field(
            "comment",
            format!("must be at most {} characters", MAX_FEEDBACK_COMMENT),
        ));
    }
    let feedback = store
        .insert_feedback(Feedback {
            id: Uuid::new_v4(),
            content_id: content.id,
            user_id,
            helpful: input.helpful,
            comment,
            created_at: Utc::now(),
        })
        .await?;
    Ok(feedback)
}

// ---- staff ----

pub async fn list_all(store: &dyn Store, query: ListQuery) -> Result<Vec<Content>, ApiError> {
    Ok(store.list_content(&query.into_filter()).await?)
}

pub async fn get_by_id(store: &dyn Store, id: Uuid) -> Result<Content, ApiError> {
    store
        .find_content(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Content not found"))
}

pub async fn create_content(store: &dyn Store, author_id: Uuid, input: ContentInput) -> Result<Content, ApiError> {
    let title = required_title(&input.title)?;
    let slug = derive_slug(input.slug.as_deref(), &title)?;
    let tags = upsert_tags(store, &input.tags).await?;
    let status = input.status.unwrap_or(ContentStatus::Draft);
    let now = Utc::now();

    let content = store
        .insert_content(Content {
            id: Uuid::new_v4(),
            slug,
            kind: input.kind,
            title,
            summary: trimmed(input.summary),
            body: input.body,
            status,
            tags,
            author_id: Some(author_id),
            published_at: (status == ContentStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!("Content '{}' created as {}", content.slug, content.status);
    Ok(content)
}

pub async fn update_content(store: &dyn Store, id: Uuid, input: ContentInput) -> Result<Content, ApiError> {
    let existing = get_by_id(store, id).await?;
    let title = required_title(&input.title)?;
    let slug = match input.slug.as_deref() {
        Some(s) => derive_slug(Some(s), &title)?,
        None => existing.slug.clone(),
    };
    let tags = upsert_tags(store, &input.tags).await?;
    let status = input.status.unwrap_or(existing.status);
    let now = Utc::now();

    // First publication stamps the date; later edits keep it
    let published_at = match (status, existing.published_at) {
        (ContentStatus::Published, None) => Some(now),
        (_, at) => at,
    };

    let content = store
        .update_content(Content {
            slug,
            kind: input.kind,
            title,
            summary: trimmed(input.summary),
            body: input.body,
            status,
            tags,
            published_at,
            updated_at: now,
            ..existing
        })
        .await?;
    Ok(content)
}

pub async fn delete_content(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    store.delete_content(id).await?;
    info!("Content {} deleted", id);
    Ok(())
}

pub async fn create_tag(store: &dyn Store, name: &str) -> Result<Tag, ApiError> {
    let name = name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ApiError::field("name", "is required"));
    }
    Ok(store.upsert_tag(&slug, name).await?)
}

pub async fn delete_tag(store: &dyn Store, slug: &str) -> Result<(), ApiError> {
    Ok(store.delete_tag(slug).await?)
}

pub async fn create_collection(store: &dyn Store, input: CollectionInput) -> Result<Collection, ApiError> {
    let title = required_title(&input.title)?;
    let slug = derive_slug(input.slug.as_deref(), &title)?;
    check_content_ids(store, &input.content_ids).await?;
    let now = Utc::now();
    Ok(store
        .insert_collection(Collection {
            id: Uuid::new_v4(),
            slug,
            title,
            description: trimmed(input.description),
            content_ids: dedup(input.content_ids),
            published: input.published,
            created_at: now,
            updated_at: now,
        })
        .await?)
}

pub async fn update_collection(store: &dyn Store, id: Uuid, input: CollectionInput) -> Result<Collection, ApiError> {
    let existing = store
        .find_collection(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Collection not found"))?;
    let title = required_title(&input.title)?;
    let slug = match input.slug.as_deref() {
        Some(s) => derive_slug(Some(s), &title)?,
        None => existing.slug.clone(),
    };
    check_content_ids(store, &input.content_ids).await?;
    Ok(store
        .update_collection(Collection {
            slug,
            title,
            description: trimmed(input.description),
            content_ids: dedup(input.content_ids),
            published: input.published,
            updated_at: Utc::now(),
            ..existing
        })
        .await?)
}

pub async fn delete_collection(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    Ok(store.delete_collection(id).await?)
}

pub async fn create_idea_pack(store: &dyn Store, input: IdeaPackInput) -> Result<IdeaPack, ApiError> {
    let title = required_title(&input.title)?;
    let slug = derive_slug(input.slug.as_deref(), &title)?;
    let now = Utc::now();
    Ok(store
        .insert_idea_pack(IdeaPack {
            id: Uuid::new_v4(),
            slug,
            title,
            description: trimmed(input.description),
            ideas: coerce_pack_ideas(&input.ideas),
            published: input.published,
            created_at: now,
            updated_at: now,
        })
        .await?)
}

pub async fn update_idea_pack(store: &dyn Store, id: Uuid, input: IdeaPackInput) -> Result<IdeaPack, ApiError> {
    let existing = store
        .find_idea_pack(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Idea pack not found"))?;
    let title = required_title(&input.title)?;
    let slug = match input.slug.as_deref() {
        Some(s) => derive_slug(Some(s), &title)?,
        None => existing.slug.clone(),
    };
    Ok(store
        .update_idea_pack(IdeaPack {
            slug,
            title,
            description: trimmed(input.description),
            ideas: coerce_pack_ideas(&input.ideas),
            published: input.published,
            updated_at: Utc::now(),
            ..existing
        })
        .await?)
}

pub async fn delete_idea_pack(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    Ok(store.delete_idea_pack(id).await?)
}

/// Pack ideas use the mood-board idea shape
pub fn coerce_pack_ideas(raw: &Value) -> Value {
    let ideas = mood_boards::coerce_ideas(
        raw.as_array().map(Vec::as_slice).unwrap_or(&[]),
        mood_boards::MAX_IDEAS,
    );
    serde_json::to_value(ideas).unwrap_or_else(|_| Value::Array(Vec::new()))
}

/// Resolve tag names to slugs, creating missing tags
pub async fn upsert_tags(store: &dyn Store, names: &[String]) -> Result<Vec<String>, ApiError> {
    let mut slugs: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() || slugs.contains(&slug) {
            continue;
        }
        store.upsert_tag(&slug, name).await?;
        slugs.push(slug);
    }
    Ok(slugs)
}

fn derive_slug(explicit: Option<&str>, title: &str) -> Result<String, ApiError> {
    let slug = slugify(explicit.filter(|s| !s.trim().is_empty()).unwrap_or(title));
    if slug.is_empty() {
        return Err(ApiError::field("slug", "could not derive a slug"));
    }
    Ok(slug)
}

fn required_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::field("title", "is required"));
    }
    if title.chars().count() > MAX_TITLE {
        return Err(ApiError::field("title", format!("must be at most {} characters", MAX_TITLE)));
    }
    Ok(title.to_string())
}

async fn check_content_ids(store: &dyn Store, ids: &[Uuid]) -> Result<(), ApiError> {
    for id in ids {
        if store.find_content(*id).await?.is_none() {
            return Err(ApiError::field("content_ids", format!("unknown content {}", id)));
        }
    }
    Ok(())
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
