//! Content bundle export and import in JSON or YAML.
//!
//! Bundles reference content by slug, never by id, so they move cleanly between
//! environments. Import upserts by slug.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::{Collection, Content, ContentFilter, IdeaPack};
use crate::database::Store;
use crate::error::ApiError;
use crate::services::content::{coerce_pack_ideas, upsert_tags};
use crate::slug::slugify;
use crate::types::{ContentKind, ContentStatus};

pub const BUNDLE_VERSION: u32 = 1;
const EXPORT_PAGE: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    Json,
    Yaml,
}

impl TransferFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            TransferFormat::Json => "application/json",
            TransferFormat::Yaml => "application/yaml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TransferFormat::Json => "json",
            TransferFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for TransferFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(TransferFormat::Json),
            "yaml" | "yml" => Ok(TransferFormat::Yaml),
            other => Err(ApiError::field("format", format!("unsupported format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub version: u32,
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(default)]
    pub content: Vec<ContentRecord>,
    #[serde(default)]
    pub collections: Vec<CollectionRecord>,
    #[serde(default)]
    pub idea_packs: Vec<IdeaPackRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub slug: String,
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub body: String,
    pub status: ContentStatus,
    /// Tag names or slugs
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Content slugs, in order
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaPackRecord {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ideas: Value,
    #[serde(default)]
    pub published: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

pub async fn export(store: &dyn Store) -> Result<Bundle, ApiError> {
    let tags = store
        .list_tags()
        .await?
        .into_iter()
        .map(|t| TagRecord { slug: t.slug, name: t.name })
        .collect();

    let mut content = Vec::new();
    let mut offset = 0;
    loop {
        let page = store
            .list_content(&ContentFilter {
                limit: EXPORT_PAGE,
                offset,
                ..Default::default()
            })
            .await?;
        let len = page.len() as i64;
        content.extend(page);
        if len < EXPORT_PAGE {
            break;
        }
        offset += len;
    }

    let slug_of = |id: &Uuid| content.iter().find(|c: &&Content| c.id == *id).map(|c| c.slug.clone());
    let collections = store
        .list_collections()
        .await?
        .into_iter()
        .map(|c| CollectionRecord {
            content: c.content_ids.iter().filter_map(|id| slug_of(id)).collect(),
            slug: c.slug,
            title: c.title,
            description: c.description,
            published: c.published,
        })
        .collect();

    let idea_packs = store
        .list_idea_packs()
        .await?
        .into_iter()
        .map(|p| IdeaPackRecord {
            slug: p.slug,
            title: p.title,
            description: p.description,
            ideas: p.ideas,
            published: p.published,
        })
        .collect();

    let content = content
        .into_iter()
        .map(|c| ContentRecord {
            slug: c.slug,
            kind: c.kind,
            title: c.title,
            summary: c.summary,
            body: c.body,
            status: c.status,
            tags: c.tags,
            published_at: c.published_at,
        })
        .collect();

    Ok(Bundle {
        version: BUNDLE_VERSION,
        exported_at: Some(Utc::now()),
        tags,
        content,
        collections,
        idea_packs,
    })
}

pub fn serialize(bundle: &Bundle, format: TransferFormat) -> Result<String, ApiError> {
    match format {
        TransferFormat::Json => serde_json::to_string_pretty(bundle)
            .map_err(|e| ApiError::internal_server_error(format!("Failed to write bundle: {}", e))),
        TransferFormat::Yaml => serde_yaml::to_string(bundle)
            .map_err(|e| ApiError::internal_server_error(format!("Failed to write bundle: {}", e))),
    }
}

pub fn parse(body: &str, format: TransferFormat) -> Result<Bundle, ApiError> {
    let bundle: Bundle = match format {
        TransferFormat::Json => serde_json::from_str(body).map_err(|e| ApiError::invalid_json(e.to_string()))?,
        TransferFormat::Yaml => {
            serde_yaml::from_str(body).map_err(|e| ApiError::bad_request(format!("Invalid YAML: {}", e)))?
        }
    };
    if bundle.version != BUNDLE_VERSION {
        return Err(ApiError::field(
            "version",
            format!("unsupported bundle version {}", bundle.version),
        ));
    }
    Ok(bundle)
}

/// Upsert everything in the bundle by slug. Bad records are reported, not fatal.
pub async fn import(store: &dyn Store, author_id: Uuid, bundle: Bundle) -> Result<ImportReport, ApiError> {
    let mut report = ImportReport::default();
    let now = Utc::now();

    for tag in &bundle.tags {
        let slug = slugify(if tag.slug.is_empty() { &tag.name } else { &tag.slug });
        if slug.is_empty() {
            report.errors.push(format!("tag '{}': empty slug", tag.name));
            continue;
        }
        store.upsert_tag(&slug, tag.name.trim()).await?;
    }

    for record in bundle.content {
        let slug = slugify(&record.slug);
        if slug.is_empty() || record.title.trim().is_empty() {
            report.errors.push(format!("content '{}': slug and title are required", record.slug));
            continue;
        }
        let tags = upsert_tags(store, &record.tags).await?;
        let published_at = match record.status {
            ContentStatus::Published => record.published_at.or(Some(now)),
            ContentStatus::Draft => record.published_at,
        };

        match store.find_content_by_slug(&slug).await? {
            Some(existing) => {
                let next = Content {
                    kind: record.kind,
                    title: record.title.trim().to_string(),
                    summary: record.summary,
                    body: record.body,
                    status: record.status,
                    tags,
                    published_at: existing.published_at.or(published_at),
                    updated_at: now,
                    ..existing.clone()
                };
                if same_content(&existing, &next) {
                    report.skipped += 1;
                    continue;
                }
                store.update_content(next).await?;
                report.updated += 1;
            }
            None => {
                store
                    .insert_content(Content {
                        id: Uuid::new_v4(),
                        slug,
                        kind: record.kind,
                        title: record.title.trim().to_string(),
                        summary: record.summary,
                        body: record.body,
                        status: record.status,
                        tags,
                        author_id: Some(author_id),
                        published_at,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                report.created += 1;
            }
        }
    }

    for record in bundle.collections {
        let slug = slugify(&record.slug);
        if slug.is_empty() || record.title.trim().is_empty() {
            report.errors.push(format!("collection '{}': slug and title are required", record.slug));
            continue;
        }
        let mut content_ids = Vec::new();
        for content_slug in &record.content {
            match store.find_content_by_slug(&slugify(content_slug)).await? {
                Some(c) if !content_ids.contains(&c.id) => content_ids.push(c.id),
                Some(_) => {}
                None => report
                    .errors
                    .push(format!("collection '{}': unknown content '{}'", slug, content_slug)),
            }
        }

        match store.find_collection_by_slug(&slug).await? {
            Some(existing) => {
                if existing.title == record.title.trim()
                    && existing.description == record.description
                    && existing.content_ids == content_ids
                    && existing.published == record.published
                {
                    report.skipped += 1;
                    continue;
                }
                store
                    .update_collection(Collection {
                        title: record.title.trim().to_string(),
                        description: record.description,
                        content_ids,
                        published: record.published,
                        updated_at: now,
                        ..existing
                    })
                    .await?;
                report.updated += 1;
            }
            None => {
                store
                    .insert_collection(Collection {
                        id: Uuid::new_v4(),
                        slug,
                        title: record.title.trim().to_string(),
                        description: record.description,
                        content_ids,
                        published: record.published,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                report.created += 1;
            }
        }
    }

    for record in bundle.idea_packs {
        let slug = slugify(&record.slug);
        if slug.is_empty() || record.title.trim().is_empty() {
            report.errors.push(format!("idea pack '{}': slug and title are required", record.slug));
            continue;
        }
        let ideas = coerce_pack_ideas(&record.ideas);
        match store.find_idea_pack_by_slug(&slug).await? {
            Some(existing) => {
                store
                    .update_idea_pack(IdeaPack {
                        title: record.title.trim().to_string(),
                        description: record.description,
                        ideas,
                        published: record.published,
                        updated_at: now,
                        ..existing
                    })
                    .await?;
                report.updated += 1;
            }
            None => {
                store
                    .insert_idea_pack(IdeaPack {
                        id: Uuid::new_v4(),
                        slug,
                        title: record.title.trim().to_string(),
                        description: record.description,
                        ideas,
                        published: record.published,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                report.created += 1;
            }
        }
    }

    if report.errors.is_empty() {
        info!(
            "Import finished: {} created, {} updated, {} skipped",
            report.created, report.updated, report.skipped
        );
    } else {
        warn!(
            "Import finished with {} errors: {} created, {} updated, {} skipped",
            report.errors.len(),
            report.created,
            report.updated,
            report.skipped
        );
    }
    Ok(report)
}

fn same_content(a: &Content, b: &Content) -> bool {
    a.kind == b.kind
        && a.title == b.title
        && a.summary == b.summary
        && a.body == b.body
        && a.status == b.status
        && a.tags == b.tags
        && a.published_at == b.published_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::store::ContentStore;
    use crate::database::MemoryStore;
    use crate::services::content::{create_collection, create_content, CollectionInput, ContentInput};

    #[tokio::test]
    async fn yaml_round_trip_between_stores() {
        let source = MemoryStore::new();
        let author = Uuid::new_v4();
        let article = create_content(
            &source,
            author,
            ContentInput {
                slug: None,
                kind: ContentKind::Guide,
                title: "Permitting on Maui".into(),
                summary: Some("County rules".into()),
                body: "Start early.".into(),
                status: Some(ContentStatus::Published),
                tags: vec!["Permits".into()],
            },
        )
        .await
        .unwrap();
        create_collection(
            &source,
            CollectionInput {
                slug: None,
                title: "Before you build".into(),
                description: None,
                content_ids: vec![article.id],
                published: true,
            },
        )
        .await
        .unwrap();

        let text = serialize(&export(&source).await.unwrap(), TransferFormat::Yaml).unwrap();
        assert!(text.contains("permitting-on-maui"));

        let target = MemoryStore::new();
        let report = import(&target, author, parse(&text, TransferFormat::Yaml).unwrap())
            .await
            .unwrap();
        assert_eq!(report.created, 2);
        assert!(report.errors.is_empty());

        let copied = target.find_content_by_slug("permitting-on-maui").await.unwrap().unwrap();
        assert_eq!(copied.tags, vec!["permits"]);
        assert_eq!(copied.published_at, article.published_at);
        let collection = target.find_collection_by_slug("before-you-build").await.unwrap().unwrap();
        assert_eq!(collection.content_ids, vec![copied.id]);

        // Importing the same bundle again changes nothing
        let again = import(&target, author, parse(&text, TransferFormat::Yaml).unwrap())
            .await
            .unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.skipped, 2);
    }

    #[test]
    fn rejects_unknown_versions_and_formats() {
        assert!(parse(r#"{"version": 2, "exported_at": null}"#, TransferFormat::Json).is_err());
        assert!("xml".parse::<TransferFormat>().is_err());
        assert_eq!("YML".parse::<TransferFormat>().unwrap(), TransferFormat::Yaml);
    }

    #[tokio::test]
    async fn bad_records_are_reported() {
        let store = MemoryStore::new();
        let bundle = parse(
            r#"{"version": 1, "exported_at": null,
                "content": [{"slug": "", "kind": "ARTICLE", "title": "x", "status": "DRAFT"}],
                "collections": [{"slug": "c", "title": "C", "content": ["ghost"]}]}"#,
            TransferFormat::Json,
        )
        .unwrap();
        let report = import(&store, Uuid::new_v4(), bundle).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 2);
    }
}
