//! E-booklet library: publication, uploads and download counting.
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use std::collections::BTreeMap;

use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::domain::validation::{self, nullable};
use crate::domain::{DomainError, FieldErrors, Page, PageRequest};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::storage::{MediaStorage, UploadKind};
use crate::models::ebooklet::{self, EbookletDto, Entity as Ebooklet};
use crate::models::{clean_list, to_json_list};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EbookletFilter {
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub tag: Option<String>,
    pub search: Option<String>,
    /// Only honoured for admins; everyone else sees published entries.
    pub published: Option<bool>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EbookletInput {
    pub title: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub authors: Option<Vec<String>>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub file_url: String,
    pub download_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopDownload {
    pub id: i32,
    pub title: String,
    pub download_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EbookletAnalytics {
    pub total: u64,
    pub published: u64,
    pub featured: u64,
    pub total_views: i64,
    pub total_downloads: i64,
    pub by_category: BTreeMap<String, u64>,
    pub top_downloads: Vec<TopDownload>,
}

fn validate_input(input: &EbookletInput, partial: bool) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();

    match &input.title {
        Some(title) => validation::required_text(&mut errors, "title", title, 255),
        None if !partial => errors.add("title", validation::REQUIRED),
        None => {}
    }
    match &input.category {
        Some(category) => validation::required_text(&mut errors, "category", category, 100),
        None if !partial => errors.add("category", validation::REQUIRED),
        None => {}
    }
    if let Some(Some(description)) = &input.description {
        validation::optional_text(
            &mut errors,
            "description",
            Some(description.as_str()),
            10_000,
        );
    }
    if let Some(authors) = &input.authors
        && authors.iter().any(|a| a.chars().count() > 255)
    {
        errors.add("authors", "Author names must not exceed 255 characters.");
    }

    errors.into_result()
}

fn apply_input(active: &mut ebooklet::ActiveModel, input: EbookletInput, was_published: bool) {
    if let Some(title) = input.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = input.description {
        active.description = Set(description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()));
    }
    if let Some(authors) = input.authors {
        active.authors = Set(to_json_list(&clean_list(&authors)));
    }
    if let Some(category) = input.category {
        active.category = Set(category.trim().to_string());
    }
    if let Some(tags) = input.tags {
        active.tags = Set(to_json_list(&clean_list(&tags)));
    }
    if let Some(featured) = input.is_featured {
        active.is_featured = Set(featured);
    }
    if let Some(published) = input.is_published {
        active.is_published = Set(published);
        // The first publication date sticks, later unpublish/publish cycles keep it
        if published && !was_published {
            let stamped = matches!(
                &active.published_at,
                ActiveValue::Set(Some(_)) | ActiveValue::Unchanged(Some(_))
            );
            if !stamped {
                active.published_at = Set(Some(super::now()));
            }
        }
    }
}

/// Admins see everything; other callers only published entries.
async fn find_visible(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    id: i32,
) -> Result<ebooklet::Model, DomainError> {
    let model = Ebooklet::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    if model.is_published || claims.is_some_and(Claims::is_admin) {
        Ok(model)
    } else {
        Err(DomainError::NotFound)
    }
}

async fn find_for_admin(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<ebooklet::Model, DomainError> {
    claims.require_admin()?;
    Ebooklet::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)
}

pub async fn list_ebooklets(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    filter: EbookletFilter,
) -> Result<Page<EbookletDto>, DomainError> {
    let mut query = Ebooklet::find();

    if claims.is_some_and(Claims::is_admin) {
        if let Some(published) = filter.published {
            query = query.filter(ebooklet::Column::IsPublished.eq(published));
        }
    } else {
        query = query.filter(ebooklet::Column::IsPublished.eq(true));
    }

    if let Some(category) = filter.category.as_deref().map(str::trim)
        && !category.is_empty()
    {
        query = query.filter(ebooklet::Column::Category.eq(category));
    }
    if let Some(featured) = filter.featured {
        query = query.filter(ebooklet::Column::IsFeatured.eq(featured));
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim)
        && !tag.is_empty()
    {
        query = query.filter(ebooklet::Column::Tags.contains(format!("\"{}\"", tag)));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
        && !search.is_empty()
    {
        query = query.filter(
            Condition::any()
                .add(ebooklet::Column::Title.contains(search))
                .add(ebooklet::Column::Description.contains(search))
                .add(ebooklet::Column::Authors.contains(search)),
        );
    }

    let page = PageRequest::new(filter.page, filter.page_size);
    let results = super::fetch_page(
        db,
        query
            .order_by_desc(ebooklet::Column::CreatedAt)
            .order_by_desc(ebooklet::Column::Id),
        page,
    )
    .await?;

    Ok(results.map(EbookletDto::from))
}

pub async fn get_ebooklet(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    id: i32,
) -> Result<EbookletDto, DomainError> {
    find_visible(db, claims, id).await?;
    super::increment::<Ebooklet, _>(db, ebooklet::Column::Id, ebooklet::Column::ViewCount, id)
        .await?;
    let model = find_visible(db, claims, id).await?;
    Ok(EbookletDto::from(model))
}

pub async fn create_ebooklet(
    db: &DatabaseConnection,
    claims: &Claims,
    input: EbookletInput,
) -> Result<EbookletDto, DomainError> {
    claims.require_admin()?;
    validate_input(&input, false)?;

    let now = super::now();
    let mut active = ebooklet::ActiveModel {
        description: Set(None),
        authors: Set("[]".to_string()),
        tags: Set("[]".to_string()),
        cover_url: Set(None),
        file_url: Set(None),
        file_size: Set(None),
        is_featured: Set(false),
        is_published: Set(false),
        view_count: Set(0),
        download_count: Set(0),
        published_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_input(&mut active, input, false);

    let model = active.insert(db).await?;
    tracing::info!("Ebooklet {} created", model.id);
    Ok(EbookletDto::from(model))
}

pub async fn update_ebooklet(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    input: EbookletInput,
    partial: bool,
) -> Result<EbookletDto, DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    validate_input(&input, partial)?;

    let was_published = model.is_published;
    let mut active: ebooklet::ActiveModel = model.into();
    apply_input(&mut active, input, was_published);
    active.updated_at = Set(super::now());

    Ok(EbookletDto::from(active.update(db).await?))
}

pub async fn delete_ebooklet(
    db: &DatabaseConnection,
    storage: &MediaStorage,
    claims: &Claims,
    id: i32,
) -> Result<(), DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    let files: Vec<String> = [model.cover_url.clone(), model.file_url.clone()]
        .into_iter()
        .flatten()
        .collect();
    model.delete(db).await?;

    for url in files {
        storage.remove(&url).await;
    }
    tracing::info!("Ebooklet {} deleted", id);
    Ok(())
}

pub async fn toggle_featured(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<EbookletDto, DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    let featured = !model.is_featured;

    let mut active: ebooklet::ActiveModel = model.into();
    active.is_featured = Set(featured);
    active.updated_at = Set(super::now());
    Ok(EbookletDto::from(active.update(db).await?))
}

pub async fn upload_file(
    db: &DatabaseConnection,
    storage: &MediaStorage,
    claims: &Claims,
    id: i32,
    filename: &str,
    data: &[u8],
) -> Result<EbookletDto, DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    let stored = storage.save(UploadKind::EbookletFile, filename, data).await?;
    let previous = model.file_url.clone();

    let mut active: ebooklet::ActiveModel = model.into();
    active.file_url = Set(Some(stored.url));
    active.file_size = Set(Some(stored.size));
    active.updated_at = Set(super::now());
    let model = active.update(db).await?;

    if let Some(url) = previous {
        storage.remove(&url).await;
    }
    Ok(EbookletDto::from(model))
}

pub async fn upload_cover(
    db: &DatabaseConnection,
    storage: &MediaStorage,
    claims: &Claims,
    id: i32,
    filename: &str,
    data: &[u8],
) -> Result<EbookletDto, DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    let stored = storage.save(UploadKind::EbookletCover, filename, data).await?;
    let previous = model.cover_url.clone();

    let mut active: ebooklet::ActiveModel = model.into();
    active.cover_url = Set(Some(stored.url));
    active.updated_at = Set(super::now());
    let model = active.update(db).await?;

    if let Some(url) = previous {
        storage.remove(&url).await;
    }
    Ok(EbookletDto::from(model))
}

pub async fn download(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    id: i32,
) -> Result<DownloadLink, DomainError> {
    let model = find_visible(db, claims, id).await?;
    if model.file_url.is_none() {
        return Err(DomainError::NotFound);
    }

    super::increment::<Ebooklet, _>(db, ebooklet::Column::Id, ebooklet::Column::DownloadCount, id)
        .await?;
    let model = find_visible(db, claims, id).await?;

    Ok(DownloadLink {
        file_url: model.file_url.unwrap_or_default(),
        download_count: model.download_count,
    })
}

pub async fn analytics(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<EbookletAnalytics, DomainError> {
    claims.require_admin()?;

    let total = Ebooklet::find().count(db).await?;
    let published = Ebooklet::find()
        .filter(ebooklet::Column::IsPublished.eq(true))
        .count(db)
        .await?;
    let featured = Ebooklet::find()
        .filter(ebooklet::Column::IsFeatured.eq(true))
        .count(db)
        .await?;
    let total_views = super::sum_of(db, Ebooklet::find(), ebooklet::Column::ViewCount).await?;
    let total_downloads =
        super::sum_of(db, Ebooklet::find(), ebooklet::Column::DownloadCount).await?;
    let by_category = super::count_by(db, Ebooklet::find(), ebooklet::Column::Category).await?;

    let top_downloads = Ebooklet::find()
        .order_by_desc(ebooklet::Column::DownloadCount)
        .order_by_asc(ebooklet::Column::Id)
        .limit(5)
        .all(db)
        .await?
        .into_iter()
        .map(|e| TopDownload {
            id: e.id,
            title: e.title,
            download_count: e.download_count,
        })
        .collect();

    Ok(EbookletAnalytics {
        total,
        published,
        featured,
        total_views,
        total_downloads,
        by_category,
        top_downloads,
    })
}
