//! Journal watch: curated summaries of published articles.
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use std::collections::BTreeMap;

use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::domain::validation::{self, nullable};
use crate::domain::{DomainError, FieldErrors, Page, PageRequest};
use crate::infrastructure::auth::Claims;
use crate::models::journal_watch::{self, Entity as JournalWatch, JournalWatchDto};
use crate::models::{clean_list, to_json_list, user};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JournalWatchFilter {
    pub category: Option<String>,
    pub journal: Option<String>,
    pub keyword: Option<String>,
    pub year: Option<i32>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub published: Option<bool>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JournalWatchInput {
    pub title: Option<String>,
    pub journal_name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub publication_date: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub doi: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub article_url: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub summary: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub commentary: Option<Option<String>>,
    pub authors: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub category: Option<String>,
    pub is_featured: Option<bool>,
    pub is_published: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub reviewer_id: Option<Option<i32>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalCount {
    pub journal_name: String,
    pub entries: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalWatchAnalytics {
    pub total: u64,
    pub published: u64,
    pub total_views: i64,
    pub by_category: BTreeMap<String, u64>,
    pub top_journals: Vec<JournalCount>,
}

async fn validate_input(
    db: &DatabaseConnection,
    input: &JournalWatchInput,
    partial: bool,
) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();

    match &input.title {
        Some(title) => validation::required_text(&mut errors, "title", title, 500),
        None if !partial => errors.add("title", validation::REQUIRED),
        None => {}
    }
    match &input.journal_name {
        Some(name) => validation::required_text(&mut errors, "journalName", name, 255),
        None if !partial => errors.add("journalName", validation::REQUIRED),
        None => {}
    }
    match &input.category {
        Some(category) => validation::required_text(&mut errors, "category", category, 100),
        None if !partial => errors.add("category", validation::REQUIRED),
        None => {}
    }
    if let Some(date) = &input.publication_date {
        validation::optional_date(&mut errors, "publicationDate", date.as_deref());
    }
    if let Some(Some(doi)) = &input.doi
        && !doi.trim().is_empty()
        && !validation::is_valid_doi(doi.trim())
    {
        errors.add("doi", "Enter a valid DOI (e.g. 10.1000/xyz123).");
    }
    if let Some(Some(url)) = &input.article_url
        && !url.trim().is_empty()
        && !validation::is_http_url(url.trim())
    {
        errors.add("articleUrl", "Enter a valid URL.");
    }
    if let Some(Some(reviewer_id)) = input.reviewer_id
        && user::Entity::find_by_id(reviewer_id).one(db).await?.is_none()
    {
        errors.add("reviewerId", "Invalid reviewer.");
    }

    errors.into_result()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn apply_input(active: &mut journal_watch::ActiveModel, input: JournalWatchInput) {
    if let Some(title) = input.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(name) = input.journal_name {
        active.journal_name = Set(name.trim().to_string());
    }
    if let Some(date) = input.publication_date {
        active.publication_date = Set(trimmed(date));
    }
    if let Some(doi) = input.doi {
        active.doi = Set(trimmed(doi));
    }
    if let Some(url) = input.article_url {
        active.article_url = Set(trimmed(url));
    }
    if let Some(summary) = input.summary {
        active.summary = Set(trimmed(summary));
    }
    if let Some(commentary) = input.commentary {
        active.commentary = Set(trimmed(commentary));
    }
    if let Some(authors) = input.authors {
        active.authors = Set(to_json_list(&clean_list(&authors)));
    }
    if let Some(keywords) = input.keywords {
        active.keywords = Set(to_json_list(&clean_list(&keywords)));
    }
    if let Some(category) = input.category {
        active.category = Set(category.trim().to_string());
    }
    if let Some(featured) = input.is_featured {
        active.is_featured = Set(featured);
    }
    if let Some(published) = input.is_published {
        active.is_published = Set(published);
    }
    if let Some(reviewer_id) = input.reviewer_id {
        active.reviewer_id = Set(reviewer_id);
    }
}

async fn find_visible(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    id: i32,
) -> Result<journal_watch::Model, DomainError> {
    let model = JournalWatch::find_by_id(id)
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
) -> Result<journal_watch::Model, DomainError> {
    claims.require_admin()?;
    JournalWatch::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)
}

pub async fn list_entries(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    filter: JournalWatchFilter,
) -> Result<Page<JournalWatchDto>, DomainError> {
    let mut query = JournalWatch::find();

    if claims.is_some_and(Claims::is_admin) {
        if let Some(published) = filter.published {
            query = query.filter(journal_watch::Column::IsPublished.eq(published));
        }
    } else {
        query = query.filter(journal_watch::Column::IsPublished.eq(true));
    }

    if let Some(category) = filter.category.as_deref().map(str::trim)
        && !category.is_empty()
    {
        query = query.filter(journal_watch::Column::Category.eq(category));
    }
    if let Some(journal) = filter.journal.as_deref().map(str::trim)
        && !journal.is_empty()
    {
        query = query.filter(journal_watch::Column::JournalName.contains(journal));
    }
    if let Some(keyword) = filter.keyword.as_deref().map(str::trim)
        && !keyword.is_empty()
    {
        query = query.filter(journal_watch::Column::Keywords.contains(keyword));
    }
    if let Some(year) = filter.year {
        query = query.filter(
            journal_watch::Column::PublicationDate.starts_with(format!("{:04}-", year)),
        );
    }
    if let Some(featured) = filter.featured {
        query = query.filter(journal_watch::Column::IsFeatured.eq(featured));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
        && !search.is_empty()
    {
        query = query.filter(
            Condition::any()
                .add(journal_watch::Column::Title.contains(search))
                .add(journal_watch::Column::Summary.contains(search))
                .add(journal_watch::Column::JournalName.contains(search)),
        );
    }

    let page = PageRequest::new(filter.page, filter.page_size);
    let results = super::fetch_page(
        db,
        query
            .order_by_desc(journal_watch::Column::PublicationDate)
            .order_by_desc(journal_watch::Column::Id),
        page,
    )
    .await?;

    Ok(results.map(JournalWatchDto::from))
}

pub async fn get_entry(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    id: i32,
) -> Result<JournalWatchDto, DomainError> {
    find_visible(db, claims, id).await?;
    super::increment::<JournalWatch, _>(
        db,
        journal_watch::Column::Id,
        journal_watch::Column::ViewCount,
        id,
    )
    .await?;
    Ok(JournalWatchDto::from(find_visible(db, claims, id).await?))
}

pub async fn create_entry(
    db: &DatabaseConnection,
    claims: &Claims,
    input: JournalWatchInput,
) -> Result<JournalWatchDto, DomainError> {
    claims.require_admin()?;
    validate_input(db, &input, false).await?;

    let now = super::now();
    let mut active = journal_watch::ActiveModel {
        publication_date: Set(None),
        doi: Set(None),
        article_url: Set(None),
        summary: Set(None),
        commentary: Set(None),
        authors: Set("[]".to_string()),
        keywords: Set("[]".to_string()),
        is_featured: Set(false),
        is_published: Set(false),
        view_count: Set(0),
        reviewer_id: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_input(&mut active, input);

    let model = active.insert(db).await?;
    tracing::info!("Journal watch entry {} created", model.id);
    Ok(JournalWatchDto::from(model))
}

pub async fn update_entry(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    input: JournalWatchInput,
    partial: bool,
) -> Result<JournalWatchDto, DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    validate_input(db, &input, partial).await?;

    let mut active: journal_watch::ActiveModel = model.into();
    apply_input(&mut active, input);
    active.updated_at = Set(super::now());
    Ok(JournalWatchDto::from(active.update(db).await?))
}

pub async fn delete_entry(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<(), DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    model.delete(db).await?;
    tracing::info!("Journal watch entry {} deleted", id);
    Ok(())
}

pub async fn toggle_featured(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<JournalWatchDto, DomainError> {
    let model = find_for_admin(db, claims, id).await?;
    let featured = !model.is_featured;

    let mut active: journal_watch::ActiveModel = model.into();
    active.is_featured = Set(featured);
    active.updated_at = Set(super::now());
    Ok(JournalWatchDto::from(active.update(db).await?))
}

pub async fn analytics(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<JournalWatchAnalytics, DomainError> {
    claims.require_admin()?;

    let total = JournalWatch::find().count(db).await?;
    let published = JournalWatch::find()
        .filter(journal_watch::Column::IsPublished.eq(true))
        .count(db)
        .await?;
    let total_views =
        super::sum_of(db, JournalWatch::find(), journal_watch::Column::ViewCount).await?;
    let by_category =
        super::count_by(db, JournalWatch::find(), journal_watch::Column::Category).await?;

    let mut journals: Vec<(String, u64)> =
        super::count_by(db, JournalWatch::find(), journal_watch::Column::JournalName)
            .await?
            .into_iter()
            .collect();
    journals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let top_journals = journals
        .into_iter()
        .take(10)
        .map(|(journal_name, entries)| JournalCount {
            journal_name,
            entries,
        })
        .collect();

    Ok(JournalWatchAnalytics {
        total,
        published,
        total_views,
        by_category,
        top_journals,
    })
}
