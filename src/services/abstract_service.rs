//! Abstract submission workflow and peer review.
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use std::collections::BTreeMap;

use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::domain::validation::{self, nullable, word_count};
use crate::domain::{
    AbstractCategory, AbstractStatus, DomainError, FieldErrors, Page, PageRequest,
    PresentationType, Recommendation, NON_FIELD_ERRORS,
};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::mailer::{deliver, Mailer};
use crate::infrastructure::storage::{MediaStorage, UploadKind};
use crate::models::abstract_review::{self, Entity as Review, ReviewDto};
use crate::models::abstract_submission::{self, AbstractDto, Entity as Abstract};
use crate::models::{clean_list, conference, to_json_list, user, AbstractAuthor};

use super::notification_service;

const MAX_TITLE_CHARS: usize = 300;
const MAX_WORDS: usize = 500;
const MAX_KEYWORDS: usize = 10;
const MAX_AUTHORS: usize = 20;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbstractFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub conference_id: Option<i32>,
    pub presentation_type: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Create, replace and patch payload. On create and replace every required
/// field must be present; on patch only the given fields are checked.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbstractInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub authors: Option<Vec<AbstractAuthor>>,
    pub keywords: Option<Vec<String>>,
    pub category: Option<String>,
    pub presentation_type: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub conference_id: Option<Option<i32>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewInput {
    pub score: Option<i32>,
    pub recommendation: String,
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractAnalytics {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    pub by_presentation_type: BTreeMap<String, u64>,
    pub review_count: u64,
    pub average_review_score: Option<f64>,
}

fn status_of(model: &abstract_submission::Model) -> AbstractStatus {
    AbstractStatus::parse(&model.status).unwrap_or(AbstractStatus::Draft)
}

fn average(scores: &[i32]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let total: i64 = scores.iter().map(|s| *s as i64).sum();
    Some(((total as f64 / scores.len() as f64) * 100.0).round() / 100.0)
}

async fn with_review_stats(
    db: &DatabaseConnection,
    model: abstract_submission::Model,
) -> Result<AbstractDto, DomainError> {
    let scores: Vec<i32> = model
        .find_related(Review)
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.score)
        .collect();

    let mut dto = AbstractDto::from(model);
    dto.review_count = Some(scores.len() as u64);
    dto.average_score = average(&scores);
    Ok(dto)
}

/// Loads an abstract the caller is allowed to see; anything else is a 404.
async fn find_visible(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<abstract_submission::Model, DomainError> {
    let model = Abstract::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    if model.submitter_id == claims.uid || claims.can_review() {
        Ok(model)
    } else {
        Err(DomainError::NotFound)
    }
}

async fn validate_input(
    db: &DatabaseConnection,
    input: &AbstractInput,
    partial: bool,
) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();

    match &input.title {
        Some(title) => validation::required_text(&mut errors, "title", title, MAX_TITLE_CHARS),
        None if !partial => errors.add("title", validation::REQUIRED),
        None => {}
    }

    match &input.content {
        Some(content) => {
            let words = word_count(content);
            if words == 0 {
                errors.add("content", validation::REQUIRED);
            } else if words > MAX_WORDS {
                errors.add(
                    "content",
                    format!(
                        "Abstract must not exceed {} words (currently {}).",
                        MAX_WORDS, words
                    ),
                );
            }
        }
        None if !partial => errors.add("content", validation::REQUIRED),
        None => {}
    }

    match &input.authors {
        Some(authors) => {
            if authors.is_empty() {
                errors.add("authors", "At least one author is required.");
            } else if authors.len() > MAX_AUTHORS {
                errors.add(
                    "authors",
                    format!("No more than {} authors are allowed.", MAX_AUTHORS),
                );
            }
            for (i, author) in authors.iter().enumerate() {
                if author.name.trim().is_empty() {
                    errors.add("authors", format!("Author {} must have a name.", i + 1));
                }
                if let Some(email) = author.email.as_deref()
                    && !email.trim().is_empty()
                    && !validation::is_valid_email(email)
                {
                    errors.add(
                        "authors",
                        format!("Author {} has an invalid email address.", i + 1),
                    );
                }
            }
        }
        None if !partial => errors.add("authors", "At least one author is required."),
        None => {}
    }

    if let Some(keywords) = &input.keywords
        && clean_list(keywords).len() > MAX_KEYWORDS
    {
        errors.add(
            "keywords",
            format!("No more than {} keywords are allowed.", MAX_KEYWORDS),
        );
    }

    match &input.category {
        Some(category) => {
            validation::choice(
                &mut errors,
                "category",
                category,
                AbstractCategory::parse,
                &AbstractCategory::choices(),
            );
        }
        None if !partial => errors.add("category", validation::REQUIRED),
        None => {}
    }

    if let Some(kind) = &input.presentation_type {
        validation::choice(
            &mut errors,
            "presentationType",
            kind,
            PresentationType::parse,
            &PresentationType::choices(),
        );
    }

    if let Some(Some(conference_id)) = input.conference_id {
        match conference::Entity::find_by_id(conference_id).one(db).await? {
            None => errors.add("conferenceId", "Invalid conference."),
            Some(found) => {
                if deadline_passed(found.abstract_deadline.as_deref()) {
                    errors.add(
                        "conferenceId",
                        "The abstract submission deadline for this conference has passed.",
                    );
                }
            }
        }
    }

    errors.into_result()
}

fn deadline_passed(deadline: Option<&str>) -> bool {
    deadline
        .and_then(validation::parse_date)
        .is_some_and(|date| date < super::today())
}

fn apply_input(active: &mut abstract_submission::ActiveModel, input: AbstractInput) {
    if let Some(title) = input.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(content) = input.content {
        active.content = Set(content.trim().to_string());
    }
    if let Some(authors) = input.authors {
        let authors: Vec<AbstractAuthor> = authors
            .into_iter()
            .map(|a| AbstractAuthor {
                name: a.name.trim().to_string(),
                affiliation: a.affiliation.filter(|s| !s.trim().is_empty()),
                email: a.email.filter(|s| !s.trim().is_empty()),
            })
            .collect();
        active.authors = Set(to_json_list(&authors));
    }
    if let Some(keywords) = input.keywords {
        active.keywords = Set(to_json_list(&clean_list(&keywords)));
    }
    if let Some(category) = input.category {
        active.category = Set(category.trim().to_string());
    }
    if let Some(kind) = input.presentation_type {
        active.presentation_type = Set(kind.trim().to_string());
    }
    if let Some(conference_id) = input.conference_id {
        active.conference_id = Set(conference_id);
    }
}

pub async fn list_abstracts(
    db: &DatabaseConnection,
    claims: &Claims,
    filter: AbstractFilter,
) -> Result<Page<AbstractDto>, DomainError> {
    let mut query = Abstract::find();

    if !claims.can_review() {
        query = query.filter(abstract_submission::Column::SubmitterId.eq(claims.uid));
    }
    if let Some(status) = filter.status.as_deref()
        && !status.is_empty()
    {
        query = query.filter(abstract_submission::Column::Status.eq(status));
    }
    if let Some(category) = filter.category.as_deref()
        && !category.is_empty()
    {
        query = query.filter(abstract_submission::Column::Category.eq(category));
    }
    if let Some(conference_id) = filter.conference_id {
        query = query.filter(abstract_submission::Column::ConferenceId.eq(conference_id));
    }
    if let Some(kind) = filter.presentation_type.as_deref()
        && !kind.is_empty()
    {
        query = query.filter(abstract_submission::Column::PresentationType.eq(kind));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
        && !search.is_empty()
    {
        query = query.filter(
            Condition::any()
                .add(abstract_submission::Column::Title.contains(search))
                .add(abstract_submission::Column::Keywords.contains(search)),
        );
    }

    let page = PageRequest::new(filter.page, filter.page_size);
    let results = super::fetch_page(
        db,
        query
            .order_by_desc(abstract_submission::Column::CreatedAt)
            .order_by_desc(abstract_submission::Column::Id),
        page,
    )
    .await?;

    Ok(results.map(AbstractDto::from))
}

pub async fn get_abstract(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<AbstractDto, DomainError> {
    let model = find_visible(db, claims, id).await?;
    with_review_stats(db, model).await
}

pub async fn create_abstract(
    db: &DatabaseConnection,
    claims: &Claims,
    input: AbstractInput,
) -> Result<AbstractDto, DomainError> {
    validate_input(db, &input, false).await?;

    let now = super::now();
    let mut active = abstract_submission::ActiveModel {
        keywords: Set("[]".to_string()),
        presentation_type: Set(PresentationType::Oral.as_str().to_string()),
        status: Set(AbstractStatus::Draft.as_str().to_string()),
        submitter_id: Set(claims.uid),
        conference_id: Set(None),
        file_url: Set(None),
        submitted_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_input(&mut active, input);

    let model = active.insert(db).await?;
    tracing::info!("Abstract {} created by user {}", model.id, claims.uid);
    with_review_stats(db, model).await
}

pub async fn update_abstract(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    input: AbstractInput,
    partial: bool,
) -> Result<AbstractDto, DomainError> {
    let model = find_visible(db, claims, id).await?;

    if !claims.is_admin() {
        if model.submitter_id != claims.uid {
            return Err(DomainError::forbidden());
        }
        if !status_of(&model).is_editable() {
            return Err(DomainError::BadRequest(
                "Abstracts can only be edited while in draft or revision requested.".to_string(),
            ));
        }
    }

    validate_input(db, &input, partial).await?;

    let mut active: abstract_submission::ActiveModel = model.into();
    apply_input(&mut active, input);
    active.updated_at = Set(super::now());

    let model = active.update(db).await?;
    with_review_stats(db, model).await
}

pub async fn delete_abstract(
    db: &DatabaseConnection,
    storage: &MediaStorage,
    claims: &Claims,
    id: i32,
) -> Result<(), DomainError> {
    let model = find_visible(db, claims, id).await?;

    if !claims.is_admin() {
        if model.submitter_id != claims.uid {
            return Err(DomainError::forbidden());
        }
        if status_of(&model) != AbstractStatus::Draft {
            return Err(DomainError::BadRequest(
                "Only draft abstracts can be deleted.".to_string(),
            ));
        }
    }

    let file_url = model.file_url.clone();
    model.delete(db).await?;
    if let Some(url) = file_url {
        storage.remove(&url).await;
    }

    tracing::info!("Abstract {} deleted by user {}", id, claims.uid);
    Ok(())
}

pub async fn submit_abstract(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    claims: &Claims,
    id: i32,
) -> Result<AbstractDto, DomainError> {
    let model = find_visible(db, claims, id).await?;

    if model.submitter_id != claims.uid {
        return Err(DomainError::forbidden());
    }
    if !status_of(&model).is_editable() {
        return Err(DomainError::BadRequest(format!(
            "Cannot submit an abstract with status \"{}\".",
            model.status
        )));
    }
    if let Some(conference_id) = model.conference_id
        && let Some(found) = conference::Entity::find_by_id(conference_id).one(db).await?
        && deadline_passed(found.abstract_deadline.as_deref())
    {
        return Err(DomainError::field(
            NON_FIELD_ERRORS,
            "The abstract submission deadline for this conference has passed.",
        ));
    }

    let now = super::now();
    let mut active: abstract_submission::ActiveModel = model.into();
    active.status = Set(AbstractStatus::Submitted.as_str().to_string());
    active.submitted_at = Set(Some(now.clone()));
    active.updated_at = Set(now);
    let model = active.update(db).await?;

    tracing::info!("Abstract {} submitted", model.id);

    if let Some(submitter) = user::Entity::find_by_id(model.submitter_id).one(db).await? {
        deliver(mailer, notification_service::abstract_submitted(&submitter, &model)).await;
    }

    with_review_stats(db, model).await
}

pub async fn change_status(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    claims: &Claims,
    id: i32,
    change: StatusChange,
) -> Result<AbstractDto, DomainError> {
    claims.require_admin()?;

    let model = Abstract::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut errors = FieldErrors::new();
    let Some(next) = validation::choice(
        &mut errors,
        "status",
        &change.status,
        AbstractStatus::parse,
        &AbstractStatus::choices(),
    ) else {
        return Err(DomainError::Validation(errors));
    };

    let current = status_of(&model);
    if !current.can_transition_to(next) {
        return Err(DomainError::field(
            "status",
            format!("Cannot change status from \"{}\" to \"{}\".", current, next),
        ));
    }

    let mut active: abstract_submission::ActiveModel = model.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(super::now());
    let model = active.update(db).await?;

    tracing::info!("Abstract {} moved from {} to {}", model.id, current, next);

    if let Some(submitter) = user::Entity::find_by_id(model.submitter_id).one(db).await? {
        deliver(
            mailer,
            notification_service::abstract_status_changed(&submitter, &model),
        )
        .await;
    }

    with_review_stats(db, model).await
}

pub async fn upload_file(
    db: &DatabaseConnection,
    storage: &MediaStorage,
    claims: &Claims,
    id: i32,
    filename: &str,
    data: &[u8],
) -> Result<AbstractDto, DomainError> {
    let model = find_visible(db, claims, id).await?;
    if model.submitter_id != claims.uid && !claims.is_admin() {
        return Err(DomainError::forbidden());
    }

    let stored = storage.save(UploadKind::AbstractDocument, filename, data).await?;
    let previous = model.file_url.clone();

    let mut active: abstract_submission::ActiveModel = model.into();
    active.file_url = Set(Some(stored.url));
    active.updated_at = Set(super::now());
    let model = active.update(db).await?;

    if let Some(url) = previous {
        storage.remove(&url).await;
    }
    with_review_stats(db, model).await
}

pub async fn list_reviews(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<Vec<ReviewDto>, DomainError> {
    if !claims.can_review() {
        return Err(DomainError::forbidden());
    }
    let model = Abstract::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let reviews = model
        .find_related(Review)
        .order_by_asc(abstract_review::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(reviews.into_iter().map(ReviewDto::from).collect())
}

pub async fn create_review(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    input: ReviewInput,
) -> Result<ReviewDto, DomainError> {
    if !claims.can_review() {
        return Err(DomainError::forbidden());
    }
    let model = Abstract::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let status = status_of(&model);
    if !status.is_reviewable() {
        return Err(DomainError::BadRequest(format!(
            "Abstracts with status \"{}\" cannot be reviewed.",
            status
        )));
    }

    let mut errors = FieldErrors::new();
    match input.score {
        Some(score) if (1..=10).contains(&score) => {}
        Some(_) => errors.add("score", "Score must be between 1 and 10."),
        None => errors.add("score", validation::REQUIRED),
    }
    validation::choice(
        &mut errors,
        "recommendation",
        &input.recommendation,
        Recommendation::parse,
        &Recommendation::choices(),
    );
    validation::optional_text(&mut errors, "comments", input.comments.as_deref(), 5000);

    let existing = Review::find()
        .filter(abstract_review::Column::AbstractId.eq(model.id))
        .filter(abstract_review::Column::ReviewerId.eq(claims.uid))
        .one(db)
        .await?;
    if existing.is_some() {
        errors.add(NON_FIELD_ERRORS, "You have already reviewed this abstract.");
    }
    errors.into_result()?;

    let now = super::now();
    let review = abstract_review::ActiveModel {
        abstract_id: Set(model.id),
        reviewer_id: Set(claims.uid),
        score: Set(input.score.unwrap_or_default()),
        recommendation: Set(input.recommendation.trim().to_string()),
        comments: Set(input.comments.filter(|c| !c.trim().is_empty())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    if status == AbstractStatus::Submitted {
        let mut active: abstract_submission::ActiveModel = model.into();
        active.status = Set(AbstractStatus::UnderReview.as_str().to_string());
        active.updated_at = Set(now);
        active.update(db).await?;
    }

    tracing::info!("Review {} recorded for abstract {}", review.id, id);
    Ok(ReviewDto::from(review))
}

pub async fn analytics(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<AbstractAnalytics, DomainError> {
    claims.require_admin()?;

    let by_status = super::count_by(db, Abstract::find(), abstract_submission::Column::Status).await?;
    let by_category =
        super::count_by(db, Abstract::find(), abstract_submission::Column::Category).await?;
    let by_presentation_type = super::count_by(
        db,
        Abstract::find(),
        abstract_submission::Column::PresentationType,
    )
    .await?;

    let statuses: Vec<&str> = AbstractStatus::ALL.iter().map(|s| s.as_str()).collect();
    let categories: Vec<&str> = AbstractCategory::ALL.iter().map(|c| c.as_str()).collect();
    let kinds: Vec<&str> = PresentationType::ALL.iter().map(|p| p.as_str()).collect();

    let total = by_status.values().sum();
    let review_count = Review::find().count(db).await?;
    let score_sum = super::sum_of(db, Review::find(), abstract_review::Column::Score).await?;
    let average_review_score = (review_count > 0)
        .then(|| ((score_sum as f64 / review_count as f64) * 100.0).round() / 100.0);

    Ok(AbstractAnalytics {
        total,
        by_status: super::with_zeroes(by_status, &statuses),
        by_category: super::with_zeroes(by_category, &categories),
        by_presentation_type: super::with_zeroes(by_presentation_type, &kinds),
        review_count,
        average_review_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_rounded_to_two_decimals() {
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[7, 8, 8]), Some(7.67));
    }

    #[test]
    fn past_deadline_is_detected() {
        assert!(deadline_passed(Some("2000-01-01")));
        assert!(!deadline_passed(Some("2999-01-01")));
        assert!(!deadline_passed(None));
        assert!(!deadline_passed(Some("not a date")));
    }
}
