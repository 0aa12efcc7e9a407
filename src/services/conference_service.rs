//! Conference catalogue and attendee registration.
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::domain::validation::{self, nullable, slugify};
use crate::domain::{
    ConferenceStatus, DomainError, FieldErrors, Page, PageRequest, RegistrationStatus,
    RegistrationType, NON_FIELD_ERRORS,
};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::mailer::{deliver, Mailer};
use crate::infrastructure::storage::{MediaStorage, UploadKind};
use crate::models::conference::{self, ConferenceDto, Entity as Conference};
use crate::models::conference_registration::{self, Entity as Registration, RegistrationDto};
use crate::models::{clean_list, to_json_list, user};

use super::notification_service;

const MAX_TITLE_CHARS: usize = 255;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceFilter {
    pub status: Option<String>,
    pub featured: Option<bool>,
    pub upcoming: Option<bool>,
    pub country: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceInput {
    pub title: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub venue: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub city: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub country: Option<Option<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub abstract_deadline: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub registration_deadline: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub capacity: Option<Option<i32>>,
    pub registration_fee_cents: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationInput {
    pub registration_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceRegistrationCount {
    pub conference_id: i32,
    pub title: String,
    pub registrations: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceAnalytics {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub featured: u64,
    pub total_views: i64,
    pub confirmed_registrations: u64,
    pub top_conferences: Vec<ConferenceRegistrationCount>,
}

/// Cross-field date rules applied to the merged (stored + incoming) values.
#[derive(Debug, Default)]
struct Schedule {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    abstract_deadline: Option<NaiveDate>,
    registration_deadline: Option<NaiveDate>,
}

impl Schedule {
    fn check(&self, errors: &mut FieldErrors) {
        let Some(start) = self.start else {
            return;
        };
        if let Some(end) = self.end
            && end < start
        {
            errors.add("endDate", "End date must be on or after the start date.");
        }
        if let Some(deadline) = self.abstract_deadline
            && deadline > start
        {
            errors.add(
                "abstractDeadline",
                "Abstract deadline must be on or before the start date.",
            );
        }
        if let Some(deadline) = self.registration_deadline
            && deadline > start
        {
            errors.add(
                "registrationDeadline",
                "Registration deadline must be on or before the start date.",
            );
        }
    }
}

fn stored_date(value: &str) -> Option<NaiveDate> {
    validation::parse_date(value)
}

fn validate_input(
    input: &ConferenceInput,
    existing: Option<&conference::Model>,
    partial: bool,
) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();

    match &input.title {
        Some(title) => validation::required_text(&mut errors, "title", title, MAX_TITLE_CHARS),
        None if !partial => errors.add("title", validation::REQUIRED),
        None => {}
    }
    for (field, value) in [
        ("venue", &input.venue),
        ("city", &input.city),
        ("country", &input.country),
    ] {
        if let Some(value) = value {
            validation::optional_text(&mut errors, field, value.as_deref(), 255);
        }
    }

    let start = match &input.start_date {
        Some(v) => validation::required_date(&mut errors, "startDate", v),
        None if !partial => {
            errors.add("startDate", validation::REQUIRED);
            None
        }
        None => existing.and_then(|c| stored_date(&c.start_date)),
    };
    let end = match &input.end_date {
        Some(v) => validation::required_date(&mut errors, "endDate", v),
        None if !partial => {
            errors.add("endDate", validation::REQUIRED);
            None
        }
        None => existing.and_then(|c| stored_date(&c.end_date)),
    };
    let abstract_deadline = match &input.abstract_deadline {
        Some(v) => validation::optional_date(&mut errors, "abstractDeadline", v.as_deref()),
        None => existing
            .and_then(|c| c.abstract_deadline.as_deref())
            .and_then(stored_date),
    };
    let registration_deadline = match &input.registration_deadline {
        Some(v) => validation::optional_date(&mut errors, "registrationDeadline", v.as_deref()),
        None => existing
            .and_then(|c| c.registration_deadline.as_deref())
            .and_then(stored_date),
    };

    Schedule {
        start,
        end,
        abstract_deadline,
        registration_deadline,
    }
    .check(&mut errors);

    if let Some(status) = &input.status {
        validation::choice(
            &mut errors,
            "status",
            status,
            ConferenceStatus::parse,
            &ConferenceStatus::choices(),
        );
    }
    if let Some(Some(capacity)) = input.capacity
        && capacity <= 0
    {
        errors.add("capacity", "Capacity must be greater than zero.");
    }
    if let Some(fee) = input.registration_fee_cents
        && fee < 0
    {
        errors.add("registrationFeeCents", "Registration fee cannot be negative.");
    }

    errors.into_result()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn apply_input(active: &mut conference::ActiveModel, input: ConferenceInput) {
    if let Some(title) = input.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = input.description {
        active.description = Set(non_blank(description));
    }
    if let Some(venue) = input.venue {
        active.venue = Set(non_blank(venue));
    }
    if let Some(city) = input.city {
        active.city = Set(non_blank(city));
    }
    if let Some(country) = input.country {
        active.country = Set(non_blank(country));
    }
    if let Some(start) = input.start_date {
        active.start_date = Set(start.trim().to_string());
    }
    if let Some(end) = input.end_date {
        active.end_date = Set(end.trim().to_string());
    }
    if let Some(deadline) = input.abstract_deadline {
        active.abstract_deadline = Set(non_blank(deadline));
    }
    if let Some(deadline) = input.registration_deadline {
        active.registration_deadline = Set(non_blank(deadline));
    }
    if let Some(status) = input.status {
        active.status = Set(status.trim().to_string());
    }
    if let Some(capacity) = input.capacity {
        active.capacity = Set(capacity);
    }
    if let Some(fee) = input.registration_fee_cents {
        active.registration_fee_cents = Set(fee);
    }
    if let Some(tags) = input.tags {
        active.tags = Set(to_json_list(&clean_list(&tags)));
    }
    if let Some(featured) = input.is_featured {
        active.is_featured = Set(featured);
    }
}

/// Derives a slug from the title, appending `-2`, `-3`, ... until it is free.
pub async fn unique_slug(db: &DatabaseConnection, title: &str) -> Result<String, DomainError> {
    let mut base = slugify(title);
    if base.is_empty() {
        base = "conference".to_string();
    }
    let taken: Vec<String> = Conference::find()
        .select_only()
        .column(conference::Column::Slug)
        .filter(conference::Column::Slug.starts_with(&base))
        .into_tuple()
        .all(db)
        .await?;

    if !taken.contains(&base) {
        return Ok(base);
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

async fn confirmed_count<C: ConnectionTrait>(
    db: &C,
    conference_id: i32,
) -> Result<u64, DomainError> {
    Ok(Registration::find()
        .filter(conference_registration::Column::ConferenceId.eq(conference_id))
        .filter(conference_registration::Column::Status.eq(RegistrationStatus::Confirmed.as_str()))
        .count(db)
        .await?)
}

async fn find_conference(db: &DatabaseConnection, id: i32) -> Result<conference::Model, DomainError> {
    Conference::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)
}

pub async fn list_conferences(
    db: &DatabaseConnection,
    filter: ConferenceFilter,
) -> Result<Page<ConferenceDto>, DomainError> {
    let mut query = Conference::find();

    if let Some(status) = filter.status.as_deref()
        && !status.is_empty()
    {
        query = query.filter(conference::Column::Status.eq(status));
    }
    if let Some(featured) = filter.featured {
        query = query.filter(conference::Column::IsFeatured.eq(featured));
    }
    if filter.upcoming == Some(true) {
        let today = super::today().format("%Y-%m-%d").to_string();
        query = query.filter(conference::Column::StartDate.gte(today));
    }
    if let Some(country) = filter.country.as_deref().map(str::trim)
        && !country.is_empty()
    {
        query = query.filter(conference::Column::Country.eq(country));
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim)
        && !tag.is_empty()
    {
        query = query.filter(conference::Column::Tags.contains(format!("\"{}\"", tag)));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
        && !search.is_empty()
    {
        query = query.filter(
            Condition::any()
                .add(conference::Column::Title.contains(search))
                .add(conference::Column::Description.contains(search))
                .add(conference::Column::City.contains(search)),
        );
    }

    let page = PageRequest::new(filter.page, filter.page_size);
    let results = super::fetch_page(
        db,
        query
            .order_by_asc(conference::Column::StartDate)
            .order_by_asc(conference::Column::Id),
        page,
    )
    .await?;

    Ok(results.map(ConferenceDto::from))
}

/// Public detail view; every call counts as one view.
pub async fn get_conference(db: &DatabaseConnection, id: i32) -> Result<ConferenceDto, DomainError> {
    find_conference(db, id).await?;
    super::increment::<Conference, _>(db, conference::Column::Id, conference::Column::ViewCount, id)
        .await?;

    let model = find_conference(db, id).await?;
    let mut dto = ConferenceDto::from(model);
    dto.registration_count = Some(confirmed_count(db, id).await?);
    Ok(dto)
}

pub async fn create_conference(
    db: &DatabaseConnection,
    claims: &Claims,
    input: ConferenceInput,
) -> Result<ConferenceDto, DomainError> {
    claims.require_admin()?;
    validate_input(&input, None, false)?;

    let slug = unique_slug(db, input.title.as_deref().unwrap_or_default()).await?;
    let now = super::now();
    let mut active = conference::ActiveModel {
        slug: Set(slug),
        description: Set(None),
        venue: Set(None),
        city: Set(None),
        country: Set(None),
        abstract_deadline: Set(None),
        registration_deadline: Set(None),
        status: Set(ConferenceStatus::Upcoming.as_str().to_string()),
        capacity: Set(None),
        registration_fee_cents: Set(0),
        tags: Set("[]".to_string()),
        is_featured: Set(false),
        banner_url: Set(None),
        view_count: Set(0),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_input(&mut active, input);

    let model = active.insert(db).await?;
    tracing::info!("Conference {} created ({})", model.id, model.slug);

    let mut dto = ConferenceDto::from(model);
    dto.registration_count = Some(0);
    Ok(dto)
}

pub async fn update_conference(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    input: ConferenceInput,
    partial: bool,
) -> Result<ConferenceDto, DomainError> {
    claims.require_admin()?;
    let model = find_conference(db, id).await?;
    validate_input(&input, Some(&model), partial)?;

    let mut active: conference::ActiveModel = model.into();
    apply_input(&mut active, input);
    active.updated_at = Set(super::now());
    let model = active.update(db).await?;

    let mut dto = ConferenceDto::from(model);
    dto.registration_count = Some(confirmed_count(db, id).await?);
    Ok(dto)
}

pub async fn delete_conference(
    db: &DatabaseConnection,
    storage: &MediaStorage,
    claims: &Claims,
    id: i32,
) -> Result<(), DomainError> {
    claims.require_admin()?;
    let model = find_conference(db, id).await?;
    let banner = model.banner_url.clone();
    model.delete(db).await?;

    if let Some(url) = banner {
        storage.remove(&url).await;
    }
    tracing::info!("Conference {} deleted", id);
    Ok(())
}

pub async fn toggle_featured(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<ConferenceDto, DomainError> {
    claims.require_admin()?;
    let model = find_conference(db, id).await?;
    let featured = !model.is_featured;

    let mut active: conference::ActiveModel = model.into();
    active.is_featured = Set(featured);
    active.updated_at = Set(super::now());
    Ok(ConferenceDto::from(active.update(db).await?))
}

pub async fn upload_banner(
    db: &DatabaseConnection,
    storage: &MediaStorage,
    claims: &Claims,
    id: i32,
    filename: &str,
    data: &[u8],
) -> Result<ConferenceDto, DomainError> {
    claims.require_admin()?;
    let model = find_conference(db, id).await?;

    let stored = storage.save(UploadKind::ConferenceBanner, filename, data).await?;
    let previous = model.banner_url.clone();

    let mut active: conference::ActiveModel = model.into();
    active.banner_url = Set(Some(stored.url));
    active.updated_at = Set(super::now());
    let model = active.update(db).await?;

    if let Some(url) = previous {
        storage.remove(&url).await;
    }
    Ok(ConferenceDto::from(model))
}

/// Registers the caller. Returns the registration and whether it is new
/// (as opposed to a reactivated cancellation).
pub async fn register(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    claims: &Claims,
    id: i32,
    input: RegistrationInput,
) -> Result<(RegistrationDto, bool), DomainError> {
    let model = find_conference(db, id).await?;

    let mut errors = FieldErrors::new();
    let registration_type = match input.registration_type.as_deref() {
        Some(kind) => validation::choice(
            &mut errors,
            "registrationType",
            kind,
            RegistrationType::parse,
            &RegistrationType::choices(),
        ),
        None => Some(RegistrationType::Member),
    };
    errors.into_result()?;
    let registration_type = registration_type.unwrap_or(RegistrationType::Member);

    if ConferenceStatus::parse(&model.status) != Some(ConferenceStatus::Upcoming) {
        return Err(DomainError::field(
            NON_FIELD_ERRORS,
            "Registration is only open for upcoming conferences.",
        ));
    }
    if let Some(deadline) = model.registration_deadline.as_deref().and_then(stored_date)
        && deadline < super::today()
    {
        return Err(DomainError::field(
            NON_FIELD_ERRORS,
            "The registration deadline has passed.",
        ));
    }

    // Seat check and write commit together or not at all
    let txn = db.begin().await?;
    let existing = Registration::find()
        .filter(conference_registration::Column::ConferenceId.eq(id))
        .filter(conference_registration::Column::UserId.eq(claims.uid))
        .one(&txn)
        .await?;
    if let Some(current) = &existing
        && current.status == RegistrationStatus::Confirmed.as_str()
    {
        return Err(DomainError::field(
            NON_FIELD_ERRORS,
            "You are already registered for this conference.",
        ));
    }

    if let Some(capacity) = model.capacity
        && confirmed_count(&txn, id).await? >= capacity.max(0) as u64
    {
        return Err(DomainError::field(
            NON_FIELD_ERRORS,
            "This conference is fully booked.",
        ));
    }

    let now = super::now();
    let (registration, created) = match existing {
        Some(current) => {
            let mut active: conference_registration::ActiveModel = current.into();
            active.status = Set(RegistrationStatus::Confirmed.as_str().to_string());
            active.registration_type = Set(registration_type.as_str().to_string());
            active.updated_at = Set(now);
            (active.update(&txn).await?, false)
        }
        None => {
            let active = conference_registration::ActiveModel {
                conference_id: Set(id),
                user_id: Set(claims.uid),
                registration_type: Set(registration_type.as_str().to_string()),
                status: Set(RegistrationStatus::Confirmed.as_str().to_string()),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            };
            (active.insert(&txn).await?, true)
        }
    };
    txn.commit().await?;

    tracing::info!("User {} registered for conference {}", claims.uid, id);

    if let Some(attendee) = user::Entity::find_by_id(claims.uid).one(db).await? {
        deliver(
            mailer,
            notification_service::registration_confirmed(&attendee, &model),
        )
        .await;
    }

    Ok((RegistrationDto::from(registration), created))
}

pub async fn unregister(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<RegistrationDto, DomainError> {
    find_conference(db, id).await?;

    let registration = Registration::find()
        .filter(conference_registration::Column::ConferenceId.eq(id))
        .filter(conference_registration::Column::UserId.eq(claims.uid))
        .filter(conference_registration::Column::Status.eq(RegistrationStatus::Confirmed.as_str()))
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut active: conference_registration::ActiveModel = registration.into();
    active.status = Set(RegistrationStatus::Cancelled.as_str().to_string());
    active.updated_at = Set(super::now());
    let registration = active.update(db).await?;

    tracing::info!("User {} cancelled registration for conference {}", claims.uid, id);
    Ok(RegistrationDto::from(registration))
}

pub async fn list_registrations(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<Vec<RegistrationDto>, DomainError> {
    claims.require_admin()?;
    find_conference(db, id).await?;

    let rows = Registration::find()
        .filter(conference_registration::Column::ConferenceId.eq(id))
        .find_also_related(user::Entity)
        .order_by_asc(conference_registration::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(registration, attendee)| {
            let mut dto = RegistrationDto::from(registration);
            if let Some(attendee) = attendee {
                dto.user_name = Some(attendee.full_name());
                dto.user_email = Some(attendee.email);
            }
            dto
        })
        .collect())
}

pub async fn analytics(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<ConferenceAnalytics, DomainError> {
    claims.require_admin()?;

    let by_status = super::count_by(db, Conference::find(), conference::Column::Status).await?;
    let statuses: Vec<&str> = ConferenceStatus::ALL.iter().map(|s| s.as_str()).collect();
    let featured = Conference::find()
        .filter(conference::Column::IsFeatured.eq(true))
        .count(db)
        .await?;
    let total_views = super::sum_of(db, Conference::find(), conference::Column::ViewCount).await?;

    let mut per_conference: Vec<(i32, i64)> = Registration::find()
        .select_only()
        .column(conference_registration::Column::ConferenceId)
        .column_as(Expr::col(conference_registration::Column::Id).count(), "count")
        .filter(conference_registration::Column::Status.eq(RegistrationStatus::Confirmed.as_str()))
        .group_by(conference_registration::Column::ConferenceId)
        .into_tuple()
        .all(db)
        .await?;
    per_conference.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let confirmed_registrations = per_conference.iter().map(|(_, n)| *n as u64).sum();

    let top_ids: Vec<i32> = per_conference.iter().take(10).map(|(id, _)| *id).collect();
    let titles: BTreeMap<i32, String> = Conference::find()
        .filter(conference::Column::Id.is_in(top_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.title))
        .collect();

    let top_conferences = per_conference
        .into_iter()
        .take(10)
        .map(|(conference_id, count)| ConferenceRegistrationCount {
            conference_id,
            title: titles.get(&conference_id).cloned().unwrap_or_default(),
            registrations: count as u64,
        })
        .collect();

    Ok(ConferenceAnalytics {
        total: by_status.values().sum(),
        by_status: super::with_zeroes(by_status, &statuses),
        featured,
        total_views,
        confirmed_registrations,
        top_conferences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> Option<NaiveDate> {
        validation::parse_date(s)
    }

    #[test]
    fn schedule_rejects_inverted_dates_and_late_deadlines() {
        let mut errors = FieldErrors::new();
        Schedule {
            start: date("2025-06-10"),
            end: date("2025-06-09"),
            abstract_deadline: date("2025-06-11"),
            registration_deadline: date("2025-06-10"),
        }
        .check(&mut errors);

        assert!(errors.contains("endDate"));
        assert!(errors.contains("abstractDeadline"));
        assert!(!errors.contains("registrationDeadline"));
    }

    #[test]
    fn partial_update_checks_against_stored_dates() {
        let stored = conference::Model {
            id: 1,
            title: "Congress".into(),
            slug: "congress".into(),
            description: None,
            venue: None,
            city: None,
            country: None,
            start_date: "2025-06-10".into(),
            end_date: "2025-06-12".into(),
            abstract_deadline: None,
            registration_deadline: None,
            status: "upcoming".into(),
            capacity: None,
            registration_fee_cents: 0,
            tags: "[]".into(),
            is_featured: false,
            banner_url: None,
            view_count: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let input = ConferenceInput {
            end_date: Some("2025-06-01".into()),
            ..Default::default()
        };
        assert!(validate_input(&input, Some(&stored), true).is_err());

        let input = ConferenceInput {
            capacity: Some(Some(0)),
            ..Default::default()
        };
        assert!(validate_input(&input, Some(&stored), true).is_err());
        assert!(validate_input(&ConferenceInput::default(), Some(&stored), true).is_ok());
    }
}
