//! Newsletter subscriptions and the public contact form.
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use std::collections::BTreeMap;

use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::domain::validation;
use crate::domain::{ContactStatus, DomainError, FieldErrors, Page, PageRequest, NON_FIELD_ERRORS};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::mailer::{deliver, Mailer};
use crate::models::contact_message::{self, ContactMessageDto, Entity as ContactMessage};
use crate::models::newsletter_subscriber::{self, Entity as Subscriber, SubscriberDto};

use super::notification_service;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscribeInput {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnsubscribeInput {
    pub token: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    Reactivated,
    AlreadySubscribed,
}

impl SubscribeOutcome {
    pub fn message(self) -> &'static str {
        match self {
            SubscribeOutcome::Created => "Subscribed to the newsletter.",
            SubscribeOutcome::Reactivated => "Your subscription has been reactivated.",
            SubscribeOutcome::AlreadySubscribed => "This email is already subscribed.",
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriberFilter {
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactFilter {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactStatusInput {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionAnalytics {
    pub total_subscribers: u64,
    pub active_subscribers: u64,
    pub inactive_subscribers: u64,
    pub total_messages: u64,
    pub messages_by_status: BTreeMap<String, u64>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ---- newsletter ----

pub async fn subscribe(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    input: SubscribeInput,
) -> Result<(SubscriberDto, SubscribeOutcome), DomainError> {
    let mut errors = FieldErrors::new();
    let email = normalize_email(input.email.as_deref().unwrap_or_default());
    if email.is_empty() {
        errors.add("email", validation::REQUIRED);
    } else {
        validation::email(&mut errors, "email", &email);
    }
    validation::optional_text(&mut errors, "name", input.name.as_deref(), 255);
    errors.into_result()?;

    let name = input
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let existing = Subscriber::find()
        .filter(newsletter_subscriber::Column::Email.eq(&email))
        .one(db)
        .await?;

    match existing {
        Some(found) if found.is_active => {
            Ok((SubscriberDto::from(found), SubscribeOutcome::AlreadySubscribed))
        }
        Some(found) => {
            let mut active: newsletter_subscriber::ActiveModel = found.into();
            active.is_active = Set(true);
            active.unsubscribed_at = Set(None);
            if name.is_some() {
                active.name = Set(name);
            }
            let reactivated = active.update(db).await?;
            tracing::info!("Newsletter subscription {} reactivated", reactivated.id);
            Ok((SubscriberDto::from(reactivated), SubscribeOutcome::Reactivated))
        }
        None => {
            let created = newsletter_subscriber::ActiveModel {
                email: Set(email),
                name: Set(name),
                is_active: Set(true),
                token: Set(uuid::Uuid::new_v4().simple().to_string()),
                subscribed_at: Set(super::now()),
                unsubscribed_at: Set(None),
                ..Default::default()
            }
            .insert(db)
            .await?;

            tracing::info!("New newsletter subscriber {}", created.id);
            deliver(mailer, notification_service::newsletter_welcome(&created)).await;
            Ok((SubscriberDto::from(created), SubscribeOutcome::Created))
        }
    }
}

/// Deactivates a subscription found by its token, or by email when no token is given.
pub async fn unsubscribe(
    db: &DatabaseConnection,
    input: UnsubscribeInput,
) -> Result<SubscriberDto, DomainError> {
    let token = input.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let email = input
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty());

    let query = match (token, email) {
        (Some(token), _) => {
            Subscriber::find().filter(newsletter_subscriber::Column::Token.eq(token))
        }
        (None, Some(email)) => {
            Subscriber::find().filter(newsletter_subscriber::Column::Email.eq(email))
        }
        (None, None) => {
            return Err(DomainError::field(
                NON_FIELD_ERRORS,
                "Provide a token or an email address.",
            ));
        }
    };

    let found = query.one(db).await?.ok_or(DomainError::NotFound)?;
    if !found.is_active {
        return Ok(SubscriberDto::from(found));
    }

    let mut active: newsletter_subscriber::ActiveModel = found.into();
    active.is_active = Set(false);
    active.unsubscribed_at = Set(Some(super::now()));
    let updated = active.update(db).await?;
    tracing::info!("Newsletter subscriber {} unsubscribed", updated.id);
    Ok(SubscriberDto::from(updated))
}

pub async fn list_subscribers(
    db: &DatabaseConnection,
    claims: &Claims,
    filter: SubscriberFilter,
) -> Result<Page<SubscriberDto>, DomainError> {
    claims.require_admin()?;
    let mut query = Subscriber::find();

    if let Some(is_active) = filter.is_active {
        query = query.filter(newsletter_subscriber::Column::IsActive.eq(is_active));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
        && !search.is_empty()
    {
        query = query.filter(
            Condition::any()
                .add(newsletter_subscriber::Column::Email.contains(search))
                .add(newsletter_subscriber::Column::Name.contains(search)),
        );
    }

    let page = PageRequest::new(filter.page, filter.page_size);
    let results = super::fetch_page(
        db,
        query
            .order_by_desc(newsletter_subscriber::Column::SubscribedAt)
            .order_by_desc(newsletter_subscriber::Column::Id),
        page,
    )
    .await?;
    Ok(results.map(SubscriberDto::from))
}

pub async fn delete_subscriber(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<(), DomainError> {
    claims.require_admin()?;
    let found = Subscriber::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;
    found.delete(db).await?;
    tracing::info!("Newsletter subscriber {} deleted", id);
    Ok(())
}

// ---- contact ----

fn validate_contact(input: &ContactInput) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();

    validation::required_text(&mut errors, "name", input.name.as_deref().unwrap_or_default(), 255);
    match input.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => validation::email(&mut errors, "email", email),
        _ => errors.add("email", validation::REQUIRED),
    }
    validation::required_text(
        &mut errors,
        "subject",
        input.subject.as_deref().unwrap_or_default(),
        200,
    );
    validation::required_text(
        &mut errors,
        "message",
        input.message.as_deref().unwrap_or_default(),
        5000,
    );

    errors.into_result()
}

pub async fn create_contact(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    inbox: &str,
    input: ContactInput,
) -> Result<ContactMessageDto, DomainError> {
    validate_contact(&input)?;

    let now = super::now();
    let text = |value: Option<String>| value.unwrap_or_default().trim().to_string();
    let created = contact_message::ActiveModel {
        name: Set(text(input.name)),
        email: Set(normalize_email(&text(input.email))),
        subject: Set(text(input.subject)),
        message: Set(text(input.message)),
        status: Set(ContactStatus::New.as_str().to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Contact message {} received", created.id);
    deliver(mailer, notification_service::contact_received(inbox, &created)).await;
    deliver(mailer, notification_service::contact_acknowledgement(&created)).await;

    Ok(ContactMessageDto::from(created))
}

pub async fn list_contacts(
    db: &DatabaseConnection,
    claims: &Claims,
    filter: ContactFilter,
) -> Result<Page<ContactMessageDto>, DomainError> {
    claims.require_admin()?;
    let mut query = ContactMessage::find();

    if let Some(status) = filter.status.as_deref().map(str::trim)
        && !status.is_empty()
    {
        query = query.filter(contact_message::Column::Status.eq(status));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim)
        && !search.is_empty()
    {
        query = query.filter(
            Condition::any()
                .add(contact_message::Column::Name.contains(search))
                .add(contact_message::Column::Email.contains(search))
                .add(contact_message::Column::Subject.contains(search)),
        );
    }

    let page = PageRequest::new(filter.page, filter.page_size);
    let results = super::fetch_page(
        db,
        query
            .order_by_desc(contact_message::Column::CreatedAt)
            .order_by_desc(contact_message::Column::Id),
        page,
    )
    .await?;
    Ok(results.map(ContactMessageDto::from))
}

/// Opening a new message marks it read.
pub async fn get_contact(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<ContactMessageDto, DomainError> {
    claims.require_admin()?;
    let found = ContactMessage::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    if found.status != ContactStatus::New.as_str() {
        return Ok(ContactMessageDto::from(found));
    }

    let mut active: contact_message::ActiveModel = found.into();
    active.status = Set(ContactStatus::Read.as_str().to_string());
    active.updated_at = Set(super::now());
    Ok(ContactMessageDto::from(active.update(db).await?))
}

pub async fn update_contact_status(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    input: ContactStatusInput,
) -> Result<ContactMessageDto, DomainError> {
    claims.require_admin()?;
    let found = ContactMessage::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut errors = FieldErrors::new();
    let status = validation::choice(
        &mut errors,
        "status",
        input.status.as_deref().unwrap_or_default(),
        ContactStatus::parse,
        &ContactStatus::choices(),
    );
    errors.into_result()?;
    let Some(status) = status else {
        return Err(DomainError::field("status", validation::REQUIRED));
    };

    let mut active: contact_message::ActiveModel = found.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(super::now());
    Ok(ContactMessageDto::from(active.update(db).await?))
}

pub async fn delete_contact(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<(), DomainError> {
    claims.require_admin()?;
    let found = ContactMessage::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;
    found.delete(db).await?;
    tracing::info!("Contact message {} deleted", id);
    Ok(())
}

pub async fn analytics(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<SubscriptionAnalytics, DomainError> {
    claims.require_admin()?;

    let total_subscribers = Subscriber::find().count(db).await?;
    let active_subscribers = Subscriber::find()
        .filter(newsletter_subscriber::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let by_status =
        super::count_by(db, ContactMessage::find(), contact_message::Column::Status).await?;
    let statuses: Vec<&str> = ContactStatus::ALL.iter().map(|s| s.as_str()).collect();

    Ok(SubscriptionAnalytics {
        total_subscribers,
        active_subscribers,
        inactive_subscribers: total_subscribers.saturating_sub(active_subscribers),
        total_messages: by_status.values().sum(),
        messages_by_status: super::with_zeroes(by_status, &statuses),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_form_requires_every_field() {
        let err = validate_contact(&ContactInput::default()).unwrap_err();
        match err {
            DomainError::Validation(errors) => {
                for field in ["name", "email", "subject", "message"] {
                    assert!(errors.contains(field), "missing error for {field}");
                }
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn contact_form_rejects_bad_email() {
        let input = ContactInput {
            name: Some("Ada".into()),
            email: Some("not-an-email".into()),
            subject: Some("Hello".into()),
            message: Some("Hi there".into()),
        };
        assert!(validate_contact(&input).is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.ORG "), "ada@example.org");
    }
}
