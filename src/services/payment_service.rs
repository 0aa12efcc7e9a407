//! Membership plans, hosted checkout and gateway webhooks.
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::domain::validation::{self, nullable};
use crate::domain::{DomainError, FieldErrors, Page, PageRequest, PaymentStatus};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::config::PaymentConfig;
use crate::infrastructure::mailer::{deliver, EmailMessage, Mailer};
use crate::models::membership::{self, Entity as Membership};
use crate::models::membership_plan::{self, Entity as Plan, PlanDto};
use crate::models::payment::{self, Entity as Payment, PaymentDto};
use crate::models::{user, webhook_event};
use crate::modules::integrations::payment_gateway::{
    verify_signature, CheckoutRequest, PaymentGateway, WebhookEvent, WebhookObject,
};

use super::notification_service;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";
pub const EVENT_CHARGE_REFUNDED: &str = "charge.refunded";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanInput {
    pub name: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanFilter {
    /// Admin only; other callers always get active plans.
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutInput {
    pub plan_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub payment_id: i32,
    pub reference: String,
    pub session_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentFilter {
    pub user_id: Option<i32>,
    pub status: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub received: bool,
    pub duplicate: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipStatus {
    pub is_active: bool,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub plan: Option<PlanDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRevenue {
    pub plan_id: i32,
    pub plan_name: String,
    pub revenue_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAnalytics {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub revenue_cents: i64,
    pub revenue_by_plan: Vec<PlanRevenue>,
    pub active_memberships: u64,
}

/// Upper bound for a plan's `durationDays`.
const MAX_DURATION_DAYS: i32 = 36_500;

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// New validity window after paying for `days` more days. A membership that is
/// still running is extended from its end; a lapsed or missing one restarts today.
pub fn extend_membership(
    current: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
    days: i32,
) -> Result<(NaiveDate, NaiveDate), DomainError> {
    let days = Duration::days(days.max(1) as i64);
    let (from, end) = match current {
        Some((from, until)) if until >= today => (from, until),
        _ => (today, today),
    };
    let until = end.checked_add_signed(days).ok_or_else(|| {
        DomainError::Internal(format!("Membership end overflows after {} + {}", end, days))
    })?;
    Ok((from, until))
}

// ---- plans ----

fn validate_plan(input: &PlanInput, partial: bool) -> FieldErrors {
    let mut errors = FieldErrors::new();

    match &input.name {
        Some(name) => validation::required_text(&mut errors, "name", name, 100),
        None if !partial => errors.add("name", validation::REQUIRED),
        None => {}
    }
    match input.price_cents {
        Some(price) if price < 0 => errors.add("priceCents", "Price cannot be negative."),
        Some(_) => {}
        None if !partial => errors.add("priceCents", validation::REQUIRED),
        None => {}
    }
    match input.duration_days {
        Some(days) if days < 1 => errors.add("durationDays", "Duration must be at least one day."),
        Some(days) if days > MAX_DURATION_DAYS => errors.add(
            "durationDays",
            format!("Duration cannot exceed {} days.", MAX_DURATION_DAYS),
        ),
        Some(_) => {}
        None if !partial => errors.add("durationDays", validation::REQUIRED),
        None => {}
    }
    if let Some(currency) = &input.currency {
        let currency = currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.add("currency", "Currency must be a three-letter ISO code.");
        }
    }

    errors
}

async fn name_taken(
    db: &DatabaseConnection,
    name: &str,
    except: Option<i32>,
) -> Result<bool, DomainError> {
    let mut query = Plan::find().filter(membership_plan::Column::Name.eq(name.trim()));
    if let Some(id) = except {
        query = query.filter(membership_plan::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

fn apply_plan(active: &mut membership_plan::ActiveModel, input: PlanInput) {
    if let Some(name) = input.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = input.description {
        active.description = Set(description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()));
    }
    if let Some(price) = input.price_cents {
        active.price_cents = Set(price);
    }
    if let Some(currency) = input.currency {
        active.currency = Set(currency.trim().to_ascii_uppercase());
    }
    if let Some(days) = input.duration_days {
        active.duration_days = Set(days);
    }
    if let Some(is_active) = input.is_active {
        active.is_active = Set(is_active);
    }
}

pub async fn list_plans(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    filter: PlanFilter,
) -> Result<Vec<PlanDto>, DomainError> {
    let mut query = Plan::find();
    if claims.is_some_and(Claims::is_admin) {
        if let Some(is_active) = filter.is_active {
            query = query.filter(membership_plan::Column::IsActive.eq(is_active));
        }
    } else {
        query = query.filter(membership_plan::Column::IsActive.eq(true));
    }

    let plans = query
        .order_by_asc(membership_plan::Column::PriceCents)
        .order_by_asc(membership_plan::Column::Id)
        .all(db)
        .await?;
    Ok(plans.into_iter().map(PlanDto::from).collect())
}

pub async fn get_plan(
    db: &DatabaseConnection,
    claims: Option<&Claims>,
    id: i32,
) -> Result<PlanDto, DomainError> {
    let plan = Plan::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;
    if !plan.is_active && !claims.is_some_and(Claims::is_admin) {
        return Err(DomainError::NotFound);
    }
    Ok(PlanDto::from(plan))
}

pub async fn create_plan(
    db: &DatabaseConnection,
    claims: &Claims,
    input: PlanInput,
) -> Result<PlanDto, DomainError> {
    claims.require_admin()?;
    let mut errors = validate_plan(&input, false);
    if let Some(name) = &input.name
        && !errors.contains("name")
        && name_taken(db, name, None).await?
    {
        errors.add("name", "A plan with this name already exists.");
    }
    errors.into_result()?;

    let now = super::now();
    let mut active = membership_plan::ActiveModel {
        description: Set(None),
        currency: Set("USD".to_string()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    apply_plan(&mut active, input);

    let plan = active.insert(db).await?;
    tracing::info!("Membership plan {} created ({})", plan.id, plan.name);
    Ok(PlanDto::from(plan))
}

pub async fn update_plan(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
    input: PlanInput,
    partial: bool,
) -> Result<PlanDto, DomainError> {
    claims.require_admin()?;
    let plan = Plan::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut errors = validate_plan(&input, partial);
    if let Some(name) = &input.name
        && !errors.contains("name")
        && name_taken(db, name, Some(id)).await?
    {
        errors.add("name", "A plan with this name already exists.");
    }
    errors.into_result()?;

    let mut active: membership_plan::ActiveModel = plan.into();
    apply_plan(&mut active, input);
    active.updated_at = Set(super::now());
    Ok(PlanDto::from(active.update(db).await?))
}

pub async fn delete_plan(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<(), DomainError> {
    claims.require_admin()?;
    let plan = Plan::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    if plan.find_related(Payment).count(db).await? > 0 {
        return Err(DomainError::BadRequest(
            "This plan has payments; deactivate it instead of deleting it.".to_string(),
        ));
    }
    plan.delete(db).await?;
    tracing::info!("Membership plan {} deleted", id);
    Ok(())
}

// ---- checkout ----

pub async fn checkout(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    config: &PaymentConfig,
    claims: &Claims,
    input: CheckoutInput,
) -> Result<CheckoutResponse, DomainError> {
    let Some(plan_id) = input.plan_id else {
        return Err(DomainError::field("planId", validation::REQUIRED));
    };
    let plan = Plan::find_by_id(plan_id)
        .one(db)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| DomainError::field("planId", "Invalid or inactive plan."))?;

    let now = super::now();
    let reference = uuid::Uuid::new_v4().to_string();
    let pending = payment::ActiveModel {
        user_id: Set(claims.uid),
        plan_id: Set(plan.id),
        amount_cents: Set(plan.price_cents),
        currency: Set(plan.currency.clone()),
        status: Set(PaymentStatus::Pending.as_str().to_string()),
        reference: Set(reference.clone()),
        provider_session_id: Set(None),
        provider_payment_id: Set(None),
        completed_at: Set(None),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let request = CheckoutRequest {
        amount: plan.price_cents,
        currency: plan.currency.clone(),
        reference: reference.clone(),
        description: format!("{} membership", plan.name),
        customer_email: claims.sub.clone(),
        success_url: config.success_url.clone(),
        cancel_url: config.cancel_url.clone(),
    };

    let session = match gateway.create_checkout_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Checkout for payment {} failed: {}", pending.id, e);
            let mut active: payment::ActiveModel = pending.into();
            active.status = Set(PaymentStatus::Failed.as_str().to_string());
            active.updated_at = Set(super::now());
            active.update(db).await?;
            return Err(e);
        }
    };

    let payment_id = pending.id;
    let mut active: payment::ActiveModel = pending.into();
    active.provider_session_id = Set(Some(session.id.clone()));
    active.updated_at = Set(super::now());
    active.update(db).await?;

    tracing::info!(
        "Checkout session {} opened for payment {} (user {})",
        session.id,
        payment_id,
        claims.uid
    );

    Ok(CheckoutResponse {
        payment_id,
        reference,
        session_id: session.id,
        checkout_url: session.url,
    })
}

// ---- webhook ----

async fn find_payment<C: ConnectionTrait>(
    db: &C,
    object: &WebhookObject,
) -> Result<Option<payment::Model>, DbErr> {
    let session_id = object.checkout_session_id();
    if !session_id.is_empty()
        && let Some(found) = Payment::find()
            .filter(payment::Column::ProviderSessionId.eq(session_id))
            .one(db)
            .await?
    {
        return Ok(Some(found));
    }
    if let Some(reference) = object.reference()
        && let Some(found) = Payment::find()
            .filter(payment::Column::Reference.eq(reference))
            .one(db)
            .await?
    {
        return Ok(Some(found));
    }
    let payment_id = object.provider_payment_id();
    if payment_id.is_empty() {
        return Ok(None);
    }
    Payment::find()
        .filter(payment::Column::ProviderPaymentId.eq(payment_id))
        .one(db)
        .await
}

async fn set_status<C: ConnectionTrait>(
    db: &C,
    found: payment::Model,
    status: PaymentStatus,
) -> Result<payment::Model, DbErr> {
    let mut active: payment::ActiveModel = found.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(super::now());
    active.update(db).await
}

/// Marks the payment completed and extends the payer's membership.
/// Returns the receipt to send once the transaction has committed.
async fn complete_payment<C: ConnectionTrait>(
    db: &C,
    found: payment::Model,
    object: &WebhookObject,
) -> Result<Option<EmailMessage>, DomainError> {
    if found.status != PaymentStatus::Pending.as_str() {
        tracing::warn!(
            "Ignoring completion for payment {} in status {}",
            found.id,
            found.status
        );
        return Ok(None);
    }

    let Some(plan) = Plan::find_by_id(found.plan_id).one(db).await? else {
        return Err(DbErr::RecordNotFound(format!("plan {}", found.plan_id)).into());
    };

    let now = super::now();
    let mut active: payment::ActiveModel = found.into();
    active.status = Set(PaymentStatus::Completed.as_str().to_string());
    active.completed_at = Set(Some(now.clone()));
    if let Some(payment_id) = &object.payment_id {
        active.provider_payment_id = Set(Some(payment_id.clone()));
    }
    active.updated_at = Set(now.clone());
    let paid = active.update(db).await?;

    let existing = Membership::find()
        .filter(membership::Column::UserId.eq(paid.user_id))
        .one(db)
        .await?;
    let current = existing.as_ref().and_then(|m| {
        Some((
            validation::parse_date(&m.valid_from)?,
            validation::parse_date(&m.valid_until)?,
        ))
    });
    let (valid_from, valid_until) =
        extend_membership(current, super::today(), plan.duration_days)?;

    let membership = match existing {
        Some(m) => {
            let mut active: membership::ActiveModel = m.into();
            active.plan_id = Set(plan.id);
            active.valid_from = Set(date_string(valid_from));
            active.valid_until = Set(date_string(valid_until));
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            membership::ActiveModel {
                user_id: Set(paid.user_id),
                plan_id: Set(plan.id),
                valid_from: Set(date_string(valid_from)),
                valid_until: Set(date_string(valid_until)),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    tracing::info!(
        "Payment {} completed; membership of user {} valid until {}",
        paid.id,
        paid.user_id,
        membership.valid_until
    );

    let payer = user::Entity::find_by_id(paid.user_id).one(db).await?;
    Ok(payer.map(|payer| notification_service::payment_receipt(&payer, &plan, &paid, &membership)))
}

/// Verifies, deduplicates and applies one gateway event.
pub async fn handle_webhook(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    config: &PaymentConfig,
    signature: Option<&str>,
    payload: &[u8],
    now: i64,
) -> Result<WebhookOutcome, DomainError> {
    let signature = signature
        .ok_or_else(|| DomainError::BadRequest("Missing webhook signature".to_string()))?;
    verify_signature(
        &config.webhook_secret,
        signature,
        payload,
        now,
        config.signature_tolerance_secs,
    )
    .map_err(|e| {
        tracing::warn!("Rejected webhook: {}", e);
        DomainError::BadRequest(format!("Invalid webhook signature: {}", e))
    })?;

    let event: WebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| DomainError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let txn = db.begin().await?;

    let seen = webhook_event::Entity::find()
        .filter(webhook_event::Column::EventId.eq(&event.id))
        .one(&txn)
        .await?;
    if seen.is_some() {
        txn.rollback().await?;
        tracing::info!("Webhook event {} already processed", event.id);
        return Ok(WebhookOutcome {
            received: true,
            duplicate: true,
        });
    }

    let recorded = webhook_event::ActiveModel {
        event_id: Set(event.id.clone()),
        event_type: Set(event.event_type.clone()),
        processed_at: Set(super::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await;
    if let Err(e) = recorded {
        txn.rollback().await?;
        if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            return Ok(WebhookOutcome {
                received: true,
                duplicate: true,
            });
        }
        return Err(e.into());
    }

    let object = &event.data.object;
    let found = find_payment(&txn, object).await?;
    let mut receipt = None;

    match (event.event_type.as_str(), found) {
        (EVENT_CHECKOUT_COMPLETED, Some(found)) => {
            receipt = complete_payment(&txn, found, object).await?;
        }
        (EVENT_CHECKOUT_EXPIRED | EVENT_PAYMENT_FAILED, Some(found)) => {
            if found.status == PaymentStatus::Pending.as_str() {
                let failed = set_status(&txn, found, PaymentStatus::Failed).await?;
                tracing::info!("Payment {} failed ({})", failed.id, event.event_type);
            }
        }
        (EVENT_CHARGE_REFUNDED, Some(found)) => {
            if found.status == PaymentStatus::Completed.as_str() {
                let refunded = set_status(&txn, found, PaymentStatus::Refunded).await?;
                tracing::info!("Payment {} refunded", refunded.id);
            }
        }
        (
            EVENT_CHECKOUT_COMPLETED
            | EVENT_CHECKOUT_EXPIRED
            | EVENT_PAYMENT_FAILED
            | EVENT_CHARGE_REFUNDED,
            None,
        ) => {
            tracing::warn!(
                "Webhook {} ({}) does not match any payment",
                event.id,
                event.event_type
            );
        }
        (other, _) => {
            tracing::debug!("Acknowledging unhandled webhook type {}", other);
        }
    }

    txn.commit().await?;

    if let Some(receipt) = receipt {
        deliver(mailer, receipt).await;
    }

    Ok(WebhookOutcome {
        received: true,
        duplicate: false,
    })
}

// ---- reads ----

async fn with_plan_names(
    db: &DatabaseConnection,
    payments: Vec<payment::Model>,
) -> Result<Vec<PaymentDto>, DomainError> {
    let plan_ids: Vec<i32> = payments.iter().map(|p| p.plan_id).collect();
    let names: BTreeMap<i32, String> = Plan::find()
        .filter(membership_plan::Column::Id.is_in(plan_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    Ok(payments
        .into_iter()
        .map(|p| {
            let plan_name = names.get(&p.plan_id).cloned();
            let mut dto = PaymentDto::from(p);
            dto.plan_name = plan_name;
            dto
        })
        .collect())
}

pub async fn list_payments(
    db: &DatabaseConnection,
    claims: &Claims,
    filter: PaymentFilter,
) -> Result<Page<PaymentDto>, DomainError> {
    let mut query = Payment::find();

    if claims.is_admin() {
        if let Some(user_id) = filter.user_id {
            query = query.filter(payment::Column::UserId.eq(user_id));
        }
    } else {
        query = query.filter(payment::Column::UserId.eq(claims.uid));
    }
    if let Some(status) = filter.status.as_deref().map(str::trim)
        && !status.is_empty()
    {
        query = query.filter(payment::Column::Status.eq(status));
    }

    let page = PageRequest::new(filter.page, filter.page_size);
    let results = super::fetch_page(
        db,
        query
            .order_by_desc(payment::Column::CreatedAt)
            .order_by_desc(payment::Column::Id),
        page,
    )
    .await?;

    let dtos = with_plan_names(db, results.results).await?;
    Ok(Page::new(page, results.count, dtos))
}

pub async fn get_payment(
    db: &DatabaseConnection,
    claims: &Claims,
    id: i32,
) -> Result<PaymentDto, DomainError> {
    let found = Payment::find_by_id(id)
        .one(db)
        .await?
        .filter(|p| p.user_id == claims.uid || claims.is_admin())
        .ok_or(DomainError::NotFound)?;

    with_plan_names(db, vec![found])
        .await?
        .pop()
        .ok_or(DomainError::NotFound)
}

pub async fn membership_status(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<MembershipStatus, DomainError> {
    let Some(current) = Membership::find()
        .filter(membership::Column::UserId.eq(claims.uid))
        .one(db)
        .await?
    else {
        return Ok(MembershipStatus {
            is_active: false,
            valid_from: None,
            valid_until: None,
            plan: None,
        });
    };

    let is_active = validation::parse_date(&current.valid_until)
        .is_some_and(|until| until >= super::today());
    let plan = Plan::find_by_id(current.plan_id).one(db).await?;

    Ok(MembershipStatus {
        is_active,
        valid_from: Some(current.valid_from),
        valid_until: Some(current.valid_until),
        plan: plan.map(PlanDto::from),
    })
}

pub async fn analytics(
    db: &DatabaseConnection,
    claims: &Claims,
) -> Result<PaymentAnalytics, DomainError> {
    claims.require_admin()?;

    let by_status = super::count_by(db, Payment::find(), payment::Column::Status).await?;
    let statuses: Vec<&str> = PaymentStatus::ALL.iter().map(|s| s.as_str()).collect();

    let completed = || {
        Payment::find().filter(payment::Column::Status.eq(PaymentStatus::Completed.as_str()))
    };
    let revenue_cents = super::sum_of(db, completed(), payment::Column::AmountCents).await?;

    let per_plan: Vec<(i32, Option<i64>)> = completed()
        .select_only()
        .column(payment::Column::PlanId)
        .column_as(Expr::col(payment::Column::AmountCents).sum(), "revenue")
        .group_by(payment::Column::PlanId)
        .into_tuple()
        .all(db)
        .await?;
    let names: BTreeMap<i32, String> = Plan::find()
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();
    let mut revenue_by_plan: Vec<PlanRevenue> = per_plan
        .into_iter()
        .map(|(plan_id, revenue)| PlanRevenue {
            plan_id,
            plan_name: names.get(&plan_id).cloned().unwrap_or_default(),
            revenue_cents: revenue.unwrap_or(0),
        })
        .collect();
    revenue_by_plan.sort_by(|a, b| b.revenue_cents.cmp(&a.revenue_cents));

    let active_memberships = Membership::find()
        .filter(membership::Column::ValidUntil.gte(date_string(super::today())))
        .count(db)
        .await?;

    Ok(PaymentAnalytics {
        total: by_status.values().sum(),
        by_status: super::with_zeroes(by_status, &statuses),
        revenue_cents,
        revenue_by_plan,
        active_memberships,
    })
}
