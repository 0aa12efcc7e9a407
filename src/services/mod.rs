//! Services Layer
//!
//! Business rules for every resource, independent from the HTTP layer.
//! Handlers extract and authenticate, then call into these functions.

pub mod abstract_service;
pub mod chat_hub;
pub mod conference_service;
pub mod ebooklet_service;
pub mod journal_watch_service;
pub mod messaging_service;
pub mod notification_service;
pub mod payment_service;
pub mod subscription_service;
pub mod user_service;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QuerySelect, Select,
};

use crate::domain::{Page, PageRequest};

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Runs `select` one page at a time and reports the total row count.
pub(crate) async fn fetch_page<E, C>(
    db: &C,
    select: Select<E>,
    page: PageRequest,
) -> Result<Page<E::Model>, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Sized + Send + Sync,
{
    let paginator = select.paginate(db, page.page_size);
    let count = paginator.num_items().await?;
    let results = paginator.fetch_page(page.index()).await?;
    Ok(Page::new(page, count, results))
}

/// `SELECT column, COUNT(*) ... GROUP BY column` as a sorted map.
pub(crate) async fn count_by<E, C>(
    db: &C,
    select: Select<E>,
    column: E::Column,
) -> Result<BTreeMap<String, u64>, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let rows: Vec<(String, i64)> = select
        .select_only()
        .column(column)
        .column_as(Expr::col(column).count(), "count")
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(key, count)| (key, count.max(0) as u64))
        .collect())
}

/// `SUM(column)` over `select`; an empty set sums to zero.
pub(crate) async fn sum_of<E, C>(db: &C, select: Select<E>, column: E::Column) -> Result<i64, DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let total: Option<Option<i64>> = select
        .select_only()
        .column_as(Expr::col(column).sum(), "total")
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Atomically adds one to a counter column of the row with the given id.
pub(crate) async fn increment<E, C>(
    db: &C,
    id_column: E::Column,
    counter: E::Column,
    id: i32,
) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    E::update_many()
        .col_expr(counter, Expr::col(counter).add(1))
        .filter(id_column.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

/// Fills in every known value so analytics report zero instead of omitting a key.
pub(crate) fn with_zeroes(mut counts: BTreeMap<String, u64>, keys: &[&str]) -> BTreeMap<String, u64> {
    for key in keys {
        counts.entry(key.to_string()).or_insert(0);
    }
    counts
}
