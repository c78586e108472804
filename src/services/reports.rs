//! Aggregation queries behind the dashboard and statistics endpoints.
//!
//! All figures are real sums over revenues/transactions/royalties; growth
//! and bucketing arithmetic comes from [`crate::stats`].

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::stats::{percent_change, ratio_pct, DateRange, Granularity};

/// Franchise scope for aggregate queries: `None` means unrestricted (admin).
pub type ScopeIds = Option<Vec<Uuid>>;

#[derive(Debug, Serialize)]
pub struct PeriodCard {
    pub current: Decimal,
    pub previous: Decimal,
    pub growth_pct: Decimal,
}

impl PeriodCard {
    fn new(current: Decimal, previous: Decimal) -> Self {
        Self {
            current,
            previous,
            growth_pct: percent_change(current, previous),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnitCounts {
    pub total: i64,
    pub pending: i64,
    pub active: i64,
    pub closed: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub revenue: PeriodCard,
    pub open_leads: i64,
    pub open_tasks: i64,
    pub royalties_due: Decimal,
    pub units: UnitCounts,
}

#[derive(Debug, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct FranchiseStats {
    pub series: Vec<SeriesPoint>,
    pub revenue: PeriodCard,
    pub unit_count: i64,
    pub lead_count: i64,
    pub leads_converted: i64,
    pub conversion_rate_pct: Decimal,
}

#[derive(Debug, Serialize)]
pub struct UnitPerformance {
    pub revenue: PeriodCard,
    pub expense_total: Decimal,
    pub net: Decimal,
    pub review_count: i64,
    pub average_rating: Option<Decimal>,
}

/// Sum of non-deleted revenue amounts inside a window, optionally scoped.
async fn revenue_sum(
    pool: &PgPool,
    scope: &ScopeIds,
    range: &DateRange,
) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM revenues \
         WHERE deleted_at IS NULL \
           AND occurred_on BETWEEN $2 AND $3 \
           AND ($1::uuid[] IS NULL OR franchise_id = ANY($1))",
    )
    .bind(scope)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await
}

pub async fn dashboard(
    pool: &PgPool,
    scope: &ScopeIds,
    range: DateRange,
) -> Result<DashboardSummary, sqlx::Error> {
    let current = revenue_sum(pool, scope, &range).await?;
    let previous = revenue_sum(pool, scope, &range.previous()).await?;

    let open_leads: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM leads \
         WHERE deleted_at IS NULL \
           AND status NOT IN ('converted', 'lost') \
           AND ($1::uuid[] IS NULL OR franchise_id = ANY($1))",
    )
    .bind(scope)
    .fetch_one(pool)
    .await?;

    let open_tasks: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks \
         WHERE deleted_at IS NULL \
           AND status <> 'done' \
           AND ($1::uuid[] IS NULL OR franchise_id = ANY($1))",
    )
    .bind(scope)
    .fetch_one(pool)
    .await?;

    let royalties_due: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM royalties \
         WHERE deleted_at IS NULL \
           AND status = 'due' \
           AND ($1::uuid[] IS NULL OR franchise_id = ANY($1))",
    )
    .bind(scope)
    .fetch_one(pool)
    .await?;

    let unit_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT status::text, COUNT(*) FROM units \
         WHERE deleted_at IS NULL \
           AND ($1::uuid[] IS NULL OR franchise_id = ANY($1)) \
         GROUP BY status",
    )
    .bind(scope)
    .fetch_all(pool)
    .await?;

    let mut units = UnitCounts {
        total: 0,
        pending: 0,
        active: 0,
        closed: 0,
    };
    for (status, count) in unit_rows {
        units.total += count;
        match status.as_str() {
            "pending" => units.pending = count,
            "active" => units.active = count,
            "closed" => units.closed = count,
            _ => {}
        }
    }

    Ok(DashboardSummary {
        revenue: PeriodCard::new(current, previous),
        open_leads,
        open_tasks,
        royalties_due,
        units,
    })
}

pub async fn franchise_stats(
    pool: &PgPool,
    franchise_id: Uuid,
    granularity: Granularity,
    range: DateRange,
) -> Result<FranchiseStats, sqlx::Error> {
    let scope: ScopeIds = Some(vec![franchise_id]);

    // Sparse per-bucket sums; missing buckets are zero-filled below.
    let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
        "SELECT date_trunc($2, occurred_on::timestamp)::date AS bucket, \
                COALESCE(SUM(amount), 0) AS total \
         FROM revenues \
         WHERE deleted_at IS NULL \
           AND franchise_id = $1 \
           AND occurred_on BETWEEN $3 AND $4 \
         GROUP BY 1",
    )
    .bind(franchise_id)
    .bind(granularity.date_trunc_arg())
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    let by_bucket: HashMap<NaiveDate, Decimal> = rows.into_iter().collect();
    let series = range
        .buckets(granularity)
        .into_iter()
        .map(|bucket| SeriesPoint {
            label: granularity.label(bucket),
            total: by_bucket.get(&bucket).copied().unwrap_or(Decimal::ZERO),
        })
        .collect();

    let current = revenue_sum(pool, &scope, &range).await?;
    let previous = revenue_sum(pool, &scope, &range.previous()).await?;

    let unit_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM units WHERE deleted_at IS NULL AND franchise_id = $1",
    )
    .bind(franchise_id)
    .fetch_one(pool)
    .await?;

    let (lead_count, leads_converted): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'converted') \
         FROM leads WHERE deleted_at IS NULL AND franchise_id = $1",
    )
    .bind(franchise_id)
    .fetch_one(pool)
    .await?;

    Ok(FranchiseStats {
        series,
        revenue: PeriodCard::new(current, previous),
        unit_count,
        lead_count,
        leads_converted,
        conversion_rate_pct: ratio_pct(Decimal::from(leads_converted), Decimal::from(lead_count)),
    })
}

pub async fn unit_performance(
    pool: &PgPool,
    unit_id: Uuid,
    range: DateRange,
) -> Result<UnitPerformance, sqlx::Error> {
    let current: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM revenues \
         WHERE deleted_at IS NULL AND unit_id = $1 AND occurred_on BETWEEN $2 AND $3",
    )
    .bind(unit_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await?;

    let prev_range = range.previous();
    let previous: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM revenues \
         WHERE deleted_at IS NULL AND unit_id = $1 AND occurred_on BETWEEN $2 AND $3",
    )
    .bind(unit_id)
    .bind(prev_range.start)
    .bind(prev_range.end)
    .fetch_one(pool)
    .await?;

    let expense_total: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM transactions \
         WHERE deleted_at IS NULL AND unit_id = $1 AND kind = 'expense' \
           AND status = 'completed' AND occurred_on BETWEEN $2 AND $3",
    )
    .bind(unit_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await?;

    let (review_count, average_rating): (i64, Option<Decimal>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(rating)::numeric(4,2) \
         FROM reviews WHERE deleted_at IS NULL AND unit_id = $1",
    )
    .bind(unit_id)
    .fetch_one(pool)
    .await?;

    Ok(UnitPerformance {
        revenue: PeriodCard::new(current, previous),
        expense_total,
        net: current - expense_total,
        review_count,
        average_rating,
    })
}
