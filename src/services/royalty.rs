use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::franchise::Franchise;
use crate::database::models::royalty::Royalty;
use crate::stats::DateRange;

/// Royalty owed on a revenue total: `revenue_total x rate / 100`, rounded to
/// cents.
pub fn royalty_amount(revenue_total: Decimal, rate: Decimal) -> Decimal {
    (revenue_total * rate / Decimal::ONE_HUNDRED).round_dp(2)
}

#[derive(Debug, sqlx::FromRow)]
struct UnitRevenueTotal {
    unit_id: Uuid,
    total: Decimal,
}

/// Generate royalty rows for one franchise over a period.
///
/// Sums verified revenues per unit and inserts one `due` royalty per unit
/// with a non-zero total, all inside a single transaction. Units that
/// already have a royalty for the exact same period are skipped, so a rerun
/// does not double-bill.
pub async fn generate_for_franchise(
    pool: &PgPool,
    franchise: &Franchise,
    period: DateRange,
) -> Result<Vec<Royalty>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let totals: Vec<UnitRevenueTotal> = sqlx::query_as(
        "SELECT unit_id, COALESCE(SUM(amount), 0) AS total \
         FROM revenues \
         WHERE franchise_id = $1 \
           AND status = 'verified' \
           AND occurred_on BETWEEN $2 AND $3 \
           AND deleted_at IS NULL \
         GROUP BY unit_id",
    )
    .bind(franchise.id)
    .bind(period.start)
    .bind(period.end)
    .fetch_all(&mut *tx)
    .await?;

    let mut created = Vec::new();
    for row in totals {
        if row.total.is_zero() {
            continue;
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
               SELECT 1 FROM royalties \
               WHERE franchise_id = $1 AND unit_id = $2 \
                 AND period_start = $3 AND period_end = $4 \
                 AND deleted_at IS NULL)",
        )
        .bind(franchise.id)
        .bind(row.unit_id)
        .bind(period.start)
        .bind(period.end)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            continue;
        }

        let amount = royalty_amount(row.total, franchise.royalty_rate);
        let royalty: Royalty = sqlx::query_as(
            "INSERT INTO royalties \
               (franchise_id, unit_id, period_start, period_end, revenue_total, rate, amount, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'due') \
             RETURNING *",
        )
        .bind(franchise.id)
        .bind(row.unit_id)
        .bind(period.start)
        .bind(period.end)
        .bind(row.total)
        .bind(franchise.royalty_rate)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        created.push(royalty);
    }

    tx.commit().await?;

    tracing::info!(
        franchise_id = %franchise.id,
        count = created.len(),
        "Generated royalties for period {} - {}",
        period.start,
        period.end
    );

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn dec(v: f64) -> Decimal {
        Decimal::from_f64(v).unwrap()
    }

    #[test]
    fn royalty_is_a_percentage_of_revenue() {
        assert_eq!(royalty_amount(dec(10_000.0), dec(6.5)), dec(650.0));
        assert_eq!(royalty_amount(dec(999.99), dec(5.0)), dec(50.0));
        assert_eq!(royalty_amount(dec(0.0), dec(8.0)), dec(0.0));
    }

    #[test]
    fn royalty_rounds_to_cents() {
        // 123.45 * 7.77% = 9.592065 -> 9.59
        assert_eq!(royalty_amount(dec(123.45), dec(7.77)), dec(9.59));
    }
}
