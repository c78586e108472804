use chrono::NaiveDate;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use super::error::QueryError;
use super::page::{PageParams, Paginated};

/// Owned bind value for a positional query parameter.
#[derive(Debug, Clone)]
pub enum Bind {
    Uuid(Uuid),
    UuidList(Vec<Uuid>),
    Text(String),
    Date(NaiveDate),
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "asc" | "ASC" => Ok(SortDirection::Asc),
            "desc" | "DESC" => Ok(SortDirection::Desc),
            other => Err(QueryError::InvalidSortDirection(other.to_string())),
        }
    }
}

/// Composable SELECT over one table: scope and filter conditions with
/// positional binds, a whitelisted ORDER BY, and LIMIT/OFFSET pagination.
///
/// Table and column names are compile-time `&'static str`s supplied by the
/// handlers; only values travel as bind parameters. Soft-deleted rows are
/// excluded unless `include_deleted` is set.
#[derive(Debug)]
pub struct SelectQuery {
    table: &'static str,
    conditions: Vec<String>,
    binds: Vec<Bind>,
    order_by: Option<(String, SortDirection)>,
    page: i64,
    per_page: Option<i64>,
    include_deleted: bool,
}

impl SelectQuery {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            conditions: vec![],
            binds: vec![],
            order_by: None,
            page: 1,
            per_page: None,
            include_deleted: false,
        }
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    fn param(&mut self, bind: Bind) -> String {
        self.binds.push(bind);
        format!("${}", self.binds.len())
    }

    pub fn and_eq_uuid(&mut self, column: &'static str, value: Uuid) -> &mut Self {
        let p = self.param(Bind::Uuid(value));
        self.conditions.push(format!("\"{}\" = {}", column, p));
        self
    }

    /// `column = ANY($n)` against a uuid list; an empty list matches nothing.
    pub fn and_any_uuid(&mut self, column: &'static str, values: Vec<Uuid>) -> &mut Self {
        let p = self.param(Bind::UuidList(values));
        self.conditions.push(format!("\"{}\" = ANY({})", column, p));
        self
    }

    pub fn and_eq_text(&mut self, column: &'static str, value: impl Into<String>) -> &mut Self {
        let p = self.param(Bind::Text(value.into()));
        self.conditions.push(format!("\"{}\" = {}", column, p));
        self
    }

    /// Equality against a Postgres enum column, bound as text. The cast keeps
    /// the bind a plain TEXT parameter.
    pub fn and_eq_status(&mut self, column: &'static str, value: &str) -> &mut Self {
        let p = self.param(Bind::Text(value.to_string()));
        self.conditions
            .push(format!("\"{}\"::text = {}", column, p));
        self
    }

    pub fn and_eq_bool(&mut self, column: &'static str, value: bool) -> &mut Self {
        let p = self.param(Bind::Bool(value));
        self.conditions.push(format!("\"{}\" = {}", column, p));
        self
    }

    pub fn and_ilike(&mut self, column: &'static str, needle: &str) -> &mut Self {
        let p = self.param(Bind::Text(format!("%{}%", needle)));
        self.conditions.push(format!("\"{}\" ILIKE {}", column, p));
        self
    }

    pub fn and_date_from(&mut self, column: &'static str, date: NaiveDate) -> &mut Self {
        let p = self.param(Bind::Date(date));
        self.conditions.push(format!("\"{}\" >= {}", column, p));
        self
    }

    pub fn and_date_to(&mut self, column: &'static str, date: NaiveDate) -> &mut Self {
        let p = self.param(Bind::Date(date));
        self.conditions.push(format!("\"{}\" <= {}", column, p));
        self
    }

    pub fn and_is_null(&mut self, column: &'static str) -> &mut Self {
        self.conditions.push(format!("\"{}\" IS NULL", column));
        self
    }

    pub fn and_not_null(&mut self, column: &'static str) -> &mut Self {
        self.conditions.push(format!("\"{}\" IS NOT NULL", column));
        self
    }

    /// Apply `sort`/`order` request parameters against a column whitelist.
    pub fn order(
        &mut self,
        sort: Option<&str>,
        direction: Option<&str>,
        allowed: &[&'static str],
        default: &'static str,
    ) -> Result<&mut Self, QueryError> {
        let column = match sort {
            Some(requested) => {
                if !allowed.contains(&requested) {
                    return Err(QueryError::InvalidSortColumn(requested.to_string()));
                }
                requested.to_string()
            }
            None => default.to_string(),
        };
        let dir = match direction {
            Some(d) => SortDirection::parse(d)?,
            None => SortDirection::Desc,
        };
        self.order_by = Some((column, dir));
        Ok(self)
    }

    pub fn paginate(&mut self, params: &PageParams) -> &mut Self {
        self.page = params.page();
        self.per_page = Some(params.per_page());
        self
    }

    fn where_clause(&self) -> String {
        let mut parts = vec![];
        if !self.include_deleted {
            parts.push("\"deleted_at\" IS NULL".to_string());
        }
        parts.extend(self.conditions.iter().cloned());
        if parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", parts.join(" AND "))
        }
    }

    pub fn select_sql(&self) -> String {
        let mut sql = format!("SELECT * FROM \"{}\"", self.table);
        let where_clause = self.where_clause();
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        if let Some((column, dir)) = &self.order_by {
            sql.push_str(&format!(" ORDER BY \"{}\" {}", column, dir.to_sql()));
        }
        if let Some(per_page) = self.per_page {
            sql.push_str(&format!(
                " LIMIT {} OFFSET {}",
                per_page,
                (self.page - 1) * per_page
            ));
        }
        sql
    }

    pub fn count_sql(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM \"{}\"", self.table);
        let where_clause = self.where_clause();
        if !where_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&where_clause);
        }
        sql
    }

    pub async fn fetch_all<T>(&self, pool: &PgPool) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = self.select_sql();
        let mut query = sqlx::query_as::<_, T>(&sql);
        for bind in &self.binds {
            query = bind_query_as(query, bind);
        }
        query.fetch_all(pool).await
    }

    pub async fn fetch_optional<T>(&self, pool: &PgPool) -> Result<Option<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = self.select_sql();
        let mut query = sqlx::query_as::<_, T>(&sql);
        for bind in &self.binds {
            query = bind_query_as(query, bind);
        }
        query.fetch_optional(pool).await
    }

    pub async fn fetch_total(&self, pool: &PgPool) -> Result<i64, sqlx::Error> {
        let sql = self.count_sql();
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for bind in &self.binds {
            query = bind_query_scalar(query, bind);
        }
        query.fetch_one(pool).await
    }

    /// Run the count query and the page query, returning the list envelope.
    pub async fn fetch_paginated<T>(&self, pool: &PgPool) -> Result<Paginated<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let total = self.fetch_total(pool).await?;
        let items = self.fetch_all(pool).await?;
        let per_page = self.per_page.unwrap_or_else(|| (items.len() as i64).max(1));
        Ok(Paginated::new(items, self.page, per_page, total))
    }
}

fn bind_query_as<'q, T>(
    query: sqlx::query::QueryAs<'q, Postgres, T, PgArguments>,
    bind: &Bind,
) -> sqlx::query::QueryAs<'q, Postgres, T, PgArguments> {
    match bind {
        Bind::Uuid(v) => query.bind(*v),
        Bind::UuidList(v) => query.bind(v.clone()),
        Bind::Text(v) => query.bind(v.clone()),
        Bind::Date(v) => query.bind(*v),
        Bind::Bool(v) => query.bind(*v),
        Bind::Int(v) => query.bind(*v),
    }
}

fn bind_query_scalar<'q, T>(
    query: sqlx::query::QueryScalar<'q, Postgres, T, PgArguments>,
    bind: &Bind,
) -> sqlx::query::QueryScalar<'q, Postgres, T, PgArguments> {
    match bind {
        Bind::Uuid(v) => query.bind(*v),
        Bind::UuidList(v) => query.bind(v.clone()),
        Bind::Text(v) => query.bind(v.clone()),
        Bind::Date(v) => query.bind(*v),
        Bind::Bool(v) => query.bind(*v),
        Bind::Int(v) => query.bind(*v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_query_excludes_soft_deleted() {
        let q = SelectQuery::new("leads");
        assert_eq!(
            q.select_sql(),
            "SELECT * FROM \"leads\" WHERE \"deleted_at\" IS NULL"
        );
    }

    #[test]
    fn include_deleted_drops_the_guard() {
        let q = SelectQuery::new("leads").include_deleted();
        assert_eq!(q.select_sql(), "SELECT * FROM \"leads\"");
    }

    #[test]
    fn conditions_number_binds_in_order() {
        let mut q = SelectQuery::new("revenues");
        q.and_eq_uuid("franchise_id", Uuid::nil())
            .and_eq_status("status", "verified")
            .and_date_from("occurred_on", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        let sql = q.select_sql();
        assert!(sql.contains("\"franchise_id\" = $1"));
        assert!(sql.contains("\"status\"::text = $2"));
        assert!(sql.contains("\"occurred_on\" >= $3"));
        assert_eq!(q.binds.len(), 3);
    }

    #[test]
    fn order_rejects_unlisted_columns() {
        let mut q = SelectQuery::new("leads");
        let err = q
            .order(Some("password_hash"), None, &["name", "created_at"], "created_at")
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidSortColumn(_)));
    }

    #[test]
    fn order_defaults_to_descending() {
        let mut q = SelectQuery::new("leads");
        q.order(Some("name"), None, &["name"], "created_at").unwrap();
        assert!(q.select_sql().ends_with("ORDER BY \"name\" DESC"));

        q.order(Some("name"), Some("asc"), &["name"], "created_at")
            .unwrap();
        assert!(q.select_sql().ends_with("ORDER BY \"name\" ASC"));
    }

    #[test]
    fn pagination_applies_limit_and_offset() {
        let mut q = SelectQuery::new("tasks");
        q.paginate(&PageParams {
            page: Some(3),
            per_page: Some(10),
            ..Default::default()
        });
        assert!(q.select_sql().ends_with("LIMIT 10 OFFSET 20"));
        // Count query never carries LIMIT/OFFSET
        assert!(!q.count_sql().contains("LIMIT"));
    }

    #[test]
    fn count_sql_keeps_conditions() {
        let mut q = SelectQuery::new("units");
        q.and_any_uuid("franchise_id", vec![Uuid::nil()]);
        assert_eq!(
            q.count_sql(),
            "SELECT COUNT(*) FROM \"units\" WHERE \"deleted_at\" IS NULL AND \"franchise_id\" = ANY($1)"
        );
    }
}
