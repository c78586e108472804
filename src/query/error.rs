use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Cannot sort by '{0}'")]
    InvalidSortColumn(String),

    #[error("Invalid sort direction '{0}', expected 'asc' or 'desc'")]
    InvalidSortDirection(String),

    #[error("Invalid value for '{0}': {1}")]
    InvalidFilterValue(&'static str, String),
}
