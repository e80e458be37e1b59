use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored signing date {0:?} is not YYYY-MM-DD")]
    BadSigningDate(String),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),
}
