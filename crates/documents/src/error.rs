use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Invalid date range: start {start} must precede end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}
