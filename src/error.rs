use chrono::NaiveDate;

use crate::models::{StudentId, ValidationError};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("student {0} is not on the active roster")]
    UnknownStudent(StudentId),

    #[error("{name} is already marked present on {date}")]
    AlreadyPresent { name: String, date: NaiveDate },

    #[error("{name} has no attendance on {date}")]
    NotPresent { name: String, date: NaiveDate },
}
