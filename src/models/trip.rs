use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

/// A validated trip creation request.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub owner_name: String,
    pub owner_email: String,
    pub emails_to_invite: Vec<String>,
}

impl NewTrip {
    /// Both ends must lie in the future and the range must not be inverted.
    /// Equal instants are accepted.
    pub fn check_schedule(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.starts_at < now {
            return Err(AppError::InvalidDateRange("invalid start date"));
        }
        if self.ends_at < now || self.ends_at < self.starts_at {
            return Err(AppError::InvalidDateRange("invalid end date"));
        }
        Ok(())
    }
}
