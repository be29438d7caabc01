use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use meterline_core::error::{AppError, Result};

/// numeric(10,2): at most 8 integer digits.
const MAX_NUMBER: f64 = 100_000_000.0;

/// Stored account record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub number: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Create/update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInput {
    pub name: String,
    pub number: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl AccountInput {
    /// Validate and normalize (trimmed name, number rounded to cents).
    pub fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidArgument("name should not be empty".into()));
        }
        if name.len() > 255 {
            return Err(AppError::InvalidArgument("name must be at most 255 characters".into()));
        }
        if !self.number.is_finite() || self.number.abs() >= MAX_NUMBER {
            return Err(AppError::InvalidArgument(
                "number must be a finite value with at most 8 integer digits".into(),
            ));
        }
        if self.description.as_ref().is_some_and(|d| d.len() > 255) {
            return Err(AppError::InvalidArgument(
                "description must be at most 255 characters".into(),
            ));
        }
        Ok(Self {
            name,
            number: (self.number * 100.0).round() / 100.0,
            description: self.description,
        })
    }
}
