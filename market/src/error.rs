use crate::types::{BidId, BidStatus, JobId, JobStatus, UserId};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};
use thiserror::Error;
use uuid::Uuid;

/// Field-keyed messages from a rejected form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), MarketError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(MarketError::Validation(self))
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    User,
    Job,
    Bid,
}

impl Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Entity::User => "user",
            Entity::Job => "job",
            Entity::Bid => "bid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },
    #[error("job {job} is {status}, bids are only accepted while it is open")]
    JobNotOpen { job: JobId, status: JobStatus },
    #[error("job {job} already has an accepted bid")]
    BidAlreadyAccepted { job: JobId },
    #[error("freelancer {freelancer} already bid on job {job}")]
    DuplicateBid { job: JobId, freelancer: UserId },
    #[error("job cannot move from {from} to {to}")]
    InvalidJobTransition { from: JobStatus, to: JobStatus },
    #[error("bid {bid} cannot move from {from} to {to}")]
    InvalidBidTransition {
        bid: BidId,
        from: BidStatus,
        to: BidStatus,
    },
    #[error("bid amount {amount} is outside the budget range [{min}, {max}]")]
    OutOfRange { amount: f64, min: f64, max: f64 },
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl MarketError {
    pub fn not_found(entity: Entity, id: Uuid) -> Self {
        MarketError::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::Validation(_) => ErrorKind::Validation,
            MarketError::NotFound { .. } => ErrorKind::NotFound,
            MarketError::JobNotOpen { .. }
            | MarketError::BidAlreadyAccepted { .. }
            | MarketError::DuplicateBid { .. } => ErrorKind::InvalidState,
            MarketError::InvalidJobTransition { .. } | MarketError::InvalidBidTransition { .. } => {
                ErrorKind::InvalidTransition
            }
            MarketError::OutOfRange { .. } => ErrorKind::OutOfRange,
            MarketError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }
}

/// The error categories surfaced to callers, independent of the variant that
/// produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidState,
    InvalidTransition,
    OutOfRange,
    Forbidden,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::Validation,
        ErrorKind::NotFound,
        ErrorKind::InvalidState,
        ErrorKind::InvalidTransition,
        ErrorKind::OutOfRange,
        ErrorKind::Forbidden,
    ];

    /// JSON-RPC error code. The range sits below the -32001 used for
    /// storage failures.
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::Validation => -32010,
            ErrorKind::NotFound => -32011,
            ErrorKind::InvalidState => -32012,
            ErrorKind::InvalidTransition => -32013,
            ErrorKind::OutOfRange => -32014,
            ErrorKind::Forbidden => -32015,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation error",
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::InvalidTransition => "invalid transition",
            ErrorKind::OutOfRange => "out of range",
            ErrorKind::Forbidden => "forbidden",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_kind() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(-32001), None);
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "too short");
        errors.add("title", "ignored");
        errors.add("budgetMax", "must exceed the minimum");
        assert_eq!(errors.get("title"), Some("too short"));
        assert_eq!(
            errors.to_string(),
            "budgetMax: must exceed the minimum; title: too short"
        );
    }

    #[test]
    fn state_errors_share_a_kind() {
        let job = Uuid::new_v4();
        let errors = [
            MarketError::JobNotOpen {
                job,
                status: JobStatus::Closed,
            },
            MarketError::BidAlreadyAccepted { job },
            MarketError::DuplicateBid {
                job,
                freelancer: Uuid::new_v4(),
            },
        ];
        assert!(errors.iter().all(|e| e.kind() == ErrorKind::InvalidState));
    }
}
