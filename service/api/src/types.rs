pub use market::{
    Bid, BidDecision, BidId, BidStatus, Budget, ErrorKind, Job, JobFilter, JobId, JobStatus,
    MarketError, NewBid, NewJob, Notification, NotificationKind, SortOrder, User, UserId,
    UserRole, ValidationErrors,
};

use jsonrpsee::types::{ErrorObject, ErrorObjectOwned};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Code used for failures that are not the caller's fault.
pub const INTERNAL_ERROR_CODE: i32 = -32001;

pub const DEFAULT_RECENT_BIDS: u32 = 10;

/// Structured payload carried in the `data` member of an error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorData {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

pub fn market_error_object(err: &MarketError) -> ErrorObjectOwned {
    let kind = err.kind();
    let fields = match err {
        MarketError::Validation(errors) => Some(errors.0.clone()),
        _ => None,
    };
    ErrorObject::owned(kind.code(), err.to_string(), Some(ApiErrorData { kind, fields }))
}

pub fn internal_error_object(message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObject::owned(INTERNAL_ERROR_CODE, message.into(), None::<()>)
}

/// Recovers the error category from a server error object. `None` for
/// internal failures and anything the server did not classify.
pub fn decode_error_object(err: &ErrorObjectOwned) -> (Option<ErrorKind>, Option<ValidationErrors>) {
    let data = err
        .data()
        .and_then(|raw| serde_json::from_str::<ApiErrorData>(raw.get()).ok());
    match data {
        Some(data) => (Some(data.kind), data.fields.map(ValidationErrors)),
        None => (ErrorKind::from_code(err.code()), None),
    }
}
