use crate::pg_notify::{NotifyPayload, TypedChannel};
use market::{Bid, BidId, BidStatus, JobId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub static BID_CHANNEL: LazyLock<TypedChannel<BidEvent>> =
    LazyLock::new(|| TypedChannel::new("bid_events"));

/// Published whenever a bid is placed or decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidEvent {
    pub bid: BidId,
    pub job: JobId,
    pub freelancer: UserId,
    pub status: BidStatus,
}

impl From<&Bid> for BidEvent {
    fn from(bid: &Bid) -> Self {
        Self {
            bid: bid.id,
            job: bid.job,
            freelancer: bid.freelancer,
            status: bid.status,
        }
    }
}

impl NotifyPayload for BidEvent {
    fn decode_payload(payload: &str) -> Result<Self, String> {
        serde_json::from_str(payload).map_err(|e| e.to_string())
    }

    fn encode_payload(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }
}
