use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use uuid::Uuid;

pub type UserId = Uuid;
pub type JobId = Uuid;
pub type BidId = Uuid;
pub type NotificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
pub enum UserRole {
    Employer,
    Freelancer,
    Hybrid,
}

impl UserRole {
    pub fn can_post_jobs(&self) -> bool {
        matches!(self, UserRole::Employer | UserRole::Hybrid)
    }

    pub fn can_bid(&self) -> bool {
        matches!(self, UserRole::Freelancer | UserRole::Hybrid)
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UserRole::Employer => "employer",
            UserRole::Freelancer => "freelancer",
            UserRole::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub min: f64,
    pub max: f64,
}

impl Budget {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, amount: f64) -> bool {
        amount.is_finite() && amount >= self.min && amount <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "job_status", rename_all = "snake_case")
)]
pub enum JobStatus {
    Open,
    InProgress,
    Completed,
    Closed,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Open => "open",
            JobStatus::InProgress => "in-progress",
            JobStatus::Completed => "completed",
            JobStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub budget: Budget,
    pub categories: Vec<String>,
    pub skills_required: Vec<String>,
    pub status: JobStatus,
    pub employer: UserId,
    pub bid_accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input of the post-job form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub budget: Budget,
    pub categories: Vec<String>,
    pub skills_required: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "bid_status", rename_all = "snake_case")
)]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
}

impl Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: BidId,
    pub job: JobId,
    pub freelancer: UserId,
    pub amount: f64,
    pub status: BidStatus,
    pub proposal_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBid {
    pub job: JobId,
    pub amount: f64,
    #[serde(default)]
    pub proposal_text: Option<String>,
}

/// Everything written by a single `setBidStatus` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidDecision {
    pub bid: Bid,
    pub job: Job,
    /// Sibling bids rejected because `bid` was accepted.
    pub rejected: Vec<Bid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(
    feature = "sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
pub enum NotificationKind {
    BidReceived,
    BidAccepted,
    BidRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub kind: NotificationKind,
    pub job: JobId,
    pub bid: BidId,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: UserId,
        kind: NotificationKind,
        bid: &Bid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            kind,
            job: bid.job,
            bid: bid.id,
            read: false,
            created_at: now,
        }
    }
}

/// Job listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobFilter {
    pub employer: Option<UserId>,
    pub status: Option<JobStatus>,
    pub category: Option<String>,
    pub skill: Option<String>,
    pub limit: Option<u32>,
}

impl JobFilter {
    /// The public marketplace listing.
    pub fn open() -> Self {
        Self {
            status: Some(JobStatus::Open),
            ..Self::default()
        }
    }

    pub fn by_employer(employer: UserId) -> Self {
        Self {
            employer: Some(employer),
            ..Self::default()
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.employer.map_or(true, |e| job.employer == e)
            && self.status.map_or(true, |s| job.status == s)
            && self
                .category
                .as_ref()
                .map_or(true, |c| job.categories.contains(c))
            && self
                .skill
                .as_ref()
                .map_or(true, |s| job.skills_required.contains(s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[cfg(any(test, feature = "test"))]
pub mod test_utils {
    use super::*;
    use proptest::prelude::*;

    fn tag() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "Design", "Writing", "Web", "Mobile", "Data", "HTML", "CSS", "Rust", "SQL", "Figma",
        ])
        .prop_map(str::to_string)
    }

    impl Arbitrary for NewJob {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        /// Jobs that pass `validate_new_job`.
        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            (
                "[A-Z][a-z]{4,20}( [a-z]{2,10}){0,4}",
                "[A-Z][a-z ]{19,80}\\.",
                0u32..10_000,
                1u32..10_000,
                prop::collection::vec(tag(), 1..4),
                prop::collection::vec(tag(), 1..4),
            )
                .prop_map(|(title, description, min, span, categories, skills)| NewJob {
                    title,
                    description,
                    budget: Budget::new(min as f64, (min + span) as f64),
                    categories,
                    skills_required: skills,
                })
                .boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_spelling() {
        assert_eq!(serde_json::to_value(JobStatus::InProgress).unwrap(), json!("in-progress"));
        assert_eq!(serde_json::to_value(UserRole::Hybrid).unwrap(), json!("hybrid"));
        assert_eq!(
            serde_json::to_value(NotificationKind::BidReceived).unwrap(),
            json!("bidReceived")
        );

        let input: NewJob = serde_json::from_value(json!({
            "title": "Build a landing page",
            "description": "Need a responsive landing page with hero section.",
            "budget": { "min": 100.0, "max": 500.0 },
            "categories": ["Design"],
            "skillsRequired": ["HTML"],
        }))
        .unwrap();
        assert_eq!(input.skills_required, vec!["HTML"]);
        assert!(serde_json::from_value::<JobStatus>(json!("in_progress")).is_err());
    }
}
