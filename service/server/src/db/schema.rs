use chrono::{DateTime, Utc};
use market::{
    Bid, BidStatus, Budget, Job, JobStatus, Notification, NotificationKind, User, UserRole,
};
use sqlx::FromRow;
use uuid::Uuid;

// Users table representation
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

// Jobs table representation
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub budget_min: f64,
    pub budget_max: f64,
    pub categories: Vec<String>,
    pub skills_required: Vec<String>,
    pub status: JobStatus,
    pub employer_id: Uuid,
    pub bid_accepted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: row.id,
            title: row.title,
            description: row.description,
            budget: Budget::new(row.budget_min, row.budget_max),
            categories: row.categories,
            skills_required: row.skills_required,
            status: row.status,
            employer: row.employer_id,
            bid_accepted: row.bid_accepted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Bids table representation
#[derive(Debug, FromRow)]
pub struct BidRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub freelancer_id: Uuid,
    pub amount: f64,
    pub status: BidStatus,
    pub proposal_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BidRow> for Bid {
    fn from(row: BidRow) -> Self {
        Bid {
            id: row.id,
            job: row.job_id,
            freelancer: row.freelancer_id,
            amount: row.amount,
            status: row.status,
            proposal_text: row.proposal_text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Notifications table representation
#[derive(Debug, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub job_id: Uuid,
    pub bid_id: Uuid,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            recipient: row.recipient_id,
            kind: row.kind,
            job: row.job_id,
            bid: row.bid_id,
            read: row.read,
            created_at: row.created_at,
        }
    }
}
