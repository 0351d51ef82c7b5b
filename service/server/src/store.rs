pub mod memory;
pub mod postgres;

use market::{
    state::Snapshot, Bid, BidDecision, BidId, BidStatus, Job, JobFilter, JobId, JobStatus,
    MarketError, NewBid, NewJob, Notification, SortOrder, User, UserId, UserRole,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Market(#[from] MarketError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for the job/bid lifecycle. Every mutating call is atomic:
/// it either applies all of its writes or fails without changing anything.
#[allow(async_fn_in_trait)]
pub trait MarketStore {
    async fn register_user(&self, name: &str, role: UserRole) -> StoreResult<User>;
    async fn get_user(&self, id: UserId) -> StoreResult<User>;

    async fn create_job(&self, employer: UserId, input: NewJob) -> StoreResult<Job>;
    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Snapshot<Job>>;
    async fn get_job(&self, id: JobId) -> StoreResult<Job>;
    async fn update_job_status(&self, id: JobId, status: JobStatus) -> StoreResult<Job>;

    async fn create_bid(&self, freelancer: UserId, input: NewBid) -> StoreResult<Bid>;
    async fn list_bids_for_job(&self, job: JobId, order: SortOrder)
        -> StoreResult<Snapshot<Bid>>;
    async fn list_bids_for_user(&self, freelancer: UserId) -> StoreResult<Snapshot<Bid>>;
    async fn recent_bids(&self, employer: UserId, limit: u32) -> StoreResult<Snapshot<Bid>>;
    async fn get_bid(&self, id: BidId) -> StoreResult<Bid>;
    async fn set_bid_status(&self, id: BidId, status: BidStatus) -> StoreResult<BidDecision>;

    async fn notifications(&self, user: UserId) -> StoreResult<Snapshot<Notification>>;
    async fn unread_count(&self, user: UserId) -> StoreResult<u64>;
    async fn mark_notifications_read(&self, user: UserId) -> StoreResult<u64>;
}

/// The backend picked at startup.
pub enum Store {
    Memory(memory::MemoryStore),
    Postgres(postgres::PostgresStore),
}

macro_rules! dispatch {
    ($self:ident, $method:ident($($arg:expr),*)) => {
        match $self {
            Store::Memory(s) => s.$method($($arg),*).await,
            Store::Postgres(s) => s.$method($($arg),*).await,
        }
    };
}

impl MarketStore for Store {
    async fn register_user(&self, name: &str, role: UserRole) -> StoreResult<User> {
        dispatch!(self, register_user(name, role))
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        dispatch!(self, get_user(id))
    }

    async fn create_job(&self, employer: UserId, input: NewJob) -> StoreResult<Job> {
        dispatch!(self, create_job(employer, input))
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Snapshot<Job>> {
        dispatch!(self, list_jobs(filter))
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Job> {
        dispatch!(self, get_job(id))
    }

    async fn update_job_status(&self, id: JobId, status: JobStatus) -> StoreResult<Job> {
        dispatch!(self, update_job_status(id, status))
    }

    async fn create_bid(&self, freelancer: UserId, input: NewBid) -> StoreResult<Bid> {
        dispatch!(self, create_bid(freelancer, input))
    }

    async fn list_bids_for_job(
        &self,
        job: JobId,
        order: SortOrder,
    ) -> StoreResult<Snapshot<Bid>> {
        dispatch!(self, list_bids_for_job(job, order))
    }

    async fn list_bids_for_user(&self, freelancer: UserId) -> StoreResult<Snapshot<Bid>> {
        dispatch!(self, list_bids_for_user(freelancer))
    }

    async fn recent_bids(&self, employer: UserId, limit: u32) -> StoreResult<Snapshot<Bid>> {
        dispatch!(self, recent_bids(employer, limit))
    }

    async fn get_bid(&self, id: BidId) -> StoreResult<Bid> {
        dispatch!(self, get_bid(id))
    }

    async fn set_bid_status(&self, id: BidId, status: BidStatus) -> StoreResult<BidDecision> {
        dispatch!(self, set_bid_status(id, status))
    }

    async fn notifications(&self, user: UserId) -> StoreResult<Snapshot<Notification>> {
        dispatch!(self, notifications(user))
    }

    async fn unread_count(&self, user: UserId) -> StoreResult<u64> {
        dispatch!(self, unread_count(user))
    }

    async fn mark_notifications_read(&self, user: UserId) -> StoreResult<u64> {
        dispatch!(self, mark_notifications_read(user))
    }
}
