use super::{MarketStore, StoreResult};
use chrono::{DateTime, Duration, Utc};
use market::{
    state::Snapshot, Bid, BidDecision, BidId, BidStatus, Job, JobFilter, JobId, JobStatus,
    MarketState, NewBid, NewJob, Notification, SortOrder, User, UserId, UserRole,
};
use tokio::sync::Mutex;
use tracing::{info, instrument};

struct Inner {
    state: MarketState,
    last_tick: DateTime<Utc>,
}

impl Inner {
    /// Wall clock, nudged forward so that no two writes share a timestamp.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now().max(self.last_tick + Duration::microseconds(1));
        self.last_tick = now;
        now
    }
}

/// Keeps the whole marketplace behind one lock, so every operation is a
/// single critical section.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: MarketState::new(),
                last_tick: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }
}

impl MarketStore for MemoryStore {
    async fn register_user(&self, name: &str, role: UserRole) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        Ok(inner.state.register_user(name, role, now)?)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        Ok(self.inner.lock().await.state.user(id)?.clone())
    }

    #[instrument(skip(self, input), level = "debug")]
    async fn create_job(&self, employer: UserId, input: NewJob) -> StoreResult<Job> {
        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        let job = inner.state.create_job(employer, input, now)?;
        info!("Created job {}", job.id);
        Ok(job)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Snapshot<Job>> {
        Ok(self.inner.lock().await.state.list_jobs(filter))
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Job> {
        Ok(self.inner.lock().await.state.job(id)?.clone())
    }

    #[instrument(skip(self), level = "debug")]
    async fn update_job_status(&self, id: JobId, status: JobStatus) -> StoreResult<Job> {
        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        let job = inner.state.update_job_status(id, status, now)?;
        info!("Job {} is now {}", id, job.status);
        Ok(job)
    }

    #[instrument(skip(self, input), level = "debug")]
    async fn create_bid(&self, freelancer: UserId, input: NewBid) -> StoreResult<Bid> {
        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        let bid = inner.state.create_bid(freelancer, input, now)?;
        info!("Bid {} placed on job {}", bid.id, bid.job);
        Ok(bid)
    }

    async fn list_bids_for_job(
        &self,
        job: JobId,
        order: SortOrder,
    ) -> StoreResult<Snapshot<Bid>> {
        Ok(self.inner.lock().await.state.bids_for_job(job, order)?)
    }

    async fn list_bids_for_user(&self, freelancer: UserId) -> StoreResult<Snapshot<Bid>> {
        Ok(self.inner.lock().await.state.bids_for_user(freelancer))
    }

    async fn recent_bids(&self, employer: UserId, limit: u32) -> StoreResult<Snapshot<Bid>> {
        Ok(self
            .inner
            .lock()
            .await
            .state
            .recent_bids(employer, limit as usize))
    }

    async fn get_bid(&self, id: BidId) -> StoreResult<Bid> {
        Ok(self.inner.lock().await.state.bid(id)?.clone())
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_bid_status(&self, id: BidId, status: BidStatus) -> StoreResult<BidDecision> {
        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        let decision = inner.state.set_bid_status(id, status, now)?;
        info!(
            "Bid {} {}, {} sibling bids rejected",
            id,
            decision.bid.status,
            decision.rejected.len()
        );
        Ok(decision)
    }

    async fn notifications(&self, user: UserId) -> StoreResult<Snapshot<Notification>> {
        Ok(self.inner.lock().await.state.notifications(user))
    }

    async fn unread_count(&self, user: UserId) -> StoreResult<u64> {
        Ok(self.inner.lock().await.state.unread_count(user))
    }

    async fn mark_notifications_read(&self, user: UserId) -> StoreResult<u64> {
        Ok(self.inner.lock().await.state.mark_notifications_read(user))
    }
}
