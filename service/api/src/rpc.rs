use super::types::{
    Bid, BidDecision, BidId, BidStatus, Job, JobFilter, JobId, JobStatus, NewBid, NewJob,
    Notification, SortOrder, User, UserId, UserRole,
};
use jsonrpsee::{proc_macros::rpc, types::ErrorObjectOwned};

#[rpc(server, client)]
pub trait MarketApi {
    #[method(name = "registerUser")]
    async fn register_user(&self, name: String, role: UserRole) -> Result<User, ErrorObjectOwned>;

    #[method(name = "getUser")]
    async fn get_user(&self, id: UserId) -> Result<User, ErrorObjectOwned>;

    #[method(name = "createJob")]
    async fn create_job(&self, caller: UserId, job: NewJob) -> Result<Job, ErrorObjectOwned>;

    #[method(name = "listJobs")]
    async fn list_jobs(&self, filter: Option<JobFilter>) -> Result<Vec<Job>, ErrorObjectOwned>;

    #[method(name = "getJob")]
    async fn get_job(&self, id: JobId) -> Result<Job, ErrorObjectOwned>;

    #[method(name = "updateJobStatus")]
    async fn update_job_status(
        &self,
        caller: UserId,
        id: JobId,
        status: JobStatus,
    ) -> Result<Job, ErrorObjectOwned>;

    #[method(name = "createBid")]
    async fn create_bid(&self, caller: UserId, bid: NewBid) -> Result<Bid, ErrorObjectOwned>;

    #[method(name = "listBidsForJob")]
    async fn list_bids_for_job(
        &self,
        job: JobId,
        order: Option<SortOrder>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned>;

    #[method(name = "listBidsForUser")]
    async fn list_bids_for_user(&self, freelancer: UserId) -> Result<Vec<Bid>, ErrorObjectOwned>;

    #[method(name = "recentBids")]
    async fn recent_bids(
        &self,
        caller: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned>;

    #[method(name = "setBidStatus")]
    async fn set_bid_status(
        &self,
        caller: UserId,
        id: BidId,
        status: BidStatus,
    ) -> Result<BidDecision, ErrorObjectOwned>;

    #[method(name = "listNotifications")]
    async fn list_notifications(&self, caller: UserId)
        -> Result<Vec<Notification>, ErrorObjectOwned>;

    #[method(name = "unreadCount")]
    async fn unread_count(&self, caller: UserId) -> Result<u64, ErrorObjectOwned>;

    #[method(name = "markNotificationsRead")]
    async fn mark_notifications_read(&self, caller: UserId) -> Result<u64, ErrorObjectOwned>;

    #[method(name = "healthCheck")]
    async fn health_check(&self) -> Result<(), ErrorObjectOwned>;
}
