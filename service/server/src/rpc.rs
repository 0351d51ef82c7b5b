use crate::{
    app_env::AppEnv,
    store::{MarketStore, StoreError},
};
use jsonrpsee::{core::async_trait, server::Server, types::ErrorObjectOwned};
use market::lifecycle;
use market_api::{
    rpc::MarketApiServer,
    types::{
        internal_error_object, market_error_object, Bid, BidDecision, BidId, BidStatus, Job,
        JobFilter, JobId, JobStatus, NewBid, NewJob, Notification, SortOrder, User, UserId,
        UserRole, DEFAULT_RECENT_BIDS,
    },
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, error, info};

pub use jsonrpsee::server::ServerHandle;

impl From<StoreError> for ErrorObjectOwned {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Market(e) => {
                debug!("Request refused: {}", e);
                market_error_object(&e)
            }
            StoreError::Database(e) => {
                error!("Database error: {:#}", e);
                internal_error_object(e.to_string())
            }
        }
    }
}

pub struct MarketApiImpl {
    app_env: Arc<AppEnv>,
}

impl MarketApiImpl {
    pub fn new(app_env: Arc<AppEnv>) -> Self {
        Self { app_env }
    }

    async fn caller(&self, id: UserId) -> Result<User, StoreError> {
        self.app_env.store.get_user(id).await
    }

    async fn owned_job(&self, caller: UserId, id: JobId) -> Result<Job, StoreError> {
        let job = self.app_env.store.get_job(id).await?;
        lifecycle::authorize_employer(caller, &job)?;
        Ok(job)
    }
}

#[async_trait]
impl MarketApiServer for MarketApiImpl {
    async fn register_user(&self, name: String, role: UserRole) -> Result<User, ErrorObjectOwned> {
        let user = self.app_env.store.register_user(&name, role).await?;
        info!("Registered {} {} as {}", user.role, user.name, user.id);
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User, ErrorObjectOwned> {
        Ok(self.caller(id).await?)
    }

    async fn create_job(&self, caller: UserId, job: NewJob) -> Result<Job, ErrorObjectOwned> {
        let user = self.caller(caller).await?;
        lifecycle::authorize_posting(&user).map_err(StoreError::from)?;
        Ok(self.app_env.store.create_job(user.id, job).await?)
    }

    async fn list_jobs(&self, filter: Option<JobFilter>) -> Result<Vec<Job>, ErrorObjectOwned> {
        let filter = filter.unwrap_or_default();
        debug!("Listing jobs with {:?}", filter);
        Ok(self.app_env.store.list_jobs(&filter).await?.collect())
    }

    async fn get_job(&self, id: JobId) -> Result<Job, ErrorObjectOwned> {
        Ok(self.app_env.store.get_job(id).await?)
    }

    async fn update_job_status(
        &self,
        caller: UserId,
        id: JobId,
        status: JobStatus,
    ) -> Result<Job, ErrorObjectOwned> {
        let job = self.owned_job(caller, id).await?;
        lifecycle::authorize_manual_transition(&job, status).map_err(StoreError::from)?;
        Ok(self.app_env.store.update_job_status(id, status).await?)
    }

    async fn create_bid(&self, caller: UserId, bid: NewBid) -> Result<Bid, ErrorObjectOwned> {
        let user = self.caller(caller).await?;
        lifecycle::authorize_bidding(&user).map_err(StoreError::from)?;
        Ok(self.app_env.store.create_bid(user.id, bid).await?)
    }

    async fn list_bids_for_job(
        &self,
        job: JobId,
        order: Option<SortOrder>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned> {
        Ok(self
            .app_env
            .store
            .list_bids_for_job(job, order.unwrap_or_default())
            .await?
            .collect())
    }

    async fn list_bids_for_user(&self, freelancer: UserId) -> Result<Vec<Bid>, ErrorObjectOwned> {
        Ok(self
            .app_env
            .store
            .list_bids_for_user(freelancer)
            .await?
            .collect())
    }

    async fn recent_bids(
        &self,
        caller: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<Bid>, ErrorObjectOwned> {
        Ok(self
            .app_env
            .store
            .recent_bids(caller, limit.unwrap_or(DEFAULT_RECENT_BIDS))
            .await?
            .collect())
    }

    async fn set_bid_status(
        &self,
        caller: UserId,
        id: BidId,
        status: BidStatus,
    ) -> Result<BidDecision, ErrorObjectOwned> {
        let bid = self.app_env.store.get_bid(id).await?;
        self.owned_job(caller, bid.job).await?;
        Ok(self.app_env.store.set_bid_status(id, status).await?)
    }

    async fn list_notifications(
        &self,
        caller: UserId,
    ) -> Result<Vec<Notification>, ErrorObjectOwned> {
        Ok(self.app_env.store.notifications(caller).await?.collect())
    }

    async fn unread_count(&self, caller: UserId) -> Result<u64, ErrorObjectOwned> {
        Ok(self.app_env.store.unread_count(caller).await?)
    }

    async fn mark_notifications_read(&self, caller: UserId) -> Result<u64, ErrorObjectOwned> {
        Ok(self.app_env.store.mark_notifications_read(caller).await?)
    }

    async fn health_check(&self) -> Result<(), ErrorObjectOwned> {
        Ok(())
    }
}

/// Binds the JSON-RPC server and starts serving. Port 0 picks a free port.
pub async fn start(addr: SocketAddr, app_env: Arc<AppEnv>) -> anyhow::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let server_addr: SocketAddr = server.local_addr()?;
    info!("JSON-RPC server started at {}", server_addr);
    let api = MarketApiImpl::new(app_env);
    let handle = server.start(api.into_rpc());
    Ok((server_addr, handle))
}
