use jsonrpsee::{
    core::ClientError as RpcError,
    http_client::{HttpClient, HttpClientBuilder},
};
use market::{
    validation::{validate_new_job, validate_user_name},
    MarketError,
};
use market_api::{
    rpc::MarketApiClient,
    types::{
        decode_error_object, Bid, BidDecision, BidId, BidStatus, ErrorKind, Job, JobFilter, JobId,
        JobStatus, NewBid, NewJob, Notification, SortOrder, User, UserId, UserRole,
        ValidationErrors,
    },
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Caught locally, nothing was sent.
    #[error("invalid input: {0}")]
    Validation(ValidationErrors),
    #[error("{message}")]
    Api {
        kind: Option<ErrorKind>,
        message: String,
        fields: Option<ValidationErrors>,
    },
    #[error(transparent)]
    Network(RpcError),
}

impl ClientError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::Validation(_) => Some(ErrorKind::Validation),
            ClientError::Api { kind, .. } => *kind,
            ClientError::Network(_) => None,
        }
    }
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Call(obj) => {
                let (kind, fields) = decode_error_object(&obj);
                ClientError::Api {
                    kind,
                    message: obj.message().to_string(),
                    fields,
                }
            }
            other => ClientError::Network(other),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A missing parent means there is nothing to list.
fn or_empty<T>(res: ClientResult<Vec<T>>) -> ClientResult<Vec<T>> {
    match res {
        Err(e) if e.kind() == Some(ErrorKind::NotFound) => {
            debug!("Treating {} as an empty listing", e);
            Ok(Vec::new())
        }
        res => res,
    }
}

pub struct MarketClient {
    inner: HttpClient,
}

impl MarketClient {
    pub fn new(url: &Url, timeout: Duration) -> ClientResult<Self> {
        let inner = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url.as_str())?;
        Ok(Self { inner })
    }

    pub async fn health_check(&self) -> ClientResult<()> {
        Ok(self.inner.health_check().await?)
    }

    pub async fn register_user(&self, name: &str, role: UserRole) -> ClientResult<User> {
        match validate_user_name(name) {
            Err(MarketError::Validation(errors)) => return Err(ClientError::Validation(errors)),
            Err(e) => {
                return Err(ClientError::Api {
                    kind: Some(e.kind()),
                    message: e.to_string(),
                    fields: None,
                })
            }
            Ok(()) => {}
        }
        Ok(self.inner.register_user(name.to_string(), role).await?)
    }

    pub async fn get_user(&self, id: UserId) -> ClientResult<User> {
        Ok(self.inner.get_user(id).await?)
    }

    #[instrument(skip(self, job), level = "debug")]
    pub async fn create_job(&self, caller: UserId, job: NewJob) -> ClientResult<Job> {
        let errors = validate_new_job(&job);
        if !errors.is_empty() {
            return Err(ClientError::Validation(errors));
        }
        Ok(self.inner.create_job(caller, job).await?)
    }

    pub async fn list_jobs(&self, filter: JobFilter) -> ClientResult<Vec<Job>> {
        or_empty(
            self.inner
                .list_jobs(Some(filter))
                .await
                .map_err(ClientError::from),
        )
    }

    pub async fn get_job(&self, id: JobId) -> ClientResult<Job> {
        Ok(self.inner.get_job(id).await?)
    }

    pub async fn update_job_status(
        &self,
        caller: UserId,
        id: JobId,
        status: JobStatus,
    ) -> ClientResult<Job> {
        Ok(self.inner.update_job_status(caller, id, status).await?)
    }

    #[instrument(skip(self, bid), level = "debug")]
    pub async fn create_bid(&self, caller: UserId, bid: NewBid) -> ClientResult<Bid> {
        if !bid.amount.is_finite() {
            let mut errors = ValidationErrors::new();
            errors.add("amount", "Amount must be a number");
            return Err(ClientError::Validation(errors));
        }
        Ok(self.inner.create_bid(caller, bid).await?)
    }

    pub async fn list_bids_for_job(
        &self,
        job: JobId,
        order: Option<SortOrder>,
    ) -> ClientResult<Vec<Bid>> {
        or_empty(
            self.inner
                .list_bids_for_job(job, order)
                .await
                .map_err(ClientError::from),
        )
    }

    pub async fn list_bids_for_user(&self, freelancer: UserId) -> ClientResult<Vec<Bid>> {
        or_empty(
            self.inner
                .list_bids_for_user(freelancer)
                .await
                .map_err(ClientError::from),
        )
    }

    pub async fn recent_bids(&self, caller: UserId, limit: Option<u32>) -> ClientResult<Vec<Bid>> {
        or_empty(
            self.inner
                .recent_bids(caller, limit)
                .await
                .map_err(ClientError::from),
        )
    }

    pub async fn set_bid_status(
        &self,
        caller: UserId,
        id: BidId,
        status: BidStatus,
    ) -> ClientResult<BidDecision> {
        Ok(self.inner.set_bid_status(caller, id, status).await?)
    }

    pub async fn notifications(&self, caller: UserId) -> ClientResult<Vec<Notification>> {
        or_empty(
            self.inner
                .list_notifications(caller)
                .await
                .map_err(ClientError::from),
        )
    }

    pub async fn unread_count(&self, caller: UserId) -> ClientResult<u64> {
        Ok(self.inner.unread_count(caller).await?)
    }

    pub async fn mark_notifications_read(&self, caller: UserId) -> ClientResult<u64> {
        Ok(self.inner.mark_notifications_read(caller).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market::Budget;
    use market_api::types::market_error_object;
    use uuid::Uuid;

    fn unreachable() -> MarketClient {
        let url = Url::parse("http://127.0.0.1:1").unwrap();
        MarketClient::new(&url, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn call_errors_keep_their_kind() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "Title must be at least 5 characters");
        let obj = market_error_object(&MarketError::Validation(errors.clone()));
        let err = ClientError::from(RpcError::Call(obj));
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
        let ClientError::Api { fields, .. } = err else {
            panic!("expected an api error");
        };
        assert_eq!(fields, Some(errors));
    }

    #[test]
    fn not_found_lists_are_empty() {
        let obj = market_error_object(&MarketError::not_found(
            market::error::Entity::Job,
            Uuid::new_v4(),
        ));
        let res: ClientResult<Vec<Bid>> = Err(ClientError::from(RpcError::Call(obj)));
        assert!(or_empty(res).unwrap().is_empty());

        let obj = market_error_object(&MarketError::Forbidden("no".into()));
        let res: ClientResult<Vec<Bid>> = Err(ClientError::from(RpcError::Call(obj)));
        assert_eq!(or_empty(res).unwrap_err().kind(), Some(ErrorKind::Forbidden));
    }

    #[tokio::test]
    async fn invalid_job_never_leaves_the_client() {
        let job = NewJob {
            title: "Hi".into(),
            description: "Too short".into(),
            budget: Budget::new(500.0, 100.0),
            categories: vec![],
            skills_required: vec!["HTML".into()],
        };
        let err = unreachable()
            .create_job(Uuid::new_v4(), job)
            .await
            .unwrap_err();
        let ClientError::Validation(errors) = err else {
            panic!("expected local validation, got {:?}", err);
        };
        assert!(errors.contains("title"));
        assert!(errors.contains("description"));
        assert!(errors.contains("budgetMax"));
        assert!(errors.contains("categories"));
    }

    #[tokio::test]
    async fn blank_name_never_leaves_the_client() {
        let err = unreachable()
            .register_user("   ", UserRole::Freelancer)
            .await
            .unwrap_err();
        let ClientError::Validation(errors) = err else {
            panic!("expected local validation, got {:?}", err);
        };
        assert!(errors.contains("name"));
    }

    #[tokio::test]
    async fn transport_failures_are_network_errors() {
        let err = unreachable().health_check().await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(err.kind(), None);
    }
}
