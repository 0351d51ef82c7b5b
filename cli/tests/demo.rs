use market::{Budget, ErrorKind, JobFilter, NewJob, UserRole};
use market_cli::{
    client::{ClientError, MarketClient},
    demo::run_demo,
};
use market_server::{app_env::AppEnv, rpc};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use url::Url;
use uuid::Uuid;

async fn connect() -> (MarketClient, rpc::ServerHandle) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (addr, handle) = rpc::start(addr, Arc::new(AppEnv::in_memory()))
        .await
        .unwrap();
    let url = Url::parse(&format!("http://{}", addr)).unwrap();
    let client = MarketClient::new(&url, Duration::from_secs(10)).unwrap();
    (client, handle)
}

#[tokio::test]
async fn demo_runs_against_in_memory_server() {
    let (client, handle) = connect().await;
    run_demo(&client, 3, 4).await.unwrap();
    handle.stop().unwrap();
}

#[tokio::test]
async fn bids_of_missing_job_list_as_empty() {
    let (client, handle) = connect().await;
    assert!(client
        .list_bids_for_job(Uuid::new_v4(), None)
        .await
        .unwrap()
        .is_empty());
    let err = client.get_job(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    handle.stop().unwrap();
}

#[tokio::test]
async fn server_refusals_are_api_errors() {
    let (client, handle) = connect().await;
    let freelancer = client
        .register_user("Alice", UserRole::Freelancer)
        .await
        .unwrap();
    let job = NewJob {
        title: "Build a landing page".into(),
        description: "Need a responsive landing page with hero section and contact form.".into(),
        budget: Budget::new(100.0, 500.0),
        categories: vec!["Design".into()],
        skills_required: vec!["HTML".into(), "CSS".into()],
    };
    let err = client.create_job(freelancer.id, job).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Api {
            kind: Some(ErrorKind::Forbidden),
            ..
        }
    ));
    assert!(client.list_jobs(JobFilter::open()).await.unwrap().is_empty());
    handle.stop().unwrap();
}
