use clap::Parser;
use market_server::{
    app_config::{init_console_subscriber, AppConfig},
    app_env::AppEnv,
    db::notify::{BidEvent, BID_CHANNEL},
    pg_notify::PgNotifier,
    rpc,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, info};

async fn listen_for_bid_events(pool: PgPool) -> anyhow::Result<()> {
    let notifier = PgNotifier::<BidEvent>::new(&pool, BID_CHANNEL.clone()).await?;
    let mut subs = notifier.subscribe();

    tokio::spawn(async move {
        while let Some(event) = subs.recv().await {
            info!(
                "Bid {} on job {} by {} is {}",
                event.bid, event.job, event.freelancer, event.status
            );
        }
    });

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_console_subscriber();
    let cli = AppConfig::parse();
    debug!("{}", serde_json::to_string_pretty(&cli)?);

    let addr = {
        let host = "0.0.0.0";
        let addr = format!("{}:{}", host, cli.json_rpc_port);
        addr.parse::<SocketAddr>()
    }?;

    let app_env = Arc::new(AppEnv::new(&cli).await?);
    if let Some(pool) = app_env.pool() {
        listen_for_bid_events(pool).await?;
    }

    let (_, handle) = rpc::start(addr, app_env).await?;

    // Keep the server running until Ctrl+C is pressed
    tokio::signal::ctrl_c().await?;

    handle.stop()?;
    info!("JSON-RPC server stopped");

    Ok(())
}
