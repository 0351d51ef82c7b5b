use anyhow::Result;
use clap::Parser;
use market::{Budget, NewBid, NewJob};
use market_cli::{
    cli::Command,
    client::{ClientError, MarketClient},
    demo::run_demo,
    env::init_console_subscriber,
};
use serde::Serialize;
use tracing::{debug, info};

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(client: &MarketClient, command: Command) -> Result<()> {
    match command {
        Command::RegisterUser(a) => print(&client.register_user(&a.name, a.role).await?),
        Command::GetUser(a) => print(&client.get_user(a.id).await?),
        Command::CreateJob(a) => {
            let job = NewJob {
                title: a.title,
                description: a.description,
                budget: Budget::new(a.budget_min, a.budget_max),
                categories: a.categories,
                skills_required: a.skills,
            };
            print(&client.create_job(a.caller, job).await?)
        }
        Command::ListJobs(a) => print(&client.list_jobs(a.filter()).await?),
        Command::GetJob(a) => print(&client.get_job(a.id).await?),
        Command::UpdateJobStatus(a) => {
            print(&client.update_job_status(a.caller, a.id, a.status).await?)
        }
        Command::CreateBid(a) => {
            let bid = NewBid {
                job: a.job,
                amount: a.amount,
                proposal_text: a.proposal,
            };
            print(&client.create_bid(a.caller, bid).await?)
        }
        Command::ListBidsForJob(a) => print(&client.list_bids_for_job(a.job, a.order).await?),
        Command::ListBidsForUser(a) => print(&client.list_bids_for_user(a.id).await?),
        Command::RecentBids(a) => print(&client.recent_bids(a.caller, a.limit).await?),
        Command::SetBidStatus(a) => print(&client.set_bid_status(a.caller, a.id, a.status).await?),
        Command::Notifications(a) => print(&client.notifications(a.caller).await?),
        Command::UnreadCount(a) => print(&client.unread_count(a.caller).await?),
        Command::MarkNotificationsRead(a) => {
            print(&client.mark_notifications_read(a.caller).await?)
        }
        Command::Health(_) => {
            client.health_check().await?;
            print(&"ok")
        }
        Command::Demo(config) => {
            info!("{}", serde_json::to_string_pretty(&config)?);
            run_demo(client, config.num_jobs, config.num_freelancers).await?;
            info!("Demo finished");
            Ok(())
        }
    }
}

fn report(err: &ClientError) {
    match err {
        ClientError::Validation(errors) => {
            for (field, message) in &errors.0 {
                eprintln!("{}: {}", field, message);
            }
        }
        ClientError::Api {
            kind,
            message,
            fields,
        } => {
            match kind {
                Some(kind) => eprintln!("{}: {}", kind, message),
                None => eprintln!("{}", message),
            }
            for (field, message) in fields.iter().flat_map(|f| f.0.iter()) {
                eprintln!("  {}: {}", field, message);
            }
        }
        ClientError::Network(err) => eprintln!("{}", err),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_console_subscriber();
    let command = Command::parse();
    let base = command.base().clone();
    debug!("{}", serde_json::to_string_pretty(&base)?);
    let client = MarketClient::new(&base.server_url()?, base.timeout())?;

    if let Err(e) = run(&client, command).await {
        match e.downcast_ref::<ClientError>() {
            Some(err) => report(err),
            None => eprintln!("{:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}
