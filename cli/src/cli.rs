use clap::Parser;
use market::{BidStatus, JobFilter, JobStatus, SortOrder, UserId, UserRole};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Parses a value the way it is spelled on the wire, e.g. `in-progress`.
fn parse_wire<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|e| e.to_string())
}

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub enum Command {
    RegisterUser(RegisterUserArgs),
    GetUser(IdArgs),
    CreateJob(CreateJobArgs),
    ListJobs(ListJobsArgs),
    GetJob(IdArgs),
    UpdateJobStatus(UpdateJobStatusArgs),
    CreateBid(CreateBidArgs),
    ListBidsForJob(ListBidsForJobArgs),
    ListBidsForUser(IdArgs),
    RecentBids(RecentBidsArgs),
    SetBidStatus(SetBidStatusArgs),
    Notifications(CallerArgs),
    UnreadCount(CallerArgs),
    MarkNotificationsRead(CallerArgs),
    Health(BaseConfig),
    /// Run a full posting, bidding and acceptance round against the server
    Demo(DemoConfig),
}

impl Command {
    pub fn base(&self) -> &BaseConfig {
        match self {
            Command::RegisterUser(a) => &a.base,
            Command::GetUser(a) | Command::GetJob(a) | Command::ListBidsForUser(a) => &a.base,
            Command::CreateJob(a) => &a.base,
            Command::ListJobs(a) => &a.base,
            Command::UpdateJobStatus(a) => &a.base,
            Command::CreateBid(a) => &a.base,
            Command::ListBidsForJob(a) => &a.base,
            Command::RecentBids(a) => &a.base,
            Command::SetBidStatus(a) => &a.base,
            Command::Notifications(a)
            | Command::UnreadCount(a)
            | Command::MarkNotificationsRead(a) => &a.base,
            Command::Health(base) => base,
            Command::Demo(a) => &a.base,
        }
    }
}

#[derive(Clone, Parser, Serialize)]
pub struct BaseConfig {
    #[arg(long, env = "SERVER_PROTOCOL", default_value = "http")]
    pub server_protocol: String,

    /// Server host
    #[arg(long, env = "SERVER_HOST", default_value = "localhost")]
    pub server_host: String,

    /// Server port
    #[arg(long, env = "SERVER_PORT", default_value = "3030")]
    pub server_port: String,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,
}

impl BaseConfig {
    pub fn server_url(&self) -> Result<Url, url::ParseError> {
        let server_url = format!(
            "{}://{}:{}",
            self.server_protocol, self.server_host, self.server_port
        );
        Url::parse(&server_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Clone, Parser, Serialize)]
pub struct IdArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    pub id: Uuid,
}

#[derive(Clone, Parser, Serialize)]
pub struct CallerArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    /// Acting user
    #[arg(long, env = "MARKET_USER")]
    pub caller: UserId,
}

#[derive(Clone, Parser, Serialize)]
pub struct RegisterUserArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    pub name: String,

    /// employer, freelancer or hybrid
    #[arg(long, value_parser = parse_wire::<UserRole>)]
    pub role: UserRole,
}

#[derive(Clone, Parser, Serialize)]
pub struct CreateJobArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    #[arg(long, env = "MARKET_USER")]
    pub caller: UserId,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: String,

    #[arg(long)]
    pub budget_min: f64,

    #[arg(long)]
    pub budget_max: f64,

    /// May be repeated
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// May be repeated
    #[arg(long = "skill")]
    pub skills: Vec<String>,
}

#[derive(Clone, Parser, Serialize)]
pub struct ListJobsArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    #[arg(long)]
    pub employer: Option<UserId>,

    /// open, in-progress, completed or closed
    #[arg(long, value_parser = parse_wire::<JobStatus>)]
    pub status: Option<JobStatus>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub skill: Option<String>,

    #[arg(long)]
    pub limit: Option<u32>,
}

impl ListJobsArgs {
    pub fn filter(&self) -> JobFilter {
        JobFilter {
            employer: self.employer,
            status: self.status,
            category: self.category.clone(),
            skill: self.skill.clone(),
            limit: self.limit,
        }
    }
}

#[derive(Clone, Parser, Serialize)]
pub struct UpdateJobStatusArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    #[arg(long, env = "MARKET_USER")]
    pub caller: UserId,

    pub id: Uuid,

    #[arg(value_parser = parse_wire::<JobStatus>)]
    pub status: JobStatus,
}

#[derive(Clone, Parser, Serialize)]
pub struct CreateBidArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    #[arg(long, env = "MARKET_USER")]
    pub caller: UserId,

    #[arg(long)]
    pub job: Uuid,

    #[arg(long)]
    pub amount: f64,

    #[arg(long)]
    pub proposal: Option<String>,
}

#[derive(Clone, Parser, Serialize)]
pub struct ListBidsForJobArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    pub job: Uuid,

    /// ascending or descending (newest first)
    #[arg(long, value_parser = parse_wire::<SortOrder>)]
    pub order: Option<SortOrder>,
}

#[derive(Clone, Parser, Serialize)]
pub struct RecentBidsArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    #[arg(long, env = "MARKET_USER")]
    pub caller: UserId,

    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Clone, Parser, Serialize)]
pub struct SetBidStatusArgs {
    #[clap(flatten)]
    pub base: BaseConfig,

    #[arg(long, env = "MARKET_USER")]
    pub caller: UserId,

    pub id: Uuid,

    /// accepted or rejected
    #[arg(value_parser = parse_wire::<BidStatus>)]
    pub status: BidStatus,
}

#[derive(Clone, Parser, Serialize)]
pub struct DemoConfig {
    #[clap(flatten)]
    pub base: BaseConfig,

    #[arg(long, env = "NUM_JOBS", default_value_t = 2)]
    pub num_jobs: usize,

    #[arg(long, env = "NUM_FREELANCERS", default_value_t = 3)]
    pub num_freelancers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_use_wire_spelling() {
        let cmd = Command::parse_from([
            "market",
            "update-job-status",
            "--caller",
            "00000000-0000-0000-0000-000000000001",
            "00000000-0000-0000-0000-000000000002",
            "in-progress",
        ]);
        let Command::UpdateJobStatus(args) = cmd else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.status, JobStatus::InProgress);
        assert_eq!(args.base.server_url().unwrap().as_str(), "http://localhost:3030/");
        assert!(parse_wire::<JobStatus>("in_progress").is_err());
    }

    #[test]
    fn repeated_tags_are_collected() {
        let cmd = Command::parse_from([
            "market",
            "create-job",
            "--caller",
            "00000000-0000-0000-0000-000000000001",
            "--title",
            "Build a landing page",
            "--description",
            "Need a responsive landing page with hero section.",
            "--budget-min",
            "100",
            "--budget-max",
            "500",
            "--category",
            "Design",
            "--skill",
            "HTML",
            "--skill",
            "CSS",
            "--server-port",
            "4000",
        ]);
        let Command::CreateJob(args) = cmd else {
            panic!("wrong subcommand");
        };
        assert_eq!(args.skills, vec!["HTML", "CSS"]);
        assert_eq!(args.categories, vec!["Design"]);
        assert_eq!(args.base.server_port, "4000");
    }
}
