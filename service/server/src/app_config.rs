use crate::db::DBConfig;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use time::macros::format_description;
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::UtcTime},
    EnvFilter,
};

#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about, long_about = None)]
pub struct AppBaseConfig {
    /// Database host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value = "5432")]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", default_value = "")]
    #[serde(skip_serializing)]
    pub db_password: String,

    /// Database name
    #[arg(long, env = "DB_NAME", default_value = "app")]
    pub db_name: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,
}

impl AppBaseConfig {
    /// Get the database configuration
    pub fn db_config(&self) -> DBConfig {
        DBConfig {
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            dbname: self.db_name.clone(),
            max_connections: self.db_max_connections,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Everything lives in process memory and is lost on exit
    Memory,
    Postgres,
}

#[derive(Parser, Debug, Clone, Serialize)]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[clap(flatten)]
    pub base_config: AppBaseConfig,

    #[arg(long, env = "JSON_RPC_PORT", default_value = "3030")]
    pub json_rpc_port: u16,

    /// Storage backend
    #[arg(long, env = "STORE", value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,
}

pub fn init_console_subscriber() {
    let timer = UtcTime::new(format_description!(
        "[year]-[month]-[day]T[hour repr:24]:[minute]:[second].[subsecond digits:3]Z"
    ));
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_span_events(FmtSpan::CLOSE)
        .with_timer(timer)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .init();
}
