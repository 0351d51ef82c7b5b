pub mod notify;
pub mod schema;

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Clone)]
pub struct DBConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub max_connections: u32,
}

impl DBConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }

    pub fn from_environment() -> Result<Self> {
        let max_connections = match std::env::var("DB_MAX_CONNECTIONS") {
            Ok(v) => v.parse()?,
            Err(_) => 5,
        };
        Ok(DBConfig {
            host: std::env::var("DB_HOST")?,
            port: std::env::var("DB_PORT")?.parse()?,
            user: std::env::var("DB_USER")?,
            password: std::env::var("DB_PASSWORD")?,
            dbname: std::env::var("DB_NAME")?,
            max_connections,
        })
    }
}

#[derive(Clone)]
pub struct DB {
    pub pool: PgPool,
}

impl DB {
    pub async fn new(config: DBConfig) -> Result<Self> {
        let connection_string = config.connection_string();
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&connection_string)
            .await?;
        Ok(Self { pool })
    }

    pub async fn new_from_environment() -> Result<Self> {
        Self::new(DBConfig::from_environment()?).await
    }
}
