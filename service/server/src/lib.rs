pub mod app_config;
pub mod app_env;
pub mod db;
pub mod pg_notify;
pub mod rpc;
pub mod store;
