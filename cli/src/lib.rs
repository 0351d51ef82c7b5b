pub mod cli;
pub mod client;
pub mod demo;
pub mod env;
