pub mod config;
pub mod db;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod migrations;
pub mod notify;
pub mod password;
pub mod server;
