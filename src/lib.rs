pub mod aggregate;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod server;
pub mod storage;
pub mod table;
pub mod types;
