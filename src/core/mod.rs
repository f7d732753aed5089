pub mod advisor;
pub mod engine;
pub mod feed;
pub mod monitor;
pub mod operations;
pub mod stats;
