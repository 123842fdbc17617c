pub mod ai;
pub mod config;
pub mod db;
pub mod engage;
pub mod error;
pub mod ingest;
pub mod models;
pub mod recommend;
pub mod shorts;
pub mod source;
