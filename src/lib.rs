//! Weekly DLC team reporting: submission with local fallback, leaderboards,
//! audit exports, and a live view over the remote report collection.

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod report;
pub mod session;
pub mod submit;
pub mod teams;
