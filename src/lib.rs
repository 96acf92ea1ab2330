pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod heat;
pub mod names;
pub mod report;
pub mod scoring;
pub mod summary;
pub mod tournament;
