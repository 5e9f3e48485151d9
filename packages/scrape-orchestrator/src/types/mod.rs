pub mod batch;
pub mod config;
pub mod job;
pub mod kind;
pub mod record;
pub mod report;
