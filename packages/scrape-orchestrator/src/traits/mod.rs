pub mod extractor;
pub mod job_store;
