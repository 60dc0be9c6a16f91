pub mod cache;
pub mod catalog;
pub mod clock;
pub mod discovery;
pub mod extractor;
pub mod fetcher;
pub mod orchestrator;
pub mod queue;
pub mod worker;
