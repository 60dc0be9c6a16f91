pub mod admin;
pub mod perfume;
pub mod queue;
