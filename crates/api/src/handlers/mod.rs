pub mod jobs;
pub mod repositories;
