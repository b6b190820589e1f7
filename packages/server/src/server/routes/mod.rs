// HTTP routes
pub mod admin;
pub mod jobs;
