pub mod active;
pub mod health;
pub mod jobs;
pub mod targets;
