pub mod activity_feed;
pub mod aggregation;
pub mod config;
pub mod confirmation;
pub mod deliberation;
pub mod notifications;
pub mod principal;
pub mod publication;
pub mod reviews;
pub mod workflow_error;

#[cfg(test)]
mod workflow_tests;
