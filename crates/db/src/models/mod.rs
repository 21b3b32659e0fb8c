pub mod activity;
pub mod event;
pub mod notification;
pub mod proposal;
pub mod review;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
