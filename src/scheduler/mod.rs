//! Scheduler module for Cryptoinfo
//!
//! Handles background work:
//! - Periodic refresh of every configured record
//! - Spacing of catalog price requests

mod refresh;
mod throttle;

pub use refresh::RefreshScheduler;
pub use throttle::RequestThrottle;
