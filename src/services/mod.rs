//! Services Layer
//!
//! Business logic shared by every presentation layer that drives Cryptoinfo.
//!
//! # Services
//!
//! - `FlowManager` - Start, advance and abort configuration flows

pub mod flow_service;

pub use flow_service::{FlowInfo, FlowManager, FlowStep};
