//! # Contracts
//!
//! Frozen interface contracts shared by every relay crate: the message data
//! model, the source/sink/observer traits and the configuration blueprint.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Ownership Model
//! - A `Message` is immutable once received
//! - It moves Source -> Dispatcher -> publish task, never shared mutably

mod blueprint;
mod error;
mod message;
pub mod metric_names;
mod observer;
mod sink;
mod source;

pub use blueprint::*;
pub use error::*;
pub use message::*;
pub use observer::Observer;
pub use sink::*;
pub use source::*;
