//! Observer trait - local side-channel for relayed payloads

use crate::Message;

/// Local observer
///
/// Called synchronously from the dispatcher loop, so observation order
/// matches inbound arrival order. Implementations must return quickly.
pub trait Observer: Send {
    /// Observer name (used for logging)
    fn name(&self) -> &str;

    /// Surface one relayed message
    fn observe(&mut self, message: &Message);
}
