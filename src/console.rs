use crate::error::EditError;

/// Capability record the host hands to the editor: a polled byte source, a
/// raw byte sink, and an optional deadline timer for terminal probing.
///
/// The editor never blocks on any of these. `poll_byte` returning `None`
/// simply leaves the engine idle until the next `step`.
pub trait Console {
    /// Return the next input byte if one is available right now.
    fn poll_byte(&mut self) -> Option<u8>;

    /// Write bytes to the terminal. Must not block indefinitely.
    fn write(&mut self, bytes: &[u8]) -> Result<(), EditError>;

    /// Arm the probe deadline. The default does nothing.
    fn arm_timeout(&mut self) {}

    /// True once an armed deadline has passed. The default never elapses,
    /// which leaves the prober waiting for a reply for as long as it takes.
    fn timeout_elapsed(&mut self) -> bool {
        false
    }
}
