use anyhow::Result;

/// Boundary to the physical output link. Slot writes are buffered and
/// cheap; `submit` pushes the assembled frame onto the wire and is the only
/// fallible step. Implementations own their reconnection story.
pub trait Transport: Send {
    /// Buffer `value` into 1-based slot `address`. Out-of-range addresses
    /// are ignored.
    fn set_channel(&mut self, address: u16, value: u8);

    fn submit(&mut self) -> Result<()>;

    fn close(&mut self);
}

/// Stand-in when no output link is configured: accepts everything,
/// delivers nothing.
pub struct NullTransport;

impl Transport for NullTransport {
    fn set_channel(&mut self, _address: u16, _value: u8) {}

    fn submit(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}
