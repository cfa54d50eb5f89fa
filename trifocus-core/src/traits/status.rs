//! Status reporting capability
//!
//! A device exposes its current fields to whatever is presenting them
//! (terminal, log, network) without knowing how they are shown.

/// A single reported value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldValue {
    /// Fixed text, e.g. a state name
    Text(&'static str),
    /// Integer value, e.g. a step count
    Int(i32),
    /// Decimal value, e.g. an angle estimate
    Float(f32),
    /// On/off flag
    Flag(bool),
}

/// Trait for devices that publish status fields
pub trait StatusReport {
    /// Short label identifying the device
    fn label(&self) -> &'static str;

    /// Emit every field as a `(name, value)` pair, in display order
    fn report(&self, sink: &mut dyn FnMut(&'static str, FieldValue));
}
