//! Event adapter trait for type-safe payload extraction

use crate::types::{Event, EventClass};

use super::AdapterValidation;

/// Dual-phase event adapter providing class-time validation and per-event extraction.
///
/// `validate_class()` runs once per event class seen by a consumer, `adapt()` runs for
/// every event of that class using the pre-computed extraction plan.
pub trait EventAdapter: Sized {
    /// Validate the adapter against an event class.
    ///
    /// This method:
    /// - Checks that all required payload members exist
    /// - Checks that member classes match the native types read from them
    /// - Builds the extraction plan (member indices) used by `adapt`
    ///
    /// An error means the adapter does not apply to events of this class.
    fn validate_class(class: &EventClass) -> crate::Result<AdapterValidation>;

    /// Extract a value from one event using the pre-validated plan.
    ///
    /// Required members are read by index; no name lookups on the hot path.
    fn adapt(event: &Event, validation: &AdapterValidation) -> Self;
}
