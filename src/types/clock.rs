//! Clock classes and clock snapshots

use crate::object::Ref;
use crate::{GraphError, Result};

const NS_PER_S: i128 = 1_000_000_000;

/// Description of a clock: frequency and offset from its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockClass {
    name: Option<String>,
    description: Option<String>,
    frequency: u64,
    offset_seconds: i64,
    offset_cycles: u64,
    precision: Option<u64>,
    origin_is_unix_epoch: bool,
}

impl Default for ClockClass {
    /// Nanosecond clock whose origin is the Unix epoch.
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            frequency: 1_000_000_000,
            offset_seconds: 0,
            offset_cycles: 0,
            precision: None,
            origin_is_unix_epoch: true,
        }
    }
}

impl ClockClass {
    /// Clock ticking `frequency` times per second.
    pub fn new(frequency: u64) -> Result<Self> {
        if frequency == 0 {
            return Err(GraphError::config("clock frequency must be greater than zero"));
        }
        Ok(Self { frequency, ..Self::default() })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Offset from the origin, in whole seconds plus cycles.
    pub fn with_offset(mut self, seconds: i64, cycles: u64) -> Self {
        self.offset_seconds = seconds;
        self.offset_cycles = cycles;
        self
    }

    pub fn with_precision(mut self, cycles: u64) -> Self {
        self.precision = Some(cycles);
        self
    }

    pub fn with_origin_is_unix_epoch(mut self, unix_epoch: bool) -> Self {
        self.origin_is_unix_epoch = unix_epoch;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn offset(&self) -> (i64, u64) {
        (self.offset_seconds, self.offset_cycles)
    }

    pub fn precision(&self) -> Option<u64> {
        self.precision
    }

    pub fn origin_is_unix_epoch(&self) -> bool {
        self.origin_is_unix_epoch
    }

    /// Nanoseconds from the clock origin for a raw cycle value.
    ///
    /// `None` when the result does not fit an `i64`.
    pub fn cycles_to_ns_from_origin(&self, value: u64) -> Option<i64> {
        let cycles = i128::from(self.offset_cycles) + i128::from(value);
        let ns = cycles * NS_PER_S / i128::from(self.frequency)
            + i128::from(self.offset_seconds) * NS_PER_S;
        i64::try_from(ns).ok()
    }
}

/// Raw clock value captured for a message, with the clock class it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockSnapshot {
    class: Ref<ClockClass>,
    value: u64,
}

impl ClockSnapshot {
    pub fn new(class: Ref<ClockClass>, value: u64) -> Self {
        Self { class, value }
    }

    /// Raw value in clock cycles.
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn clock_class(&self) -> &ClockClass {
        &self.class
    }

    /// Nanoseconds from the clock origin; `None` on overflow.
    pub fn ns_from_origin(&self) -> Option<i64> {
        self.class.cycles_to_ns_from_origin(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_frequency_rejected() {
        assert!(matches!(ClockClass::new(0), Err(GraphError::Config { .. })));
    }

    #[test]
    fn ns_from_origin_applies_frequency_and_offset() {
        let class = ClockClass::new(1_000).unwrap().with_offset(10, 500);
        let snapshot = ClockSnapshot::new(Ref::new(class), 1_500);
        // 10 s + (500 + 1500) ms
        assert_eq!(snapshot.ns_from_origin(), Some(12_000_000_000));
        assert_eq!(snapshot.value(), 1_500);
    }

    #[test]
    fn overflow_yields_none() {
        let class = ClockClass::default().with_offset(i64::MAX, 0);
        assert_eq!(class.cycles_to_ns_from_origin(0), None);

        let negative = ClockClass::default().with_offset(-1, 0);
        assert_eq!(negative.cycles_to_ns_from_origin(0), Some(-1_000_000_000));
    }

    proptest! {
        #[test]
        fn prop_nanosecond_clock_is_identity(value in 0u64..i64::MAX as u64) {
            let class = ClockClass::default();
            prop_assert_eq!(class.cycles_to_ns_from_origin(value), Some(value as i64));
        }
    }
}
