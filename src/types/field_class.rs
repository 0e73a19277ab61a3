//! Field classes: the type descriptions fields are created from

use std::fmt;
use std::ops::RangeInclusive;

use super::FieldData;
use crate::object::Ref;
use crate::{GraphError, Result};

/// Discriminant of a [`FieldClass`], used when checking typed views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClassKind {
    UnsignedInteger,
    SignedInteger,
    UnsignedEnumeration,
    SignedEnumeration,
    String,
    Structure,
}

impl FieldClassKind {
    /// Whether fields of this kind hold an integer (enumerations included).
    pub fn is_integer(self) -> bool {
        !matches!(self, FieldClassKind::String | FieldClassKind::Structure)
    }

    /// Whether integer fields of this kind are signed.
    pub fn is_signed(self) -> bool {
        matches!(self, FieldClassKind::SignedInteger | FieldClassKind::SignedEnumeration)
    }
}

impl fmt::Display for FieldClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldClassKind::UnsignedInteger => "unsigned integer",
            FieldClassKind::SignedInteger => "signed integer",
            FieldClassKind::UnsignedEnumeration => "unsigned enumeration",
            FieldClassKind::SignedEnumeration => "signed enumeration",
            FieldClassKind::String => "string",
            FieldClassKind::Structure => "structure",
        })
    }
}

/// Label attached to one or more value ranges of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationMapping<T> {
    pub label: String,
    pub ranges: Vec<RangeInclusive<T>>,
}

impl<T: PartialOrd> EnumerationMapping<T> {
    fn contains(&self, value: &T) -> bool {
        self.ranges.iter().any(|range| range.contains(value))
    }
}

/// Named member of a structure field class.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureMember {
    pub name: String,
    pub class: Ref<FieldClass>,
}

/// Type description of a field.
///
/// Integer classes carry a value range in bits (1..=64): a field of that class only
/// accepts values representable in that many bits.
///
/// ```rust
/// use tracegraph::types::{FieldClass, FieldClassKind};
///
/// let mut payload = FieldClass::structure();
/// payload.append_member_of::<u64>("index").unwrap();
/// payload.append_member("comm", FieldClass::String).unwrap();
///
/// assert_eq!(payload.member_count(), 2);
/// assert_eq!(payload.member_index("comm"), Some(1));
/// assert_eq!(payload.member_by_name("index").unwrap().class.kind(), FieldClassKind::UnsignedInteger);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FieldClass {
    UnsignedInteger { range: u32 },
    SignedInteger { range: u32 },
    UnsignedEnumeration { range: u32, mappings: Vec<EnumerationMapping<u64>> },
    SignedEnumeration { range: u32, mappings: Vec<EnumerationMapping<i64>> },
    String,
    Structure { members: Vec<StructureMember> },
}

fn check_range(range: u32) -> Result<u32> {
    if (1..=64).contains(&range) {
        Ok(range)
    } else {
        Err(GraphError::config(format!("integer value range must be 1..=64 bits, got {}", range)))
    }
}

impl FieldClass {
    /// Unsigned integer class holding values of `range` bits.
    pub fn unsigned(range: u32) -> Result<Self> {
        Ok(FieldClass::UnsignedInteger { range: check_range(range)? })
    }

    /// Signed integer class holding values of `range` bits.
    pub fn signed(range: u32) -> Result<Self> {
        Ok(FieldClass::SignedInteger { range: check_range(range)? })
    }

    pub fn unsigned_enumeration(range: u32) -> Result<Self> {
        Ok(FieldClass::UnsignedEnumeration { range: check_range(range)?, mappings: Vec::new() })
    }

    pub fn signed_enumeration(range: u32) -> Result<Self> {
        Ok(FieldClass::SignedEnumeration { range: check_range(range)?, mappings: Vec::new() })
    }

    /// Empty structure class.
    pub fn structure() -> Self {
        FieldClass::Structure { members: Vec::new() }
    }

    /// Field class matching a native type.
    pub fn of<T: FieldData>() -> Self {
        T::field_class()
    }

    pub fn kind(&self) -> FieldClassKind {
        match self {
            FieldClass::UnsignedInteger { .. } => FieldClassKind::UnsignedInteger,
            FieldClass::SignedInteger { .. } => FieldClassKind::SignedInteger,
            FieldClass::UnsignedEnumeration { .. } => FieldClassKind::UnsignedEnumeration,
            FieldClass::SignedEnumeration { .. } => FieldClassKind::SignedEnumeration,
            FieldClass::String => FieldClassKind::String,
            FieldClass::Structure { .. } => FieldClassKind::Structure,
        }
    }

    /// Value range in bits for integer and enumeration classes.
    pub fn value_range(&self) -> Option<u32> {
        match self {
            FieldClass::UnsignedInteger { range }
            | FieldClass::SignedInteger { range }
            | FieldClass::UnsignedEnumeration { range, .. }
            | FieldClass::SignedEnumeration { range, .. } => Some(*range),
            FieldClass::String | FieldClass::Structure { .. } => None,
        }
    }

    /// Append a member to a structure class.
    pub fn append_member(&mut self, name: impl Into<String>, class: FieldClass) -> Result<()> {
        let name = name.into();
        let FieldClass::Structure { members } = self else {
            return Err(GraphError::type_conversion(format!(
                "cannot append member '{}' to a {} field class",
                name,
                self.kind()
            )));
        };
        if members.iter().any(|member| member.name == name) {
            return Err(GraphError::config(format!("structure member '{}' already exists", name)));
        }
        members.try_reserve(1)?;
        members.push(StructureMember { name, class: Ref::new(class) });
        Ok(())
    }

    /// Append a member whose class matches a native type.
    pub fn append_member_of<T: FieldData>(&mut self, name: impl Into<String>) -> Result<()> {
        self.append_member(name, T::field_class())
    }

    /// Builder form of [`FieldClass::append_member`] for structure literals.
    pub fn with_member(mut self, name: impl Into<String>, class: FieldClass) -> Result<Self> {
        self.append_member(name, class)?;
        Ok(self)
    }

    /// Map a label to a range of an unsigned enumeration.
    pub fn add_unsigned_mapping(&mut self, label: impl Into<String>, range: RangeInclusive<u64>) -> Result<()> {
        match self {
            FieldClass::UnsignedEnumeration { mappings, .. } => {
                add_mapping(mappings, label.into(), range);
                Ok(())
            }
            other => Err(GraphError::type_conversion(format!(
                "expected unsigned enumeration, got {}",
                other.kind()
            ))),
        }
    }

    /// Map a label to a range of a signed enumeration.
    pub fn add_signed_mapping(&mut self, label: impl Into<String>, range: RangeInclusive<i64>) -> Result<()> {
        match self {
            FieldClass::SignedEnumeration { mappings, .. } => {
                add_mapping(mappings, label.into(), range);
                Ok(())
            }
            other => Err(GraphError::type_conversion(format!(
                "expected signed enumeration, got {}",
                other.kind()
            ))),
        }
    }

    /// Number of structure members; zero for non-structures.
    pub fn member_count(&self) -> usize {
        match self {
            FieldClass::Structure { members } => members.len(),
            _ => 0,
        }
    }

    pub fn members(&self) -> &[StructureMember] {
        match self {
            FieldClass::Structure { members } => members,
            _ => &[],
        }
    }

    pub fn member_by_index(&self, index: usize) -> Option<&StructureMember> {
        self.members().get(index)
    }

    pub fn member_by_name(&self, name: &str) -> Option<&StructureMember> {
        self.members().iter().find(|member| member.name == name)
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members().iter().position(|member| member.name == name)
    }

    /// Labels whose ranges contain `value` (unsigned enumerations).
    pub fn unsigned_labels(&self, value: u64) -> Vec<&str> {
        match self {
            FieldClass::UnsignedEnumeration { mappings, .. } => mappings
                .iter()
                .filter(|mapping| mapping.contains(&value))
                .map(|mapping| mapping.label.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Labels whose ranges contain `value` (signed enumerations).
    pub fn signed_labels(&self, value: i64) -> Vec<&str> {
        match self {
            FieldClass::SignedEnumeration { mappings, .. } => mappings
                .iter()
                .filter(|mapping| mapping.contains(&value))
                .map(|mapping| mapping.label.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn add_mapping<T>(mappings: &mut Vec<EnumerationMapping<T>>, label: String, range: RangeInclusive<T>) {
    match mappings.iter_mut().find(|mapping| mapping.label == label) {
        Some(mapping) => mapping.ranges.push(range),
        None => mappings.push(EnumerationMapping { label, ranges: vec![range] }),
    }
}

/// Largest value an unsigned integer of `range` bits can hold (0 for a
/// zero-width integer).
pub(crate) fn unsigned_max(range: u32) -> u64 {
    if range >= 64 { u64::MAX } else { (1u64 << range) - 1 }
}

/// Inclusive bounds of a signed integer of `range` bits. A zero-width
/// integer only holds 0.
pub(crate) fn signed_bounds(range: u32) -> (i64, i64) {
    if range == 0 {
        (0, 0)
    } else if range >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        let max = (1i64 << (range - 1)) - 1;
        (-max - 1, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn integer_ranges_are_validated() {
        assert!(FieldClass::unsigned(0).is_err());
        assert!(FieldClass::signed(65).is_err());
        assert_eq!(FieldClass::unsigned(8).unwrap().value_range(), Some(8));
        assert_eq!(FieldClass::String.value_range(), None);
    }

    #[test]
    fn structure_members_keep_insertion_order() {
        let payload = FieldClass::structure()
            .with_member("pid", FieldClass::signed(32).unwrap())
            .and_then(|class| class.with_member("comm", FieldClass::String))
            .unwrap();

        let names: Vec<_> = payload.members().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["pid", "comm"]);
        assert_eq!(payload.member_index("comm"), Some(1));
        assert!(payload.member_by_name("tid").is_none());
    }

    #[test]
    fn duplicate_and_misplaced_members_rejected() {
        let mut payload = FieldClass::structure();
        payload.append_member_of::<u32>("count").unwrap();
        assert!(payload.append_member_of::<u32>("count").is_err());

        let mut scalar = FieldClass::String;
        assert!(matches!(
            scalar.append_member("x", FieldClass::String),
            Err(GraphError::TypeConversion { .. })
        ));
    }

    #[test]
    fn enumeration_labels() {
        let mut state = FieldClass::unsigned_enumeration(8).unwrap();
        state.add_unsigned_mapping("RUNNING", 0..=0).unwrap();
        state.add_unsigned_mapping("BLOCKED", 1..=2).unwrap();
        state.add_unsigned_mapping("BLOCKED", 7..=7).unwrap();

        assert_eq!(state.unsigned_labels(0), ["RUNNING"]);
        assert_eq!(state.unsigned_labels(7), ["BLOCKED"]);
        assert!(state.unsigned_labels(5).is_empty());
        assert!(state.add_signed_mapping("NEG", -1..=-1).is_err());
    }

    proptest! {
        #[test]
        fn prop_bounds_match_bit_width(range in 1u32..=64) {
            let max = unsigned_max(range);
            prop_assert_eq!(u64::from(max.count_ones()), u64::from(range));

            let (min, smax) = signed_bounds(range);
            prop_assert_eq!(min, -smax - 1);
            if range < 64 {
                prop_assert_eq!(smax as u64, unsigned_max(range - 1));
            }
        }
    }
}
