//! Validation types and field extraction strategies for adapters

use std::collections::HashMap;

use tracing::debug;

use super::ClassProvider;
use crate::types::{Event, Field, FieldClassKind, FieldData};
use crate::{GraphError, Result};

/// Pre-computed extraction plan built when an event class is first seen.
///
/// Contains the payload member index and class kind of every extracted field, so
/// per-event extraction reads members by position.
#[derive(Debug, Clone)]
pub struct AdapterValidation {
    /// Ordered list of field extraction operations
    pub extraction_plan: Vec<FieldExtraction>,
    /// Fast lookup from member name to extraction index
    index_map: HashMap<String, usize>,
}

impl AdapterValidation {
    /// Create a new validation plan with the given extraction operations.
    pub fn new(extraction_plan: Vec<FieldExtraction>) -> Self {
        let index_map = extraction_plan
            .iter()
            .enumerate()
            .filter_map(|(index, extraction)| extraction.field_name().map(|name| (name.to_string(), index)))
            .collect();

        Self { extraction_plan, index_map }
    }

    /// Get the number of fields that will be extracted.
    pub fn field_count(&self) -> usize {
        self.extraction_plan.len()
    }

    /// Check if the validation plan contains any required fields.
    pub fn has_required_fields(&self) -> bool {
        self.extraction_plan.iter().any(FieldExtraction::is_required)
    }

    /// Lookup the extraction index for a member name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_map.get(name).copied()
    }

    /// Payload member index the plan recorded for `name`.
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.index_of(name).and_then(|index| self.extraction_plan.get(index)).and_then(FieldExtraction::member_index)
    }

    fn member<'e>(&self, event: &'e Event, name: &str) -> Option<&'e Field> {
        let payload = event.payload()?;
        match self.member_index(name) {
            Some(index) => payload.member_by_index(index),
            None => payload.member_by_name(name),
        }
    }

    /// Fetch a payload value through the plan, falling back to a name lookup.
    pub fn fetch<T: FieldData>(&self, event: &Event, name: &str) -> Result<T> {
        self.member(event, name).ok_or_else(|| GraphError::FieldNotFound { field: name.to_string() })?.get()
    }

    /// Fetch a payload value, `None` when missing or of another type.
    pub fn fetch_optional<T: FieldData>(&self, event: &Event, name: &str) -> Option<T> {
        self.member(event, name).and_then(|field| field.get().ok())
    }

    /// Fetch a payload value, or the type default when missing or of another type.
    pub fn fetch_or_default<T>(&self, event: &Event, name: &str) -> T
    where
        T: FieldData + Default,
    {
        self.fetch_optional(event, name).unwrap_or_default()
    }
}

/// Extraction strategy for a single adapter field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldExtraction {
    /// Member that must exist; validation fails if missing.
    Required {
        /// Member name in the payload
        name: String,
        /// Position in the payload structure
        index: usize,
        /// Class kind checked at validation time
        kind: FieldClassKind,
    },

    /// Member that may be absent from some event classes.
    Optional {
        /// Member name in the payload
        name: String,
        /// Position if the member exists
        index: Option<usize>,
    },

    /// Field to skip during extraction (application-managed).
    Skipped,
}

impl FieldExtraction {
    /// Plan a required member whose class must hold `T`.
    pub fn required<T: FieldData>(provider: &impl ClassProvider, name: &str) -> Result<Self> {
        let Some(index) = provider.member_index(name) else {
            debug!("Member '{}' missing; available: {:?}", name, provider.member_names());
            return Err(GraphError::FieldNotFound { field: name.to_string() });
        };
        let kind = provider.member_class(name).map(|class| class.kind()).unwrap_or(FieldClassKind::Structure);
        let expected = T::field_class().kind();
        let compatible = kind == expected
            || (kind.is_integer() && expected.is_integer() && kind.is_signed() == expected.is_signed());
        if !compatible {
            return Err(GraphError::type_conversion(format!(
                "member '{}' is a {} field, expected {}",
                name, kind, expected
            )));
        }
        Ok(FieldExtraction::Required { name: name.to_string(), index, kind })
    }

    /// Plan an optional member.
    pub fn optional(provider: &impl ClassProvider, name: &str) -> Self {
        FieldExtraction::Optional { name: name.to_string(), index: provider.member_index(name) }
    }

    /// Get the member name if this extraction involves a payload member.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            FieldExtraction::Required { name, .. } | FieldExtraction::Optional { name, .. } => Some(name),
            FieldExtraction::Skipped => None,
        }
    }

    /// Check if this field extraction requires the member to exist.
    pub fn is_required(&self) -> bool {
        matches!(self, FieldExtraction::Required { .. })
    }

    /// Payload member index, if known.
    pub fn member_index(&self) -> Option<usize> {
        match self {
            FieldExtraction::Required { index, .. } => Some(*index),
            FieldExtraction::Optional { index, .. } => *index,
            FieldExtraction::Skipped => None,
        }
    }
}
