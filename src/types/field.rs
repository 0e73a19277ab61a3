//! Field instances and typed conversions to and from native values

use super::field_class::{signed_bounds, unsigned_max};
use super::{FieldClass, FieldClassKind};
use crate::object::Ref;
use crate::{GraphError, Result};

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    String(String),
    Structure(Vec<Field>),
}

impl FieldValue {
    fn default_for(class: &FieldClass) -> Self {
        match class {
            FieldClass::UnsignedInteger { .. } | FieldClass::UnsignedEnumeration { .. } => {
                FieldValue::Unsigned(0)
            }
            FieldClass::SignedInteger { .. } | FieldClass::SignedEnumeration { .. } => {
                FieldValue::Signed(0)
            }
            FieldClass::String => FieldValue::String(String::new()),
            FieldClass::Structure { members } => FieldValue::Structure(
                members.iter().map(|member| Field::new(member.class.acquire())).collect(),
            ),
        }
    }
}

/// A field instance: a value shaped by its [`FieldClass`].
///
/// Typed accessors check the class before converting and report a
/// [`GraphError::TypeConversion`] instead of reinterpreting the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    class: Ref<FieldClass>,
    value: FieldValue,
}

impl Field {
    /// Create a field with a zero value (empty string, zeroed members).
    pub fn new(class: Ref<FieldClass>) -> Self {
        let value = FieldValue::default_for(&class);
        Self { class, value }
    }

    pub fn class(&self) -> &FieldClass {
        &self.class
    }

    pub fn class_ref(&self) -> &Ref<FieldClass> {
        &self.class
    }

    pub fn kind(&self) -> FieldClassKind {
        self.class.kind()
    }

    fn mismatch(&self, expected: &str) -> GraphError {
        GraphError::type_conversion(format!("expected {}, got {} field", expected, self.kind()))
    }

    /// Value of an unsigned integer or unsigned enumeration field.
    pub fn unsigned_value(&self) -> Result<u64> {
        match self.value {
            FieldValue::Unsigned(value) => Ok(value),
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    /// Value of a signed integer or signed enumeration field.
    pub fn signed_value(&self) -> Result<i64> {
        match self.value {
            FieldValue::Signed(value) => Ok(value),
            _ => Err(self.mismatch("signed integer")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match &self.value {
            FieldValue::String(value) => Ok(value),
            _ => Err(self.mismatch("string")),
        }
    }

    /// Store an unsigned value, checking it fits the class value range.
    pub fn set_unsigned(&mut self, value: u64) -> Result<()> {
        let range = self.class.value_range().unwrap_or(64);
        match &mut self.value {
            FieldValue::Unsigned(slot) => {
                if value > unsigned_max(range) {
                    return Err(GraphError::type_conversion(format!(
                        "{} does not fit in {} bits",
                        value, range
                    )));
                }
                *slot = value;
                Ok(())
            }
            _ => Err(self.mismatch("unsigned integer")),
        }
    }

    /// Store a signed value, checking it fits the class value range.
    pub fn set_signed(&mut self, value: i64) -> Result<()> {
        let range = self.class.value_range().unwrap_or(64);
        match &mut self.value {
            FieldValue::Signed(slot) => {
                let (min, max) = signed_bounds(range);
                if !(min..=max).contains(&value) {
                    return Err(GraphError::type_conversion(format!(
                        "{} does not fit in {} signed bits",
                        value, range
                    )));
                }
                *slot = value;
                Ok(())
            }
            _ => Err(self.mismatch("signed integer")),
        }
    }

    pub fn set_string(&mut self, value: impl Into<String>) -> Result<()> {
        match &mut self.value {
            FieldValue::String(slot) => {
                *slot = value.into();
                Ok(())
            }
            _ => Err(self.mismatch("string")),
        }
    }

    /// Convert to a native type.
    pub fn get<T: FieldData>(&self) -> Result<T> {
        T::from_field(self)
    }

    /// Store a native value.
    pub fn set<T: FieldData>(&mut self, value: T) -> Result<()> {
        value.into_field(self)
    }

    /// Read an enumeration (or plain integer) field as a user enum.
    pub fn enumeration<E: TryFrom<i64>>(&self) -> Result<E> {
        let raw = match self.value {
            FieldValue::Signed(value) => value,
            FieldValue::Unsigned(value) => i64::try_from(value).map_err(|_| {
                GraphError::type_conversion(format!("{} exceeds the enumeration domain", value))
            })?,
            _ => return Err(self.mismatch("enumeration")),
        };
        E::try_from(raw).map_err(|_| GraphError::type_conversion(format!("no enumerator for value {}", raw)))
    }

    /// Store a user enum into an enumeration (or plain integer) field.
    pub fn set_enumeration<E: Into<i64>>(&mut self, value: E) -> Result<()> {
        let raw = value.into();
        if self.kind().is_signed() {
            self.set_signed(raw)
        } else {
            let raw = u64::try_from(raw).map_err(|_| {
                GraphError::type_conversion(format!("{} is negative for an unsigned field", raw))
            })?;
            self.set_unsigned(raw)
        }
    }

    /// Labels of the enumeration mappings containing the current value.
    pub fn labels(&self) -> Result<Vec<&str>> {
        match (self.class(), &self.value) {
            (FieldClass::UnsignedEnumeration { .. }, FieldValue::Unsigned(value)) => {
                Ok(self.class.unsigned_labels(*value))
            }
            (FieldClass::SignedEnumeration { .. }, FieldValue::Signed(value)) => {
                Ok(self.class.signed_labels(*value))
            }
            _ => Err(self.mismatch("enumeration")),
        }
    }

    /// Number of members; zero for non-structure fields.
    pub fn member_count(&self) -> usize {
        match &self.value {
            FieldValue::Structure(members) => members.len(),
            _ => 0,
        }
    }

    pub fn member_by_index(&self, index: usize) -> Option<&Field> {
        match &self.value {
            FieldValue::Structure(members) => members.get(index),
            _ => None,
        }
    }

    pub fn member_by_index_mut(&mut self, index: usize) -> Option<&mut Field> {
        match &mut self.value {
            FieldValue::Structure(members) => members.get_mut(index),
            _ => None,
        }
    }

    pub fn member_by_name(&self, name: &str) -> Option<&Field> {
        self.class.member_index(name).and_then(|index| self.member_by_index(index))
    }

    pub fn member_by_name_mut(&mut self, name: &str) -> Option<&mut Field> {
        let index = self.class.member_index(name)?;
        self.member_by_index_mut(index)
    }

    /// Member lookup that reports a missing name as an error.
    pub fn member(&self, name: &str) -> Result<&Field> {
        self.member_by_name(name).ok_or_else(|| GraphError::FieldNotFound { field: name.to_string() })
    }

    pub fn member_mut(&mut self, name: &str) -> Result<&mut Field> {
        self.member_by_name_mut(name).ok_or_else(|| GraphError::FieldNotFound { field: name.to_string() })
    }

    /// Iterate `(name, field)` pairs of a structure field.
    pub fn members(&self) -> impl Iterator<Item = (&str, &Field)> {
        let fields: &[Field] = match &self.value {
            FieldValue::Structure(members) => members,
            _ => &[],
        };
        self.class.members().iter().map(|member| member.name.as_str()).zip(fields)
    }
}

/// Trait for native types that can be read from and written to fields.
pub trait FieldData: Sized {
    /// Field class that holds this type without loss.
    fn field_class() -> FieldClass;

    /// Convert from a field, checking its class.
    fn from_field(field: &Field) -> Result<Self>;

    /// Store into a field, checking its class and value range.
    fn into_field(self, field: &mut Field) -> Result<()>;
}

macro_rules! unsigned_field_data {
    ($($ty:ty),*) => {$(
        impl FieldData for $ty {
            fn field_class() -> FieldClass {
                FieldClass::UnsignedInteger { range: <$ty>::BITS }
            }

            fn from_field(field: &Field) -> Result<Self> {
                let value = field.unsigned_value()?;
                <$ty>::try_from(value).map_err(|_| {
                    GraphError::type_conversion(format!(
                        "{} does not fit in {}",
                        value,
                        stringify!($ty)
                    ))
                })
            }

            fn into_field(self, field: &mut Field) -> Result<()> {
                field.set_unsigned(u64::from(self))
            }
        }
    )*};
}

macro_rules! signed_field_data {
    ($($ty:ty),*) => {$(
        impl FieldData for $ty {
            fn field_class() -> FieldClass {
                FieldClass::SignedInteger { range: <$ty>::BITS }
            }

            fn from_field(field: &Field) -> Result<Self> {
                let value = field.signed_value()?;
                <$ty>::try_from(value).map_err(|_| {
                    GraphError::type_conversion(format!(
                        "{} does not fit in {}",
                        value,
                        stringify!($ty)
                    ))
                })
            }

            fn into_field(self, field: &mut Field) -> Result<()> {
                field.set_signed(i64::from(self))
            }
        }
    )*};
}

unsigned_field_data!(u8, u16, u32, u64);
signed_field_data!(i8, i16, i32, i64);

impl FieldData for bool {
    fn field_class() -> FieldClass {
        FieldClass::UnsignedInteger { range: 1 }
    }

    fn from_field(field: &Field) -> Result<Self> {
        Ok(field.unsigned_value()? != 0)
    }

    fn into_field(self, field: &mut Field) -> Result<()> {
        field.set_unsigned(u64::from(self))
    }
}

impl FieldData for String {
    fn field_class() -> FieldClass {
        FieldClass::String
    }

    fn from_field(field: &Field) -> Result<Self> {
        field.as_str().map(str::to_string)
    }

    fn into_field(self, field: &mut Field) -> Result<()> {
        field.set_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn payload() -> Field {
        let mut class = FieldClass::structure();
        class.append_member_of::<u64>("index").unwrap();
        class.append_member_of::<i32>("delta").unwrap();
        class.append_member_of::<String>("comm").unwrap();
        class.append_member("small", FieldClass::unsigned(4).unwrap()).unwrap();
        Field::new(Ref::new(class))
    }

    #[test]
    fn zero_width_integers_only_hold_zero() {
        let mut signed = Field::new(Ref::new(FieldClass::SignedInteger { range: 0 }));
        signed.set_signed(0).unwrap();
        assert!(signed.set_signed(-1).is_err());
        assert!(signed.set_signed(1).is_err());

        let mut unsigned = Field::new(Ref::new(FieldClass::UnsignedInteger { range: 0 }));
        unsigned.set_unsigned(0).unwrap();
        assert!(unsigned.set_unsigned(1).is_err());
    }

    #[derive(Debug, PartialEq)]
    enum State {
        Running,
        Blocked,
    }

    impl TryFrom<i64> for State {
        type Error = ();

        fn try_from(value: i64) -> std::result::Result<Self, ()> {
            match value {
                0 => Ok(State::Running),
                1 => Ok(State::Blocked),
                _ => Err(()),
            }
        }
    }

    impl From<State> for i64 {
        fn from(state: State) -> i64 {
            match state {
                State::Running => 0,
                State::Blocked => 1,
            }
        }
    }

    #[test]
    fn new_structure_is_zeroed() {
        let field = payload();
        assert_eq!(field.member_count(), 4);
        assert_eq!(field.member("index").unwrap().get::<u64>().unwrap(), 0);
        assert_eq!(field.member("comm").unwrap().as_str().unwrap(), "");
    }

    #[test]
    fn typed_get_and_set_by_name() {
        let mut field = payload();
        field.member_mut("index").unwrap().set(42u64).unwrap();
        field.member_mut("delta").unwrap().set(-7i32).unwrap();
        field.member_mut("comm").unwrap().set(String::from("bash")).unwrap();

        assert_eq!(field.member("index").unwrap().get::<u64>().unwrap(), 42);
        assert_eq!(field.member("delta").unwrap().get::<i64>().unwrap(), -7);
        assert_eq!(field.member_by_index(2).unwrap().get::<String>().unwrap(), "bash");

        let names: Vec<_> = field.members().map(|(name, _)| name).collect();
        assert_eq!(names, ["index", "delta", "comm", "small"]);
    }

    #[test]
    fn wrong_view_is_reported() {
        let field = payload();
        let index = field.member("index").unwrap();
        assert!(matches!(index.get::<i64>(), Err(GraphError::TypeConversion { .. })));
        assert!(matches!(index.as_str(), Err(GraphError::TypeConversion { .. })));
        assert!(matches!(field.member("missing"), Err(GraphError::FieldNotFound { .. })));
    }

    #[test]
    fn values_are_range_checked() {
        let mut field = payload();
        let small = field.member_mut("small").unwrap();
        small.set(15u8).unwrap();
        assert!(small.set(16u8).is_err());
        assert_eq!(small.get::<u8>().unwrap(), 15);

        let mut wide = Field::new(Ref::new(FieldClass::of::<u64>()));
        wide.set(300u64).unwrap();
        assert!(matches!(wide.get::<u8>(), Err(GraphError::TypeConversion { .. })));
    }

    #[test]
    fn enumeration_conversion_and_labels() {
        let mut class = FieldClass::unsigned_enumeration(8).unwrap();
        class.add_unsigned_mapping("RUNNING", 0..=0).unwrap();
        class.add_unsigned_mapping("BLOCKED", 1..=1).unwrap();
        let mut field = Field::new(Ref::new(class));

        field.set_enumeration(State::Blocked).unwrap();
        assert_eq!(field.enumeration::<State>().unwrap(), State::Blocked);
        assert_eq!(field.labels().unwrap(), ["BLOCKED"]);

        field.set_unsigned(9).unwrap();
        assert!(field.enumeration::<State>().is_err());
        assert!(field.set_enumeration(-1i64).is_err());
    }

    proptest! {
        #[test]
        fn prop_signed_roundtrip_within_range(value in any::<i16>()) {
            let mut field = Field::new(Ref::new(FieldClass::of::<i16>()));
            field.set(value).unwrap();
            prop_assert_eq!(field.get::<i16>().unwrap(), value);
            prop_assert_eq!(field.get::<i64>().unwrap(), i64::from(value));
        }

        #[test]
        fn prop_unsigned_range_rejects_overflow(range in 1u32..64, excess in 1u64..1024) {
            let mut field = Field::new(Ref::new(FieldClass::unsigned(range).unwrap()));
            let max = unsigned_max(range);
            prop_assert!(field.set_unsigned(max).is_ok());
            prop_assert!(field.set_unsigned(max.saturating_add(excess)).is_err() || max == u64::MAX);
            prop_assert_eq!(field.unsigned_value().unwrap(), max);
        }
    }
}
