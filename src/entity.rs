//! Keyed records and the skip-aware stream item

use ndarray::{Array1, ArrayD};
use std::collections::BTreeMap;

/// Field holding the time-frequency features, in lookup order
pub const FEATURE_KEYS: [&str; 2] = ["cqt", "data"];

pub const CHORD_LABEL: &str = "chord_label";
pub const CHORD_IDX: &str = "chord_idx";
pub const QUALITY_IDX: &str = "quality_idx";
pub const ROOT_IDX: &str = "root_idx";
pub const CLASS_IDX: &str = "class_idx";
pub const TARGET: &str = "target";
pub const CHROMA: &str = "chroma";
pub const NOTE_NUMBERS: &str = "note_numbers";

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Array(ArrayD<f32>),
    Int(i64),
    Float(f64),
    Text(String),
    Ints(Vec<i64>),
}

impl From<ArrayD<f32>> for Field {
    fn from(value: ArrayD<f32>) -> Self {
        Field::Array(value)
    }
}

impl From<Array1<f32>> for Field {
    fn from(value: Array1<f32>) -> Self {
        Field::Array(value.into_dyn())
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Int(value)
    }
}

impl From<usize> for Field {
    fn from(value: usize) -> Self {
        Field::Int(value as i64)
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Float(value)
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<Vec<i64>> for Field {
    fn from(value: Vec<i64>) -> Self {
        Field::Ints(value)
    }
}

/// Ordered mapping from field name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    fields: BTreeMap<String, Field>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion
    pub fn with(mut self, key: &str, value: impl Into<Field>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Field>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Field> {
        self.fields.remove(key)
    }

    /// All fields as a mapping
    pub fn values(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    pub fn into_values(self) -> BTreeMap<String, Field> {
        self.fields
    }

    pub fn array(&self, key: &str) -> Option<&ArrayD<f32>> {
        match self.fields.get(key)? {
            Field::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.fields.get(key)? {
            Field::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key)? {
            Field::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Name of the feature field present on this record, if any
    pub fn feature_key(&self) -> Option<&'static str> {
        FEATURE_KEYS
            .iter()
            .copied()
            .find(|k| matches!(self.fields.get(*k), Some(Field::Array(_))))
    }

    pub fn features(&self) -> Option<&ArrayD<f32>> {
        self.array(self.feature_key()?)
    }

    pub fn features_mut(&mut self) -> Option<&mut ArrayD<f32>> {
        let key = self.feature_key()?;
        match self.fields.get_mut(key)? {
            Field::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Remove and return the feature field with its key
    pub fn take_features(&mut self) -> Option<(&'static str, ArrayD<f32>)> {
        let key = self.feature_key()?;
        match self.fields.remove(key)? {
            Field::Array(a) => Some((key, a)),
            _ => None,
        }
    }
}

impl FromIterator<(String, Field)> for Entity {
    fn from_iter<I: IntoIterator<Item = (String, Field)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A stream item: a record, or a marker for a record that was rejected.
///
/// Skips keep parallel (zipped) streams aligned; every stage passes them
/// through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample<T = Entity> {
    Record(T),
    Skip,
}

impl<T> Sample<T> {
    pub fn is_skip(&self) -> bool {
        matches!(self, Sample::Skip)
    }

    pub fn record(self) -> Option<T> {
        match self {
            Sample::Record(r) => Some(r),
            Sample::Skip => None,
        }
    }

    pub fn as_record(&self) -> Option<&T> {
        match self {
            Sample::Record(r) => Some(r),
            Sample::Skip => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Sample<U> {
        match self {
            Sample::Record(r) => Sample::Record(f(r)),
            Sample::Skip => Sample::Skip,
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> Sample<U>>(self, f: F) -> Sample<U> {
        match self {
            Sample::Record(r) => f(r),
            Sample::Skip => Sample::Skip,
        }
    }
}

impl<T> From<Option<T>> for Sample<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(r) => Sample::Record(r),
            None => Sample::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_feature_key_lookup() {
        let e = Entity::new().with("data", Array3::<f32>::zeros((1, 2, 3)).into_dyn());
        assert_eq!(e.feature_key(), Some("data"));

        let e = e.with("cqt", Array3::<f32>::zeros((1, 2, 3)).into_dyn());
        assert_eq!(e.feature_key(), Some("cqt"));

        assert_eq!(Entity::new().with("cqt", 3i64).feature_key(), None);
    }

    #[test]
    fn test_sample_from_option() {
        assert!(Sample::<i32>::from(None).is_skip());
        assert_eq!(Sample::from(Some(2)).map(|v| v * 2).record(), Some(4));
    }
}
