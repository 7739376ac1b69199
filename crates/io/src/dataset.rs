//! Result datasets: named fields plus global display attributes.

use std::collections::BTreeMap;

use crate::field::Field;

/// Global attribute value of a result dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Scalar text, e.g. `fc_ser-linestyle = "solid"`.
    Text(String),
    /// List of `key=value` tokens, written as a string array.
    List(Vec<String>),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::List(v)
    }
}

/// Named result fields in insertion order with global attributes.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    variables: Vec<Field>,
    attrs: BTreeMap<String, AttrValue>,
}

impl Dataset {
    /// Empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field`, replacing a variable of the same name.
    pub fn insert(&mut self, field: Field) {
        match self.variables.iter_mut().find(|f| f.name() == field.name()) {
            Some(slot) => *slot = field,
            None => self.variables.push(field),
        }
    }

    /// Builder form of [`Dataset::insert`].
    pub fn with(mut self, field: Field) -> Self {
        self.insert(field);
        self
    }

    /// Remove and return the variable `name`.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        let idx = self.variables.iter().position(|f| f.name() == name)?;
        Some(self.variables.remove(idx))
    }

    /// Variable `name`.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.variables.iter().find(|f| f.name() == name)
    }

    /// All variables.
    pub fn variables(&self) -> &[Field] {
        &self.variables
    }

    /// Variable names in order.
    pub fn names(&self) -> Vec<&str> {
        self.variables.iter().map(Field::name).collect()
    }

    /// Set a global attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// Global attribute `key`.
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// All global attributes.
    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    /// Copy every global attribute of `other` into `self`.
    pub fn merge_attrs(&mut self, other: &Dataset) {
        for (k, v) in &other.attrs {
            self.attrs.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Dim;
    use ndarray::{ArrayD, IxDyn};

    fn scalar(name: &str, v: f64) -> Field {
        Field::new(name, vec![Dim::X], ArrayD::from_elem(IxDyn(&[1]), v)).unwrap()
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut ds = Dataset::new().with(scalar("a", 1.0)).with(scalar("b", 2.0));
        ds.insert(scalar("a", 3.0));
        assert_eq!(ds.names(), vec!["a", "b"]);
        assert_eq!(ds.get("a").unwrap().data()[[0]], 3.0);
    }

    #[test]
    fn remove_variable() {
        let mut ds = Dataset::new().with(scalar("obs", 1.0));
        assert!(ds.remove("obs").is_some());
        assert!(ds.remove("obs").is_none());
        assert!(ds.variables().is_empty());
    }

    #[test]
    fn attributes() {
        let mut ds = Dataset::new();
        ds.set_attr("fc_ser-linestyle", "solid");
        ds.set_attr("fc_ser-0", vec!["color=k".to_string()]);
        assert_eq!(ds.attr("fc_ser-linestyle"), Some(&AttrValue::Text("solid".into())));
        assert!(matches!(ds.attr("fc_ser-0"), Some(AttrValue::List(v)) if v.len() == 1));
    }
}
