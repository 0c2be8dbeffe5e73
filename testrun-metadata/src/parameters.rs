// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, btree_map};

/// A single value inside a test's parameter mapping.
///
/// Parameters come from test frameworks that allow arbitrary values, so this
/// covers everything JSON can express. Floats may be NaN when constructed in
/// process; [`TestParameters::normalized`] replaces those with [`Self::Null`]
/// since NaN does not survive JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// An absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer that fits in 64 bits.
    Integer(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    String(String),
    /// A list of values.
    List(Vec<ParamValue>),
    /// A nested mapping.
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Returns this value with every NaN, however deeply nested, replaced by
    /// [`Self::Null`].
    pub fn normalized(self) -> Self {
        match self {
            Self::Float(value) if value.is_nan() => Self::Null,
            Self::List(values) => Self::List(values.into_iter().map(Self::normalized).collect()),
            Self::Map(map) => Self::Map(
                map.into_iter()
                    .map(|(key, value)| (key, value.normalized()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Returns true if this value contains a NaN anywhere.
    pub fn contains_nan(&self) -> bool {
        match self {
            Self::Float(value) => value.is_nan(),
            Self::List(values) => values.iter().any(Self::contains_nan),
            Self::Map(map) => map.values().any(Self::contains_nan),
            Self::Null | Self::Bool(_) | Self::Integer(_) | Self::String(_) => false,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// The parameters a test was invoked with, keyed by parameter name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestParameters(BTreeMap<String, ParamValue>);

impl TestParameters {
    /// Creates an empty parameter mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, returning the previous value if there was one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the parameters in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.0.iter()
    }

    /// Returns these parameters with every NaN replaced by null.
    pub fn normalized(self) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(key, value)| (key, value.normalized()))
                .collect(),
        )
    }

    /// Returns true if any parameter contains a NaN.
    pub fn contains_nan(&self) -> bool {
        self.0.values().any(ParamValue::contains_nan)
    }
}

impl From<BTreeMap<String, ParamValue>> for TestParameters {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for TestParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a TestParameters {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
