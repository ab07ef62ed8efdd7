//! Variable assignments.
//!
//! `Values` maps variable keys to their current estimates. Each estimate is one of
//! the supported manifold types, stored in the [`VariableValue`] enum and read back
//! with a typed accessor:
//!
//! ```
//! use lie_factors::core::values::Values;
//! use lie_factors::manifold::sim3::Sim3;
//!
//! let mut values = Values::new();
//! values.insert("x1", Sim3::from_scale(2.0));
//! assert_eq!(values.at::<Sim3>("x1").unwrap().scale(), 2.0);
//! assert!(values.at::<Sim3>("x2").is_err());
//! ```

use crate::core::{CoreError, CoreResult};
use crate::manifold::{
    LieGroup, ManifoldResult, rn::Rn, se3::SE3, sim3::Sim3, so3::SO3,
};
use nalgebra::DVector;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Variable identifier.
pub type Key = String;

/// A variable estimate of one of the supported manifold types.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableValue {
    Rn(Rn),
    SO3(SO3),
    SE3(SE3),
    Sim3(Sim3),
}

impl VariableValue {
    /// Tangent-space dimension of the stored value.
    pub fn tangent_dim(&self) -> usize {
        match self {
            VariableValue::Rn(v) => v.tangent_dim(),
            VariableValue::SO3(v) => v.tangent_dim(),
            VariableValue::SE3(v) => v.tangent_dim(),
            VariableValue::Sim3(v) => v.tangent_dim(),
        }
    }

    /// Apply a tangent update: `value ⊞ delta`.
    pub fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<VariableValue> {
        Ok(match self {
            VariableValue::Rn(v) => VariableValue::Rn(v.retract(delta)?),
            VariableValue::SO3(v) => VariableValue::SO3(v.retract(delta)?),
            VariableValue::SE3(v) => VariableValue::SE3(v.retract(delta)?),
            VariableValue::Sim3(v) => VariableValue::Sim3(v.retract(delta)?),
        })
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            VariableValue::Rn(_) => "Rn",
            VariableValue::SO3(_) => "SO3",
            VariableValue::SE3(_) => "SE3",
            VariableValue::Sim3(_) => "Sim3",
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Rn(v) => write!(f, "{v}"),
            VariableValue::SO3(v) => write!(f, "{v}"),
            VariableValue::SE3(v) => write!(f, "{v}"),
            VariableValue::Sim3(v) => write!(f, "{v}"),
        }
    }
}

/// Manifold types that can be stored in [`Values`].
pub trait ValueType: LieGroup {
    /// Name reported when a lookup finds a different type.
    const TYPE_NAME: &'static str;

    /// Borrow the concrete value if the variant matches.
    fn from_value(value: &VariableValue) -> Option<&Self>;

    /// Wrap into the matching variant.
    fn into_value(self) -> VariableValue;
}

macro_rules! impl_value_type {
    ($ty:ty, $variant:ident) => {
        impl ValueType for $ty {
            const TYPE_NAME: &'static str = stringify!($variant);

            fn from_value(value: &VariableValue) -> Option<&Self> {
                match value {
                    VariableValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_value(self) -> VariableValue {
                VariableValue::$variant(self)
            }
        }

        impl From<$ty> for VariableValue {
            fn from(value: $ty) -> Self {
                VariableValue::$variant(value)
            }
        }
    };
}

impl_value_type!(Rn, Rn);
impl_value_type!(SO3, SO3);
impl_value_type!(SE3, SE3);
impl_value_type!(Sim3, Sim3);

/// Assignment of values to variable keys, iterated in sorted key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values {
    values: BTreeMap<Key, VariableValue>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert<T: ValueType>(&mut self, key: impl Into<Key>, value: T) -> Option<VariableValue> {
        self.values.insert(key.into(), value.into_value())
    }

    /// Typed lookup.
    ///
    /// Fails with [`CoreError::Variable`] when the key is missing or holds another type.
    pub fn at<T: ValueType>(&self, key: &str) -> CoreResult<&T> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| CoreError::Variable(format!("Key '{key}' not found in Values")))?;

        T::from_value(value).ok_or_else(|| {
            CoreError::Variable(format!(
                "Key '{key}' holds a {} but a {} was requested",
                value.type_name(),
                T::TYPE_NAME
            ))
        })
    }

    /// Untyped lookup.
    pub fn get(&self, key: &str) -> Option<&VariableValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &VariableValue)> {
        self.values.iter()
    }

    /// Apply per-key tangent updates, returning the updated assignment.
    ///
    /// Keys without an entry in `delta` keep their value. An update for an unknown
    /// key, or one with the wrong dimension, is an error.
    pub fn retract(&self, delta: &HashMap<Key, DVector<f64>>) -> CoreResult<Values> {
        let mut updated = self.clone();
        for (key, step) in delta {
            let current = self
                .values
                .get(key)
                .ok_or_else(|| CoreError::Variable(format!("Cannot retract unknown key '{key}'")))?;
            let moved = current.retract(step).map_err(|e| {
                CoreError::Variable(format!("Failed to retract '{key}'")).log_with_source(e)
            })?;
            updated.values.insert(key.clone(), moved);
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_values_typed_lookup() {
        let mut values = Values::new();
        values.insert("p", Rn::from_vec(vec![1.0, 2.0, 3.0]));
        values.insert("x", Sim3::from_scale(2.0));

        assert_eq!(values.len(), 2);
        assert!(values.contains("p"));
        assert_eq!(values.at::<Sim3>("x").unwrap().scale(), 2.0);
        assert_eq!(values.keys().cloned().collect::<Vec<_>>(), vec!["p", "x"]);
    }

    #[test]
    fn test_values_lookup_errors() {
        let mut values = Values::new();
        values.insert("x", SE3::identity());

        match values.at::<Sim3>("x") {
            Err(CoreError::Variable(msg)) => assert!(msg.contains("holds a SE3")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            values.at::<SE3>("missing"),
            Err(CoreError::Variable(_))
        ));
    }

    #[test]
    fn test_values_retract() {
        let mut values = Values::new();
        values.insert("p", Rn::from(Vector3::new(1.0, 1.0, 1.0)));
        values.insert("x", Sim3::identity());

        let mut delta = HashMap::new();
        delta.insert("p".to_string(), DVector::from_vec(vec![1.0, 0.0, -1.0]));
        let updated = values.retract(&delta).unwrap();

        assert_eq!(
            updated.at::<Rn>("p").unwrap().to_point3(),
            Vector3::new(2.0, 1.0, 0.0)
        );
        assert_eq!(updated.at::<Sim3>("x").unwrap(), &Sim3::identity());

        delta.insert("x".to_string(), DVector::zeros(3));
        assert!(values.retract(&delta).is_err());

        let mut unknown = HashMap::new();
        unknown.insert("y".to_string(), DVector::zeros(7));
        assert!(values.retract(&unknown).is_err());
    }

    #[test]
    fn test_variable_value_dimensions() {
        assert_eq!(VariableValue::from(Sim3::identity()).tangent_dim(), 7);
        assert_eq!(VariableValue::from(SE3::identity()).tangent_dim(), 6);
        assert_eq!(VariableValue::from(SO3::identity()).tangent_dim(), 3);
        assert_eq!(VariableValue::from(Rn::zeros(5)).tangent_dim(), 5);
    }
}
