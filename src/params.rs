//! Bound parameter sets.

use crate::error::{Error, Result};
use crate::value::Value;

/// One ordered set of bound values for one execution.
///
/// Positions are 1-based, like SQL placeholders. A position that was never
/// set is distinct from one bound to NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    values: Vec<Option<Value>>,
}

impl ParameterSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set with every position bound, in order.
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    /// Bind `value` at 1-based `position`.
    pub fn set(&mut self, position: usize, value: Value) -> Result<()> {
        let idx = position.checked_sub(1).ok_or_else(|| {
            Error::ParameterBinding("Parameter positions start at 1".to_string())
        })?;
        if self.values.len() <= idx {
            self.values.resize(idx + 1, None);
        }
        self.values[idx] = Some(value);
        Ok(())
    }

    /// Drop every binding.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Highest position bound so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing was bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check the set against the statement's parameter count.
    ///
    /// Without a known count, every position up to the highest bound one must
    /// be set.
    pub fn validate(&self, expected: Option<usize>) -> Result<()> {
        let expected = expected.unwrap_or(self.values.len());
        if self.values.len() > expected {
            return Err(Error::ParameterBinding(format!(
                "Parameter at position {} is out of range, statement has {expected} parameters",
                self.values.len()
            )));
        }
        for idx in 0..expected {
            if !matches!(self.values.get(idx), Some(Some(_))) {
                return Err(Error::ParameterBinding(format!(
                    "Parameter at position {} is not set",
                    idx + 1
                )));
            }
        }
        Ok(())
    }

    /// Bound values in order. Unset positions read as NULL; call
    /// [`validate`](Self::validate) first to rule them out.
    pub fn values(&self) -> impl ExactSizeIterator<Item = &Value> + '_ {
        const NULL: &Value = &Value::Null;
        self.values.iter().map(|v| v.as_ref().unwrap_or(NULL))
    }

    /// Apply `f` to every bound value.
    pub(crate) fn map_values(self, f: impl Fn(Value) -> Value) -> Self {
        Self {
            values: self.values.into_iter().map(|v| v.map(&f)).collect(),
        }
    }
}

/// Types that can be bound as a whole parameter set.
///
/// Implemented for tuples of up to 12 values convertible into [`Value`], and
/// for `Vec<Value>`.
pub trait ToParams {
    /// Convert into an ordered parameter set.
    fn into_parameter_set(self) -> ParameterSet;
}

impl ToParams for () {
    fn into_parameter_set(self) -> ParameterSet {
        ParameterSet::new()
    }
}

impl ToParams for Vec<Value> {
    fn into_parameter_set(self) -> ParameterSet {
        ParameterSet::from_values(self)
    }
}

impl ToParams for ParameterSet {
    fn into_parameter_set(self) -> ParameterSet {
        self
    }
}

macro_rules! impl_to_params {
    ($($idx:tt: $T:ident),+) => {
        impl<$($T: Into<Value>),+> ToParams for ($($T,)+) {
            fn into_parameter_set(self) -> ParameterSet {
                ParameterSet::from_values(vec![$(self.$idx.into()),+])
            }
        }
    };
}

impl_to_params!(0: T0);
impl_to_params!(0: T0, 1: T1);
impl_to_params!(0: T0, 1: T1, 2: T2);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9, 10: T10);
impl_to_params!(0: T0, 1: T1, 2: T2, 3: T3, 4: T4, 5: T5, 6: T6, 7: T7, 8: T8, 9: T9, 10: T10, 11: T11);
