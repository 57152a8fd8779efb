//! Parameter-space expansion for batch sweeps.
//!
//! A sweep maps each engine variable to a list of candidate values;
//! expansion enumerates the full Cartesian product as indexed
//! [`ParameterAssignment`]s, one per steady-state job.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One fixed assignment of engine variables to values.
///
/// Iteration order is insertion order and is preserved through command
/// synthesis, so generated `set` tokens are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterAssignment {
    entries: Vec<(String, Value)>,
}

impl ParameterAssignment {
    /// Create an empty assignment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a variable binding, keeping insertion order.
    ///
    /// A repeated name overwrites the earlier binding in place so the
    /// assignment never issues two `set`s for the same variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Look up a bound value by variable name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no variables are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Variable names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl<'a> IntoIterator for &'a ParameterAssignment {
    type Item = (&'a str, &'a Value);
    type IntoIter = std::vec::IntoIter<(&'a str, &'a Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

/// Ordered sweep definition: variable name → candidate values.
#[derive(Debug, Clone, Default)]
pub struct ParameterGrid {
    axes: Vec<(String, Vec<Value>)>,
}

impl ParameterGrid {
    /// Create an empty grid.
    #[must_use]
    pub const fn new() -> Self {
        Self { axes: Vec::new() }
    }

    /// Add a sweep axis. Axis order fixes the enumeration order: the
    /// last-added axis varies fastest.
    #[must_use]
    pub fn axis(
        mut self,
        name: impl Into<String>,
        candidates: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        self.axes.push((
            name.into(),
            candidates.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Number of axes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Check whether the grid has no axes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Expand into the full Cartesian product.
    ///
    /// Output assignments are indexed `0..∏nᵢ` with the right-most axis
    /// varying fastest. A degenerate single-axis, single-candidate grid
    /// yields exactly one assignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the grid is empty or any axis
    /// has no candidates.
    pub fn expand(&self) -> Result<Vec<ParameterAssignment>> {
        if self.axes.is_empty() {
            return Err(Error::Configuration(
                "parameter grid has no axes to expand".to_string(),
            ));
        }
        for (name, candidates) in &self.axes {
            if candidates.is_empty() {
                return Err(Error::Configuration(format!(
                    "sweep axis '{name}' has no candidate values"
                )));
            }
        }

        let total: usize = self.axes.iter().map(|(_, c)| c.len()).product();
        let mut out = Vec::with_capacity(total);
        for index in 0..total {
            // Decompose the flat index in mixed radix, right-most axis
            // varying fastest.
            let mut rem = index;
            let mut picks = vec![0usize; self.axes.len()];
            for (pos, (_, candidates)) in self.axes.iter().enumerate().rev() {
                picks[pos] = rem % candidates.len();
                rem /= candidates.len();
            }
            let mut assignment = ParameterAssignment::new();
            for (pos, (name, candidates)) in self.axes.iter().enumerate() {
                assignment.set(name.clone(), candidates[picks[pos]].clone());
            }
            out.push(assignment);
        }
        Ok(out)
    }
}
