use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Key under which a validator reports a failure, e.g. `required` or `email`.
/// Custom validators define their own keys with [`ErrorKey::new`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ErrorKey(&'static str);

impl ErrorKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for ErrorKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Key reported by [`crate::validators::required`].
pub const REQUIRED: ErrorKey = ErrorKey::new("required");
/// Key reported by [`crate::validators::email`].
pub const EMAIL: ErrorKey = ErrorKey::new("email");

/// Diagnostic payload attached to an error key. Opaque to the engine: most
/// validators report a bare [`ErrorValue::Flag`], richer ones attach text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorValue {
    Flag,
    Detail(String),
}

/// Non-empty map of validator failures. "No errors" is `Option::None`, never
/// an empty map, so "valid" stays a single unambiguous state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorMap(BTreeMap<ErrorKey, ErrorValue>);

impl ErrorMap {
    pub fn flag(key: ErrorKey) -> Self {
        Self(BTreeMap::from([(key, ErrorValue::Flag)]))
    }

    pub fn detail(key: ErrorKey, detail: impl Into<String>) -> Self {
        Self(BTreeMap::from([(key, ErrorValue::Detail(detail.into()))]))
    }

    pub fn and(mut self, key: ErrorKey, value: ErrorValue) -> Self {
        self.0.insert(key, value);
        self
    }

    /// Shallow key union; entries from `other` win on collision.
    pub fn merge(&mut self, other: ErrorMap) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, key: ErrorKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn get(&self, key: ErrorKey) -> Option<&ErrorValue> {
        self.0.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ErrorKey> + '_ {
        self.0.keys().copied()
    }

    pub fn first_key(&self) -> ErrorKey {
        *self
            .0
            .keys()
            .next()
            .expect("error map is constructed non-empty")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Folds individual validator results into one map, preserving the
/// later-result-wins rule on key collisions. `None` results contribute
/// nothing; an all-`None` input folds to `None`.
pub(crate) fn union_results(results: impl IntoIterator<Item = Option<ErrorMap>>) -> Option<ErrorMap> {
    let mut total: Option<ErrorMap> = None;
    for result in results {
        if let Some(map) = result {
            match &mut total {
                Some(union) => union.merge(map),
                None => total = Some(map),
            }
        }
    }
    total
}
