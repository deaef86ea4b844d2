//! Caller-supplied key/value annotations for operations.

/// An ordered collection of string key/value tags attached to an operation.
///
/// Iteration order is the insertion order, which makes downstream processing
/// (such as the per-call sanitization caps) deterministic. Keys are
/// case-sensitive; inserting an existing key replaces its value in place.
///
/// # Examples
///
/// ```
/// use on_the_clock::OperationTags;
///
/// let mut tags = OperationTags::new();
/// tags.insert("tenant", "acme");
/// tags.insert("region", "eu-west-1");
///
/// assert_eq!(tags.get("tenant"), Some("acme"));
/// assert_eq!(tags.len(), 2);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OperationTags {
    entries: Vec<(String, String)>,
}

impl OperationTags {
    /// Creates an empty tag collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tag, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Returns the value for the given key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The number of tags in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection contains no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for OperationTags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut tags = Self::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for OperationTags {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut tags = Self::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}
