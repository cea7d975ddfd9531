//! Value types shared by requests and responses.
//!
//! The central type is [`MultiValueMap`], an ordered string multi-map used
//! for query parameters, form fields and cookies. [`Headers`] wraps the same
//! storage with case-insensitive keys.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Ordered mapping from string keys to one or more string values.
///
/// Keys iterate in ascending order (which makes [`url_encode`](Self::url_encode)
/// deterministic); values keep their insertion order within a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiValueMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl MultiValueMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map from key/value pairs, preserving value order per key.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (key, value) in pairs {
            map.add(key.as_ref(), value.as_ref());
        }
        map
    }

    /// Appends a value to the given key.
    pub fn add(&mut self, key: &str, value: &str) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// Replaces every existing value of the key with the single given value.
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries
            .insert(key.to_string(), vec![value.to_string()]);
    }

    /// Removes the key entirely.
    pub fn del(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Returns the first value of the key, or `""` when the key is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.get_at(key, 0)
    }

    /// Returns the value at `index` for the key, or `""` when out of range.
    #[must_use]
    pub fn get_at(&self, key: &str, index: usize) -> &str {
        self.entries
            .get(key)
            .and_then(|values| values.get(index))
            .map_or("", String::as_str)
    }

    /// Returns all values of the key, in insertion order.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates `(key, value)` pairs: keys ascending, values in insertion
    /// order within each key.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(key, values)| {
            values.iter().map(move |value| (key.as_str(), value.as_str()))
        })
    }

    /// Serializes the map as `key1=value1&key1=value2&key2=value3`.
    ///
    /// Both keys and values are percent-encoded; keys come out in ascending
    /// order so the result is deterministic.
    #[must_use]
    pub fn url_encode(&self) -> String {
        let mut encoded = String::new();
        for (key, value) in self.pairs() {
            if !encoded.is_empty() {
                encoded.push('&');
            }
            encoded.push_str(&urlencoding::encode(key));
            encoded.push('=');
            encoded.push_str(&urlencoding::encode(value));
        }
        encoded
    }
}

macro_rules! multi_value_wrapper {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(MultiValueMap);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Creates the collection from key/value pairs.
            #[must_use]
            pub fn from_pairs<K, V>(pairs: &[(K, V)]) -> Self
            where
                K: AsRef<str>,
                V: AsRef<str>,
            {
                Self(MultiValueMap::from_pairs(pairs))
            }
        }

        impl Deref for $name {
            type Target = MultiValueMap;

            fn deref(&self) -> &MultiValueMap {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut MultiValueMap {
                &mut self.0
            }
        }

        impl From<MultiValueMap> for $name {
            fn from(map: MultiValueMap) -> Self {
                Self(map)
            }
        }
    };
}

multi_value_wrapper! {
    /// Query parameters appended to the request URL.
    Params
}

multi_value_wrapper! {
    /// URL-encoded form fields sent as the request body.
    PostForm
}

multi_value_wrapper! {
    /// Cookies attached to a single request.
    Cookies
}

/// Request and session header collection.
///
/// Keys are case-insensitive: they are normalized to lowercase on insertion,
/// so `Content-Type` and `content-type` address the same entry. Query and
/// form keys stay case-sensitive; only headers get this treatment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(MultiValueMap);

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header collection from key/value pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Self::new();
        for (key, value) in pairs {
            headers.add(key.as_ref(), value.as_ref());
        }
        headers
    }

    /// Appends a value under the (case-insensitive) key.
    pub fn add(&mut self, key: &str, value: &str) {
        self.0.add(&key.to_ascii_lowercase(), value);
    }

    /// Replaces every value of the (case-insensitive) key.
    pub fn set(&mut self, key: &str, value: &str) {
        self.0.set(&key.to_ascii_lowercase(), value);
    }

    /// Removes the (case-insensitive) key.
    pub fn del(&mut self, key: &str) {
        self.0.del(&key.to_ascii_lowercase());
    }

    /// Returns the first value of the key, or `""` when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.0.get(&key.to_ascii_lowercase())
    }

    /// Returns the value at `index` for the key, or `""` when out of range.
    #[must_use]
    pub fn get_at(&self, key: &str, index: usize) -> &str {
        self.0.get_at(&key.to_ascii_lowercase(), index)
    }

    /// Returns all values of the key.
    #[must_use]
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get_all(&key.to_ascii_lowercase())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(key, value)` pairs with lowercased keys.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.pairs()
    }
}

/// One HTTP cookie, either supplied by the caller or echoed from a
/// `Set-Cookie` response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Domain scope carried by a `Set-Cookie` header, when present.
    pub domain: Option<String>,
    /// Path scope carried by a `Set-Cookie` header, when present.
    pub path: Option<String>,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }
}

/// Per-scheme proxy addresses, like `http://127.0.0.1:1080`.
///
/// An empty string means "no proxy for that scheme".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proxy {
    pub http: String,
    pub https: String,
}

impl Proxy {
    #[must_use]
    pub fn new(http: impl Into<String>, https: impl Into<String>) -> Self {
        Self {
            http: http.into(),
            https: https.into(),
        }
    }

    /// True when neither scheme has a proxy configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.https.is_empty()
    }
}
