//! Metadata API request and response types
//!
//! Query parameters arrive either as a key/value map or as an ordered list of
//! pairs. Both are kept as given for the wire and normalized into a
//! [`ParamMultimap`] wherever values have to be interpreted.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Default number of items requested per page
pub const PAGE_SIZE: usize = 25;

/// Reserved query key holding the page size
pub const LIMIT_PARAM: &str = "_limit";

/// Reserved query key holding the index of the first item of a page
pub const OFFSET_PARAM: &str = "_offset";

// ============================================================================
// Response
// ============================================================================

/// One response from the metadata API: `{"meta": {...}, "items": [...]}`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Response metadata. A `limit` entry means the endpoint paginates.
    pub meta: JsonObject,
    /// Records, in server order
    pub items: Vec<JsonValue>,
}

impl ApiResponse {
    /// Create a response from its parts
    pub fn new(meta: JsonObject, items: Vec<JsonValue>) -> Self {
        Self { meta, items }
    }

    /// Decode a parsed JSON body, checking the `meta`/`items` shape
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(mut body) = value else {
            return Err(Error::malformed("response body is not a JSON object"));
        };

        let meta = match body.remove("meta") {
            Some(JsonValue::Object(meta)) => meta,
            Some(_) => return Err(Error::malformed("'meta' is not an object")),
            None => return Err(Error::malformed("missing 'meta'")),
        };

        let items = match body.remove("items") {
            Some(JsonValue::Array(items)) => items,
            Some(_) => return Err(Error::malformed("'items' is not an array")),
            None => return Err(Error::malformed("missing 'items'")),
        };

        Ok(Self { meta, items })
    }

    /// The server's page limit, or `None` when the endpoint does not paginate
    pub fn page_limit(&self) -> Result<Option<usize>> {
        let Some(limit) = self.meta.get("limit") else {
            return Ok(None);
        };

        limit
            .as_u64()
            .map(|n| n as usize)
            .or_else(|| limit.as_str().and_then(|s| s.parse().ok()))
            .map(Some)
            .ok_or_else(|| Error::malformed(format!("'meta.limit' is not a count: {limit}")))
    }

    /// Number of items in this response
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this response holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query parameters as supplied by a caller
///
/// `Map` holds one or more values per key; `Pairs` is an ordered list in
/// which a key may repeat (e.g. several `originatingSite` entries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParams {
    Map(BTreeMap<String, Vec<String>>),
    Pairs(Vec<(String, String)>),
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::Map(BTreeMap::new())
    }
}

impl QueryParams {
    /// Empty map-style parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Build pair-style parameters
    pub fn pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build map-style parameters with a single value per key
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), vec![v.into()]))
                .collect(),
        )
    }

    /// Set `key` to a single value, replacing every earlier value for it
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self {
            Self::Map(map) => {
                map.insert(key, vec![value]);
            }
            Self::Pairs(pairs) => {
                pairs.retain(|(k, _)| *k != key);
                pairs.push((key, value));
            }
        }
    }

    /// First value supplied for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        match self {
            Self::Map(map) => map.get(key).and_then(|v| v.first()).map(String::as_str),
            Self::Pairs(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }

    /// Whether no parameters are present
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(map) => map.is_empty(),
            Self::Pairs(pairs) => pairs.is_empty(),
        }
    }

    /// Flatten into wire order, one pair per value
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        match self {
            Self::Map(map) => map
                .iter()
                .flat_map(|(k, values)| values.iter().map(move |v| (k.clone(), v.clone())))
                .collect(),
            Self::Pairs(pairs) => pairs.clone(),
        }
    }

    /// Normalize into one set of accepted values per key
    pub fn normalize(&self) -> ParamMultimap {
        let mut multimap = ParamMultimap::default();
        for (key, value) in self.to_pairs() {
            multimap.insert(key, value);
        }
        multimap
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Pairs(pairs)
    }
}

impl From<Vec<(&str, &str)>> for QueryParams {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        Self::pairs(pairs)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for QueryParams {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::pairs(pairs)
    }
}

impl From<HashMap<String, String>> for QueryParams {
    fn from(map: HashMap<String, String>) -> Self {
        Self::map(map)
    }
}

impl From<BTreeMap<String, String>> for QueryParams {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::map(map)
    }
}

impl From<BTreeMap<String, Vec<String>>> for QueryParams {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self::Map(map)
    }
}

/// Accepted values per parameter key
///
/// Keys keep the order of their first appearance. Values within a key are
/// OR'd together and kept without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMultimap {
    entries: Vec<(String, Vec<String>)>,
}

impl ParamMultimap {
    /// Add one accepted value for `key`
    pub fn insert(&mut self, key: String, value: String) {
        if let Some((_, values)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            if !values.contains(&value) {
                values.push(value);
            }
        } else {
            self.entries.push((key, vec![value]));
        }
    }

    /// All accepted values for `key`
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First accepted value for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(<[String]>::first).map(String::as_str)
    }

    /// Iterate keys with their values, in first-appearance order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are present
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
