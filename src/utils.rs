//! Small helpers shared across modules

use serde::{Deserialize, Serialize};

/// Strip the scheme from a URL
///
/// `https://www.example.com` => `www.example.com`. Strings without a scheme
/// are returned unchanged.
pub fn remove_protocol_from_url(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// A single value or a list of them, as accepted from config and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for OneOrMany {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(String::from).collect())
    }
}

/// Always get a list: nothing or `""` gives `[]`, a single value gives `[value]`
pub fn ensure_list(items: Option<OneOrMany>) -> Vec<String> {
    match items {
        None => Vec::new(),
        Some(OneOrMany::One(item)) if item.is_empty() => Vec::new(),
        Some(OneOrMany::One(item)) => vec![item],
        Some(OneOrMany::Many(items)) => items,
    }
}
