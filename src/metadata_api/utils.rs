//! Helpers for picking values out of metadata records

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use regex::Regex;
use std::sync::LazyLock;

/// Last segment of a URI, made of letters, digits, `_` and `-`
///
/// `http://fdri.ceh.ac.uk/ref/cosmos/time-series/lwin_raw` => `lwin_raw`
pub const URI_ID_EXTRACT_REGEX: &str = r".+/([a-zA-Z0-9_-]+)$";

/// Site code after the network prefix of a site URI
///
/// `http://fdri.ceh.ac.uk/id/site/cosmos-chimn` => `chimn`
pub const SITE_ID_EXTRACT_REGEX: &str = r".+/\w+-([a-zA-Z0-9]+)$";

static URI_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(URI_ID_EXTRACT_REGEX).unwrap());
static SITE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(SITE_ID_EXTRACT_REGEX).unwrap());

/// Extract the identifier at the end of a URI
pub fn extract_uri_id(uri: &str) -> Option<&str> {
    URI_ID_RE
        .captures(uri)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Extract the site code from a site URI
pub fn extract_site_id(uri: &str) -> Option<&str> {
    SITE_ID_RE
        .captures(uri)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Unwrap a list that must hold exactly one item
///
/// Non-list values are returned unchanged.
pub fn check_single_list_item(data: &JsonValue) -> Result<&JsonValue> {
    match data {
        JsonValue::Array(items) if items.len() == 1 => Ok(&items[0]),
        JsonValue::Array(items) => Err(Error::invalid_value(
            "items",
            format!("single list check failed, {} items found: {data}", items.len()),
        )),
        other => Ok(other),
    }
}

/// Read `key` from a record, taking the first element if the value is a list
///
/// `{key: [a, b]}` gives `a`, `{key: a}` gives `a`.
pub fn get_property<'a>(key: &str, prop: Option<&'a JsonObject>) -> Option<&'a JsonValue> {
    let prop = prop.filter(|p| !p.is_empty())?;
    match prop.get(key)? {
        JsonValue::Array(values) => values.first(),
        value => Some(value),
    }
}
