//! Field filters understood by the mock metadata API
//!
//! Each filter receives the accepted values for its parameter key and the
//! current candidate items, and keeps the items whose field matches one of
//! the accepted values. Items missing the inspected field never match.

use crate::types::JsonValue;

/// Signature shared by every filter predicate
pub type FilterFn = fn(&[String], Vec<JsonValue>) -> Vec<JsonValue>;

/// Query parameter keys that filter items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    /// `@id` of the item itself
    Id,
    /// `@id` of the first originating site
    OriginatingSite,
    /// Aggregation periodicity code (e.g. `PT30M`) of the first type entry
    Periodicity,
    /// Name of the source data column
    SourceColumnName,
    /// Processing level `@id` of the first type entry
    ProcessingLevel,
    /// `@id` of `type`, read as an object rather than a list
    TypeId,
    /// Any `@id` among the time series a configuration applies to
    AppliesToTimeSeries,
}

impl FilterKey {
    /// Every registered filter
    pub const ALL: [FilterKey; 7] = [
        FilterKey::Id,
        FilterKey::OriginatingSite,
        FilterKey::Periodicity,
        FilterKey::SourceColumnName,
        FilterKey::ProcessingLevel,
        FilterKey::TypeId,
        FilterKey::AppliesToTimeSeries,
    ];

    /// Look up the filter registered for a query parameter name
    pub fn from_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.param_name() == name)
    }

    /// Query parameter name for this filter
    pub fn param_name(self) -> &'static str {
        match self {
            Self::Id => "@id",
            Self::OriginatingSite => "originatingSite",
            Self::Periodicity => "type.measure.aggregation.periodicity",
            Self::SourceColumnName => "sourceColumnName",
            Self::ProcessingLevel => "type.processingLevel",
            Self::TypeId => "type",
            Self::AppliesToTimeSeries => "appliesToTimeSeries",
        }
    }

    /// Predicate implementing this filter
    pub fn predicate(self) -> FilterFn {
        match self {
            Self::Id => filter_by_id,
            Self::OriginatingSite => filter_by_site,
            Self::Periodicity => filter_by_periodicity,
            Self::SourceColumnName => filter_by_column,
            Self::ProcessingLevel => filter_by_processing_level,
            Self::TypeId => filter_by_type,
            Self::AppliesToTimeSeries => filter_by_applies_to_ts_id,
        }
    }

    /// Narrow `items` to those accepted by this filter
    pub fn apply(self, accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
        (self.predicate())(accepted, items)
    }
}

fn is_accepted(accepted: &[String], value: Option<&JsonValue>) -> bool {
    value
        .and_then(JsonValue::as_str)
        .is_some_and(|v| accepted.iter().any(|a| a == v))
}

fn retain_pointer(accepted: &[String], items: Vec<JsonValue>, pointer: &str) -> Vec<JsonValue> {
    items
        .into_iter()
        .filter(|item| is_accepted(accepted, item.pointer(pointer)))
        .collect()
}

/// Keep items whose own `@id` is accepted
pub fn filter_by_id(accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
    retain_pointer(accepted, items, "/@id")
}

/// Keep items whose first `originatingSite` has an accepted `@id`
pub fn filter_by_site(accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
    retain_pointer(accepted, items, "/originatingSite/0/@id")
}

/// Keep items whose first `type` entry has an accepted periodicity
pub fn filter_by_periodicity(accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
    retain_pointer(accepted, items, "/type/0/measure/aggregation/periodicity")
}

/// Keep items whose `sourceColumnName` is accepted
pub fn filter_by_column(accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
    retain_pointer(accepted, items, "/sourceColumnName")
}

/// Keep items whose first `type` entry has an accepted processing level
pub fn filter_by_processing_level(accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
    retain_pointer(accepted, items, "/type/0/processingLevel/@id")
}

/// Keep items whose `type.@id` is accepted
///
/// Unlike the periodicity and processing level filters, `type` is read as an
/// object here, so items carrying `type` as a list never match.
pub fn filter_by_type(accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
    retain_pointer(accepted, items, "/type/@id")
}

/// Keep items where any `appliesToTimeSeries` entry has an accepted `@id`
pub fn filter_by_applies_to_ts_id(accepted: &[String], items: Vec<JsonValue>) -> Vec<JsonValue> {
    items
        .into_iter()
        .filter(|item| {
            item.get("appliesToTimeSeries")
                .and_then(JsonValue::as_array)
                .is_some_and(|series| {
                    series
                        .iter()
                        .any(|ts| is_accepted(accepted, ts.get("@id")))
                })
        })
        .collect()
}
