//! Request parameter and payload shapes.

use serde::{Deserialize, Serialize};

/// A value given either alone or as a list.
///
/// Mutation payloads keep their shape: an object in gives an object out, an
/// array in gives an array out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value
    One(T),
    /// A list of values
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Whether the value was given as a list.
    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    /// Whether there are no values (only possible for an empty list).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The values as a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Query parameters of `list`, `count` and `find_one`.
///
/// Every value arrives as the caller sent it. Pagination strings are
/// normalised later, so junk offsets and limits fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParams {
    /// Saved view to apply
    pub view_id: Option<String>,
    /// Fields to return, comma separated or as a list
    pub fields: Option<OneOrMany<String>>,
    /// Sort fields, `-` prefixed for descending
    pub sort: Option<OneOrMany<String>>,
    /// Filter expression
    #[serde(rename = "where")]
    pub filter: Option<String>,
    /// Rows to skip
    pub offset: Option<String>,
    /// Page size
    pub limit: Option<String>,
}

impl ListParams {
    /// Parameters bound to a view.
    pub fn for_view(view_id: impl Into<String>) -> Self {
        Self {
            view_id: Some(view_id.into()),
            ..Self::default()
        }
    }

    /// Sets the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the sort fields.
    pub fn with_sort<S: Into<String>>(mut self, sort: impl IntoIterator<Item = S>) -> Self {
        self.sort = Some(OneOrMany::Many(sort.into_iter().map(Into::into).collect()));
        self
    }

    /// Sets the requested fields.
    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(OneOrMany::Many(fields.into_iter().map(Into::into).collect()));
        self
    }

    /// Sets the raw offset and limit.
    pub fn with_window(mut self, offset: impl Into<String>, limit: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self.limit = Some(limit.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabula_core::Row;

    #[test]
    fn object_and_array_payloads_keep_their_shape() {
        let one: OneOrMany<Row> = serde_json::from_value(json!({"Name": "Kabul"})).unwrap();
        assert!(!one.is_many());

        let many: OneOrMany<Row> =
            serde_json::from_value(json!([{"Name": "Kabul"}, {"Name": "Herat"}])).unwrap();
        assert!(many.is_many());
        assert_eq!(many.len(), 2);
    }

    #[test]
    fn params_accept_strings_or_lists() {
        let params: ListParams = serde_json::from_value(json!({
            "viewId": "vw_1",
            "fields": "Name,Population",
            "sort": ["-Population", "Name"],
            "where": "(Name,eq,Kabul)",
            "limit": "10",
        }))
        .unwrap();
        assert_eq!(params.view_id.as_deref(), Some("vw_1"));
        assert_eq!(params.fields, Some(OneOrMany::One("Name,Population".to_string())));
        assert_eq!(params.sort.map(OneOrMany::into_vec).unwrap().len(), 2);
        assert_eq!(params.filter.as_deref(), Some("(Name,eq,Kabul)"));
        assert!(params.offset.is_none());
    }
}
