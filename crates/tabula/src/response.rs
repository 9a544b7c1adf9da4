//! Response shapes.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tabula_core::Row;
use tabula_query::PageInfo;

/// One page of rows with its page metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Rows of the page, keyed by column title
    list: Vec<Row>,
    /// Position of the page within the matching rows
    page_info: PageInfo,
}

impl ListResponse {
    /// Creates a response.
    pub fn new(list: Vec<Row>, page_info: PageInfo) -> Self {
        Self { list, page_info }
    }
}

/// Result of `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    /// Matching rows
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_response_uses_camel_case() {
        let info = PageInfo {
            total_rows: 400,
            page: 3,
            page_size: 100,
            is_first_page: false,
            is_last_page: false,
        };
        let value = serde_json::to_value(ListResponse::new(Vec::new(), info)).unwrap();
        assert_eq!(
            value,
            json!({
                "list": [],
                "pageInfo": {
                    "totalRows": 400,
                    "page": 3,
                    "pageSize": 100,
                    "isFirstPage": false,
                    "isLastPage": false
                }
            })
        );
    }
}
