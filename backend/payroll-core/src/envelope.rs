// src/envelope.rs
//
// Maps the server's list and entity envelopes onto `Page<T>` / `T` before
// anything reaches the reducer. Accepted list shapes:
//
//   [ ... ]
//   { "data": [ ... ] }
//   { "data": { "items": [ ... ], "totalItems", "page", "pageSize", "totalPages" } }
//   { "data": { "Items": { "$values": [ ... ] }, ... } }
//   { "items": [ ... ], ... }

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::gateway::GatewayError;
use crate::models::{Page, Pagination};

/// Page coordinates the caller asked for; used when the envelope carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn number_field(object: &Map<String, Value>, names: &[&str]) -> Option<u64> {
    field(object, names).and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// Pulls the item array out of `items`, `Items` or `Items.$values`.
fn item_array(object: &Map<String, Value>) -> Option<&Vec<Value>> {
    match field(object, &["items", "Items", "$values"])? {
        Value::Array(items) => Some(items),
        Value::Object(inner) => match inner.get("$values") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(u64::from(page_size)) as u32
}

fn decode_items<T: DeserializeOwned>(items: &[Value]) -> Result<Vec<T>, GatewayError> {
    items
        .iter()
        .cloned()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(GatewayError::from)
}

fn flat_page<T: DeserializeOwned>(
    items: &[Value],
    requested: PageRequest,
) -> Result<Page<T>, GatewayError> {
    let items = decode_items(items)?;
    let total_items = items.len() as u64;
    Ok(Page {
        items,
        pagination: Pagination {
            page: requested.page,
            page_size: requested.page_size,
            total_items,
            total_pages: total_pages(total_items, requested.page_size),
        },
    })
}

fn enveloped_page<T: DeserializeOwned>(
    object: &Map<String, Value>,
    requested: PageRequest,
) -> Option<Result<Page<T>, GatewayError>> {
    let raw_items = item_array(object)?;
    let items = match decode_items::<T>(raw_items) {
        Ok(items) => items,
        Err(e) => return Some(Err(e)),
    };

    let page_size = number_field(object, &["pageSize", "PageSize"])
        .map(|n| n as u32)
        .unwrap_or(requested.page_size);
    let total_items = number_field(object, &["totalItems", "TotalItems", "totalCount", "TotalCount"])
        .unwrap_or(items.len() as u64);
    let pagination = Pagination {
        page: number_field(object, &["page", "Page", "pageNumber", "PageNumber"])
            .map(|n| n as u32)
            .unwrap_or(requested.page),
        page_size,
        total_items,
        total_pages: number_field(object, &["totalPages", "TotalPages"])
            .map(|n| n as u32)
            .unwrap_or_else(|| total_pages(total_items, page_size)),
    };
    Some(Ok(Page { items, pagination }))
}

/// Normalizes any known list envelope into a page.
pub fn normalize_page<T: DeserializeOwned>(
    payload: Value,
    requested: PageRequest,
) -> Result<Page<T>, GatewayError> {
    match &payload {
        Value::Array(items) => return flat_page(items, requested),
        Value::Object(object) => {
            match object.get("data") {
                Some(Value::Array(items)) => return flat_page(items, requested),
                Some(Value::Object(inner)) => {
                    if let Some(page) = enveloped_page(inner, requested) {
                        return page;
                    }
                }
                _ => {}
            }
            if let Some(page) = enveloped_page(object, requested) {
                return page;
            }
        }
        _ => {}
    }
    Err(GatewayError::Envelope(format!(
        "no list found in payload: {}",
        truncate(&payload)
    )))
}

/// Unwraps `{ "data": {...} }` when present, otherwise decodes the payload itself.
pub fn normalize_entity<T: DeserializeOwned>(payload: Value) -> Result<T, GatewayError> {
    let inner = match payload {
        Value::Object(mut object) if matches!(object.get("data"), Some(Value::Object(_))) => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    if inner.is_null() {
        return Err(GatewayError::Envelope("empty entity payload".to_string()));
    }
    Ok(serde_json::from_value(inner)?)
}

/// Like [`normalize_entity`] for endpoints that may return a list of entities.
pub fn normalize_entities<T: DeserializeOwned>(payload: Value) -> Result<Vec<T>, GatewayError> {
    let requested = PageRequest {
        page: 1,
        page_size: 0,
    };
    normalize_page(payload, requested).map(|page| page.items)
}

fn truncate(value: &Value) -> String {
    const MAX_LEN: usize = 200;
    let mut text = value.to_string();
    if text.len() > MAX_LEN {
        let mut cut = MAX_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: i64,
    }

    const REQUESTED: PageRequest = PageRequest {
        page: 2,
        page_size: 10,
    };

    #[test]
    fn flat_array_under_data_uses_requested_page() {
        let page: Page<Row> =
            normalize_page(json!({ "data": [{ "id": 1 }, { "id": 2 }] }), REQUESTED).unwrap();

        assert_eq!(page.items, vec![Row { id: 1 }, Row { id: 2 }]);
        assert_eq!(page.pagination.page, 2);
        assert_eq!(page.pagination.page_size, 10);
        assert_eq!(page.pagination.total_items, 2);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[test]
    fn nested_items_envelope_carries_server_pagination() {
        let payload = json!({
            "success": true,
            "data": {
                "items": [{ "id": 5 }],
                "totalItems": 31,
                "page": 4,
                "pageSize": 10,
                "totalPages": 4
            }
        });
        let page: Page<Row> = normalize_page(payload, REQUESTED).unwrap();

        assert_eq!(page.items, vec![Row { id: 5 }]);
        assert_eq!(page.pagination.page, 4);
        assert_eq!(page.pagination.total_items, 31);
        assert_eq!(page.pagination.total_pages, 4);
    }

    #[test]
    fn dotnet_values_envelope_is_unwrapped() {
        let payload = json!({
            "data": {
                "Items": { "$values": [{ "id": 8 }, { "id": 9 }] },
                "TotalCount": 12,
                "PageSize": 5
            }
        });
        let page: Page<Row> = normalize_page(payload, REQUESTED).unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.page, 2);
        assert_eq!(page.pagination.page_size, 5);
        assert_eq!(page.pagination.total_items, 12);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn unknown_shape_is_an_envelope_error() {
        let result: Result<Page<Row>, _> = normalize_page(json!({ "data": 17 }), REQUESTED);
        assert!(matches!(result, Err(GatewayError::Envelope(_))));
    }

    #[test]
    fn entity_is_unwrapped_from_data_or_taken_as_is() {
        let wrapped: Row = normalize_entity(json!({ "data": { "id": 3 } })).unwrap();
        let bare: Row = normalize_entity(json!({ "id": 4 })).unwrap();
        assert_eq!(wrapped, Row { id: 3 });
        assert_eq!(bare, Row { id: 4 });

        let empty: Result<Row, _> = normalize_entity(Value::Null);
        assert!(matches!(empty, Err(GatewayError::Envelope(_))));
    }
}
