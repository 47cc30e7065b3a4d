// src/extract.rs

//! Body and query extractors whose rejections come back as [`AppError`] JSON instead of
//! axum's plain-text responses.

use axum::{
    extract::{FromRequest, FromRequestParts, Query},
    http::Uri,
};
use serde::de::DeserializeOwned;
use url::form_urlencoded;

use crate::error::{AppError, AppResult};

/// `axum::Json` with structured rejections.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Query` with structured rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Parses a query string in which `key` may repeat (`?tag=a&tag=b`) or carry a comma
/// separated list. The values of `key` are returned beside `T`, which is built from the
/// remaining pairs.
pub fn query_with_list<T: DeserializeOwned>(
    query: Option<&str>,
    key: &str,
) -> AppResult<(T, Vec<String>)> {
    let mut values = Vec::new();
    let mut rest = form_urlencoded::Serializer::new(String::new());

    for (name, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        if name == key {
            values.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            );
        } else {
            rest.append_pair(&name, &value);
        }
    }

    let uri: Uri = format!("/?{}", rest.finish())
        .parse()
        .map_err(|_| AppError::ValidationError("Malformed query string".to_string()))?;
    let Query(params) = Query::<T>::try_from_uri(&uri)?;
    Ok((params, values))
}
