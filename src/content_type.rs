//! Content-type header parsing and lookup equivalents.
//!
//! Clients vary in how they present charset and boundary parameters, so a raw
//! `Content-Type` header is reduced to a short ordered list of
//! [equivalents](ContentType::equivalents) that are tried against the media
//! types a contract declares. The first equivalent also names the validator
//! cache bucket.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Cache bucket used when the request carries no content type.
pub const NOT_PROVIDED: &str = "not_provided";

/// Strips a `boundary` parameter and everything after it
#[allow(clippy::expect_used)]
static BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r";\s*boundary.*").expect("boundary regex should be valid")
});

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentType {
    raw: Option<String>,
    without_boundary: Option<String>,
    media_type: Option<String>,
    charset: Option<String>,
}

impl ContentType {
    /// Parse a raw header value. An absent or empty header yields a value
    /// with no equivalents.
    #[must_use]
    pub fn parse(header: Option<&str>) -> Self {
        let raw = match header.map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => return Self::default(),
        };

        let without_boundary = BOUNDARY.replace(raw, "").into_owned();
        let mut parts = without_boundary.split(';');
        let media_type = parts.next().unwrap_or_default().trim().to_string();
        let charset = parts
            .next()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Self {
            raw: Some(raw.to_string()),
            without_boundary: Some(without_boundary),
            media_type: Some(media_type),
            charset,
        }
    }

    /// Read the `content-type` entry of a lower-cased header map.
    #[must_use]
    pub fn from_headers(headers: &Map<String, Value>) -> Self {
        Self::parse(headers.get("content-type").and_then(Value::as_str))
    }

    /// The header exactly as received
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// The header with any `boundary` parameter removed
    pub fn without_boundary(&self) -> Option<&str> {
        self.without_boundary.as_deref()
    }

    /// The bare media type (everything before the first `;`)
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// The first parameter after the media type, typically `charset=...`
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Whether a content type header was supplied
    #[must_use]
    pub fn is_provided(&self) -> bool {
        self.raw.is_some()
    }

    /// Ordered lookup keys for schema and cache lookup.
    ///
    /// With a charset: `[mediaType, "mediaType; charset"]`. Without one:
    /// `[withoutBoundary, "mediaType; charset=utf-8"]`. Without a header: empty.
    #[must_use]
    pub fn equivalents(&self) -> Vec<String> {
        let (Some(without_boundary), Some(media_type)) =
            (self.without_boundary.as_deref(), self.media_type.as_deref())
        else {
            return Vec::new();
        };
        match self.charset.as_deref() {
            Some(charset) => vec![media_type.to_string(), format!("{media_type}; {charset}")],
            None => vec![
                without_boundary.to_string(),
                format!("{media_type}; charset=utf-8"),
            ],
        }
    }

    /// Cache bucket for this content type: the first equivalent or
    /// [`NOT_PROVIDED`].
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.equivalents()
            .into_iter()
            .next()
            .unwrap_or_else(|| NOT_PROVIDED.to_string())
    }
}

/// Whether a declared media type carries JSON, by subtype (`application/json`)
/// or structured-syntax suffix (`application/problem+json`). Parameters are
/// ignored.
#[must_use]
pub fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    let Some((_, subtype)) = essence.split_once('/') else {
        return false;
    };
    let subtype = subtype.to_ascii_lowercase();
    subtype == "json" || subtype.ends_with("+json")
}
