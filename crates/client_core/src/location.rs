//! URL-backed UI state: the current path and query string, and the values
//! the search and shared-document scenes derive from them.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use shared::domain::{CollectionId, DateFilter, ShareId, Theme, UserId};
use url::{form_urlencoded, Url};

use crate::error::LocationError;

const BASE_URL: &str = "http://localhost";
const SEARCH_PREFIX: &str = "/search";

/// Characters left untouched by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const COLLECTION_ID_PARAM: &str = "collectionId";
pub const USER_ID_PARAM: &str = "userId";
pub const DATE_FILTER_PARAM: &str = "dateFilter";
pub const INCLUDE_ARCHIVED_PARAM: &str = "includeArchived";
pub const THEME_PARAM: &str = "theme";
pub const EDIT_PARAM: &str = "edit";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    path: String,
    query: Vec<(String, String)>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Parses a path with optional query string, or an absolute URL whose
    /// origin is then ignored.
    pub fn parse(raw: &str) -> Result<Self, LocationError> {
        let invalid = |source: url::ParseError| LocationError::Invalid {
            raw: raw.to_string(),
            source,
        };
        let url = Url::parse(BASE_URL)
            .and_then(|base| base.join(raw))
            .map_err(invalid)?;
        Ok(Self {
            path: url.path().to_string(),
            query: url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        })
    }

    /// Path of the search scene for `term`, keeping this location's query.
    pub fn for_search_term(&self, term: &str) -> Self {
        let path = if term.is_empty() {
            SEARCH_PREFIX.to_string()
        } else {
            format!("{SEARCH_PREFIX}/{}", utf8_percent_encode(term, COMPONENT))
        };
        Self {
            path,
            query: self.query.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Merges `updates` into the query string. Keys whose merged value is
    /// empty are dropped.
    pub fn merge_query<I, K, V>(&self, updates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut query = self.query.clone();
        for (key, value) in updates {
            let key = key.into();
            let value = value.into();
            match query.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => query.push((key, value)),
            }
        }
        query.retain(|(_, v)| !v.is_empty());
        Self {
            path: self.path.clone(),
            query,
        }
    }

    /// Decoded search term from `/search/<term>`, empty for any other path.
    pub fn search_term(&self) -> String {
        let Some(rest) = self.path.strip_prefix(SEARCH_PREFIX) else {
            return String::new();
        };
        let Some(segment) = rest.strip_prefix('/') else {
            return String::new();
        };
        let segment = segment.split('/').next().unwrap_or_default();
        percent_decode_str(segment).decode_utf8_lossy().into_owned()
    }

    pub fn theme_override(&self) -> Option<Theme> {
        self.param(THEME_PARAM).and_then(|v| v.parse().ok())
    }

    pub fn edit_requested(&self) -> bool {
        self.param(EDIT_PARAM) == Some("true")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            write!(f, "?{encoded}")?;
        }
        Ok(())
    }
}

/// Search filters as carried in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub collection_id: Option<CollectionId>,
    pub user_id: Option<UserId>,
    pub date_filter: Option<DateFilter>,
    pub include_archived: bool,
}

impl SearchFilters {
    pub fn from_location(location: &Location) -> Self {
        Self {
            collection_id: non_empty(location, COLLECTION_ID_PARAM).map(CollectionId::new),
            user_id: non_empty(location, USER_ID_PARAM).map(UserId::new),
            date_filter: non_empty(location, DATE_FILTER_PARAM).and_then(|v| v.parse().ok()),
            include_archived: location.param(INCLUDE_ARCHIVED_PARAM) == Some("true"),
        }
    }
}

fn non_empty<'a>(location: &'a Location, key: &str) -> Option<&'a str> {
    location.param(key).filter(|v| !v.is_empty())
}

/// A filter selection made in the UI. `Some("")` clears the filter, `None`
/// leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChange {
    pub collection_id: Option<String>,
    pub user_id: Option<String>,
    pub date_filter: Option<String>,
    pub include_archived: Option<String>,
}

impl FilterChange {
    pub fn collection(id: impl Into<String>) -> Self {
        Self {
            collection_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            user_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn date(filter: impl Into<String>) -> Self {
        Self {
            date_filter: Some(filter.into()),
            ..Self::default()
        }
    }

    pub fn include_archived(include: bool) -> Self {
        Self {
            include_archived: Some(if include { "true" } else { "" }.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn query_updates(&self) -> Vec<(&'static str, String)> {
        [
            (COLLECTION_ID_PARAM, &self.collection_id),
            (USER_ID_PARAM, &self.user_id),
            (DATE_FILTER_PARAM, &self.date_filter),
            (INCLUDE_ARCHIVED_PARAM, &self.include_archived),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

/// Route of the shared-document scene: `/s/<share_id>` or
/// `/s/<share_id>/doc/<slug>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedRoute {
    pub share_id: ShareId,
    pub document_slug: String,
}

impl SharedRoute {
    pub fn new(share_id: impl Into<String>, document_slug: impl Into<String>) -> Self {
        Self {
            share_id: ShareId::new(share_id),
            document_slug: document_slug.into(),
        }
    }

    pub fn from_location(location: &Location) -> Option<Self> {
        let mut segments = location.path().trim_matches('/').split('/');
        if segments.next()? != "s" {
            return None;
        }
        let share_id = segments.next().filter(|s| !s.is_empty())?;
        let document_slug = match (segments.next(), segments.next()) {
            (None, _) => String::new(),
            (Some("doc"), Some(slug)) => slug.to_string(),
            _ => return None,
        };
        Some(Self::new(
            percent_decode_str(share_id).decode_utf8_lossy(),
            percent_decode_str(&document_slug).decode_utf8_lossy(),
        ))
    }
}

#[cfg(test)]
#[path = "tests/location_tests.rs"]
mod tests;
