//! Database URL construction.
//!
//! `{base}{/path}.json?{query params}&auth={token}`

use url::Url;

use crate::error::{DatabaseError, Result};
use crate::query::Query;

/// Leading slash enforced, surrounding whitespace and trailing slashes
/// dropped. The root path normalizes to `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUrlBuilder {
    base: String,
    parsed: Url,
}

impl DatabaseUrlBuilder {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let base = base.into().trim().trim_end_matches('/').to_string();
        if base.is_empty() {
            return Err(DatabaseError::MissingDatabaseUrl);
        }
        let parsed =
            Url::parse(&base).map_err(|e| DatabaseError::InvalidUrl(format!("{}: {}", base, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(DatabaseError::InvalidUrl(format!("{}: not a base URL", base)));
        }
        Ok(Self { base, parsed })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// URL for `path` with the query filters followed by `auth` when the
    /// token is non-empty.
    ///
    /// Each key is appended as its own percent-encoded segment, so `?`, `#`
    /// and `%` inside a key stay part of the path.
    pub fn build(&self, path: &str, query: &Query, auth_token: &str) -> Result<Url> {
        let normalized = normalize_path(path);
        let keys: Vec<&str> = normalized.split('/').filter(|key| !key.is_empty()).collect();

        let mut url = self.parsed.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| DatabaseError::InvalidUrl(format!("{}: not a base URL", self.base)))?;
            segments.pop_if_empty();
            match keys.split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{}.json", last));
                }
                None => {
                    segments.push(".json");
                }
            }
        }

        let mut params = query.params();
        if !auth_token.is_empty() {
            params.push(("auth", auth_token.to_string()));
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> DatabaseUrlBuilder {
        DatabaseUrlBuilder::new("https://demo-default-rtdb.firebaseio.com/").unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("users/u1"), "/users/u1");
        assert_eq!(normalize_path("/users/u1"), "/users/u1");
        assert_eq!(normalize_path("users/u1/"), "/users/u1");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_leading_slash_is_idempotent() {
        for path in ["scores", "users/u1/profile", "a/b/c", "levels/3"] {
            let without = builder().build(path, &Query::new(), "tok").unwrap();
            let with = builder()
                .build(&format!("/{}", path), &Query::new(), "tok")
                .unwrap();
            assert_eq!(without, with, "path {}", path);
            assert_eq!(normalize_path(&normalize_path(path)), normalize_path(path));
        }
    }

    #[test]
    fn test_plain_url_without_token() {
        let url = builder().build("scores", &Query::new(), "").unwrap();
        assert_eq!(url.as_str(), "https://demo-default-rtdb.firebaseio.com/scores.json");
    }

    #[test]
    fn test_root_path() {
        let url = builder().build("", &Query::new(), "").unwrap();
        assert_eq!(url.as_str(), "https://demo-default-rtdb.firebaseio.com/.json");
    }

    #[test]
    fn test_auth_comes_after_filters() {
        let query = Query::new().order_by("score").limit_to_first(10);
        let url = builder().build("scores", &query, "tok").unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("orderBy".to_string(), "\"score\"".to_string()),
                ("limitToFirst".to_string(), "10".to_string()),
                ("auth".to_string(), "tok".to_string()),
            ]
        );
    }

    #[test]
    fn test_reserved_characters_stay_in_the_key() {
        let url = builder().build("faq/why?", &Query::new(), "tok").unwrap();
        assert_eq!(url.path(), "/faq/why%3F.json");
        assert_eq!(url.query(), Some("auth=tok"));
        assert_eq!(url.fragment(), None);

        let url = builder().build("notes/a b#c/100%", &Query::new(), "").unwrap();
        assert_eq!(url.path(), "/notes/a%20b%23c/100%25.json");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_base_with_path_prefix() {
        let builder = DatabaseUrlBuilder::new("http://localhost:9000/ns/").unwrap();
        let url = builder.build("/scores/", &Query::new(), "").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/ns/scores.json");
    }

    #[test]
    fn test_rejects_missing_base() {
        assert!(matches!(
            DatabaseUrlBuilder::new("  "),
            Err(DatabaseError::MissingDatabaseUrl)
        ));
        assert!(DatabaseUrlBuilder::new("not a url").is_err());
    }
}
