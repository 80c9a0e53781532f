//! Text search filter construction
//!
//! Turns a query string and a set of field names into one compiled
//! predicate: every token must match at least one field, case-insensitively.
//! Short tokens match field prefixes, longer ones match anywhere.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::pipeline::ir::{Predicate, TestFn};

/// Tokens shorter than this match as prefixes, the rest as substrings
pub const CONTAINS_MIN_LEN: usize = 4;

/// A query needs at least one token of this length to run at all
pub const SPECIFIC_MIN_LEN: usize = 3;

/// Read access to named text fields
///
/// Missing fields and non-text values read as `None`, which matches like an
/// empty string.
pub trait TextFields {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>>;
}

impl TextFields for serde_json::Value {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name)?.as_str().map(Cow::Borrowed)
    }
}

impl<S: BuildHasher> TextFields for HashMap<String, String, S> {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl TextFields for BTreeMap<String, String> {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl<T: TextFields + ?Sized> TextFields for &T {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).text_field(name)
    }
}

impl<T: TextFields + ?Sized> TextFields for Rc<T> {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).text_field(name)
    }
}

impl<T: TextFields + ?Sized> TextFields for Arc<T> {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        (**self).text_field(name)
    }
}

/// How one token is matched against a field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    StartsWith,
    Contains,
}

/// A lowercased token and its rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenRule {
    pub token: String,
    pub rule: MatchRule,
}

impl TokenRule {
    fn new(token: &str) -> Self {
        let rule = if token.chars().count() < CONTAINS_MIN_LEN {
            MatchRule::StartsWith
        } else {
            MatchRule::Contains
        };
        TokenRule {
            token: token.to_lowercase(),
            rule,
        }
    }

    #[inline]
    fn matches(&self, haystack: &str) -> bool {
        match self.rule {
            MatchRule::StartsWith => haystack.starts_with(&self.token),
            MatchRule::Contains => haystack.contains(&self.token),
        }
    }
}

/// Why a query compiled to an always-false filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NoFields,
    NotSpecific,
}

/// Introspection metadata attached to a text-search filter
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchInfo {
    pub query: String,
    pub fields: Vec<String>,
    /// Tokens in evaluation order (longest first)
    pub tokens: Vec<TokenRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<Rejection>,
}

/// A compiled text query
#[derive(Clone, Debug)]
pub struct TextQuery {
    info: Rc<SearchInfo>,
}

impl TextQuery {
    pub fn compile(query: &str, fields: &[&str]) -> Self {
        let mut tokens: Vec<&str> = query.split_whitespace().collect();
        // Longest (most selective) first; stable for equal lengths
        tokens.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));

        let rejected = if fields.is_empty() {
            Some(Rejection::NoFields)
        } else if !tokens.iter().any(|t| t.chars().count() >= SPECIFIC_MIN_LEN) {
            Some(Rejection::NotSpecific)
        } else {
            None
        };

        if let Some(reason) = rejected {
            debug!(query, ?reason, "text query rejected, filter matches nothing");
        }

        TextQuery {
            info: Rc::new(SearchInfo {
                query: query.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
                tokens: tokens.into_iter().map(TokenRule::new).collect(),
                rejected,
            }),
        }
    }

    pub fn info(&self) -> &SearchInfo {
        &self.info
    }

    pub(crate) fn shared_info(&self) -> Rc<SearchInfo> {
        Rc::clone(&self.info)
    }

    pub fn is_rejected(&self) -> bool {
        self.info.rejected.is_some()
    }

    /// Evaluate against one element
    ///
    /// Each field is read and lowercased once; evaluation stops at the first
    /// token no field satisfies.
    pub fn matches<T: TextFields + ?Sized>(&self, item: &T) -> bool {
        if self.is_rejected() {
            return false;
        }
        let haystacks: SmallVec<[String; 4]> = self
            .info
            .fields
            .iter()
            .map(|name| {
                item.text_field(name)
                    .map(|text| text.to_lowercase())
                    .unwrap_or_default()
            })
            .collect();

        self.info
            .tokens
            .iter()
            .all(|token| haystacks.iter().any(|h| token.matches(h)))
    }

    /// Compile into a filter predicate
    pub(crate) fn predicate<'a, T: TextFields + 'a>(&self) -> Predicate<'a, T> {
        if self.is_rejected() {
            return Predicate::Never;
        }
        let query = self.clone();
        let test: TestFn<'a, T> = Rc::new(move |item: &T, _: usize| query.matches(item));
        Predicate::Test(test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[&str] = &["name", "emailAddress"];

    fn person(name: &str, email: &str) -> serde_json::Value {
        json!({ "name": name, "emailAddress": email })
    }

    #[test]
    fn test_tokens_sorted_longest_first() {
        let query = TextQuery::compile("  ab  alice \t mal ", FIELDS);
        let tokens: Vec<&str> = query.info().tokens.iter().map(|t| t.token.as_str()).collect();
        assert_eq!(tokens, vec!["alice", "mal", "ab"]);
        assert_eq!(query.info().tokens[0].rule, MatchRule::Contains);
        assert_eq!(query.info().tokens[1].rule, MatchRule::StartsWith);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            TextQuery::compile("a an of", FIELDS).info().rejected,
            Some(Rejection::NotSpecific)
        );
        assert_eq!(TextQuery::compile("", FIELDS).info().rejected, Some(Rejection::NotSpecific));
        assert_eq!(TextQuery::compile("alice", &[]).info().rejected, Some(Rejection::NoFields));
        assert!(matches!(
            TextQuery::compile("a", FIELDS).predicate::<serde_json::Value>(),
            Predicate::Never
        ));
    }

    #[test]
    fn test_prefix_and_contains_rules() {
        let alice = person("Alice Exampleton", "alice@example.com");
        let malice = person("Malice", "m@example.com");

        let prefix = TextQuery::compile("ali", FIELDS);
        assert!(prefix.matches(&alice));
        assert!(!prefix.matches(&malice));

        let contains = TextQuery::compile("ALIC", FIELDS);
        assert!(contains.matches(&alice));
        assert!(contains.matches(&malice));
    }

    #[test]
    fn test_tokens_may_match_different_fields() {
        let query = TextQuery::compile("mal evi", FIELDS);
        assert!(query.matches(&person("Malice", "evil@domain.com")));
        assert!(!query.matches(&person("Malice", "good@domain.com")));
    }

    #[test]
    fn test_missing_and_non_text_fields_read_empty() {
        let query = TextQuery::compile("bob", FIELDS);
        assert!(!query.matches(&json!({ "name": 42 })));
        assert!(query.matches(&json!({ "emailAddress": "bob@x.org" })));
    }

    #[test]
    fn test_map_fields() {
        let mut row = HashMap::new();
        row.insert("name".to_string(), "Grace Hopper".to_string());
        let query = TextQuery::compile("hopp", &["name"]);
        assert!(query.matches(&row));
    }

    #[test]
    fn test_info_serializes() {
        let value = serde_json::to_value(TextQuery::compile("ali", &["name"]).info()).unwrap();
        assert_eq!(
            value,
            json!({
                "query": "ali",
                "fields": ["name"],
                "tokens": [{ "token": "ali", "rule": "starts_with" }]
            })
        );
    }
}
