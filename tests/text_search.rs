//! Text search filter tests
//!
//! Worked examples over records with `name` and `emailAddress` fields.

use std::borrow::Cow;

use fusepipe::{lazy, MatchRule, OpInfo, Pipeline, Rejection, TextFields};
use serde_json::{json, Value};

const FIELDS: &[&str] = &["name", "emailAddress"];

fn people() -> Vec<Value> {
    vec![
        json!({ "name": "Alice Exampleton", "emailAddress": "alice@example.com" }),
        json!({ "name": "Malice", "emailAddress": "evil@domain.com" }),
        json!({ "name": "Bob", "emailAddress": "bob@builder.org" }),
    ]
}

fn names(pipeline: &Pipeline<'_, Value>) -> Vec<String> {
    pipeline
        .to_vec()
        .unwrap()
        .iter()
        .filter_map(|person| person["name"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn test_unspecific_query_matches_nothing() {
    let p = lazy(people()).filter_text("a an of", FIELDS);
    assert_eq!(p.count().unwrap(), 0);
    assert!(p.plan_summary().unwrap().never);

    match &p.describe()[0] {
        OpInfo::Filter { never, search: Some(info), .. } => {
            assert!(*never);
            assert_eq!(info.rejected, Some(Rejection::NotSpecific));
        }
        other => panic!("unexpected op {:?}", other),
    }
}

#[test]
fn test_two_letter_query_is_rejected() {
    let p = lazy(people()).filter_text("al", FIELDS);
    assert_eq!(p.count().unwrap(), 0);
    assert!(p.plan_summary().unwrap().never);
}

#[test]
fn test_short_token_uses_prefix_rule() {
    let p = lazy(people()).filter_text("ali", FIELDS);
    assert_eq!(names(&p), vec!["Alice Exampleton"]);
}

#[test]
fn test_long_token_uses_contains_rule() {
    let p = lazy(people()).filter_text("alic", FIELDS);
    assert_eq!(names(&p), vec!["Alice Exampleton", "Malice"]);
}

#[test]
fn test_tokens_satisfied_by_different_fields() {
    let p = lazy(people()).filter_text("mal evi", FIELDS);
    assert_eq!(names(&p), vec!["Malice"]);
}

#[test]
fn test_case_insensitive() {
    let p = lazy(people()).filter_text("BOB BUILDER", FIELDS);
    assert_eq!(names(&p), vec!["Bob"]);
}

#[test]
fn test_search_composes_with_other_steps() {
    let p = lazy(people())
        .filter_text("example", FIELDS)
        .transform(|mut person| {
            person["matched"] = json!(true);
            person
        })
        .take(1);

    let out = p.to_vec().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["matched"], json!(true));
    assert_eq!(out[0]["name"], json!("Alice Exampleton"));
}

#[test]
fn test_describe_exposes_token_rules() {
    let p = lazy(people()).filter_text("al example", FIELDS);
    let described = serde_json::to_value(p.describe()).unwrap();
    assert_eq!(described[0]["op"], json!("filter"));
    assert_eq!(described[0]["search"]["tokens"][0]["token"], json!("example"));
    assert_eq!(described[0]["search"]["tokens"][0]["rule"], json!("contains"));
    assert_eq!(described[0]["search"]["tokens"][1]["rule"], json!("starts_with"));

    match &p.describe()[0] {
        OpInfo::Filter { search: Some(info), .. } => {
            assert_eq!(info.tokens[1].rule, MatchRule::StartsWith);
        }
        other => panic!("unexpected op {:?}", other),
    }
}

#[derive(Clone)]
struct Contact {
    name: String,
    email: String,
}

impl TextFields for Contact {
    fn text_field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "name" => Some(Cow::Borrowed(&self.name)),
            "emailAddress" => Some(Cow::Borrowed(&self.email)),
            _ => None,
        }
    }
}

#[test]
fn test_struct_accessor() {
    let contacts = vec![
        Contact {
            name: "Grace Hopper".to_string(),
            email: "grace@navy.mil".to_string(),
        },
        Contact {
            name: "Alan Turing".to_string(),
            email: "alan@bletchley.uk".to_string(),
        },
    ];

    let found = lazy(&contacts)
        .filter_text("grace navy", FIELDS)
        .map(|c| c.name)
        .to_vec()
        .unwrap();
    assert_eq!(found, vec!["Grace Hopper".to_string()]);
}
