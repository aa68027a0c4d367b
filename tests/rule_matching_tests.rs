//! Integration tests for rule files and rule matching

use hrc::rules::{fingerprint, RuleSetConfig};
use hrc::{CacheRule, CallbackRegistry, CategorySpec, HrcError, HttpRequest, Request, RuleSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn session_callbacks() -> CallbackRegistry {
    CallbackRegistry::new()
        .with("Session::user_id", |request, rule| {
            let user = request.match_cookie("uid", Some("([0-9]+)"))?;
            let segment = rule.config().get("segment")?.as_str()?;
            Some(format!("{}:{}", segment, user))
        })
        .unwrap()
}

#[test]
fn test_load_yaml_rule_file() {
    hrc::init_tracing();

    let rules = RuleSet::from_path(fixture("cache_rules.yaml"), session_callbacks()).unwrap();

    let names: Vec<&str> = rules.rules().map(|rule| rule.name()).collect();
    assert_eq!(names, vec!["home", "localized-docs", "members"]);

    let docs = rules.get("localized-docs").unwrap();
    assert_eq!(docs.ttl(), 300);
    assert_eq!(docs.tags(), ["docs".to_string(), "i18n".to_string()]);
}

#[test]
fn test_yaml_rule_file_needs_its_callbacks() {
    let err = RuleSet::from_path(fixture("cache_rules.yaml"), CallbackRegistry::new()).unwrap_err();
    assert!(matches!(err, HrcError::UnknownCallback(_)));
    assert!(err.is_configuration_error());
}

#[test]
fn test_load_json_rule_file() {
    let config = RuleSetConfig::from_path(fixture("cache_rules.json")).unwrap();
    assert_eq!(config.rules.len(), 2);

    let rules = RuleSet::from_config(config, CallbackRegistry::new()).unwrap();
    let catalog = HttpRequest::new("/catalog/shoes?size=42&color=red");
    let matched = rules.match_request(&catalog).unwrap().unwrap();

    assert_eq!(matched.rule().name(), "catalog");
    assert_eq!(
        matched.key(),
        fingerprint("Url-/catalog/shoes?size=42&color=redQuery-color:redQuery-size:42")
    );
}

#[test]
fn test_home_example() {
    let rules = RuleSet::from_path(fixture("cache_rules.yaml"), session_callbacks()).unwrap();

    let paged = HttpRequest::new("/?page=3");
    let matched = rules.match_request(&paged).unwrap().unwrap();
    assert_eq!(matched.rule().name(), "home");
    assert_eq!(matched.key(), fingerprint("Query-page"));
    assert_eq!(matched.ttl(), 60);

    assert!(rules.match_request(&HttpRequest::new("/")).unwrap().is_none());
}

#[test]
fn test_localized_docs() {
    let rules = RuleSet::from_path(fixture("cache_rules.yaml"), session_callbacks()).unwrap();

    let german = HttpRequest::new("/docs/intro").with_header("Accept-Language", "de-AT");
    let matched = rules.match_request(&german).unwrap().unwrap();
    assert_eq!(matched.rule().name(), "localized-docs");
    assert_eq!(
        matched.key(),
        fingerprint("Url-/docs/introHeader-Accept-Language:deCookie-session")
    );

    // same effective language, same key
    let german_de = HttpRequest::new("/docs/intro").with_header("accept-language", "de-DE");
    assert_eq!(
        rules.match_request(&german_de).unwrap().unwrap().key(),
        matched.key()
    );

    let french = HttpRequest::new("/docs/intro").with_header("Accept-Language", "fr");
    assert!(rules.match_request(&french).unwrap().is_none());

    let logged_in = HttpRequest::new("/docs/intro")
        .with_header("Accept-Language", "en")
        .with_cookie("session", "s3cr3t");
    assert!(rules.match_request(&logged_in).unwrap().is_none());
}

#[test]
fn test_callback_rule() {
    let rules = RuleSet::from_path(fixture("cache_rules.yaml"), session_callbacks()).unwrap();

    let member = HttpRequest::new("/members/feed").with_header("Cookie", "uid=42; theme=dark");
    let matched = rules.match_request(&member).unwrap().unwrap();
    assert_eq!(matched.rule().name(), "members");
    assert_eq!(
        matched.key(),
        fingerprint("Url-/members/feedcallback-premium:42")
    );

    let guest = HttpRequest::new("/members/feed");
    assert!(rules.match_request(&guest).unwrap().is_none());
}

#[test]
fn test_keys_differ_per_matched_value() {
    let rule = CacheRule::builder("by-sort")
        .ttl(60)
        .tag("list")
        .query(CategorySpec::fields([("sort", "asc|desc")]))
        .build()
        .unwrap();
    let callbacks = CallbackRegistry::new();

    let asc = rule
        .match_request(&HttpRequest::new("/list?sort=asc"), &callbacks)
        .unwrap();
    let desc = rule
        .match_request(&HttpRequest::new("/list?sort=desc"), &callbacks)
        .unwrap();
    let asc_again = rule
        .match_request(&HttpRequest::new("/other?sort=asc"), &callbacks)
        .unwrap();

    assert!(asc.is_some());
    assert_ne!(asc, desc);
    assert_eq!(asc, asc_again);
}

#[test]
fn test_capture_all_key_tracks_values() {
    let rule = CacheRule::builder("cookies")
        .ttl(60)
        .tag("t")
        .cookie(CategorySpec::CaptureAll)
        .build()
        .unwrap();
    let callbacks = CallbackRegistry::new();

    let a = HttpRequest::new("/").with_cookie("b", "2").with_cookie("a", "1");
    let b = HttpRequest::new("/").with_cookie("a", "1").with_cookie("b", "2");
    let c = HttpRequest::new("/").with_cookie("a", "1").with_cookie("b", "3");

    let key_a = rule.match_request(&a, &callbacks).unwrap().unwrap();
    let key_b = rule.match_request(&b, &callbacks).unwrap().unwrap();
    let key_c = rule.match_request(&c, &callbacks).unwrap().unwrap();

    assert_eq!(key_a, key_b);
    assert_ne!(key_a, key_c);
    assert_eq!(key_a, fingerprint("Cookie-a:1Cookie-b:2"));
}

#[test]
fn test_callbacks_stop_at_first_falsy() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (before, after) = (calls.clone(), calls.clone());

    let callbacks = CallbackRegistry::new()
        .with("Chain::yes", move |_, _| {
            before.fetch_add(1, Ordering::SeqCst);
            Some("yes".to_string())
        })
        .unwrap()
        .with("Chain::empty", |_, _| Some(String::new()))
        .unwrap()
        .with("Chain::unreached", move |_, _| {
            after.fetch_add(10, Ordering::SeqCst);
            Some("unreached".to_string())
        })
        .unwrap();

    let rule = CacheRule::builder("chained")
        .ttl(60)
        .tag("t")
        .callback("Chain::yes")
        .callback("Chain::empty")
        .callback("Chain::unreached")
        .build()
        .unwrap();
    let rules = RuleSet::new(vec![rule], callbacks).unwrap();

    assert!(rules.match_request(&HttpRequest::new("/")).unwrap().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_malformed_callback_in_rule_file() {
    let source = r#"
rules:
  - name: broken
    ttl: 60
    tags: [t]
    match:
      Callback: ["NoDelimiter"]
"#;
    let err = RuleSet::from_yaml_str(source, CallbackRegistry::new()).unwrap_err();
    assert!(err.is_configuration_error());
}
