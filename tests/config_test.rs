//! Config file loading and merge semantics.

use deepscroll::config::{DetectionMethod, ScrollConfig, ScrollContainer, ScrollOptions};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_named(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp config");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn yaml_config_merges_over_defaults() {
    let file = write_named(
        r##"
item_selector: ".card"
detection_method: itemCount
max_scroll_attempts: 12
scroll_amount:
  min: 100
wait_after_scroll:
  max: 900
scroll_container: ".feed"
load_more_selectors:
  - ".lm"
  - "#more"
"##,
        ".yaml",
    );

    let cfg = ScrollConfig::from_file(file.path()).unwrap();
    assert_eq!(cfg.item_selector.as_deref(), Some(".card"));
    assert_eq!(cfg.detection_method, DetectionMethod::ItemCount);
    assert_eq!(cfg.max_scroll_attempts, 12);
    assert_eq!(cfg.scroll_amount.min, 100);
    assert_eq!(cfg.scroll_amount.max, ScrollConfig::default().scroll_amount.max);
    assert_eq!(cfg.wait_after_scroll.min, ScrollConfig::default().wait_after_scroll.min);
    assert_eq!(cfg.wait_after_scroll.max, 900);
    assert_eq!(
        cfg.scroll_container,
        ScrollContainer::Selector(".feed".to_string())
    );
    assert_eq!(cfg.load_more_selectors, vec![".lm", "#more"]);
}

#[test]
fn json_config_is_accepted() {
    let file = write_named(
        r#"{
            "detection_method": "scrollHeight",
            "max_duration_seconds": 30,
            "viewport": { "width": 1280 },
            "headless": false
        }"#,
        ".json",
    );

    let cfg = ScrollConfig::from_file(file.path()).unwrap();
    assert_eq!(cfg.detection_method, DetectionMethod::ScrollHeight);
    assert_eq!(cfg.max_duration_seconds, 30);
    assert_eq!(cfg.viewport.width, 1280);
    assert_eq!(cfg.viewport.height, ScrollConfig::default().viewport.height);
    assert!(!cfg.headless);
}

#[test]
fn unknown_keys_are_ignored() {
    let file = write_named(
        r#"
max_scroll_attempts: 5
some_future_knob: true
nested_mystery:
  a: 1
"#,
        ".yml",
    );

    let cfg = ScrollConfig::from_file(file.path()).unwrap();
    assert_eq!(cfg.max_scroll_attempts, 5);
}

#[test]
fn malformed_file_reports_invalid_config() {
    let file = write_named("{ not json or yaml: [", ".json");
    let err = ScrollConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("invalid configuration"));
}

#[test]
fn missing_file_reports_invalid_config() {
    let err = ScrollConfig::from_file("/nonexistent/deepscroll.yaml").unwrap_err();
    assert!(err.to_string().contains("invalid configuration"));
}

#[test]
fn options_fill_defaults_for_load_with_options() {
    let options = ScrollOptions {
        item_selector: Some(".row".to_string()),
        max_load_more_clicks: Some(2),
        ..Default::default()
    };
    let cfg = options.into_config();
    assert_eq!(cfg.item_selector.as_deref(), Some(".row"));
    assert_eq!(cfg.max_load_more_clicks, 2);
    assert_eq!(
        cfg.max_scroll_attempts,
        ScrollConfig::default().max_scroll_attempts
    );
    assert!(cfg.validate().is_ok());
}
