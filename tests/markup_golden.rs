//! Golden test for deterministic markup expansion
//!
//! With a frozen clock and fixed data, template expansion must be
//! byte-identical across runs. The hash is compared against a committed
//! golden when one exists; set UPDATE_GOLDENS=1 to (re)write it.

use std::fs;
use std::path::PathBuf;

use chrono::TimeZone;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use inkpanel::renderer::TemplateRenderer;
use inkpanel::store::TemplateStore;
use inkpanel::DisplayConfig;

fn golden_path() -> PathBuf {
    PathBuf::from("tests/goldens/weather_markup.sha256")
}

fn markup_hash() -> String {
    // The shipped template store, rendered at a fixed instant.
    let store = TemplateStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates"));
    let renderer = TemplateRenderer::new(&store, DisplayConfig::default());

    let data = match json!({"temperature": "72", "condition": "Sunny", "location": "Library"}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };
    let now = chrono::Local.with_ymd_and_hms(2024, 1, 15, 9, 5, 0).unwrap();

    let markup = renderer
        .render_at("weather", &data, now)
        .expect("Failed to render weather template");

    assert!(markup.contains("72°"));
    assert!(markup.contains("09:05"));

    hex::encode(Sha256::digest(markup.as_bytes()))
}

#[test]
fn markup_is_idempotent_under_frozen_clock() {
    assert_eq!(markup_hash(), markup_hash());
}

#[test]
fn markup_matches_golden() {
    let hash = markup_hash();
    let gpath = golden_path();

    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all(gpath.parent().unwrap()).ok();
        fs::write(&gpath, &hash).expect("write golden");
        eprintln!("Updated markup golden: {:?}", gpath);
        return;
    }

    if gpath.exists() {
        let expected = fs::read_to_string(&gpath).expect("read golden");
        assert_eq!(hash, expected.trim(), "Markup does not match golden");
    }
}
