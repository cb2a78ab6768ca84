// src/config/sources.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

/// One monitored feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Stable config key, e.g. "leakbase".
    pub key: String,
    /// Human label used in messages and reports.
    pub name: String,
    pub feed_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Load the source list from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<Source>> {
    let parsed = if hint_ext == "json" {
        parse_json(s)
    } else {
        parse_toml(s).or_else(|toml_err| {
            parse_json(s).map_err(|_| toml_err)
        })
    };
    let list = parsed.map_err(|e| anyhow!("unsupported sources format: {e:#}"))?;
    clean_list(list)
}

fn parse_toml(s: &str) -> Result<Vec<Source>> {
    #[derive(Deserialize)]
    struct TomlSources {
        #[serde(default, rename = "source")]
        sources: Vec<Source>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<Source>> {
    Ok(serde_json::from_str(s)?)
}

/// Trim fields, drop blank URLs, reject duplicate keys.
fn clean_list(items: Vec<Source>) -> Result<Vec<Source>> {
    use std::collections::HashSet;
    let mut keys = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.key = it.key.trim().to_string();
        it.name = it.name.trim().to_string();
        it.feed_url = it.feed_url.trim().to_string();
        if it.feed_url.is_empty() {
            tracing::warn!(key = %it.key, "source without feed_url ignored");
            continue;
        }
        if it.name.is_empty() {
            it.name = it.key.clone();
        }
        if !keys.insert(it.key.clone()) {
            return Err(anyhow!("duplicate source key {:?}", it.key));
        }
        out.push(it);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_formats_work() {
        let toml = r#"
[[source]]
key = "leakbase"
name = " LeakBase "
feed_url = "https://leakbase.test/forums/-/index.rss"

[[source]]
key = "gerki"
name = ""
feed_url = "https://gerki.test/rss"
enabled = false

[[source]]
key = "empty"
name = "Empty"
feed_url = "  "
"#;
        let out = parse_sources(toml, "toml").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "LeakBase");
        assert!(out[0].enabled);
        assert_eq!(out[1].name, "gerki");
        assert!(!out[1].enabled);

        let json = r#"[{"key":"a","name":"A","feed_url":"https://a.test/rss"}]"#;
        let out = parse_sources(json, "json").unwrap();
        assert_eq!(out[0].key, "a");
        assert!(out[0].enabled);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let json = r#"[
            {"key":"a","name":"A","feed_url":"https://a.test/rss"},
            {"key":"a","name":"B","feed_url":"https://b.test/rss"}
        ]"#;
        assert!(parse_sources(json, "json").is_err());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_sources("this is not a source list", "").is_err());
    }
}
