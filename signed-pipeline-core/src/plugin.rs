//! Plugin references
//!
//! A step's `plugins` may be written as a list (`- docker#v1.2.3`,
//! `- docker#v1.2.3: {image: node}`) or as a map of reference to settings. The
//! agent later exposes the same plugins as a JSON list of fully qualified
//! references. Both forms are reduced here to one canonical JSON string so the
//! signer and the verifier hash identical bytes.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::{Result, SignError};
use crate::value::{kind_name, to_canonical_string};

/// Namespace that single-segment plugin names resolve against
pub const OFFICIAL_PLUGIN_NAMESPACE: &str = "github.com/buildkite-plugins";

/// Host that `org/name` plugin names resolve against
pub const PLUGIN_SOURCE_HOST: &str = "github.com";

/// Suffix appended to shorthand plugin names
pub const PLUGIN_REPOSITORY_SUFFIX: &str = "-buildkite-plugin";

// 'official-plugin' and 'official-plugin#v2'
static OFFICIAL_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9-]+)(#.+)?$").expect("invalid official plugin pattern")
});

// 'some-org/some-plugin' and 'some-org/some-plugin#v2'
static ORG_PLUGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9-]+/[A-Za-z0-9-]+)(#.+)?$").expect("invalid org plugin pattern")
});

/// Resolve a plugin name to its repository-qualified form
///
/// The `#version` suffix is kept verbatim. Names that match neither shorthand
/// are assumed to be qualified already and returned unchanged.
///
/// # Example
/// ```
/// use signed_pipeline_core::plugin::resolve;
///
/// assert_eq!(
///     resolve("docker#v3.0.1"),
///     "github.com/buildkite-plugins/docker-buildkite-plugin#v3.0.1"
/// );
/// assert_eq!(
///     resolve("seek-oss/aws-sm"),
///     "github.com/seek-oss/aws-sm-buildkite-plugin"
/// );
/// ```
pub fn resolve(name: &str) -> String {
    if let Some(caps) = OFFICIAL_PLUGIN.captures(name) {
        let version = caps.get(2).map_or("", |m| m.as_str());
        return format!(
            "{}/{}{}{}",
            OFFICIAL_PLUGIN_NAMESPACE, &caps[1], PLUGIN_REPOSITORY_SUFFIX, version
        );
    }

    if let Some(caps) = ORG_PLUGIN.captures(name) {
        let version = caps.get(2).map_or("", |m| m.as_str());
        return format!(
            "{}/{}{}{}",
            PLUGIN_SOURCE_HOST, &caps[1], PLUGIN_REPOSITORY_SUFFIX, version
        );
    }

    name.to_string()
}

/// A single plugin declaration
#[derive(Debug, Clone, PartialEq)]
pub struct PluginReference {
    /// Name as written in the pipeline, e.g. `docker#v1.2.3`
    pub name: String,
    /// Settings, `Value::Null` when the plugin takes none
    pub params: Value,
}

impl PluginReference {
    /// Read a plugin from one entry of a `plugins` list
    ///
    /// Accepts a bare reference string or a single-key map of reference to
    /// settings.
    pub fn from_entry(entry: &Value) -> Result<Self> {
        match entry {
            Value::String(name) => Ok(Self {
                name: name.clone(),
                params: Value::Null,
            }),
            Value::Object(map) => {
                let (name, params) = single_pair(map)?;
                Ok(Self {
                    name: name.clone(),
                    params: params.clone(),
                })
            }
            other => Err(SignError::MalformedPluginReference(format!(
                "unknown plugin reference type {}",
                kind_name(other)
            ))),
        }
    }

    /// Repository-qualified reference, see [`resolve`]
    pub fn qualified_name(&self) -> String {
        resolve(&self.name)
    }
}

/// Canonicalise a step's `plugins` field
///
/// Both list and map syntax are accepted. Every reference is resolved, entries
/// are sorted by qualified reference and written as canonical JSON of the form
/// `[{"<qualified>":<params>},...]`. An empty plugin set yields an empty
/// string, meaning there is nothing to sign.
pub fn canonicalize(plugins: &Value) -> Result<String> {
    let references = match plugins {
        Value::Array(items) => items
            .iter()
            .map(PluginReference::from_entry)
            .collect::<Result<Vec<_>>>()?,
        Value::Object(map) => map
            .iter()
            .map(|(name, params)| PluginReference {
                name: name.clone(),
                params: params.clone(),
            })
            .collect(),
        other => {
            return Err(SignError::MalformedPluginReference(format!(
                "unknown plugin type {}",
                kind_name(other)
            )));
        }
    };

    let entries = references
        .into_iter()
        .map(|plugin| (plugin.qualified_name(), plugin.params))
        .collect();

    Ok(encode_sorted(entries))
}

/// Canonicalise plugin JSON as the agent exposes it to a running job
///
/// The input is already a list of qualified single-key entries; it is only
/// re-sorted and re-encoded so it matches what [`canonicalize`] produced at
/// signing time.
pub fn canonicalize_json(plugin_json: &str) -> Result<String> {
    if plugin_json.trim().is_empty() {
        return Ok(String::new());
    }

    let items = match serde_json::from_str::<Value>(plugin_json)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => {
            return Err(SignError::MalformedPluginReference(format!(
                "expected a list of plugins, got {}",
                kind_name(&other)
            )));
        }
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(map) = item else {
            return Err(SignError::MalformedPluginReference(format!(
                "expected a plugin object, got {}",
                kind_name(&item)
            )));
        };
        let (name, params) = single_pair(&map)?;
        entries.push((name.clone(), params.clone()));
    }

    Ok(encode_sorted(entries))
}

fn single_pair(map: &Map<String, Value>) -> Result<(&String, &Value)> {
    let mut pairs = map.iter();
    match (pairs.next(), pairs.next()) {
        (Some(pair), None) => Ok(pair),
        (None, _) => Err(SignError::MalformedPluginReference(
            "empty plugin reference".to_string(),
        )),
        (Some(_), Some(_)) => Err(SignError::MalformedPluginReference(format!(
            "plugin reference must have exactly one name, got {}",
            map.len()
        ))),
    }
}

/// Stable-sort `(qualified, params)` pairs by reference and encode them
fn encode_sorted(mut entries: Vec<(String, Value)>) -> String {
    if entries.is_empty() {
        return String::new();
    }

    entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

    let list = entries
        .into_iter()
        .map(|(name, params)| {
            let mut entry = Map::new();
            entry.insert(name, params);
            Value::Object(entry)
        })
        .collect();

    to_canonical_string(&Value::Array(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_official_plugin() {
        assert_eq!(
            resolve("docker"),
            "github.com/buildkite-plugins/docker-buildkite-plugin"
        );
        assert_eq!(
            resolve("docker-compose#v2.5.1"),
            "github.com/buildkite-plugins/docker-compose-buildkite-plugin#v2.5.1"
        );
    }

    #[test]
    fn test_resolve_org_plugin() {
        assert_eq!(
            resolve("seek-oss/custom-plugin#v1"),
            "github.com/seek-oss/custom-plugin-buildkite-plugin#v1"
        );
    }

    #[test]
    fn test_resolve_passes_through_qualified_names() {
        let qualified = "github.com/buildkite-plugins/docker-buildkite-plugin#v1.4.0";
        assert_eq!(resolve(qualified), qualified);
        assert_eq!(
            resolve("ssh://git@example.com/org/plugin.git#main"),
            "ssh://git@example.com/org/plugin.git#main"
        );
        assert_eq!(resolve("a/b/c"), "a/b/c");
        assert_eq!(resolve(""), "");
    }

    #[test]
    fn test_plugin_from_string_entry() {
        let plugin = PluginReference::from_entry(&json!("docker#v1")).unwrap();
        assert_eq!(plugin.name, "docker#v1");
        assert_eq!(plugin.params, Value::Null);
    }

    #[test]
    fn test_plugin_from_map_entry() {
        let plugin = PluginReference::from_entry(&json!({"docker#v1": {"image": "x"}})).unwrap();
        assert_eq!(plugin.name, "docker#v1");
        assert_eq!(plugin.params, json!({"image": "x"}));
    }

    #[test]
    fn test_plugin_from_invalid_entries() {
        for entry in [json!(3), json!(null), json!([]), json!({}), json!({"a": 1, "b": 2})] {
            let result = PluginReference::from_entry(&entry);
            assert!(
                matches!(result, Err(SignError::MalformedPluginReference(_))),
                "{entry} should be rejected"
            );
        }
    }

    #[test]
    fn test_canonicalize_array_syntax() {
        let plugins = json!([{"docker#v1.4.0": {"image": "node:7"}}]);
        assert_eq!(
            canonicalize(&plugins).unwrap(),
            r#"[{"github.com/buildkite-plugins/docker-buildkite-plugin#v1.4.0":{"image":"node:7"}}]"#
        );
    }

    #[test]
    fn test_canonicalize_bare_reference_has_null_params() {
        let plugins = json!(["docker#v1"]);
        assert_eq!(
            canonicalize(&plugins).unwrap(),
            r#"[{"github.com/buildkite-plugins/docker-buildkite-plugin#v1":null}]"#
        );
    }

    #[test]
    fn test_canonicalize_sorts_by_qualified_name() {
        let plugins = json!([
            {"seek-oss/custom-plugin": {"a-setting": true}},
            {"my-plugin": {"my-setting": true}}
        ]);

        let canonical = canonicalize(&plugins).unwrap();
        let buildkite = canonical
            .find("github.com/buildkite-plugins/my-plugin-buildkite-plugin")
            .unwrap();
        let seek = canonical
            .find("github.com/seek-oss/custom-plugin-buildkite-plugin")
            .unwrap();
        assert!(buildkite < seek);
    }

    #[test]
    fn test_canonicalize_array_and_map_syntax_agree() {
        let as_array = json!([
            {"seek-oss/custom-plugin#v2": {"z": 1, "a": {"nested": [1, 2]}}},
            "docker-login#v2.0.1",
            {"docker#v3.0.1": {"image": "node", "always-pull": true}}
        ]);
        let as_map = json!({
            "docker#v3.0.1": {"always-pull": true, "image": "node"},
            "docker-login#v2.0.1": null,
            "seek-oss/custom-plugin#v2": {"a": {"nested": [1, 2]}, "z": 1}
        });

        assert_eq!(
            canonicalize(&as_array).unwrap(),
            canonicalize(&as_map).unwrap()
        );
    }

    #[test]
    fn test_canonicalize_empty_sets() {
        assert_eq!(canonicalize(&json!([])).unwrap(), "");
        assert_eq!(canonicalize(&json!({})).unwrap(), "");
    }

    #[test]
    fn test_canonicalize_rejects_unknown_types() {
        assert!(matches!(
            canonicalize(&json!("docker")),
            Err(SignError::MalformedPluginReference(_))
        ));
        assert!(matches!(
            canonicalize(&json!([42])),
            Err(SignError::MalformedPluginReference(_))
        ));
    }

    #[test]
    fn test_canonicalize_json_matches_signing_side() {
        let declared = json!([
            {"seek-oss/custom-plugin#v1": {"a-setting": true}},
            {"docker#v1.4.0": {"image": "node:7", "workdir": "/app"}}
        ]);
        let transport = r#"[
            {"github.com/seek-oss/custom-plugin-buildkite-plugin#v1":{"a-setting":true}},
            {"github.com/buildkite-plugins/docker-buildkite-plugin#v1.4.0":{"workdir":"/app","image":"node:7"}}
        ]"#;

        assert_eq!(
            canonicalize(&declared).unwrap(),
            canonicalize_json(transport).unwrap()
        );
    }

    #[test]
    fn test_canonicalize_json_stable_for_equal_names() {
        let transport = r#"[{"b":2},{"a":1},{"b":1}]"#;
        assert_eq!(
            canonicalize_json(transport).unwrap(),
            r#"[{"a":1},{"b":2},{"b":1}]"#
        );
    }

    #[test]
    fn test_canonicalize_json_empty_inputs() {
        assert_eq!(canonicalize_json("").unwrap(), "");
        assert_eq!(canonicalize_json("  ").unwrap(), "");
        assert_eq!(canonicalize_json("[]").unwrap(), "");
        assert_eq!(canonicalize_json("null").unwrap(), "");
    }

    #[test]
    fn test_canonicalize_json_rejects_bad_input() {
        assert!(matches!(
            canonicalize_json("[{"),
            Err(SignError::InvalidPluginJson(_))
        ));
        assert!(matches!(
            canonicalize_json(r#"{"docker":null}"#),
            Err(SignError::MalformedPluginReference(_))
        ));
        assert!(matches!(
            canonicalize_json(r#"["docker"]"#),
            Err(SignError::MalformedPluginReference(_))
        ));
    }
}
