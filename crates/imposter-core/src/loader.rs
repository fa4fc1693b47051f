//! The config loader (C1, §4.1): walks a directory for `*-config.{yaml,
//! yml,json}` files, applies env-var substitution, splits multi-document
//! YAML, and normalizes each document into a loaded `ServerConfig`.
//!
//! Directory walking via `globwalk` is grounded on
//! `mockforge-http::replay_listing::list_all`'s `GlobWalkerBuilder` usage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globwalk::GlobWalkerBuilder;
use serde::Deserialize as _;

use crate::env_subst;
use crate::error::{Error, Result};
use crate::legacy;
use crate::model::{PluginKind, ServerConfig};
use crate::plugin::{Augmenter, NoopAugmenter};
use crate::resource_id;
use crate::security;

const DEFAULT_IGNORES: &[&str] = &[".git", ".idea", ".svn", "node_modules"];

/// Process-wide options read once from the environment (§6), overridable by
/// CLI flags in `imposter-cli`.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub port: u16,
    pub config_scan_recursive: bool,
    pub auto_base_path: bool,
    pub support_legacy_config: bool,
    pub openapi_validation_default_behaviour: String,
}

impl RuntimeOptions {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("IMPOSTER_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080),
            config_scan_recursive: env_flag("IMPOSTER_CONFIG_SCAN_RECURSIVE"),
            auto_base_path: env_flag("IMPOSTER_AUTO_BASE_PATH"),
            support_legacy_config: env_flag("IMPOSTER_SUPPORT_LEGACY_CONFIG"),
            openapi_validation_default_behaviour: std::env::var("IMPOSTER_OPENAPI_VALIDATION_DEFAULT_BEHAVIOUR")
                .unwrap_or_else(|_| "ignore".to_string()),
        }
    }
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            port: 8080,
            config_scan_recursive: false,
            auto_base_path: false,
            support_legacy_config: false,
            openapi_validation_default_behaviour: "ignore".to_string(),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Load and fully normalize every `ServerConfig` document under `root`.
/// `augmenters` supplies the SOAP/OpenAPI plugin hooks; a kind with no
/// registered augmenter falls back to [`NoopAugmenter`].
pub fn load(
    root: &Path,
    options: &RuntimeOptions,
    augmenters: &HashMap<PluginKind, Arc<dyn Augmenter>>,
) -> Result<Vec<ServerConfig>> {
    let ignores = read_ignore_file(root);
    let mut configs = Vec::new();

    for path in candidate_files(root, options.config_scan_recursive, &ignores) {
        let raw = std::fs::read_to_string(&path)?;
        let substituted = env_subst::expand(&raw);
        let relative_dir = path.parent().and_then(|p| p.strip_prefix(root).ok()).unwrap_or_else(|| Path::new(""));

        for document in serde_yaml::Deserializer::from_str(&substituted) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            let value = if options.support_legacy_config && legacy::detect(&value) { legacy::rewrite(value) } else { value };

            let mut config: ServerConfig = serde_yaml::from_value(value)
                .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;

            config.config_dir = root.join(relative_dir);

            let augmenter = augmenters.get(&config.plugin).cloned().unwrap_or_else(|| Arc::new(NoopAugmenter));
            security::rewrite(&mut config);
            normalize(&mut config, root, relative_dir, options);
            augmenter.augment(&mut config)?;
            assign_resource_ids(&mut config);

            configs.push(config);
        }
    }

    Ok(configs)
}

fn normalize(config: &mut ServerConfig, root: &Path, relative_dir: &Path, options: &RuntimeOptions) {
    if config.base_path.is_none() && options.auto_base_path && relative_dir != Path::new("") {
        config.base_path = Some(format!("/{}", relative_dir.to_string_lossy().replace('\\', "/")));
    }

    let prefix = relative_dir.to_path_buf();
    for resource in &mut config.resources {
        if let Some(response) = &mut resource.base.response {
            if let Some(file) = &response.file {
                if Path::new(file).is_relative() && prefix != Path::new("") {
                    response.file = Some(prefix.join(file).to_string_lossy().into_owned());
                }
            }
            if let Some(dir) = &response.dir {
                if Path::new(dir).is_relative() && prefix != Path::new("") {
                    response.dir = Some(prefix.join(dir).to_string_lossy().into_owned());
                }
            }
        }
        if let (Some(base_path), Some(path)) = (&config.base_path, &resource.matcher.path) {
            if !path.starts_with(base_path.as_str()) {
                resource.matcher.path = Some(format!("{base_path}{path}"));
            }
        }
    }
    for interceptor in &mut config.interceptors {
        if let (Some(base_path), Some(path)) = (&config.base_path, &interceptor.matcher.path) {
            if !path.starts_with(base_path.as_str()) {
                interceptor.matcher.path = Some(format!("{base_path}{path}"));
            }
        }
    }

    if let Some(wsdl) = &config.wsdl_file {
        if Path::new(wsdl).is_relative() && prefix != Path::new("") {
            config.wsdl_file = Some(prefix.join(wsdl).to_string_lossy().into_owned());
        }
    }
    if let Some(spec) = &config.spec_file {
        if Path::new(spec).is_relative() && prefix != Path::new("") {
            config.spec_file = Some(prefix.join(spec).to_string_lossy().into_owned());
        }
    }
    for store in config.system.stores.values_mut() {
        if let Some(preload) = &store.preload_file {
            if Path::new(preload).is_relative() && prefix != Path::new("") {
                store.preload_file = Some(prefix.join(preload).to_string_lossy().into_owned());
            }
        }
    }
    let _ = root;
}

/// Compute and store each resource/interceptor's resource-id (§4.5), once
/// augmentation has had a chance to append its own resources.
fn assign_resource_ids(config: &mut ServerConfig) {
    for resource in &mut config.resources {
        if resource.base.resource_id.is_none() {
            resource.base.resource_id = Some(resource_id::compute(&resource.matcher, config.plugin));
        }
    }
    for interceptor in &mut config.interceptors {
        if interceptor.base.resource_id.is_none() {
            interceptor.base.resource_id = Some(resource_id::compute(&interceptor.matcher, config.plugin));
        }
    }
}

fn candidate_files(root: &Path, recursive: bool, ignores: &[String]) -> Vec<PathBuf> {
    let pattern = if recursive { "**/*-config.{json,yaml,yml}" } else { "*-config.{json,yaml,yml}" };
    let Ok(walker) = GlobWalkerBuilder::from_patterns(root, &[pattern]).build() else { return Vec::new() };

    walker
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| !is_ignored(path, root, ignores))
        .collect()
}

fn is_ignored(path: &Path, root: &Path, ignores: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/");
    ignores.iter().any(|fragment| relative.contains(fragment.as_str()))
}

fn read_ignore_file(root: &Path) -> Vec<String> {
    let path = root.join(".imposterignore");
    let Ok(contents) = std::fs::read_to_string(path) else {
        return DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect();
    };
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn loads_single_document_config() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "hello-config.yaml",
            "plugin: rest\nresources:\n  - path: /hi\n    response:\n      content: hi\n",
        );
        let options = RuntimeOptions::default();
        let configs = load(tmp.path(), &options, &HashMap::new()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].resources.len(), 1);
    }

    #[test]
    fn splits_multi_document_yaml() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "multi-config.yaml",
            "plugin: rest\nresources: []\n---\nplugin: rest\nresources: []\n",
        );
        let options = RuntimeOptions::default();
        let configs = load(tmp.path(), &options, &HashMap::new()).unwrap();
        assert_eq!(configs.len(), 2);
    }

    #[test]
    fn non_matching_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "notes.yaml", "plugin: rest\nresources: []\n");
        let options = RuntimeOptions::default();
        let configs = load(tmp.path(), &options, &HashMap::new()).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn env_var_is_substituted_before_parsing() {
        std::env::set_var("IMPOSTER_TEST_CONTENT", "hello-env");
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "env-config.yaml",
            "plugin: rest\nresources:\n  - path: /hi\n    response:\n      content: ${env.IMPOSTER_TEST_CONTENT}\n",
        );
        let options = RuntimeOptions::default();
        let configs = load(tmp.path(), &options, &HashMap::new()).unwrap();
        assert_eq!(configs[0].resources[0].base.response.as_ref().unwrap().content.as_deref(), Some("hello-env"));
        std::env::remove_var("IMPOSTER_TEST_CONTENT");
    }

    #[test]
    fn legacy_shape_is_rewritten_when_enabled() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "legacy-config.yaml",
            "plugin: rest\npath: /a\nmethod: GET\nresponse:\n  staticData: hi\n",
        );
        let options = RuntimeOptions { support_legacy_config: true, ..RuntimeOptions::default() };
        let configs = load(tmp.path(), &options, &HashMap::new()).unwrap();
        assert_eq!(configs[0].resources[0].matcher.path.as_deref(), Some("/a"));
        assert_eq!(configs[0].resources[0].base.response.as_ref().unwrap().content.as_deref(), Some("hi"));
    }

    #[test]
    fn resource_ids_are_assigned() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "ids-config.yaml",
            "plugin: rest\nresources:\n  - method: GET\n    path: /a\n    response:\n      content: ok\n",
        );
        let options = RuntimeOptions::default();
        let configs = load(tmp.path(), &options, &HashMap::new()).unwrap();
        assert_eq!(configs[0].resources[0].base.resource_id.as_deref(), Some("GET:/a"));
    }

    #[test]
    fn ignored_directory_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        write(&tmp.path().join("node_modules"), "skip-config.yaml", "plugin: rest\nresources: []\n");
        let options = RuntimeOptions { config_scan_recursive: true, ..RuntimeOptions::default() };
        let configs = load(tmp.path(), &options, &HashMap::new()).unwrap();
        assert!(configs.is_empty());
    }
}
