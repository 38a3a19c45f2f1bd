//! Generator configuration.
//!
//! Loaded from an optional YAML file. Every section has defaults, so an empty
//! file (or none at all) is a valid configuration. The `routes` table stands in
//! for route introspection: it tells the document builder which template
//! renders the response of which endpoint.
//!
//! ```yaml
//! info:
//!   title: Blog API
//!   version: 2.0.0
//! views_root: app/views
//! routes:
//!   - path: /users/:id
//!     method: get
//!     template: users/show
//! ```

use crate::error::{Error, Result};
use crate::resolver::{PartialResolver, TEMPLATE_EXTENSION, VIEWS_DIR_NAME};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Document `info` section
    #[serde(default)]
    pub info: InfoConfig,

    /// Directory namespaced partials resolve against. Searched upward from
    /// each template when absent.
    #[serde(default)]
    pub views_root: Option<PathBuf>,

    /// Directory name searched for when `views_root` is absent
    #[serde(default = "default_views_dir_name")]
    pub views_dir_name: String,

    #[serde(default = "default_template_extension")]
    pub template_extension: String,

    /// Endpoint to template mapping
    #[serde(default)]
    pub routes: Vec<RouteMapping>,
}

fn default_views_dir_name() -> String {
    VIEWS_DIR_NAME.to_string()
}

fn default_template_extension() -> String {
    TEMPLATE_EXTENSION.to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            info: InfoConfig::default(),
            views_root: None,
            views_dir_name: default_views_dir_name(),
            template_extension: default_template_extension(),
            routes: Vec::new(),
        }
    }
}

/// `info` section of the generated document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_description")]
    pub description: Option<String>,
}

fn default_title() -> String {
    "Generated API".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_description() -> Option<String> {
    Some("API documentation generated from Jbuilder templates".to_string())
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            version: default_version(),
            description: default_description(),
        }
    }
}

/// HTTP methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// One endpoint whose response body is rendered by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapping {
    /// Route path, Rails style (`/users/:id`)
    pub path: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    /// Template path relative to the views directory, with or without the
    /// template extension
    pub template: String,
    /// Response status; falls back to the template's operation annotation,
    /// then `200`
    #[serde(default)]
    pub status: Option<String>,
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

impl RouteMapping {
    /// The template path without `extension`, as used to key compiled schemas.
    pub fn template_key(&self, extension: &str) -> String {
        let template = self.template.trim_start_matches('/');
        template.strip_suffix(extension).unwrap_or(template).to_string()
    }
}

/// Supplier of endpoint to template mappings.
pub trait RouteSource {
    fn routes(&self) -> &[RouteMapping];
}

impl RouteSource for GeneratorConfig {
    fn routes(&self) -> &[RouteMapping] {
        &self.routes
    }
}

impl GeneratorConfig {
    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this configuration.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration: {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            file: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        debug!("Configuration has {} route mappings", config.routes.len());
        Ok(config)
    }

    /// Partial resolver configured with the views settings.
    pub fn partial_resolver(&self) -> PartialResolver {
        let resolver = PartialResolver::new()
            .with_views_dir_name(self.views_dir_name.clone())
            .with_extension(self.template_extension.clone());

        match &self.views_root {
            Some(root) => resolver.with_views_root(root.clone()),
            None => resolver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GeneratorConfig::from_yaml_str("").unwrap();

        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.views_dir_name, "views");
        assert_eq!(config.template_extension, ".json.jbuilder");
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
info:
  title: Blog API
  version: 2.0.0
views_root: app/views
routes:
  - path: /users/:id
    method: get
    template: users/show
  - path: /users
    method: post
    template: users/show.json.jbuilder
    status: "201"
"#;

        let config = GeneratorConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.info.title, "Blog API");
        assert_eq!(config.info.version, "2.0.0");
        assert!(config.info.description.is_some());
        assert_eq!(config.views_root, Some(PathBuf::from("app/views")));
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].method, HttpMethod::Post);
        assert_eq!(config.routes[1].status.as_deref(), Some("201"));
        assert_eq!(config.routes[0].template_key(".json.jbuilder"), "users/show");
        assert_eq!(config.routes[1].template_key(".json.jbuilder"), "users/show");
    }

    #[test]
    fn test_method_defaults_to_get() {
        let config = GeneratorConfig::from_yaml_str("routes:\n  - path: /posts\n    template: posts/index\n").unwrap();

        assert_eq!(config.routes()[0].method, HttpMethod::Get);
        assert_eq!(config.routes()[0].status, None);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let result = GeneratorConfig::from_yaml_str("routes: [ { path: ");

        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("openapi.yml");
        fs::write(&path, "views_dir_name: templates\n").unwrap();

        let config = GeneratorConfig::load(&path).unwrap();
        assert_eq!(config.views_dir_name, "templates");

        let missing = GeneratorConfig::load(&temp_dir.path().join("nope.yml"));
        assert!(matches!(missing, Err(Error::Read { .. })));
    }

    #[test]
    fn test_partial_resolver_uses_views_settings() {
        let config = GeneratorConfig {
            views_root: Some(PathBuf::from("/site/templates")),
            ..GeneratorConfig::default()
        };

        let resolved = config
            .partial_resolver()
            .resolve("shared/meta", Path::new("/site/templates/posts/show.json.jbuilder"));

        assert_eq!(resolved, PathBuf::from("/site/templates/shared/_meta.json.jbuilder"));
    }
}
