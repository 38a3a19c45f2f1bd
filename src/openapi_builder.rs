use crate::annotation::OperationAnnotation;
use crate::compiler::{Schema, SchemaCompiler};
use crate::config::{HttpMethod, InfoConfig, RouteMapping, RouteSource};
use crate::walker::WalkResult;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const JSON_MEDIA_TYPE: &str = "application/json";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    /// Paths collection (URL path -> PathItem)
    paths: IndexMap<String, PathItem>,
    /// Compiled template schemas by component name
    schemas: IndexMap<String, Schema>,
    /// Template key -> component name
    templates: HashMap<String, String>,
    /// Operation annotations by component name
    operations: HashMap<String, OperationAnnotation>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

impl PathItem {
    fn operation_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
        }
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Path parameters taken from the route pattern
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Responses by status code
    pub responses: IndexMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location; always `path` here
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Components {
    pub schemas: IndexMap<String, Schema>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    pub info: Info,
    pub paths: IndexMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl From<&InfoConfig> for Info {
    fn from(config: &InfoConfig) -> Self {
        Self {
            title: config.title.clone(),
            version: config.version.clone(),
            description: config.description.clone(),
        }
    }
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info::from(&InfoConfig::default()),
            paths: IndexMap::new(),
            schemas: IndexMap::new(),
            templates: HashMap::new(),
            operations: HashMap::new(),
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Compiles a walked template and registers it as a component schema.
    ///
    /// # Arguments
    ///
    /// * `template_key` - Views-relative template path without extension (`users/show`)
    /// * `result` - The walk of that template
    ///
    /// # Returns
    ///
    /// The component name the schema was registered under.
    pub fn add_template(&mut self, template_key: &str, result: &WalkResult) -> String {
        let name = Self::component_name(template_key);
        debug!("Adding component {} for template {}", name, template_key);

        let schema = SchemaCompiler::compile(&result.root);
        if self.schemas.insert(name.clone(), schema).is_some() {
            warn!("Component {} registered twice; keeping the later template", name);
        }
        self.templates.insert(template_key.to_string(), name.clone());

        match &result.operation {
            Some(operation) => {
                self.operations.insert(name.clone(), operation.clone());
            }
            None => {
                self.operations.remove(&name);
            }
        }

        name
    }

    /// Registers an already compiled schema under `name`.
    pub fn add_schema(&mut self, name: impl Into<String>, schema: Schema) {
        self.schemas.insert(name.into(), schema);
    }

    /// Adds the operation for one route mapping.
    ///
    /// The response references the component compiled from the mapped
    /// template. Returns `false`, leaving the document unchanged, when that
    /// template was never added.
    pub fn add_route(&mut self, route: &RouteMapping, extension: &str) -> bool {
        let template_key = route.template_key(extension);
        let Some(component) = self.templates.get(&template_key).cloned() else {
            warn!(
                "Route {} {} maps to unknown template '{}'",
                route.method.as_str(),
                route.path,
                template_key
            );
            return false;
        };
        debug!("Adding route: {} {} -> {}", route.method.as_str(), route.path, component);

        let annotation = self.operations.get(&component).cloned().unwrap_or_default();

        let status = route
            .status
            .clone()
            .or_else(|| annotation.status.clone())
            .unwrap_or_else(|| "200".to_string());

        let mut content = IndexMap::new();
        content.insert(
            JSON_MEDIA_TYPE.to_string(),
            MediaType {
                schema: Schema::reference(&component),
            },
        );

        let mut responses = IndexMap::new();
        responses.insert(
            status,
            Response {
                description: annotation
                    .response_description
                    .clone()
                    .unwrap_or_else(|| "Successful response".to_string()),
                content: Some(content),
            },
        );

        let operation = Operation {
            summary: annotation
                .summary
                .clone()
                .or_else(|| Some(format!("{} {}", route.method.as_str(), route.path))),
            description: annotation.description.clone(),
            operation_id: annotation.operation_id.clone(),
            tags: annotation.tags.clone(),
            parameters: Self::path_parameters(&route.path),
            responses,
        };

        let path_item = self
            .paths
            .entry(Self::convert_path_format(&route.path))
            .or_default();
        *path_item.operation_mut(route.method) = Some(operation);

        true
    }

    /// Adds every route of `source`, returning how many were added.
    pub fn add_routes(&mut self, source: &dyn RouteSource, extension: &str) -> usize {
        source
            .routes()
            .iter()
            .filter(|route| self.add_route(route, extension))
            .count()
    }

    /// Component name for a template key: `api/v1/users/show` -> `ApiV1UsersShow`.
    pub fn component_name(template_key: &str) -> String {
        template_key
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                let mut chars = segment.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Convert path format from :param to OpenAPI {param} format
    fn convert_path_format(path: &str) -> String {
        path.split('/')
            .map(|part| match part.strip_prefix(':') {
                Some(name) => format!("{{{}}}", name),
                None => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn path_parameters(path: &str) -> Vec<Parameter> {
        path.split('/')
            .filter_map(|part| {
                part.strip_prefix(':')
                    .or_else(|| part.strip_prefix('{').and_then(|p| p.strip_suffix('}')))
            })
            .map(|name| Parameter {
                name: name.to_string(),
                location: "path".to_string(),
                required: true,
                schema: Schema::typed("string"),
            })
            .collect()
    }

    /// Build the final OpenAPI document
    pub fn build(self) -> OpenApiDocument {
        debug!(
            "Building final OpenAPI document: {} paths, {} schemas",
            self.paths.len(),
            self.schemas.len()
        );

        let components = if self.schemas.is_empty() {
            None
        } else {
            Some(Components {
                schemas: self.schemas,
            })
        };

        OpenApiDocument {
            openapi: "3.0.0".to_string(),
            info: self.info,
            paths: self.paths,
            components,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}
