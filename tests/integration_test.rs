use jbuilder_openapi::{
    cli::generate,
    compiler::SchemaCompiler,
    config::GeneratorConfig,
    error::Error,
    openapi_builder::OpenApiBuilder,
    resolver::PartialResolver,
    serializer::{serialize_json, serialize_yaml},
    walker::TemplateWalker,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FIXTURES: &[(&str, &str)] = &[
    (
        "app/views/users/show.json.jbuilder",
        include_str!("fixtures/views/users/show.json.jbuilder"),
    ),
    (
        "app/views/users/_profile.json.jbuilder",
        include_str!("fixtures/views/users/_profile.json.jbuilder"),
    ),
    (
        "app/views/users/index.json.jbuilder",
        include_str!("fixtures/views/users/index.json.jbuilder"),
    ),
    (
        "app/views/users/_user.json.jbuilder",
        include_str!("fixtures/views/users/_user.json.jbuilder"),
    ),
    (
        "app/views/posts/show.json.jbuilder",
        include_str!("fixtures/views/posts/show.json.jbuilder"),
    ),
    (
        "app/views/posts/_post.json.jbuilder",
        include_str!("fixtures/views/posts/_post.json.jbuilder"),
    ),
    (
        "app/views/broken/show.json.jbuilder",
        include_str!("fixtures/views/broken/show.json.jbuilder"),
    ),
    (
        "app/views/broken/_loop_a.json.jbuilder",
        include_str!("fixtures/views/broken/_loop_a.json.jbuilder"),
    ),
    (
        "app/views/broken/_loop_b.json.jbuilder",
        include_str!("fixtures/views/broken/_loop_b.json.jbuilder"),
    ),
    ("openapi.yml", include_str!("fixtures/openapi.yml")),
];

/// Helper function to create a temporary Rails-style project
fn create_test_project(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

fn views(project: &TempDir) -> PathBuf {
    project.path().join("app/views")
}

fn compile(template: &Path) -> Value {
    let mut walker = TemplateWalker::new(PartialResolver::new());
    let result = walker.walk_file(template).expect("Failed to walk template");
    SchemaCompiler::compile_value(&result.root).expect("Failed to compile schema")
}

#[test]
fn test_show_template_end_to_end() {
    let project = create_test_project(FIXTURES);
    let schema = compile(&views(&project).join("users/show.json.jbuilder"));

    assert_eq!(
        schema,
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer", "description": "User ID"},
                "email": {"type": "string", "format": "email"},
                "slug": {"type": "TODO: MISSING COMMENT"},
                "status": {
                    "type": "string",
                    "enum": ["active", "inactive", "suspended"],
                    "example": "active"
                },
                "profile": {
                    "type": "object",
                    "properties": {
                        "bio": {"type": "string"},
                        "avatar_url": {"type": "string", "nullable": true}
                    },
                    "required": ["avatar_url"]
                },
                "last_login_at": {"type": "string", "format": "date-time"},
                "tags": {
                    "type": "array",
                    "description": "Tag labels",
                    "items": {
                        "type": "object",
                        "properties": {"label": {"type": "string"}},
                        "required": ["label"]
                    }
                },
                "posts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer"},
                            "title": {"type": "string"}
                        },
                        "required": ["id", "title"]
                    }
                }
            },
            "required": ["id", "email", "slug", "status", "profile", "tags", "posts"]
        })
    );
}

#[test]
fn test_property_listing_walks_partials() {
    let project = create_test_project(FIXTURES);
    let mut walker = TemplateWalker::new(PartialResolver::new());
    let result = walker
        .walk_file(&views(&project).join("users/show.json.jbuilder"))
        .unwrap();

    let paths: Vec<String> = result.properties().into_iter().map(|p| p.path).collect();
    assert_eq!(
        paths,
        vec![
            "id",
            "email",
            "slug",
            "status",
            "profile",
            "profile.bio",
            "profile.avatar_url",
            "last_login_at",
            "tags",
            "tags[].label",
            "posts",
            "posts[].id",
            "posts[].title",
        ]
    );

    let partials: Vec<&str> = result.partials.iter().map(|p| p.partial.as_str()).collect();
    assert_eq!(partials, vec!["users/profile", "posts/post"]);
    assert!(result.warnings.is_empty());

    let operation = result.operation.expect("operation annotation");
    assert_eq!(operation.summary.as_deref(), Some("Show a user"));
    assert_eq!(operation.operation_id.as_deref(), Some("showUser"));
    assert_eq!(operation.tags, vec!["Users"]);
}

#[test]
fn test_root_array_from_collection_partial() {
    let project = create_test_project(FIXTURES);
    let schema = compile(&views(&project).join("users/index.json.jbuilder"));

    assert_eq!(
        schema,
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "name": {"type": "string"}
                },
                "required": ["id", "name"]
            }
        })
    );
}

#[test]
fn test_missing_partial_is_a_warning() {
    let project = create_test_project(FIXTURES);
    let mut walker = TemplateWalker::new(PartialResolver::new());
    let result = walker
        .walk_file(&views(&project).join("posts/show.json.jbuilder"))
        .unwrap();

    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("shared/author"));

    let schema = SchemaCompiler::compile_value(&result.root).unwrap();
    assert_eq!(schema["properties"]["id"], json!({"type": "integer"}));
    assert_eq!(schema["properties"]["title"], json!({"type": "TODO: MISSING COMMENT"}));
    assert_eq!(schema["properties"]["author"], json!({"type": "object"}));
    assert_eq!(
        schema["properties"]["comments"]["items"]["properties"],
        json!({
            "id": {"type": "TODO: MISSING COMMENT"},
            "body": {"type": "TODO: MISSING COMMENT"}
        })
    );
}

#[test]
fn test_cyclic_partials_fail_the_template() {
    let project = create_test_project(FIXTURES);
    let mut walker = TemplateWalker::new(PartialResolver::new());

    let err = walker
        .walk_file(&views(&project).join("broken/show.json.jbuilder"))
        .unwrap_err();

    match err {
        Error::CyclicPartial(cycle) => {
            let names: Vec<String> = cycle
                .chain
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            assert_eq!(
                names,
                vec![
                    "show.json.jbuilder",
                    "_loop_a.json.jbuilder",
                    "_loop_b.json.jbuilder",
                    "_loop_a.json.jbuilder",
                ]
            );
        }
        other => panic!("expected a cyclic partial error, got {other}"),
    }
}

#[test]
fn test_generate_continues_after_failures() {
    let project = create_test_project(FIXTURES);
    let config = GeneratorConfig::load(&project.path().join("openapi.yml")).unwrap();

    let generation = generate(&views(&project), &config).unwrap();

    assert_eq!(generation.templates_found, 4);
    assert_eq!(generation.partials_found, 5);
    assert_eq!(generation.failures.len(), 1);
    assert!(generation.failures[0].0.ends_with("broken/show.json.jbuilder"));
    assert!(generation.failures[0].1.contains("Cyclic partial inclusion"));
    assert_eq!(generation.routes_added, 3);
    assert_eq!(generation.warnings, 1);
    assert_eq!(generation.missing_annotations(), 8);

    let keys: Vec<&String> = generation.properties.keys().collect();
    assert_eq!(keys, vec!["posts/show", "users/index", "users/show"]);

    let doc = serde_json::to_value(&generation.document).unwrap();
    assert_eq!(doc["info"]["title"], "Blog API");
    assert_eq!(doc["info"]["version"], "2.0.0");

    let show = &doc["paths"]["/users/{id}"]["get"];
    assert_eq!(show["summary"], "Show a user");
    assert_eq!(show["operationId"], "showUser");
    assert_eq!(show["parameters"][0]["name"], "id");
    assert_eq!(show["parameters"][0]["in"], "path");
    assert_eq!(
        show["responses"]["200"]["content"]["application/json"]["schema"],
        json!({"$ref": "#/components/schemas/UsersShow"})
    );

    assert_eq!(doc["paths"]["/users"]["get"]["summary"], "List users");
    assert_eq!(
        doc["paths"]["/posts/{id}"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/PostsShow"
    );
    assert!(doc["paths"].get("/broken").is_none());

    let schemas = doc["components"]["schemas"].as_object().unwrap();
    assert!(schemas.contains_key("UsersIndex"));
    assert!(!schemas.contains_key("BrokenShow"));
    assert_eq!(schemas["UsersIndex"]["type"], "array");
}

#[test]
fn test_serialized_document_output() {
    let project = create_test_project(FIXTURES);
    let config = GeneratorConfig::load(&project.path().join("openapi.yml")).unwrap();
    let generation = generate(&views(&project), &config).unwrap();

    let yaml = serialize_yaml(&generation.document).unwrap();
    assert!(yaml.contains("title: Blog API"));
    assert!(yaml.contains("/users/{id}:"));
    assert!(yaml.contains("UsersShow:"));
    assert!(yaml.contains("TODO: MISSING COMMENT"));

    // Properties come out in template order, not sorted
    let id = yaml.find("email:").unwrap();
    let slug = yaml.find("slug:").unwrap();
    assert!(id < slug);

    let json = serialize_json(&generation.properties).unwrap();
    let parsed: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["users/show"][2]["path"], "slug");
    assert_eq!(parsed["users/show"][2]["annotated"], false);
}

#[test]
fn test_builder_without_routes_has_only_components() {
    let project = create_test_project(FIXTURES);
    let mut walker = TemplateWalker::new(PartialResolver::new());
    let result = walker
        .walk_file(&views(&project).join("users/index.json.jbuilder"))
        .unwrap();

    let mut builder = OpenApiBuilder::new();
    let name = builder.add_template("users/index", &result);
    let doc = builder.build();

    assert_eq!(name, "UsersIndex");
    assert!(doc.paths.is_empty());
    assert!(doc.components.unwrap().schemas.contains_key("UsersIndex"));
}
