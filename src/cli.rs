use crate::config::GeneratorConfig;
use crate::openapi_builder::{OpenApiBuilder, OpenApiDocument};
use crate::scanner::TemplateScanner;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::shape::PropertyRecord;
use crate::walker::TemplateWalker;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Jbuilder OpenAPI Generator - Infer OpenAPI response schemas from annotated Jbuilder templates
#[derive(Parser, Debug)]
#[command(name = "jbuilder-openapi")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the views directory holding the templates
    #[arg(value_name = "VIEWS_PATH")]
    pub views_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// YAML configuration file with document info and route mappings
    #[arg(short = 'c', long = "config", value_name = "CONFIG")]
    pub config_path: Option<PathBuf>,

    /// Output the flat property list of every template instead of an OpenAPI document
    #[arg(long = "properties")]
    pub properties: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Everything produced by one batch run over a views directory.
#[derive(Debug)]
pub struct Generation {
    pub document: OpenApiDocument,
    /// Flat property list per template key, in scan order
    pub properties: IndexMap<String, Vec<PropertyRecord>>,
    pub templates_found: usize,
    pub partials_found: usize,
    /// Templates skipped because of a fatal error, with the error message
    pub failures: Vec<(PathBuf, String)>,
    /// Recoverable problems reported while walking
    pub warnings: usize,
    pub routes_added: usize,
}

impl Generation {
    /// Number of properties without an `@openapi` comment.
    pub fn missing_annotations(&self) -> usize {
        self.properties
            .values()
            .flatten()
            .filter(|record| !record.annotated)
            .count()
    }
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.views_path.exists() {
        anyhow::bail!("Views path does not exist: {}", args.views_path.display());
    }

    if !args.views_path.is_dir() {
        anyhow::bail!("Views path is not a directory: {}", args.views_path.display());
    }

    if let Some(ref config) = args.config_path {
        if !config.is_file() {
            anyhow::bail!("Config file does not exist: {}", config.display());
        }
    }

    info!("Views path: {}", args.views_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if let Some(ref config) = args.config_path {
        info!("Config file: {}", config.display());
    }

    Ok(args)
}

/// Scans, walks and compiles every template under `views_path`.
///
/// A template that fails fatally (cyclic partials, malformed syntax, parse
/// errors) is logged and skipped; the rest of the batch continues.
///
/// # Errors
///
/// Returns an error if the views directory cannot be scanned.
pub fn generate(views_path: &Path, config: &GeneratorConfig) -> Result<Generation> {
    // Step 1: Scan directory for templates
    info!("Scanning views directory...");
    let scanner = TemplateScanner::new(views_path.to_path_buf())
        .with_extension(config.template_extension.clone());
    let scan_result = scanner
        .scan()
        .with_context(|| format!("Failed to scan {}", views_path.display()))?;

    info!(
        "Found {} templates and {} partials",
        scan_result.templates.len(),
        scan_result.partials.len()
    );

    // Step 2: Walk and compile each template
    info!("Walking templates...");
    let mut walker = TemplateWalker::new(config.partial_resolver());
    let mut builder = OpenApiBuilder::new().with_info(
        config.info.title.clone(),
        config.info.version.clone(),
        config.info.description.clone(),
    );
    let mut properties = IndexMap::new();
    let mut failures = Vec::new();
    let mut warnings = 0;

    for template in &scan_result.templates {
        let key = scanner.template_key(template);
        match walker.walk_file(template) {
            Ok(result) => {
                debug!("Walked {} ({} partials)", key, result.partials.len());
                warnings += result.warnings.len();
                properties.insert(key.clone(), result.properties());
                builder.add_template(&key, &result);
            }
            Err(err) => {
                warn!("Skipping {}: {}", template.display(), err);
                failures.push((template.clone(), err.to_string()));
            }
        }
    }

    // Step 3: Attach configured routes
    info!("Adding {} route mappings...", config.routes.len());
    let routes_added = builder.add_routes(config, &config.template_extension);

    Ok(Generation {
        document: builder.build(),
        properties,
        templates_found: scan_result.templates.len(),
        partials_found: scan_result.partials.len(),
        failures,
        warnings: warnings + scan_result.warnings.len(),
        routes_added,
    })
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    let config = match &args.config_path {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    let generation = generate(&args.views_path, &config)?;

    if generation.templates_found == 0 {
        anyhow::bail!("No templates found in the views directory");
    }

    // Step 4: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match (args.properties, args.output_format) {
        (true, OutputFormat::Yaml) => serialize_yaml(&generation.properties)?,
        (true, OutputFormat::Json) => serialize_json(&generation.properties)?,
        (false, OutputFormat::Yaml) => serialize_yaml(&generation.document)?,
        (false, OutputFormat::Json) => serialize_json(&generation.document)?,
    };

    // Step 5: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote output to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    // Step 6: Display summary
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Templates found: {}", generation.templates_found);
    info!("  - Partials found: {}", generation.partials_found);
    info!("  - Templates compiled: {}", generation.properties.len());
    info!("  - Templates failed: {}", generation.failures.len());
    info!("  - Properties missing annotations: {}", generation.missing_annotations());
    info!("  - Warnings: {}", generation.warnings);
    info!("  - Routes added: {}", generation.routes_added);

    Ok(())
}
