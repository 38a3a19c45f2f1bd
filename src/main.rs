//! Jbuilder OpenAPI Generator - Command-line tool for inferring OpenAPI schemas from templates.
//!
//! Walks every Jbuilder template under a views directory, reconstructs the JSON document each
//! one renders, and emits the result as OpenAPI component schemas. Route mappings from an
//! optional config file attach those schemas to endpoints.
//!
//! # Usage
//!
//! ```bash
//! jbuilder-openapi [OPTIONS] <VIEWS_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! jbuilder-openapi app/views -c openapi.yml -o openapi.yaml
//! ```
//!
//! List every property and whether it is annotated:
//! ```bash
//! jbuilder-openapi app/views --properties -f json
//! ```

use anyhow::Result;
use clap::Parser;
use jbuilder_openapi::cli;
use log::info;

fn main() -> Result<()> {
    // Parse once to read the verbose flag before the logger exists, validate afterwards
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Jbuilder OpenAPI Generator starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
