use clap::{Parser, Subcommand};
use image_variations::bulk::{self, BulkOptions};
use image_variations::config::{self, Config};
use image_variations::imaging::RustBackend;
use image_variations::naming::derive_variation_name;
use image_variations::output;
use image_variations::records::{Catalog, CatalogError, RecordSource};
use image_variations::variations::{FieldSelector, VariationParams, VariationSpec};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "image-variations")]
#[command(about = "Render and maintain derived image variations")]
#[command(long_about = "\
Render and maintain derived image variations

Every image field declares named variations in variations.toml. Each
variation is stored next to its source, named after it:

  image/goods/tea.jpg              source
  image/goods/tea.thumbnail.jpg    variation \"thumbnail\"
  image/goods/tea.large.jpg        variation \"large\"

The record catalog (records.json) lists which file each record holds:

  { \"goods.goodsinfo.gpic\": [ { \"pk\": 1, \"value\": \"image/goods/tea.jpg\" } ] }

Run 'image-variations gen-config' to generate a documented variations.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "variations.toml", global = true)]
    config: PathBuf,

    /// Record catalog (JSON)
    #[arg(long, default_value = "records.json", global = true)]
    catalog: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every variation of every record of one or more fields
    Render {
        /// Fields to render, as app.model.field
        #[arg(required = true, value_name = "FIELD_PATH")]
        field_path: Vec<String>,
        /// Replace variations that already exist
        #[arg(long)]
        replace: bool,
        /// Skip records whose source file is missing instead of aborting
        #[arg(short = 'i', long)]
        ignore_missing: bool,
    },
    /// Print the storage path of a variation of a stored file
    Name {
        /// Stored source path
        path: String,
        /// Variation name
        variation: String,
    },
    /// Validate the configuration and catalog without rendering
    Check,
    /// Print a stock variations.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> CliResult {
    match &cli.command {
        Command::Render {
            field_path,
            replace,
            ignore_missing,
        } => {
            let config = config::load_config(&cli.config)?;
            let options = BulkOptions {
                replace: *replace,
                ignore_missing: *ignore_missing,
                threads: config::effective_threads(&config.processing),
            };
            render(&config, &cli.catalog, field_path, &options)
        }
        Command::Name { path, variation } => {
            VariationSpec::new(variation.as_str(), VariationParams::default())?;
            println!("{}", derive_variation_name(path, variation));
            Ok(())
        }
        Command::Check => check(&cli.config, &cli.catalog),
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(())
        }
    }
}

/// Bulk-render each field in turn. All field paths are resolved before the
/// first render starts.
fn render(config: &Config, catalog_path: &Path, field_paths: &[String], options: &BulkOptions) -> CliResult {
    let registry = config.registry()?;
    let catalog = Catalog::load(catalog_path)?;

    let mut fields = Vec::with_capacity(field_paths.len());
    for field_path in field_paths {
        let selector: FieldSelector = field_path.parse()?;
        let field = registry
            .get(&selector)
            .ok_or_else(|| format!("'{selector}' is not a registered image field"))?;
        fields.push((selector, field));
    }

    let backend = RustBackend::new();
    for (selector, field) in &fields {
        let records = catalog.records(selector)?;

        let (tx, rx) = std::sync::mpsc::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                for line in output::format_progress_event(&event) {
                    println!("{}", line);
                }
            }
        });
        let result = bulk::render_bulk(
            selector,
            field,
            &records,
            &config.storage,
            &backend,
            options,
            Some(tx),
        );
        printer
            .join()
            .map_err(|_| "progress printer thread panicked")?;
        output::print_bulk_summary(&result?);
    }
    Ok(())
}

fn check(config_path: &Path, catalog_path: &Path) -> CliResult {
    println!("==> Checking {}", config_path.display());
    let config = config::load_config(config_path)?;
    let registry = config.registry()?;

    let mut counts = BTreeMap::new();
    if catalog_path.exists() {
        let catalog = Catalog::load(catalog_path)?;
        for (selector, _) in registry.iter() {
            match catalog.records(selector) {
                Ok(records) => {
                    counts.insert(selector.to_string(), records.len());
                }
                Err(CatalogError::UnknownField(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
    } else {
        println!("    no catalog at {}", catalog_path.display());
    }

    output::print_check_output(&config.storage, &registry, &counts);
    println!("==> Configuration is valid");
    Ok(())
}
