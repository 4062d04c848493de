use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use catalog_feed::app::ports::{CatalogPorts, UploadSink};
use catalog_feed::app::FeedGenerator;
use catalog_feed::config::AppConfig;
use catalog_feed::domain::specification::{FeedSpecification, SpecificationBuilder};
use catalog_feed::infra::{DirectorySink, HttpPutSink, InMemoryCatalog};
use catalog_feed::logging;

#[derive(Parser)]
#[command(name = "catalog-feed")]
#[command(about = "Product catalog feed generator")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a feed and upload it
    Generate {
        /// Catalog export (JSON)
        #[arg(long)]
        catalog: PathBuf,
        /// Feed request payload (JSON)
        #[arg(long)]
        payload: PathBuf,
        /// Copy the feed into this directory instead of uploading to the pre-signed URL
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Check a feed request payload without generating anything
    Validate {
        #[arg(long)]
        payload: PathBuf,
    },
}

fn read_specification(config: &AppConfig, payload: &Path) -> Result<FeedSpecification> {
    let content = fs::read_to_string(payload)
        .with_context(|| format!("Failed to read payload {}", payload.display()))?;
    let payload: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", payload.display()))?;
    let spec = SpecificationBuilder::new(config.children.attribute_map.clone())
        .build(&payload)
        .context("Invalid feed payload")?;
    Ok(spec)
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    logging::init_logging(&config.app.log_dir);

    match cli.command {
        Commands::Generate {
            catalog,
            payload,
            output_dir,
        } => {
            let spec = read_specification(&config, &payload)?;
            let catalog = InMemoryCatalog::from_path(&catalog).context("Failed to load catalog")?;
            info!(products = catalog.product_count(), format = %spec.format, "Starting feed generation");

            let sink: Arc<dyn UploadSink> = match output_dir {
                Some(dir) => Arc::new(DirectorySink::new(dir)),
                None => Arc::new(HttpPutSink::new().context("Failed to build HTTP client")?),
            };
            let ports = CatalogPorts::from_single(Arc::new(catalog));
            let mut generator = FeedGenerator::from_config(&config, ports, sink);

            println!("🚀 Generating {} feed...", spec.format);
            match generator.generate(&spec) {
                Ok(report) => {
                    println!("✅ Feed generated");
                    println!("   Pages: {}", report.pages);
                    println!("   Rows: {}", report.rows);
                    if let Some(name) = &report.uploaded_name {
                        println!("   Uploaded: {}", name);
                    }
                    println!("   Duration: {:.2}s", report.duration.as_secs_f64());
                }
                Err(e) => {
                    error!(error = %e, "Feed generation failed");
                    println!("❌ Feed generation failed: {}", e);
                    return Err(e).context("Feed generation failed");
                }
            }
        }
        Commands::Validate { payload } => {
            let spec = read_specification(&config, &payload)?;
            println!("✅ Payload is valid");
            println!("   Format: {}", spec.format);
            println!("   Store: {}", spec.store_code);
            println!("   Ignored fields: {}", spec.ignore_fields.len());
            if spec.pre_signed_url.is_none() {
                println!("⚠️  No preSignedUrl; only --output-dir generation is possible");
            }
        }
    }

    Ok(())
}
