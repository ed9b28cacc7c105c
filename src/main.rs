pub mod classify;
pub mod config;
pub mod data;
pub mod error;
pub mod join;
pub mod render;
pub mod server;
pub mod surface;
pub mod types;

use crate::classify::ThresholdScale;
use crate::error::Error;
use crate::surface::SvgSurface;
use crate::types::RegionDatum;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the choropleth map SVG
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the generated map with the hover API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let mut surface = SvgSurface::new(app_config.map.width, app_config.map.height);

            match assemble(&app_config).await {
                Ok((regions, scale)) => {
                    render::render(&mut surface, &regions, &scale, &app_config.legend);
                    write_svg(&app_config.output.svg, &surface)?;
                    tracing::info!(path = ?app_config.output.svg, "Generation complete");
                }
                Err(err @ Error::Fetch { .. }) => {
                    // A dataset never arrived; leave a visible unavailable
                    // state rather than a blank surface, then fail loudly.
                    tracing::error!(%err, "dataset fetch failed");
                    render::render_unavailable(&mut surface);
                    write_svg(&app_config.output.svg, &surface)?;
                    return Err(err.into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let mut surface = SvgSurface::new(app_config.map.width, app_config.map.height);

            let regions = match assemble(&app_config).await {
                Ok((regions, scale)) => {
                    render::render(&mut surface, &regions, &scale, &app_config.legend);
                    regions
                }
                Err(err @ Error::Fetch { .. }) => {
                    tracing::error!(%err, "dataset fetch failed; serving unavailable state");
                    render::render_unavailable(&mut surface);
                    Vec::new()
                }
                Err(err) => return Err(err.into()),
            };

            server::start_server(app_config, regions, surface.finish()).await?;
        }
    }

    Ok(())
}

/// The data-join-and-classification pipeline: both datasets loaded
/// concurrently, then features extracted, records indexed, the color scale
/// derived from every observed value, and the join performed. Everything is
/// rebuilt from scratch on each invocation.
async fn assemble(
    config: &config::AppConfig,
) -> Result<(Vec<RegionDatum>, ThresholdScale), Error> {
    let (geometry, records) = data::load_datasets(config).await?;

    let features = data::extract_features(geometry, &config.input.object)?;
    tracing::info!(features = features.len(), "Extracted region features");

    // The scale sees the raw record list, before the index's
    // first-wins dedup.
    let scale = ThresholdScale::from_values(
        records.iter().map(|r| r.bachelors_or_higher),
        config.map.palette.clone(),
    )?;

    let index = data::AttainmentIndex::build(records);
    tracing::info!(records = index.len(), "Indexed attainment records");

    let outcome = join::join_regions(features, &index, &scale);
    if !outcome.unmatched.is_empty() {
        tracing::warn!(
            unmatched = outcome.unmatched.len(),
            "regions drawn with fallback value"
        );
    }

    Ok((outcome.regions, scale))
}

fn write_svg(path: &std::path::Path, surface: &SvgSurface) -> anyhow::Result<()> {
    use anyhow::Context;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }
    }
    std::fs::write(path, surface.finish())
        .with_context(|| format!("Failed to write SVG: {:?}", path))
}
