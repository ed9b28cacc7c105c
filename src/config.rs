use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub legend: LegendConfig,
    #[serde(default)]
    pub tooltip: TooltipConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// County geometry: a topology document or a GeoJSON FeatureCollection,
    /// given as a local path or an http(s) URL.
    pub counties: String,
    /// Attainment records (JSON list or CSV), local path or http(s) URL.
    pub education: String,
    /// Name of the object collection inside a topology document.
    #[serde(default = "default_object")]
    pub object: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Ordered fill palette; bucket count is palette length minus one, with
    /// the leading color reserved for values below the observed domain.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LegendConfig {
    #[serde(default = "default_legend_x")]
    pub x: f64,
    #[serde(default = "default_legend_y")]
    pub y: f64,
    #[serde(default = "default_swatch_size")]
    pub swatch_size: f64,
    #[serde(default = "default_swatch_spacing")]
    pub swatch_spacing: f64,
    /// Fill for the first swatch, kept neutral instead of the below-domain
    /// palette color to preserve the established legend appearance.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TooltipConfig {
    #[serde(default = "default_offset_x")]
    pub offset_x: f64,
    #[serde(default = "default_offset_y")]
    pub offset_y: f64,
    #[serde(default = "default_visible_opacity")]
    pub visible_opacity: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub svg: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_object() -> String {
    "counties".to_string()
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    600
}

// Blues ramp, light to dark; nine colors give eight value buckets.
fn default_palette() -> Vec<String> {
    [
        "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c",
        "#08306b",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_legend_x() -> f64 {
    600.0
}

fn default_legend_y() -> f64 {
    40.0
}

fn default_swatch_size() -> f64 {
    18.0
}

fn default_swatch_spacing() -> f64 {
    20.0
}

fn default_placeholder() -> String {
    "#ffffff".to_string()
}

fn default_offset_x() -> f64 {
    -380.0
}

fn default_offset_y() -> f64 {
    -420.0
}

fn default_visible_opacity() -> f64 {
    0.7
}

fn default_static_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            width: default_width(),
            height: default_height(),
            palette: default_palette(),
        }
    }
}

impl Default for LegendConfig {
    fn default() -> Self {
        LegendConfig {
            x: default_legend_x(),
            y: default_legend_y(),
            swatch_size: default_swatch_size(),
            swatch_spacing: default_swatch_spacing(),
            placeholder: default_placeholder(),
        }
    }
}

impl Default for TooltipConfig {
    fn default() -> Self {
        TooltipConfig {
            offset_x: default_offset_x(),
            offset_y: default_offset_y(),
            visible_opacity: default_visible_opacity(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
