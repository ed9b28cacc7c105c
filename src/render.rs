use crate::classify::ThresholdScale;
use crate::config::{LegendConfig, TooltipConfig};
use crate::surface::Surface;
use crate::types::{RegionDatum, ShapePayload};
use serde::Serialize;

/// Draw the joined map into the surface: one filled shape per region datum,
/// then the legend row. The surface is cleared first, so calling this again
/// after a data reload redraws instead of duplicating elements.
pub fn render(
    surface: &mut dyn Surface,
    regions: &[RegionDatum],
    scale: &ThresholdScale,
    legend: &LegendConfig,
) {
    surface.clear();

    for datum in regions {
        surface.region(&datum.feature.geometry, &datum.color, &datum.payload());
    }

    for (i, bucket) in scale.buckets().iter().enumerate() {
        // The first swatch stays a neutral placeholder rather than the
        // below-domain color; established legend appearance.
        let fill = if i == 0 { &legend.placeholder } else { &bucket.color };
        surface.legend_swatch(
            legend.x + i as f64 * legend.swatch_spacing,
            legend.y,
            legend.swatch_size,
            fill,
            (bucket.lower, bucket.upper),
        );
    }

    tracing::info!(regions = regions.len(), "map rendered");
}

/// Visible stand-in for a map whose data never arrived.
pub fn render_unavailable(surface: &mut dyn Surface) {
    surface.clear();
    surface.message("data unavailable");
}

/// The one piece of mutable UI state: the tooltip's text, position, and
/// opacity, driven only by pointer hover events.
#[derive(Debug, Clone, Serialize)]
pub struct Tooltip {
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub opacity: f64,
    #[serde(skip)]
    config: TooltipConfig,
}

impl Tooltip {
    pub fn new(config: TooltipConfig) -> Self {
        Tooltip {
            text: String::new(),
            left: 0.0,
            top: 0.0,
            opacity: 0.0,
            config,
        }
    }

    /// Pointer entered a drawn region: populate the text, position relative
    /// to the pointer, and make the tooltip visible.
    pub fn hover_enter(&mut self, payload: &ShapePayload, pointer: (f64, f64)) {
        self.text = format!("{} : {}%", payload.label, payload.value);
        self.left = pointer.0 + self.config.offset_x;
        self.top = pointer.1 + self.config.offset_y;
        self.opacity = self.config.visible_opacity;
    }

    /// Pointer left the region: hide, keeping the stale text harmless.
    pub fn hover_leave(&mut self) {
        self.opacity = 0.0;
    }
}
