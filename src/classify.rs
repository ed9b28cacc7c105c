use crate::error::Error;
use crate::types::ColorBucket;

/// Equal-width threshold classification over the observed value range.
///
/// A palette of `n` colors yields `n - 1` thresholds spaced
/// `(max - min) / (n - 1)` apart starting at `min`. A value's slot is the
/// number of thresholds at or below it, so each bucket is half-open on the
/// right except the last, which also takes everything at or above the final
/// threshold. Slot 0 (below `min`) only ever receives out-of-domain values
/// such as the join fallback 0.
#[derive(Debug, Clone)]
pub struct ThresholdScale {
    domain_min: f64,
    domain_max: f64,
    thresholds: Vec<f64>,
    palette: Vec<String>,
}

impl ThresholdScale {
    /// Build the scale from every observed attainment value and the
    /// configured palette.
    pub fn from_values(
        values: impl IntoIterator<Item = f64>,
        palette: Vec<String>,
    ) -> Result<Self, Error> {
        if palette.len() < 2 {
            return Err(Error::PaletteTooSmall(palette.len()));
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut seen = false;
        for v in values {
            seen = true;
            min = min.min(v);
            max = max.max(v);
        }
        if !seen {
            return Err(Error::EmptyAttainment);
        }

        let bucket_count = palette.len() - 1;
        // min == max collapses the domain: no thresholds, one bucket,
        // and no width division at all.
        let thresholds = if max > min {
            let width = (max - min) / bucket_count as f64;
            (0..bucket_count).map(|i| min + width * i as f64).collect()
        } else {
            Vec::new()
        };

        Ok(ThresholdScale {
            domain_min: min,
            domain_max: max,
            thresholds,
            palette,
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.domain_min, self.domain_max)
    }

    /// Index of the bucket whose range contains `value` (bisect right over
    /// the thresholds).
    fn slot(&self, value: f64) -> usize {
        self.thresholds.partition_point(|t| *t <= value)
    }

    pub fn color_for(&self, value: f64) -> &str {
        &self.palette[self.slot(value)]
    }

    pub fn bucket_for(&self, value: f64) -> ColorBucket {
        self.bucket_at(self.slot(value))
    }

    /// Inverse lookup: the `[lower, upper]` range of the bucket in the given
    /// slot, with the domain min/max standing in where a bound would
    /// otherwise be unbounded. Supports legend-range display.
    fn bucket_at(&self, slot: usize) -> ColorBucket {
        let lower = if slot == 0 {
            self.domain_min
        } else {
            self.thresholds[slot - 1]
        };
        let upper = if slot < self.thresholds.len() {
            self.thresholds[slot]
        } else {
            self.domain_max
        };
        ColorBucket {
            lower,
            upper,
            color: self.palette[slot].clone(),
        }
    }

    /// Every bucket in slot order; one legend swatch is drawn per entry.
    pub fn buckets(&self) -> Vec<ColorBucket> {
        (0..=self.thresholds.len()).map(|i| self.bucket_at(i)).collect()
    }
}
