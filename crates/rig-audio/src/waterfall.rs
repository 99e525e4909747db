//! Mapping spectra to waterfall rows

use serde::{Deserialize, Serialize};

use crate::colormap::{colormap, Rgb};
use crate::spectrum::to_db;

/// Decibel range mapped onto the colormap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterfallScale {
    /// Level drawn as the coldest colour
    pub floor_db: f64,
    /// Level drawn as the hottest colour
    pub ceiling_db: f64,
}

impl Default for WaterfallScale {
    fn default() -> Self {
        Self {
            floor_db: -100.0,
            ceiling_db: 0.0,
        }
    }
}

impl WaterfallScale {
    /// Scale spanning the weakest to the strongest bin of `magnitudes`
    pub fn fit(magnitudes: &[f64]) -> Self {
        let (min, max) = magnitudes
            .iter()
            .map(|&m| to_db(m))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), db| {
                (lo.min(db), hi.max(db))
            });
        if min.is_finite() && max > min {
            Self {
                floor_db: min,
                ceiling_db: max,
            }
        } else {
            Self::default()
        }
    }

    /// Colormap intensity for a magnitude, in [0, 1]
    pub fn intensity(&self, magnitude: f64) -> f64 {
        let span = self.ceiling_db - self.floor_db;
        if span <= 0.0 {
            return 0.0;
        }
        ((to_db(magnitude) - self.floor_db) / span).clamp(0.0, 1.0)
    }

    /// One waterfall row, one colour per bin
    pub fn row(&self, magnitudes: &[f64]) -> Vec<Rgb> {
        magnitudes
            .iter()
            .map(|&m| colormap(self.intensity(m)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_range() {
        let scale = WaterfallScale::default();
        assert_eq!(scale.intensity(1.0), 1.0);
        assert_eq!(scale.intensity(10.0), 1.0);
        assert_eq!(scale.intensity(1e-6), 0.0);
        assert_eq!(scale.intensity(0.0), 0.0);
        assert!((scale.intensity(1e-3) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_row_colours() {
        let scale = WaterfallScale::default();
        let row = scale.row(&[0.0, 1.0]);
        assert_eq!(row[0], Rgb { r: 0, g: 0, b: 255 });
        assert_eq!(row[1], Rgb { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn test_fit() {
        let scale = WaterfallScale::fit(&[0.01, 0.1, 1.0]);
        assert!((scale.floor_db + 40.0).abs() < 1e-9);
        assert!(scale.ceiling_db.abs() < 1e-9);

        assert_eq!(WaterfallScale::fit(&[]), WaterfallScale::default());
        assert_eq!(WaterfallScale::fit(&[0.5, 0.5]), WaterfallScale::default());
    }
}
