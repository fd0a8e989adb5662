use crate::error::{ChoromapError, ChoromapResult};

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Visual configuration for the choropleth frames.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MapStyle {
    pub canvas: Canvas,
    /// Padding between the canvas edge and the map/legend, in pixels.
    pub margin_px: f64,
    /// Opaque frame background (RGBA8, straight alpha).
    pub background_rgba: [u8; 4],
    /// Region border color.
    pub edge_rgba: [u8; 4],
    /// Region border width in pixels.
    pub edge_width_px: f64,
    /// Title text before the formatted date.
    pub title_prefix: String,
    pub title_size_px: f32,
    pub legend_size_px: f32,
    /// Ascending classification thresholds; values classify inclusive-lower
    /// (a value equal to a threshold belongs to the class above it).
    pub thresholds: Vec<f64>,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1000,
                height: 600,
            },
            margin_px: 24.0,
            background_rgba: [255, 255, 255, 255],
            edge_rgba: [0, 0, 0, 255],
            edge_width_px: 1.0,
            title_prefix: "COVID-19 cases by state".to_string(),
            title_size_px: 20.0,
            legend_size_px: 12.0,
            thresholds: default_case_thresholds(),
        }
    }
}

impl MapStyle {
    pub fn validate(&self) -> ChoromapResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ChoromapError::validation(
                "canvas width/height must be > 0",
            ));
        }
        if !self.margin_px.is_finite() || self.margin_px < 0.0 {
            return Err(ChoromapError::validation("margin_px must be >= 0"));
        }
        if !self.edge_width_px.is_finite() || self.edge_width_px <= 0.0 {
            return Err(ChoromapError::validation("edge_width_px must be > 0"));
        }
        if self.title_size_px <= 0.0 || self.legend_size_px <= 0.0 {
            return Err(ChoromapError::validation("text sizes must be > 0"));
        }
        Classifier::new(&self.thresholds)?;
        Ok(())
    }
}

/// The case-count thresholds of the source visualization, yielding 11
/// classes including below-first and above-last.
pub fn default_case_thresholds() -> Vec<f64> {
    vec![
        100.0, 500.0, 1_000.0, 5_000.0, 10_000.0, 30_000.0, 50_000.0, 100_000.0, 300_000.0,
        500_000.0,
    ]
}

/// Maps continuous values onto discrete classes at fixed thresholds.
///
/// Edges are inclusive-lower: with thresholds `[100, 500, ...]`, the value
/// `500` lands in the `500 – 1000` class, not `100 – 500`.
#[derive(Clone, Debug)]
pub struct Classifier {
    thresholds: Vec<f64>,
}

impl Classifier {
    pub fn new(thresholds: &[f64]) -> ChoromapResult<Self> {
        if thresholds.is_empty() {
            return Err(ChoromapError::validation(
                "classification needs at least one threshold",
            ));
        }
        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(ChoromapError::validation(
                "classification thresholds must be finite",
            ));
        }
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ChoromapError::validation(
                "classification thresholds must be strictly ascending",
            ));
        }
        Ok(Self {
            thresholds: thresholds.to_vec(),
        })
    }

    /// Number of classes (thresholds + 1).
    pub fn class_count(&self) -> usize {
        self.thresholds.len() + 1
    }

    /// Class index for a value: the number of thresholds `<=` the value.
    pub fn class_of(&self, value: f64) -> usize {
        self.thresholds.iter().take_while(|&&t| value >= t).count()
    }

    /// Human-readable range label per class, in class order.
    pub fn class_labels(&self) -> Vec<String> {
        let fmt = |v: f64| {
            if v.fract() == 0.0 && v.abs() < 1e15 {
                format!("{}", v as i64)
            } else {
                format!("{v}")
            }
        };

        let mut labels = Vec::with_capacity(self.class_count());
        labels.push(format!("< {}", fmt(self.thresholds[0])));
        for pair in self.thresholds.windows(2) {
            labels.push(format!("{} - {}", fmt(pair[0]), fmt(pair[1])));
        }
        labels.push(format!(
            ">= {}",
            fmt(self.thresholds[self.thresholds.len() - 1])
        ));
        labels
    }
}

/// A sequential color ramp sampled by linear interpolation between stops.
#[derive(Clone, Debug)]
pub struct ColorRamp {
    stops: Vec<[u8; 3]>,
}

impl ColorRamp {
    /// The OrRd (orange-red) perceptual ramp used for case counts.
    pub fn or_rd() -> Self {
        Self {
            stops: vec![
                [0xff, 0xf7, 0xec],
                [0xfe, 0xe8, 0xc8],
                [0xfd, 0xd4, 0x9e],
                [0xfd, 0xbb, 0x84],
                [0xfc, 0x8d, 0x59],
                [0xef, 0x65, 0x48],
                [0xd7, 0x30, 0x1f],
                [0xb3, 0x00, 0x00],
                [0x7f, 0x00, 0x00],
            ],
        }
    }

    /// Sample the ramp at `t` in `[0, 1]` (clamped).
    pub fn sample(&self, t: f64) -> [u8; 3] {
        let t = t.clamp(0.0, 1.0);
        let last = self.stops.len() - 1;
        let scaled = t * last as f64;
        let lo = scaled.floor() as usize;
        if lo >= last {
            return self.stops[last];
        }
        let frac = scaled - lo as f64;

        let a = self.stops[lo];
        let b = self.stops[lo + 1];
        let lerp = |x: u8, y: u8| -> u8 {
            (f64::from(x) + (f64::from(y) - f64::from(x)) * frac).round() as u8
        };
        [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2])]
    }

    /// Evenly spaced class colors, darkest class last.
    pub fn class_colors(&self, classes: usize) -> Vec<[u8; 3]> {
        if classes <= 1 {
            return vec![self.sample(0.0); classes.max(1)];
        }
        (0..classes)
            .map(|i| self.sample(i as f64 / (classes - 1) as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(&default_case_thresholds()).unwrap()
    }

    #[test]
    fn eleven_classes_for_ten_thresholds() {
        assert_eq!(classifier().class_count(), 11);
    }

    #[test]
    fn edges_are_inclusive_lower() {
        let c = classifier();
        // 500 belongs to the "500 - 1000" class, not "100 - 500".
        assert_eq!(c.class_of(500.0), 2);
        assert_eq!(c.class_labels()[2], "500 - 1000");
        assert_eq!(c.class_of(499.9), 1);
    }

    #[test]
    fn below_first_and_above_last_classes_exist() {
        let c = classifier();
        assert_eq!(c.class_of(0.0), 0);
        assert_eq!(c.class_of(99.0), 0);
        assert_eq!(c.class_of(500_000.0), 10);
        assert_eq!(c.class_of(2_000_000.0), 10);
    }

    #[test]
    fn labels_cover_every_class() {
        let c = classifier();
        let labels = c.class_labels();
        assert_eq!(labels.len(), c.class_count());
        assert_eq!(labels[0], "< 100");
        assert_eq!(labels[10], ">= 500000");
    }

    #[test]
    fn thresholds_must_ascend() {
        assert!(Classifier::new(&[100.0, 100.0]).is_err());
        assert!(Classifier::new(&[500.0, 100.0]).is_err());
        assert!(Classifier::new(&[]).is_err());
    }

    #[test]
    fn ramp_endpoints_match_the_stops() {
        let ramp = ColorRamp::or_rd();
        assert_eq!(ramp.sample(0.0), [0xff, 0xf7, 0xec]);
        assert_eq!(ramp.sample(1.0), [0x7f, 0x00, 0x00]);
    }

    #[test]
    fn class_colors_are_distinct_and_ordered() {
        let colors = ColorRamp::or_rd().class_colors(11);
        assert_eq!(colors.len(), 11);
        assert_eq!(colors[0], [0xff, 0xf7, 0xec]);
        assert_eq!(colors[10], [0x7f, 0x00, 0x00]);
        // Red channel darkens monotonically on this ramp.
        assert!(colors.windows(2).all(|w| w[1][0] <= w[0][0]));
    }

    #[test]
    fn default_style_validates() {
        MapStyle::default().validate().unwrap();
    }
}
