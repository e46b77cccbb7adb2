//! HSV colour boxes for the two cube colours, persisted as `KEY: h,s,v` lines.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Cube colours the station sorts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CubeColor {
    /// Black cubes.
    Black,
    /// Aqua (blue-green) cubes.
    Aqua,
}

/// A colour in OpenCV HSV space: hue 0-180, saturation and value 0-255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue.
    pub h: u8,
    /// Saturation.
    pub s: u8,
    /// Value.
    pub v: u8,
}

impl Hsv {
    /// Largest hue.
    pub const MAX_HUE: u8 = 180;

    /// Creates a colour.
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    fn from_floats(h: f32, s: f32, v: f32) -> Self {
        let clamp = |x: f32, max: u8| x.round().clamp(0.0, f32::from(max)) as u8;
        Self::new(clamp(h, Self::MAX_HUE), clamp(s, u8::MAX), clamp(v, u8::MAX))
    }
}

impl std::fmt::Display for Hsv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.h, self.s, self.v)
    }
}

impl FromStr for Hsv {
    type Err = ConfigError;

    /// Parses `h,s,v`. Fractional values are rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f32> = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| ConfigError::new(format!("bad HSV value '{}': {}", s, e)))?;
        match parts.as_slice() {
            [h, s, v] => Ok(Self::from_floats(*h, *s, *v)),
            _ => Err(ConfigError::new(format!("expected h,s,v but got '{}'", s))),
        }
    }
}

/// Inclusive HSV box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    /// Lower corner.
    pub lower: Hsv,
    /// Upper corner.
    pub upper: Hsv,
}

impl HsvRange {
    /// Creates a box.
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// True if every channel of `hsv` lies within the box.
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }
}

impl std::fmt::Display for HsvRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]-[{}]", self.lower, self.upper)
    }
}

const BLACK_DEFAULT: HsvRange = HsvRange::new(Hsv::new(0, 0, 0), Hsv::new(180, 100, 100));
const AQUA_DEFAULT: HsvRange = HsvRange::new(Hsv::new(80, 50, 50), Hsv::new(110, 255, 255));

/// Half-widths of the aqua box around a sampled mean.
const AQUA_SPREAD: (f32, f32, f32) = (20.0, 50.0, 50.0);

/// Colour boxes for both cube colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCalibration {
    black: HsvRange,
    aqua: HsvRange,
}

impl Default for ColorCalibration {
    fn default() -> Self {
        Self {
            black: BLACK_DEFAULT,
            aqua: AQUA_DEFAULT,
        }
    }
}

impl ColorCalibration {
    /// Box for `color`.
    pub fn range(&self, color: CubeColor) -> HsvRange {
        match color {
            CubeColor::Black => self.black,
            CubeColor::Aqua => self.aqua,
        }
    }

    /// Replaces the box for `color`.
    pub fn set_range(&mut self, color: CubeColor, range: HsvRange) {
        match color {
            CubeColor::Black => self.black = range,
            CubeColor::Aqua => self.aqua = range,
        }
    }

    /// First colour whose box contains `hsv`, black before aqua.
    pub fn classify(&self, hsv: Hsv) -> Option<CubeColor> {
        if self.black.contains(hsv) {
            Some(CubeColor::Black)
        } else if self.aqua.contains(hsv) {
            Some(CubeColor::Aqua)
        } else {
            None
        }
    }

    /// Recalibrates `color` from HSV samples taken inside the target box.
    ///
    /// Black always resets to its fixed box since its hue is meaningless.
    /// Aqua becomes the sample mean widened by (20, 50, 50) and clamped.
    #[instrument(skip(self, samples), fields(samples = samples.len()))]
    pub fn calibrate(&mut self, color: CubeColor, samples: &[Hsv]) -> Result<HsvRange, ConfigError> {
        if samples.is_empty() {
            return Err(ConfigError::new("ROI is empty, calibration failed"));
        }
        let range = match color {
            CubeColor::Black => BLACK_DEFAULT,
            CubeColor::Aqua => {
                let n = samples.len() as f32;
                let mean = |f: fn(&Hsv) -> u8| samples.iter().map(|x| f32::from(f(x))).sum::<f32>() / n;
                let (h, s, v) = (mean(|x| x.h), mean(|x| x.s), mean(|x| x.v));
                let (dh, ds, dv) = AQUA_SPREAD;
                HsvRange::new(
                    Hsv::from_floats(h - dh, s - ds, v - dv),
                    Hsv::from_floats(h + dh, s + ds, v + dv),
                )
            }
        };
        info!(%color, %range, "Colour calibrated");
        self.set_range(color, range);
        Ok(range)
    }

    /// Parses calibration text. Keys not present keep their defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut cal = Self::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let slot = match key.trim() {
                "BLACK_LOWER" => &mut cal.black.lower,
                "BLACK_UPPER" => &mut cal.black.upper,
                "AQUA_LOWER" => &mut cal.aqua.lower,
                "AQUA_UPPER" => &mut cal.aqua.upper,
                other => {
                    debug!(key = other, "Ignoring unknown calibration key");
                    continue;
                }
            };
            *slot = value.trim().parse()?;
        }
        Ok(cal)
    }

    /// Renders the four-line file format.
    pub fn to_text(&self) -> String {
        format!(
            "BLACK_LOWER: {}\nBLACK_UPPER: {}\nAQUA_LOWER: {}\nAQUA_UPPER: {}\n",
            self.black.lower, self.black.upper, self.aqua.lower, self.aqua.upper
        )
    }

    /// Loads `path`, or the defaults when it does not exist.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No calibration file found, using default values");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::new(format!("Failed to read calibration: {}", e)))?;
        let cal = Self::parse(&text)?;
        info!("Color calibration loaded from file");
        Ok(cal)
    }

    /// Writes the file format to `path`.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path.as_ref(), self.to_text())
            .map_err(|e| ConfigError::new(format!("Failed to save calibration: {}", e)))?;
        info!("Calibration saved");
        Ok(())
    }
}

/// Reads a region-of-interest sample file: a JSON array of `[h, s, v]`.
pub fn load_roi_samples(path: impl AsRef<Path>) -> Result<Vec<Hsv>, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::new(format!("Failed to read {}: {}", path.display(), e)))?;
    let raw: Vec<[f32; 3]> = serde_json::from_str(&text)
        .map_err(|e| ConfigError::new(format!("Failed to parse ROI samples: {}", e)))?;
    Ok(raw.into_iter().map(|[h, s, v]| Hsv::from_floats(h, s, v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_classify() {
        let cal = ColorCalibration::default();
        assert_eq!(cal.range(CubeColor::Black).upper, Hsv::new(180, 100, 100));
        assert_eq!(cal.classify(Hsv::new(90, 200, 200)), Some(CubeColor::Aqua));
        assert_eq!(cal.classify(Hsv::new(10, 20, 20)), Some(CubeColor::Black));
        assert_eq!(cal.classify(Hsv::new(10, 200, 200)), None);
    }

    #[test]
    fn test_aqua_calibration_clamps() {
        let mut cal = ColorCalibration::default();
        let samples = [Hsv::new(170, 230, 30), Hsv::new(170, 230, 30)];
        let range = cal.calibrate(CubeColor::Aqua, &samples).unwrap();
        assert_eq!(range.lower, Hsv::new(150, 180, 0));
        assert_eq!(range.upper, Hsv::new(180, 255, 80));
        assert_eq!(cal.range(CubeColor::Aqua), range);
    }

    #[test]
    fn test_black_calibration_is_fixed() {
        let mut cal = ColorCalibration::default();
        cal.set_range(CubeColor::Black, HsvRange::new(Hsv::new(1, 1, 1), Hsv::new(2, 2, 2)));
        let range = cal.calibrate(CubeColor::Black, &[Hsv::new(50, 50, 50)]).unwrap();
        assert_eq!(range, BLACK_DEFAULT);
        assert!(cal.calibrate(CubeColor::Aqua, &[]).is_err());
    }

    #[test]
    fn test_text_round_trip_and_partial_file() {
        let mut cal = ColorCalibration::default();
        cal.calibrate(CubeColor::Aqua, &[Hsv::new(95, 120, 140)]).unwrap();
        assert_eq!(ColorCalibration::parse(&cal.to_text()).unwrap(), cal);

        let partial = ColorCalibration::parse("AQUA_LOWER: 70.4,40,40\n# comment\n").unwrap();
        assert_eq!(partial.range(CubeColor::Aqua).lower, Hsv::new(70, 40, 40));
        assert_eq!(partial.range(CubeColor::Aqua).upper, AQUA_DEFAULT.upper);
        assert!(ColorCalibration::parse("BLACK_LOWER: 1,2").is_err());
    }

    #[test]
    fn test_file_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color_calibration.txt");
        assert_eq!(ColorCalibration::load_or_default(&path).unwrap(), ColorCalibration::default());

        let mut cal = ColorCalibration::default();
        cal.calibrate(CubeColor::Aqua, &[Hsv::new(100, 100, 100)]).unwrap();
        cal.save(&path).unwrap();
        assert_eq!(ColorCalibration::load_or_default(&path).unwrap(), cal);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("BLACK_LOWER: 0,0,0\n"));
    }

    #[test]
    fn test_roi_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roi.json");
        std::fs::write(&path, "[[90, 100, 110], [92.6, 300, -5]]").unwrap();
        let samples = load_roi_samples(&path).unwrap();
        assert_eq!(samples, vec![Hsv::new(90, 100, 110), Hsv::new(93, 255, 0)]);
    }
}
