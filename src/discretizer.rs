//! Weather discretization
//!
//! Continuous weather variables are reduced to binary indicators with fixed
//! thresholds. Both thresholds are inclusive on the upper side.

use serde::{Deserialize, Serialize};

/// Precipitation (mm over 3h) at or above which an hour counts as rainy
pub const PRECIPITATION_THRESHOLD: f64 = 2.5;

/// Temperature at or above which an hour counts as mild
pub const TEMPERATURE_THRESHOLD: f64 = 5.0;

/// Thresholds used to discretize weather variables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Discretizer {
    pub precipitation_threshold: f64,
    pub temperature_threshold: f64,
}

impl Default for Discretizer {
    fn default() -> Self {
        Self {
            precipitation_threshold: PRECIPITATION_THRESHOLD,
            temperature_threshold: TEMPERATURE_THRESHOLD,
        }
    }
}

impl Discretizer {
    /// 1 when precipitation reaches the threshold, 0 below it, missing when unknown
    pub fn precipitation_flag(&self, value: Option<f64>) -> Option<u8> {
        threshold_flag(value, self.precipitation_threshold)
    }

    /// 1 when temperature reaches the threshold, 0 below it, missing when unknown
    pub fn temperature_flag(&self, value: Option<f64>) -> Option<u8> {
        threshold_flag(value, self.temperature_threshold)
    }
}

fn threshold_flag(value: Option<f64>, threshold: f64) -> Option<u8> {
    match value {
        Some(v) if v.is_nan() => None,
        Some(v) if v < threshold => Some(0),
        Some(_) => Some(1),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precipitation_boundary() {
        let d = Discretizer::default();
        assert_eq!(d.precipitation_flag(Some(2.5)), Some(1));
        assert_eq!(d.precipitation_flag(Some(2.499)), Some(0));
        assert_eq!(d.precipitation_flag(Some(0.0)), Some(0));
        assert_eq!(d.precipitation_flag(Some(12.0)), Some(1));
    }

    #[test]
    fn test_temperature_boundary() {
        let d = Discretizer::default();
        assert_eq!(d.temperature_flag(Some(5.0)), Some(1));
        assert_eq!(d.temperature_flag(Some(4.999)), Some(0));
        assert_eq!(d.temperature_flag(Some(-3.0)), Some(0));
    }

    #[test]
    fn test_missing_values_stay_missing() {
        let d = Discretizer::default();
        assert_eq!(d.precipitation_flag(None), None);
        assert_eq!(d.precipitation_flag(Some(f64::NAN)), None);
        assert_eq!(d.temperature_flag(None), None);
        assert_eq!(d.temperature_flag(Some(f64::NAN)), None);
    }

    #[test]
    fn test_custom_thresholds() {
        let d = Discretizer {
            precipitation_threshold: 1.0,
            temperature_threshold: 10.0,
        };
        assert_eq!(d.precipitation_flag(Some(1.0)), Some(1));
        assert_eq!(d.temperature_flag(Some(9.0)), Some(0));
    }
}
