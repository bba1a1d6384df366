/*
 * This file is part of Cyclone.
 *
 * Copyright (C) 2025 Cyclone contributors
 *
 * Cyclone is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Cyclone is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Cyclone. If not, see <https://www.gnu.org/licenses/>.
 */

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::thresholds;
use crate::error::{CycloneError, Result};

/// Temperature thresholds (°C) at or above which each speed tier applies,
/// plus the hysteresis margin for stepping down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    pub low_speed_temp: f64,
    pub med_speed_temp: f64,
    pub high_speed_temp: f64,
    pub full_speed_temp: f64,
    pub hysteresis: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low_speed_temp: thresholds::DEFAULT_LOW,
            med_speed_temp: thresholds::DEFAULT_MEDIUM,
            high_speed_temp: thresholds::DEFAULT_HIGH,
            full_speed_temp: thresholds::DEFAULT_FULL,
            hysteresis: thresholds::DEFAULT_HYSTERESIS,
        }
    }
}

/// Values given on the command line; `None` keeps whatever the file or the
/// defaults provided.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdOverrides {
    pub low_speed_temp: Option<f64>,
    pub med_speed_temp: Option<f64>,
    pub high_speed_temp: Option<f64>,
    pub full_speed_temp: Option<f64>,
    pub hysteresis: Option<f64>,
}

impl ThresholdConfig {
    pub fn apply(mut self, overrides: &ThresholdOverrides) -> Self {
        if let Some(v) = overrides.low_speed_temp {
            self.low_speed_temp = v;
        }
        if let Some(v) = overrides.med_speed_temp {
            self.med_speed_temp = v;
        }
        if let Some(v) = overrides.high_speed_temp {
            self.high_speed_temp = v;
        }
        if let Some(v) = overrides.full_speed_temp {
            self.full_speed_temp = v;
        }
        if let Some(v) = overrides.hysteresis {
            self.hysteresis = v;
        }
        self
    }

    /// Check ordering and bounds:
    /// `low < medium < high < full < 80.0` and `2 <= hysteresis <= 20`.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("low_speed_temp", self.low_speed_temp),
            ("med_speed_temp", self.med_speed_temp),
            ("high_speed_temp", self.high_speed_temp),
            ("full_speed_temp", self.full_speed_temp),
            ("hysteresis", self.hysteresis),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(CycloneError::invalid_config(field, "must be a finite number"));
            }
        }

        for pair in fields[..4].windows(2) {
            let (lower_name, lower) = pair[0];
            let (upper_name, upper) = pair[1];
            if lower >= upper {
                return Err(CycloneError::invalid_config(
                    upper_name,
                    format!("{}°C must be above {} ({}°C)", upper, lower_name, lower),
                ));
            }
        }

        if self.full_speed_temp >= thresholds::SAFETY_CEILING {
            return Err(CycloneError::invalid_config(
                "full_speed_temp",
                format!(
                    "{}°C must be below {}°C",
                    self.full_speed_temp,
                    thresholds::SAFETY_CEILING
                ),
            ));
        }

        if !(thresholds::MIN_HYSTERESIS..=thresholds::MAX_HYSTERESIS).contains(&self.hysteresis) {
            return Err(CycloneError::invalid_config(
                "hysteresis",
                format!(
                    "{}°C must be between {} and {}",
                    self.hysteresis,
                    thresholds::MIN_HYSTERESIS,
                    thresholds::MAX_HYSTERESIS
                ),
            ));
        }

        Ok(())
    }
}

/// Read a JSON threshold file. Missing fields take their defaults.
pub fn load_config_file(path: &Path) -> Result<ThresholdConfig> {
    let data = fs::read_to_string(path).map_err(|e| {
        CycloneError::config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let cfg: ThresholdConfig = serde_json::from_str(&data)?;
    Ok(cfg)
}

/// Defaults, then the optional file, then command-line overrides. The result
/// is validated before it is returned.
pub fn resolve_config(
    file: Option<&Path>,
    overrides: &ThresholdOverrides,
) -> Result<ThresholdConfig> {
    let base = match file {
        Some(path) => load_config_file(path)?,
        None => ThresholdConfig::default(),
    };
    let cfg = base.apply(overrides);
    cfg.validate()?;
    Ok(cfg)
}
