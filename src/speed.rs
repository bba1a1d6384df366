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

//! Fan speed tiers and their duty-cycle values
//!
//! The duty-cycle value of each tier depends on the PWM period, which is only
//! known once the hardware has been read, so the tier table is a value built
//! at startup rather than a set of constants.

use std::fmt;

use crate::constants::tiers;
use crate::error::{CycloneError, Result};

/// The five discrete fan speeds, slowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpeedTier {
    NoSpin,
    Low,
    Medium,
    High,
    Full,
}

impl SpeedTier {
    pub const ALL: [SpeedTier; 5] = [
        SpeedTier::NoSpin,
        SpeedTier::Low,
        SpeedTier::Medium,
        SpeedTier::High,
        SpeedTier::Full,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpeedTier::NoSpin => "no-spin",
            SpeedTier::Low => "low",
            SpeedTier::Medium => "medium",
            SpeedTier::High => "high",
            SpeedTier::Full => "full",
        }
    }
}

impl fmt::Display for SpeedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Duty-cycle value of every tier for one PWM period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyLevels {
    period: u64,
    low: u64,
    medium: u64,
    high: u64,
}

impl DutyLevels {
    /// Build the tier table for `period`.
    ///
    /// Every tier must get its own duty-cycle value, since the step-down
    /// thresholds are keyed by value. Periods below 5 cannot provide that.
    pub fn new(period: u64) -> Result<Self> {
        if period < tiers::MIN_PERIOD {
            return Err(CycloneError::Config(format!(
                "PWM period {} is too small (minimum {})",
                period,
                tiers::MIN_PERIOD
            )));
        }
        let levels = Self {
            period,
            low: fraction_of(period, tiers::LOW_FRACTION),
            medium: fraction_of(period, tiers::MEDIUM_FRACTION),
            high: fraction_of(period, tiers::HIGH_FRACTION),
        };

        let values: Vec<u64> = levels.iter().map(|(_, v)| v).collect();
        if values.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CycloneError::Config(format!(
                "PWM period {} gives overlapping tier values {:?}",
                period, values
            )));
        }
        Ok(levels)
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn duty_cycle(&self, tier: SpeedTier) -> u64 {
        match tier {
            SpeedTier::NoSpin => 0,
            SpeedTier::Low => self.low,
            SpeedTier::Medium => self.medium,
            SpeedTier::High => self.high,
            SpeedTier::Full => self.period,
        }
    }

    /// `value` as a percentage of the period
    pub fn percent(&self, value: u64) -> f64 {
        value as f64 / self.period as f64 * 100.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeedTier, u64)> + '_ {
        SpeedTier::ALL.iter().map(move |&tier| (tier, self.duty_cycle(tier)))
    }
}

fn fraction_of(period: u64, fraction: f64) -> u64 {
    (fraction * period as f64).floor() as u64
}
