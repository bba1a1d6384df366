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

//! Tier selection with hysteresis
//!
//! # How It Works
//!
//! 1. **Classification**: the temperature is placed in one of five ranges
//!    bounded by the configured thresholds, giving a target tier.
//!
//! 2. **Ramp up**: when the target duty cycle is at or above the current one,
//!    it is adopted immediately.
//!
//! 3. **Step down**: when the fan is spinning faster than the target, the
//!    threshold of the *current duty-cycle value* is looked up. The fan only
//!    slows down once the temperature drops below that threshold minus the
//!    hysteresis. A duty cycle with no threshold (0, or any value that is not
//!    one of the four spinning tiers) steps down immediately.
//!
//! Everything here is a pure function of (current duty cycle, temperature,
//! configuration), so it is tested without hardware.

use std::collections::BTreeMap;

use crate::config::ThresholdConfig;
use crate::speed::{DutyLevels, SpeedTier};

/// Threshold temperature (°C) of every spinning tier
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    tiers: [(SpeedTier, f64); 4],
    by_duty: BTreeMap<u64, f64>,
}

impl ThresholdTable {
    pub fn new(levels: &DutyLevels, cfg: &ThresholdConfig) -> Self {
        let tiers = [
            (SpeedTier::Low, cfg.low_speed_temp),
            (SpeedTier::Medium, cfg.med_speed_temp),
            (SpeedTier::High, cfg.high_speed_temp),
            (SpeedTier::Full, cfg.full_speed_temp),
        ];
        let by_duty = tiers
            .iter()
            .map(|&(tier, temp)| (levels.duty_cycle(tier), temp))
            .collect();
        Self { tiers, by_duty }
    }

    /// Threshold keyed by duty-cycle value. `None` for 0 and non-canonical values.
    pub fn threshold(&self, duty_cycle: u64) -> Option<f64> {
        self.by_duty.get(&duty_cycle).copied()
    }

    pub fn tier_threshold(&self, tier: SpeedTier) -> Option<f64> {
        self.tiers.iter().find(|(t, _)| *t == tier).map(|&(_, temp)| temp)
    }

    /// Tier the temperature alone calls for
    pub fn target_tier(&self, temperature: f64) -> SpeedTier {
        self.tiers
            .iter()
            .rev()
            .find(|&&(_, threshold)| temperature >= threshold)
            .map(|&(tier, _)| tier)
            .unwrap_or(SpeedTier::NoSpin)
    }
}

/// Why a tick left the duty cycle alone
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldReason {
    /// Already at the target duty cycle
    AtTarget,
    /// Cooler than the current tier but not below `lower_limit` yet
    Hysteresis { lower_limit: f64 },
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Hold {
        state: u64,
        target: SpeedTier,
        reason: HoldReason,
    },
    Change {
        from: u64,
        to: u64,
        target: SpeedTier,
    },
}

impl Decision {
    /// Duty cycle after this decision
    pub fn state(&self) -> u64 {
        match *self {
            Decision::Hold { state, .. } => state,
            Decision::Change { to, .. } => to,
        }
    }

    /// Whether the duty cycle must be written
    pub fn needs_write(&self) -> bool {
        matches!(self, Decision::Change { .. })
    }

    pub fn target(&self) -> SpeedTier {
        match *self {
            Decision::Hold { target, .. } | Decision::Change { target, .. } => target,
        }
    }
}

/// Immutable controller configuration: tier values, thresholds and hysteresis
#[derive(Debug, Clone)]
pub struct SpeedPolicy {
    levels: DutyLevels,
    thresholds: ThresholdTable,
    hysteresis: f64,
}

impl SpeedPolicy {
    /// `cfg` is expected to be validated already
    pub fn new(levels: DutyLevels, cfg: &ThresholdConfig) -> Self {
        Self {
            thresholds: ThresholdTable::new(&levels, cfg),
            levels,
            hysteresis: cfg.hysteresis,
        }
    }

    pub fn levels(&self) -> &DutyLevels {
        &self.levels
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn hysteresis(&self) -> f64 {
        self.hysteresis
    }

    /// Decide the next duty cycle given the current one and a temperature
    pub fn decide(&self, current: u64, temperature: f64) -> Decision {
        let target = self.thresholds.target_tier(temperature);
        let target_duty = self.levels.duty_cycle(target);

        if current > target_duty {
            if let Some(threshold) = self.thresholds.threshold(current) {
                let lower_limit = threshold - self.hysteresis;
                if temperature >= lower_limit {
                    return Decision::Hold {
                        state: current,
                        target,
                        reason: HoldReason::Hysteresis { lower_limit },
                    };
                }
            }
        }

        if target_duty == current {
            Decision::Hold {
                state: current,
                target,
                reason: HoldReason::AtTarget,
            }
        } else {
            Decision::Change {
                from: current,
                to: target_duty,
                target,
            }
        }
    }
}
