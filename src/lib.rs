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

//! Cyclone - temperature-driven PWM fan control for single-board computers
//!
//! This library provides the speed tiers, the hysteresis policy, access to
//! the PWM channel and temperature sensor, and the control loop tying them
//! together.

pub mod constants;
pub mod error;
pub mod config;
pub mod speed;
pub mod controller;
pub mod pwm;
pub mod sensor;
pub mod service;
pub mod logger;

pub use config::ThresholdConfig;
pub use controller::{Decision, HoldReason, SpeedPolicy, ThresholdTable};
pub use error::{CycloneError, Result};
pub use pwm::{DutyCycle, PwmChannel, SysfsPwm};
pub use sensor::{CommandSensor, TemperatureSensor, ThermalZoneSensor};
pub use service::{FanController, Tick};
pub use speed::{DutyLevels, SpeedTier};

#[cfg(test)]
pub mod test_utils;
