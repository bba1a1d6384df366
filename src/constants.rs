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

//! Constants and configuration defaults for Cyclone
//!
//! Paths, timings, and threshold limits live here so the rest of the crate
//! never carries magic numbers.

/// System paths
pub mod paths {
    /// PWM channel driving the fan (pwmchip0, channel 3 on the Raspberry Pi 5 fan header)
    pub const PWM_CHANNEL_DIR: &str = "/sys/class/pwm/pwmchip0/pwm3";

    /// Attribute names inside a PWM channel directory
    pub const PERIOD_FILE: &str = "period";
    pub const DUTY_CYCLE_FILE: &str = "duty_cycle";
    pub const ENABLE_FILE: &str = "enable";

    /// Default log file
    pub const LOG_FILE: &str = "/var/log/pi-cyclone.log";

    /// Default thermal zone for the `thermal-zone` sensor
    pub const THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

    /// Present when systemd-journald is running
    pub const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";
}

/// Control loop timing
pub mod timing {
    use std::time::Duration;

    /// Delay between two ticks
    pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

    /// Granularity of the inter-tick sleep, so shutdown requests are seen quickly
    pub const SLEEP_SLICE: Duration = Duration::from_millis(50);

    /// Default upper bound on one temperature query
    pub const SENSOR_TIMEOUT_MS: u64 = 2000;

    /// Poll interval while waiting for the sensor process to exit
    pub const SENSOR_POLL: Duration = Duration::from_millis(10);
}

/// Threshold configuration defaults and limits (°C)
pub mod thresholds {
    pub const DEFAULT_LOW: f64 = 50.0;
    pub const DEFAULT_MEDIUM: f64 = 60.0;
    pub const DEFAULT_HIGH: f64 = 67.5;
    pub const DEFAULT_FULL: f64 = 75.0;
    pub const DEFAULT_HYSTERESIS: f64 = 5.0;

    /// Every threshold must stay strictly below this
    pub const SAFETY_CEILING: f64 = 80.0;

    pub const MIN_HYSTERESIS: f64 = 2.0;
    pub const MAX_HYSTERESIS: f64 = 20.0;
}

/// Tier duty-cycle fractions of the PWM period
///
/// See <https://www.raspberrypi.com/documentation/computers/raspberry-pi-5.html#cooling-raspberry-pi-5>
pub mod tiers {
    pub const LOW_FRACTION: f64 = 0.3;
    pub const MEDIUM_FRACTION: f64 = 0.5;
    pub const HIGH_FRACTION: f64 = 0.7;

    /// Smallest period for which the tiers stay strictly ordered.
    /// At 4 the floored medium and high values are both 2.
    pub const MIN_PERIOD: u64 = 5;
}

/// Temperature query
pub mod sensor {
    /// VideoCore query command and arguments
    pub const VCGENCMD: &str = "vcgencmd";
    pub const VCGENCMD_ARGS: &[&str] = &["measure_temp"];

    /// Millidegrees per degree for sysfs thermal zones
    pub const MILLIDEGREES_PER_DEGREE: f64 = 1000.0;
}

/// Error reporting
pub mod errors {
    /// Consecutive failed ticks before a warning is raised
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;
}
