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

//! Fan control loop
//!
//! Every tick reads the temperature, opens the duty-cycle register, reads the
//! current value, decides, writes if needed and closes the register again
//! before sleeping. A failing tick is logged and the loop carries on with the
//! last known duty cycle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::{resolve_config, ThresholdConfig, ThresholdOverrides};
use crate::constants::{errors, timing};
use crate::controller::{Decision, SpeedPolicy};
use crate::error::Result;
use crate::pwm::{DutyCycle, PwmChannel};
use crate::sensor::TemperatureSensor;
use crate::speed::DutyLevels;

/// Result of one successful tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub temperature: f64,
    pub decision: Decision,
}

/// Control loop state: the hardware, the immutable policy and the last known
/// duty cycle
pub struct FanController<P: PwmChannel, S: TemperatureSensor> {
    pwm: P,
    sensor: S,
    policy: SpeedPolicy,
    state: u64,
    error_streak: u32,
}

impl<P: PwmChannel, S: TemperatureSensor> FanController<P, S> {
    /// Read the period and the initial duty cycle. Any failure here is fatal.
    pub fn start(pwm: P, sensor: S, cfg: &ThresholdConfig) -> Result<Self> {
        let period = pwm.read_period()?;
        let levels = DutyLevels::new(period)?;
        let policy = SpeedPolicy::new(levels, cfg);
        let state = pwm.open_duty_cycle()?.read_state()?;

        info!(period, duty_cycle = state, "PWM channel ready");
        for (tier, duty) in policy.levels().iter() {
            match policy.thresholds().tier_threshold(tier) {
                Some(temp) => info!("  {:<8} duty {:>8} from {}°C", tier.name(), duty, temp),
                None => info!("  {:<8} duty {:>8}", tier.name(), duty),
            }
        }
        info!(hysteresis = policy.hysteresis(), "step-down hysteresis {}°C", policy.hysteresis());

        Ok(Self {
            pwm,
            sensor,
            policy,
            state,
            error_streak: 0,
        })
    }

    /// Resolve the thresholds from `file` and `overrides`, then start on
    /// `pwm`. The channel is not touched when the configuration is invalid.
    pub fn configure(
        pwm: P,
        sensor: S,
        file: Option<&Path>,
        overrides: &ThresholdOverrides,
    ) -> Result<Self> {
        let cfg = resolve_config(file, overrides)?;
        info!(
            low = cfg.low_speed_temp,
            medium = cfg.med_speed_temp,
            high = cfg.high_speed_temp,
            full = cfg.full_speed_temp,
            hysteresis = cfg.hysteresis,
            "thresholds"
        );
        Self::start(pwm, sensor, &cfg)
    }

    /// Last duty cycle read from or written to the hardware
    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn policy(&self) -> &SpeedPolicy {
        &self.policy
    }

    pub fn error_streak(&self) -> u32 {
        self.error_streak
    }

    /// One read-decide-write cycle. The duty-cycle handle is dropped before
    /// returning, whatever the outcome.
    pub fn tick(&mut self) -> Result<Tick> {
        let temperature = self.sensor.read_temperature()?;

        let mut handle = self.pwm.open_duty_cycle()?;
        let current = handle.read_state()?;
        self.state = current;

        let decision = self.policy.decide(current, temperature);
        match decision {
            Decision::Change { from, to, target } => {
                handle.write_state(to)?;
                self.state = to;

                let levels = self.policy.levels();
                let previous_pct = levels.percent(from);
                let new_pct = levels.percent(to);
                info!(
                    temperature,
                    previous_pct,
                    new_pct,
                    previous_duty = from,
                    new_duty = to,
                    tier = %target,
                    "Temperature = {}°C, current speed = {:.0}%, new speed = {:.0}%",
                    temperature,
                    previous_pct,
                    new_pct
                );
            }
            Decision::Hold { state, reason, .. } => {
                debug!(temperature, duty_cycle = state, ?reason, "holding");
            }
        }

        Ok(Tick {
            temperature,
            decision,
        })
    }

    /// Run one tick and account for its errors. Returns the tick when it succeeded.
    pub fn poll(&mut self) -> Option<Tick> {
        match self.tick() {
            Ok(tick) => {
                if self.error_streak > 0 {
                    info!(failed_ticks = self.error_streak, "control loop recovered");
                    self.error_streak = 0;
                }
                Some(tick)
            }
            Err(e) => {
                self.error_streak = self.error_streak.saturating_add(1);
                error!(
                    operation = e.operation(),
                    error = %e,
                    consecutive = self.error_streak,
                    duty_cycle = self.state,
                    "tick failed, keeping last duty cycle"
                );
                if self.error_streak == errors::MAX_CONSECUTIVE_ERRORS {
                    warn!(
                        "{} consecutive ticks failed; fan speed is no longer following temperature",
                        self.error_streak
                    );
                }
                None
            }
        }
    }

    /// Tick every `interval` until `shutdown` is set
    pub fn run(&mut self, interval: Duration, shutdown: &AtomicBool) {
        info!(interval_secs = interval.as_secs_f64(), "fan control loop started");
        while !shutdown.load(Ordering::SeqCst) {
            self.poll();
            sleep_unless_shutdown(interval, shutdown);
        }
        info!(duty_cycle = self.state, "fan control loop stopped");
    }
}

/// Sleep for `total`, waking early when `shutdown` is set
fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(timing::SLEEP_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::HoldReason;
    use crate::error::CycloneError;
    use crate::speed::SpeedTier;
    use crate::test_utils::{default_thresholds, scripted_sensor, FakePwm};

    fn controller(
        duty: u64,
        readings: Vec<Result<f64>>,
    ) -> (FakePwm, FanController<FakePwm, crate::sensor::MockTemperatureSensor>) {
        let pwm = FakePwm::new(1000, duty);
        let sensor = scripted_sensor(readings);
        let ctl = FanController::start(pwm.clone(), sensor, &default_thresholds()).unwrap();
        (pwm, ctl)
    }

    #[test]
    fn test_start_reads_period_and_state() {
        let (pwm, ctl) = controller(500, vec![]);
        assert_eq!(ctl.state(), 500);
        assert_eq!(ctl.policy().levels().period(), 1000);
        assert_eq!(pwm.open_handles(), 0);
        assert!(pwm.writes().is_empty());
    }

    #[test]
    fn test_start_fails_without_period() {
        let pwm = FakePwm::new(1000, 0);
        pwm.state.borrow_mut().fail_period = true;
        let sensor = scripted_sensor(vec![]);
        let err = FanController::start(pwm, sensor, &default_thresholds()).err().unwrap();
        assert!(matches!(err, CycloneError::HardwareRead { .. }));
    }

    #[test]
    fn test_start_rejects_tiny_period() {
        let pwm = FakePwm::new(2, 0);
        let sensor = scripted_sensor(vec![]);
        assert!(FanController::start(pwm, sensor, &default_thresholds()).is_err());
    }

    #[test]
    fn test_invalid_config_never_touches_channel() {
        let pwm = FakePwm::new(1000, 500);
        let overrides = ThresholdOverrides {
            low_speed_temp: Some(60.0),
            med_speed_temp: Some(50.0),
            ..Default::default()
        };

        let sensor = scripted_sensor(vec![]);
        let err = FanController::configure(pwm.clone(), sensor, None, &overrides)
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert_eq!(pwm.state.borrow().period_reads, 0);
        assert_eq!(pwm.state.borrow().opens, 0);
    }

    #[test]
    fn test_configure_applies_overrides() {
        let pwm = FakePwm::new(1000, 0);
        let overrides = ThresholdOverrides {
            low_speed_temp: Some(40.0),
            ..Default::default()
        };

        let sensor = scripted_sensor(vec![Ok(42.0)]);
        let mut ctl = FanController::configure(pwm.clone(), sensor, None, &overrides).unwrap();
        assert_eq!(pwm.state.borrow().period_reads, 1);
        assert_eq!(ctl.policy().thresholds().threshold(300), Some(40.0));

        ctl.tick().unwrap();
        assert_eq!(pwm.writes(), vec![300]);
    }

    #[test]
    fn test_step_down_writes_once() {
        let (pwm, mut ctl) = controller(500, vec![Ok(51.0)]);
        let tick = ctl.tick().unwrap();
        assert_eq!(tick.temperature, 51.0);
        assert_eq!(
            tick.decision,
            Decision::Change {
                from: 500,
                to: 300,
                target: SpeedTier::Low,
            }
        );
        assert_eq!(pwm.writes(), vec![300]);
        assert_eq!(ctl.state(), 300);
        assert_eq!(pwm.open_handles(), 0);
    }

    #[test]
    fn test_hold_does_not_write() {
        let (pwm, mut ctl) = controller(700, vec![Ok(64.0), Ok(61.0)]);

        let tick = ctl.tick().unwrap();
        assert!(matches!(
            tick.decision,
            Decision::Hold {
                state: 700,
                reason: HoldReason::Hysteresis { .. },
                ..
            }
        ));
        assert!(pwm.writes().is_empty());

        let tick = ctl.tick().unwrap();
        assert_eq!(tick.decision.state(), 500);
        assert_eq!(pwm.writes(), vec![500]);
    }

    #[test]
    fn test_tick_follows_external_changes() {
        let (pwm, mut ctl) = controller(0, vec![Ok(52.0), Ok(52.0)]);
        ctl.tick().unwrap();
        assert_eq!(pwm.duty_cycle(), 300);

        // Someone else set the fan to high; hardware is the source of truth
        pwm.state.borrow_mut().duty_cycle = 700;
        let tick = ctl.tick().unwrap();
        assert_eq!(
            tick.decision,
            Decision::Change {
                from: 700,
                to: 300,
                target: SpeedTier::Low,
            }
        );
        assert_eq!(ctl.state(), 300);
        assert_eq!(pwm.writes(), vec![300, 300]);
    }

    #[test]
    fn test_sensor_error_keeps_state() {
        let (pwm, mut ctl) = controller(
            500,
            vec![Err(CycloneError::Parse("garbage".into())), Ok(76.0)],
        );

        assert!(ctl.poll().is_none());
        assert_eq!(ctl.error_streak(), 1);
        assert_eq!(ctl.state(), 500);
        assert!(pwm.writes().is_empty());

        let tick = ctl.poll().unwrap();
        assert_eq!(tick.decision.state(), 1000);
        assert_eq!(ctl.error_streak(), 0);
    }

    #[test]
    fn test_write_error_releases_handle() {
        let (pwm, mut ctl) = controller(0, vec![Ok(70.0)]);
        pwm.state.borrow_mut().fail_write = true;

        let err = ctl.tick().unwrap_err();
        assert!(matches!(err, CycloneError::HardwareWrite { .. }));
        assert_eq!(pwm.open_handles(), 0);
        assert_eq!(ctl.state(), 0);
    }

    #[test]
    fn test_read_error_counts_streak() {
        let readings = (0..12).map(|_| Ok(60.0)).collect();
        let (pwm, mut ctl) = controller(500, readings);
        pwm.state.borrow_mut().fail_read = true;

        for expected in 1..=12 {
            assert!(ctl.poll().is_none());
            assert_eq!(ctl.error_streak(), expected);
        }
        assert_eq!(pwm.open_handles(), 0);
        assert_eq!(ctl.state(), 500);
    }

    #[test]
    fn test_open_error_skips_tick() {
        let (pwm, mut ctl) = controller(300, vec![Ok(45.0)]);
        pwm.state.borrow_mut().fail_open = true;
        assert!(matches!(ctl.tick(), Err(CycloneError::HardwareRead { .. })));
        assert!(pwm.writes().is_empty());
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let (_pwm, mut ctl) = controller(0, vec![]);
        let shutdown = AtomicBool::new(true);
        ctl.run(Duration::from_secs(5), &shutdown);
        assert_eq!(ctl.error_streak(), 0);
    }

    #[test]
    fn test_sleep_returns_early_on_shutdown() {
        let shutdown = AtomicBool::new(true);
        let start = Instant::now();
        sleep_unless_shutdown(Duration::from_secs(10), &shutdown);
        assert!(start.elapsed() < Duration::from_secs(1));

        let shutdown = AtomicBool::new(false);
        let start = Instant::now();
        sleep_unless_shutdown(Duration::from_millis(120), &shutdown);
        assert!(start.elapsed() >= Duration::from_millis(120));
    }
}
