/*
 * Test utilities and fakes for Cyclone
 *
 * In-memory PWM channel and fixtures shared by the unit tests.
 */

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use crate::config::ThresholdConfig;
use crate::error::{CycloneError, Result};
use crate::pwm::{DutyCycle, PwmChannel};
use crate::sensor::MockTemperatureSensor;

#[derive(Debug, Default)]
pub struct FakePwmState {
    pub period: u64,
    pub duty_cycle: u64,
    pub period_reads: usize,
    /// Every value written, in order
    pub writes: Vec<u64>,
    pub opens: usize,
    /// Handles currently alive
    pub open_handles: usize,
    pub fail_period: bool,
    pub fail_open: bool,
    pub fail_read: bool,
    pub fail_write: bool,
}

/// PWM channel kept in memory, shared with the test through `state`
#[derive(Debug, Clone)]
pub struct FakePwm {
    pub state: Rc<RefCell<FakePwmState>>,
}

impl FakePwm {
    pub fn new(period: u64, duty_cycle: u64) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakePwmState {
                period,
                duty_cycle,
                ..Default::default()
            })),
        }
    }

    pub fn duty_cycle(&self) -> u64 {
        self.state.borrow().duty_cycle
    }

    pub fn writes(&self) -> Vec<u64> {
        self.state.borrow().writes.clone()
    }

    pub fn open_handles(&self) -> usize {
        self.state.borrow().open_handles
    }
}

fn fake_path() -> PathBuf {
    PathBuf::from("/fake/pwm/duty_cycle")
}

impl PwmChannel for FakePwm {
    type Handle = FakeHandle;

    fn read_period(&self) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        state.period_reads += 1;
        if state.fail_period {
            return Err(CycloneError::hardware_read(
                "/fake/pwm/period",
                "No such file or directory",
            ));
        }
        Ok(state.period)
    }

    fn open_duty_cycle(&self) -> Result<FakeHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_open {
            return Err(CycloneError::hardware_read(fake_path(), "No such device"));
        }
        state.opens += 1;
        state.open_handles += 1;
        Ok(FakeHandle {
            state: Rc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct FakeHandle {
    state: Rc<RefCell<FakePwmState>>,
}

impl DutyCycle for FakeHandle {
    fn read_state(&mut self) -> Result<u64> {
        let state = self.state.borrow();
        if state.fail_read {
            return Err(CycloneError::hardware_read(fake_path(), "Input/output error"));
        }
        Ok(state.duty_cycle)
    }

    fn write_state(&mut self, value: u64) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_write {
            return Err(CycloneError::hardware_write(fake_path(), "Permission denied"));
        }
        state.duty_cycle = value;
        state.writes.push(value);
        Ok(())
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.state.borrow_mut().open_handles -= 1;
    }
}

/// Mock sensor returning `readings` in order, one per call
pub fn scripted_sensor(readings: Vec<Result<f64>>) -> MockTemperatureSensor {
    let calls = readings.len();
    let mut queue: VecDeque<Result<f64>> = readings.into();
    let mut sensor = MockTemperatureSensor::new();
    sensor
        .expect_read_temperature()
        .times(calls)
        .returning(move || {
            queue
                .pop_front()
                .unwrap_or_else(|| Err(CycloneError::SensorRead("no more readings".into())))
        });
    sensor
}

/// Thresholds 50 / 60 / 67.5 / 75 with 5°C hysteresis
pub fn default_thresholds() -> ThresholdConfig {
    ThresholdConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::TemperatureSensor;

    #[test]
    fn test_fake_pwm_tracks_handles() {
        let pwm = FakePwm::new(1000, 500);
        {
            let mut handle = pwm.open_duty_cycle().unwrap();
            assert_eq!(pwm.open_handles(), 1);
            assert_eq!(handle.read_state().unwrap(), 500);
            handle.write_state(700).unwrap();
        }
        assert_eq!(pwm.open_handles(), 0);
        assert_eq!(pwm.duty_cycle(), 700);
        assert_eq!(pwm.writes(), vec![700]);
    }

    #[test]
    fn test_scripted_sensor_order() {
        let sensor = scripted_sensor(vec![
            Ok(40.0),
            Err(CycloneError::SensorRead("x".into())),
            Ok(41.0),
        ]);
        assert_eq!(sensor.read_temperature().unwrap(), 40.0);
        assert!(sensor.read_temperature().is_err());
        assert_eq!(sensor.read_temperature().unwrap(), 41.0);
    }
}
