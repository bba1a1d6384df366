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

//! Temperature sources
//!
//! The default source is the VideoCore query (`vcgencmd measure_temp`), which
//! prints `temp=48.3'C`. A sysfs thermal zone reporting millidegrees can be
//! used instead on boards without `vcgencmd`.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::constants::{sensor, timing};
use crate::error::{CycloneError, Result};

lazy_static! {
    static ref VCGENCMD_TEMP: Regex = Regex::new(r"^temp=(\d*\.\d*)'C").unwrap();
}

/// Instantaneous temperature in °C
#[cfg_attr(test, mockall::automock)]
pub trait TemperatureSensor {
    fn read_temperature(&self) -> Result<f64>;
}

impl<T: TemperatureSensor + ?Sized> TemperatureSensor for Box<T> {
    fn read_temperature(&self) -> Result<f64> {
        (**self).read_temperature()
    }
}

/// Extract the temperature from `vcgencmd measure_temp` output
pub fn parse_vcgencmd_output(output: &str) -> Result<f64> {
    let caps = VCGENCMD_TEMP
        .captures(output)
        .ok_or_else(|| {
            CycloneError::Parse(format!(
                "{:?} does not match temp=<float>'C",
                output.trim()
            ))
        })?;
    caps[1]
        .parse::<f64>()
        .map_err(|e| CycloneError::Parse(format!("{:?}: {}", &caps[1], e)))
}

/// Runs an external query command and parses its stdout
#[derive(Debug, Clone)]
pub struct CommandSensor {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSensor {
    pub fn new(program: impl Into<PathBuf>, args: &[&str], timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }

    /// `vcgencmd measure_temp`
    pub fn vcgencmd(timeout: Duration) -> Self {
        Self::new(sensor::VCGENCMD, sensor::VCGENCMD_ARGS, timeout)
    }

    fn describe(&self) -> String {
        let mut s = self.program.display().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }

    /// Run the command and return its stdout. The child is killed once the
    /// timeout has elapsed. Both pipes are drained while waiting so a chatty
    /// command cannot stall on a full pipe.
    fn run(&self) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CycloneError::SensorRead(format!("cannot run {}: {}", self.describe(), e))
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CycloneError::SensorRead(format!(
                        "{} did not finish within {} ms",
                        self.describe(),
                        self.timeout.as_millis()
                    )));
                }
                Ok(None) => thread::sleep(timing::SENSOR_POLL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CycloneError::SensorRead(format!(
                        "waiting for {}: {}",
                        self.describe(),
                        e
                    )));
                }
            }
        };

        let stdout = collect(stdout).map_err(|e| {
            CycloneError::SensorRead(format!("reading output of {}: {}", self.describe(), e))
        })?;

        if !status.success() {
            let stderr = collect(stderr).unwrap_or_default();
            return Err(CycloneError::SensorRead(format!(
                "{} exited with {}: {}",
                self.describe(),
                status,
                stderr.trim()
            )));
        }

        debug!(command = %self.describe(), output = %stdout.trim(), "temperature query");
        Ok(stdout)
    }
}

/// Read `pipe` to the end on a helper thread
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut buf = String::new();
        pipe.read_to_string(&mut buf)?;
        Ok(buf)
    })
}

fn collect(reader: Option<JoinHandle<io::Result<String>>>) -> io::Result<String> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "pipe reader panicked"))?,
        None => Ok(String::new()),
    }
}

impl TemperatureSensor for CommandSensor {
    fn read_temperature(&self) -> Result<f64> {
        let output = self.run()?;
        parse_vcgencmd_output(&output)
    }
}

/// sysfs thermal zone, e.g. `/sys/class/thermal/thermal_zone0/temp`
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TemperatureSensor for ThermalZoneSensor {
    fn read_temperature(&self) -> Result<f64> {
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| CycloneError::SensorRead(format!("{}: {}", self.path.display(), e)))?;
        let millidegrees = raw.trim().parse::<i64>().map_err(|_| {
            CycloneError::Parse(format!(
                "{}: expected millidegrees, found {:?}",
                self.path.display(),
                raw.trim()
            ))
        })?;
        Ok(millidegrees as f64 / sensor::MILLIDEGREES_PER_DEGREE)
    }
}
