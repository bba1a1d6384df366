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

//! PWM channel access
//!
//! A Linux PWM channel exported under `/sys/class/pwm/pwmchipN/pwmM` exposes
//! `period`, `duty_cycle` and `enable` attributes. The period is read once;
//! the duty cycle is opened once per tick and both the current-state read and
//! any write go through that single handle, which is closed when the handle
//! is dropped at the end of the tick.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::paths;
use crate::error::{CycloneError, Result};

/// Duty-cycle register opened for one tick
pub trait DutyCycle {
    fn read_state(&mut self) -> Result<u64>;
    fn write_state(&mut self, value: u64) -> Result<()>;
}

/// A PWM output driving the fan
pub trait PwmChannel {
    type Handle: DutyCycle;

    /// Maximum duty-cycle value of the channel
    fn read_period(&self) -> Result<u64>;

    /// Open the duty-cycle register for reading and writing
    fn open_duty_cycle(&self) -> Result<Self::Handle>;
}

/// PWM channel backed by a sysfs directory
#[derive(Debug, Clone)]
pub struct SysfsPwm {
    dir: PathBuf,
}

impl SysfsPwm {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn period_path(&self) -> PathBuf {
        self.dir.join(paths::PERIOD_FILE)
    }

    pub fn duty_cycle_path(&self) -> PathBuf {
        self.dir.join(paths::DUTY_CYCLE_FILE)
    }

    pub fn enable_path(&self) -> PathBuf {
        self.dir.join(paths::ENABLE_FILE)
    }

    /// Whether the channel output is switched on (`enable` reads `1`)
    pub fn is_enabled(&self) -> Result<bool> {
        let path = self.enable_path();
        let raw = read_trimmed(&path).map_err(|e| CycloneError::hardware_read(&path, e))?;
        Ok(raw == "1")
    }
}

impl PwmChannel for SysfsPwm {
    type Handle = DutyCycleFile;

    fn read_period(&self) -> Result<u64> {
        let path = self.period_path();
        let raw = read_trimmed(&path).map_err(|e| CycloneError::hardware_read(&path, e))?;
        parse_register(&path, &raw)
    }

    fn open_duty_cycle(&self) -> Result<DutyCycleFile> {
        DutyCycleFile::open(self.duty_cycle_path())
    }
}

/// Open `duty_cycle` attribute. Closed on drop.
#[derive(Debug)]
pub struct DutyCycleFile {
    file: File,
    path: PathBuf,
}

impl DutyCycleFile {
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| CycloneError::hardware_read(&path, e))?;
        Ok(Self { file, path })
    }
}

impl DutyCycle for DutyCycleFile {
    fn read_state(&mut self) -> Result<u64> {
        let mut raw = String::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut raw))
            .map_err(|e| CycloneError::hardware_read(&self.path, e))?;
        parse_register(&self.path, raw.trim())
    }

    fn write_state(&mut self, value: u64) -> Result<()> {
        // Truncation is a no-op on sysfs but keeps regular files from
        // retaining the tail of a longer previous value.
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| self.file.write_all(value.to_string().as_bytes()))
            .and_then(|_| self.file.flush())
            .map_err(|e| CycloneError::hardware_write(&self.path, e))
    }
}

fn read_trimmed(path: &Path) -> std::io::Result<String> {
    Ok(fs::read_to_string(path)?.trim().to_string())
}

fn parse_register(path: &Path, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|_| {
        CycloneError::hardware_read(path, format!("expected an integer, found {:?}", raw))
    })
}
