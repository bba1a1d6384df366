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

//! Unified error handling for Cyclone
//!
//! A single error type shared by configuration, the PWM adapter, the
//! temperature sensors and the control loop.

use std::path::PathBuf;

/// Result type alias using CycloneError
pub type Result<T> = std::result::Result<T, CycloneError>;

#[derive(thiserror::Error, Debug)]
pub enum CycloneError {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Failed to read {path}: {reason}")]
    HardwareRead {
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to write {path}: {reason}")]
    HardwareWrite {
        path: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Temperature Errors
    // ============================================================================
    #[error("Temperature query failed: {0}")]
    SensorRead(String),

    #[error("Unexpected sensor output: {0}")]
    Parse(String),
}

impl CycloneError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config value error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn hardware_read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::HardwareRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn hardware_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::HardwareWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Configuration errors must stop the process before the loop starts
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::InvalidConfig { .. } | Self::JsonParse(_)
        )
    }

    /// Short name of the failing operation, used as a structured log field
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidConfig { .. } | Self::JsonParse(_) => "configuration",
            Self::HardwareRead { .. } => "hardware_read",
            Self::HardwareWrite { .. } => "hardware_write",
            Self::SensorRead(_) => "sensor_read",
            Self::Parse(_) => "sensor_parse",
        }
    }
}
