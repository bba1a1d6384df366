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

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use cyclone::config::{resolve_config, ThresholdOverrides};
use cyclone::constants::{paths, timing};
use cyclone::logger::{self, LogOptions};
use cyclone::{CommandSensor, FanController, SysfsPwm, TemperatureSensor, ThermalZoneSensor};

const VERSION: &str = env!("CARGO_PKG_VERSION");

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SensorKind {
    /// `vcgencmd measure_temp`
    Vcgencmd,
    /// sysfs thermal zone in millidegrees
    ThermalZone,
}

#[derive(Parser, Debug)]
#[command(name = "cyclone", version, about = "Temperature-driven PWM fan controller")]
struct Cli {
    /// Low fan speed temperature threshold (°C)
    #[arg(long, alias = "low_speed_temp")]
    low_speed_temp: Option<f64>,

    /// Medium fan speed temperature threshold (°C)
    #[arg(long, alias = "med_speed_temp")]
    med_speed_temp: Option<f64>,

    /// High fan speed temperature threshold (°C)
    #[arg(long, alias = "high_speed_temp")]
    high_speed_temp: Option<f64>,

    /// Full fan speed temperature threshold (°C)
    #[arg(long, alias = "full_speed_temp")]
    full_speed_temp: Option<f64>,

    /// Hysteresis (°C)
    #[arg(long)]
    hysteresis: Option<f64>,

    /// JSON file with threshold defaults; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exported PWM channel directory
    #[arg(long, default_value = paths::PWM_CHANNEL_DIR)]
    pwm_dir: PathBuf,

    /// Temperature source
    #[arg(long, value_enum, default_value_t = SensorKind::Vcgencmd)]
    sensor: SensorKind,

    /// Thermal zone file read by `--sensor thermal-zone`
    #[arg(long, default_value = paths::THERMAL_ZONE)]
    thermal_zone: PathBuf,

    /// Give up on a temperature query after this many milliseconds
    #[arg(long, default_value_t = timing::SENSOR_TIMEOUT_MS)]
    sensor_timeout_ms: u64,

    /// Append log records to this file
    #[arg(long, default_value = paths::LOG_FILE)]
    log_file: PathBuf,

    /// Log to stderr only
    #[arg(long)]
    no_log_file: bool,

    /// Also log to the systemd journal
    #[arg(long)]
    journald: bool,

    /// Validate the thresholds and exit without touching the hardware
    #[arg(long)]
    check_config: bool,
}

impl Cli {
    fn overrides(&self) -> ThresholdOverrides {
        ThresholdOverrides {
            low_speed_temp: self.low_speed_temp,
            med_speed_temp: self.med_speed_temp,
            high_speed_temp: self.high_speed_temp,
            full_speed_temp: self.full_speed_temp,
            hysteresis: self.hysteresis,
        }
    }

    fn build_sensor(&self) -> Box<dyn TemperatureSensor> {
        match self.sensor {
            SensorKind::Vcgencmd => Box::new(CommandSensor::vcgencmd(Duration::from_millis(
                self.sensor_timeout_ms,
            ))),
            SensorKind::ThermalZone => Box::new(ThermalZoneSensor::new(&self.thermal_zone)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = if cli.no_log_file || cli.check_config {
        None
    } else {
        Some(cli.log_file.clone())
    };
    let sinks = logger::init_logging(&LogOptions {
        file: log_file,
        journald: cli.journald,
    });

    if cli.check_config {
        let cfg = match resolve_config(cli.config.as_deref(), &cli.overrides()) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("{}", e);
                return Err(e).context("invalid configuration");
            }
        };
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    info!("cyclone {} starting", VERSION);
    if let Some(path) = &sinks.file {
        info!("logging to {}", path.display());
    }

    // SAFETY: geteuid is always safe - it just returns the effective user ID of the process.
    if unsafe { libc::geteuid() } != 0 {
        warn!("not running as root; writes to the PWM channel may be refused");
    }

    if let Err(e) = ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
    }) {
        warn!(
            "Failed to set signal handler: {}. Stop the controller with SIGKILL.",
            e
        );
    }

    // Thresholds are resolved before the channel is opened
    let pwm = SysfsPwm::new(&cli.pwm_dir);
    let started = FanController::configure(
        pwm.clone(),
        cli.build_sensor(),
        cli.config.as_deref(),
        &cli.overrides(),
    );
    let mut controller = match started {
        Ok(controller) => controller,
        Err(e) if e.is_configuration() => {
            error!("{}", e);
            return Err(e).context("invalid configuration");
        }
        Err(e) => {
            error!(operation = e.operation(), "{}", e);
            return Err(e).with_context(|| {
                format!("cannot start on PWM channel {}", pwm.dir().display())
            });
        }
    };

    match pwm.is_enabled() {
        Ok(true) => {}
        Ok(false) => warn!(
            "PWM channel {} is not enabled; the fan will not spin",
            pwm.dir().display()
        ),
        Err(e) => warn!("cannot check PWM enable state: {}", e),
    }

    controller.run(timing::TICK_INTERVAL, &SHUTDOWN);
    info!("shutdown complete");
    Ok(())
}
