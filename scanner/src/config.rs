use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use structopt::StructOpt;

use base::defs::{Error, ErrorKind::*, IntoResult, Result};
use base::util::fs;

pub const DEFAULT_SESSION_DURATION: f32 = 5.0;
pub const DEFAULT_CAPTURE_THROTTLE: f32 = 0.5;
pub const DEFAULT_MESH_DENSITY: f32 = 1.0;

#[derive(Clone, Debug, Deserialize, PartialEq, StructOpt)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    #[structopt(
        help = "Scanning session duration in seconds",
        long,
        default_value = "5"
    )]
    pub session_duration: f32,

    #[structopt(
        help = "Minimum interval between captures of a fragment in seconds",
        long,
        default_value = "0.5"
    )]
    pub capture_throttle: f32,

    #[structopt(
        help = "Spatial mapping mesh density (0, 1]",
        long,
        default_value = "1"
    )]
    pub mesh_density: f32,

    #[structopt(
        help = "Leave captured textures off fragment materials on stop",
        long = "no-apply-textures",
        parse(from_flag = std::ops::Not::not)
    )]
    pub apply_textures_on_stop: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            session_duration: DEFAULT_SESSION_DURATION,
            capture_throttle: DEFAULT_CAPTURE_THROTTLE,
            mesh_density: DEFAULT_MESH_DENSITY,
            apply_textures_on_stop: true,
        }
    }
}

impl ScanConfig {
    pub fn from_json(json: &str) -> Result<ScanConfig> {
        let config: ScanConfig = serde_json::from_str(json)
            .res(|| "failed to parse scan config".to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ScanConfig> {
        Self::from_json(&fs::read_text_file(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.session_duration()?;
        self.capture_throttle()?;

        if !(self.mesh_density > 0.0 && self.mesh_density <= 1.0) {
            let desc = format!(
                "mesh density {} is out of range (0, 1]",
                self.mesh_density
            );
            return Err(Error::new(MalformedData, desc));
        }

        Ok(())
    }

    pub fn session_duration(&self) -> Result<Duration> {
        seconds("session duration", self.session_duration)
    }

    pub fn capture_throttle(&self) -> Result<Duration> {
        seconds("capture throttle", self.capture_throttle)
    }
}

/// Converts a span in seconds, failing with `MalformedData` when it is
/// negative, NaN or beyond what `Duration` holds.
pub fn seconds(name: &str, value: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(value)
        .res(|| format!("{} of {} seconds is out of range", name, value))
}
