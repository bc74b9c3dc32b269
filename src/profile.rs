//! Target profiles
//!
//! A profile is a RON file describing the target chip, the attached flash
//! and the geometry of the simulated part. Every field is optional; missing
//! fields take their defaults.

use serde::{Deserialize, Serialize};
use si91x_core::dispatch::TargetProfile;
use si91x_core::qspi::FlashConfig;
use si91x_sim::SimFlashConfig;
use std::fs;
use std::path::Path;

use crate::error::CliError;

/// Simulated flash part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Capacity in bytes; a power of two
    pub size: usize,
    /// Program page size
    pub page_size: usize,
    /// Address bytes at power-up (3 or 4)
    pub addr_bytes: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        let sim = SimFlashConfig::default();
        Self {
            manufacturer_id: sim.manufacturer_id,
            device_id: sim.device_id,
            size: sim.size,
            page_size: sim.page_size,
            addr_bytes: sim.addr_bytes,
        }
    }
}

impl Geometry {
    /// Simulator configuration for this part
    pub fn sim_config(&self) -> SimFlashConfig {
        SimFlashConfig {
            manufacturer_id: self.manufacturer_id,
            device_id: self.device_id,
            size: self.size,
            page_size: self.page_size,
            addr_bytes: self.addr_bytes,
            ..SimFlashConfig::default()
        }
    }
}

/// Everything a command needs to know about the target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Chip and ROM usage
    pub target: TargetProfile,
    /// Attached flash
    pub flash: FlashConfig,
    /// Simulated part
    pub geometry: Geometry,
}

impl Profile {
    /// Parse a profile from RON text
    pub fn from_ron(content: &str) -> Result<Self, CliError> {
        Ok(ron::from_str(content)?)
    }

    /// Load a profile file, or the default profile when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            log::debug!("No profile given, using defaults");
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path).map_err(CliError::io(path))?;
        let profile = Self::from_ron(&content)?;
        log::info!(
            "Loaded profile {} ({:?}, {:?} on {:?})",
            path.display(),
            profile.target.chip,
            profile.flash.flash_type,
            profile.flash.cs_no
        );
        Ok(profile)
    }
}
