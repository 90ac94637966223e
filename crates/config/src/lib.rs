// Panelmux - Display Controller Interrupt Arbitration
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Number of output interface slots on the display controller.
pub const NUM_INTERFACES: usize = 3;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_bus_clock_hz() -> u64 {
    128_000_000
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_max_consecutive_timeouts() -> u32 {
    20
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PowerConfig {
    /// Bus clock rate requested while any event is pending. Parked at 0 otherwise.
    #[serde(default = "default_bus_clock_hz")]
    pub bus_clock_hz: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            bus_clock_hz: default_bus_clock_hz(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WaitConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Consecutive timeouts tolerated per interface before the device is
    /// declared wedged.
    #[serde(default = "default_max_consecutive_timeouts")]
    pub max_consecutive_timeouts: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_consecutive_timeouts: default_max_consecutive_timeouts(),
        }
    }
}

impl WaitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InterfaceDescriptor {
    pub id: String, // e.g. "mddi_pmdh", "lcdc"
    pub index: usize,
    pub dma_mask: u32,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default)]
    pub power: PowerConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: "mdp".to_string(),
            power: PowerConfig::default(),
            wait: WaitConfig::default(),
            interfaces: Vec::new(),
        }
    }
}

impl ControllerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read controller config at {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Controller Config YAML")?;
        config.validate()?;
        tracing::debug!(
            "Loaded controller config '{}' with {} interface(s)",
            config.name,
            config.interfaces.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.power.bus_clock_hz == 0 {
            anyhow::bail!("Power 'bus_clock_hz' must be greater than zero");
        }

        if self.wait.timeout_ms == 0 {
            anyhow::bail!("Wait 'timeout_ms' must be greater than zero");
        }

        let mut ids = HashSet::new();
        let mut indices = HashSet::new();
        let mut claimed: u32 = 0;
        for iface in &self.interfaces {
            if iface.id.trim().is_empty() {
                anyhow::bail!("Interface id cannot be empty");
            }
            if iface.index >= NUM_INTERFACES {
                anyhow::bail!(
                    "Interface '{}' has index {} (controller has {} slots)",
                    iface.id,
                    iface.index,
                    NUM_INTERFACES
                );
            }
            if !ids.insert(iface.id.as_str()) {
                anyhow::bail!("Duplicate interface id '{}'", iface.id);
            }
            if !indices.insert(iface.index) {
                anyhow::bail!(
                    "Interface '{}' reuses slot index {}",
                    iface.id,
                    iface.index
                );
            }
            if iface.dma_mask == 0 {
                anyhow::bail!("Interface '{}' has an empty 'dma_mask'", iface.id);
            }
            if claimed & iface.dma_mask != 0 {
                anyhow::bail!(
                    "Interface '{}' dma_mask {:#x} overlaps bits already claimed ({:#x})",
                    iface.id,
                    iface.dma_mask,
                    claimed & iface.dma_mask
                );
            }
            claimed |= iface.dma_mask;
        }

        Ok(())
    }

    pub fn interface(&self, id: &str) -> Option<&InterfaceDescriptor> {
        self.interfaces.iter().find(|i| i.id == id)
    }
}
