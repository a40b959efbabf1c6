// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Top-level configuration for a running responder instance.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Identity reported in the greeting and by the `PicoInfo` handler.
    pub board: BoardConfig,
    /// Storage geometry for the settings sector.
    pub storage: StorageConfig,
    /// TCP/UDP bind parameters.
    pub listener: ListenerConfig,
    /// Protocol-level tunables that don't change the wire format.
    pub runtime: RuntimeConfig,
}

/// Board identity used in the UDP discovery responder and the greeting.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BoardConfig {
    #[serde(rename = "BoardId")]
    /// Lowercase hex string uniquely identifying this device.
    pub board_id: String,

    #[serde(rename = "Hostname")]
    /// Network hostname, also stored under the `name` settings key.
    pub hostname: String,

    #[serde(rename = "Version")]
    /// Version string reported in the greeting and by `PicoInfo`.
    pub version: String,
}

/// Settings-sector geometry. Defaults match a single 4 KiB flash sector.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StorageConfig {
    #[serde(rename = "FileSize")]
    /// Total size in bytes of the settings sector.
    pub file_size: u32,

    #[serde(rename = "SectorSize")]
    /// Erase granularity of the backing storage.
    pub sector_size: u32,

    #[serde(rename = "PageSize")]
    /// Program granularity of the backing storage.
    pub page_size: u32,
}

/// Bind addresses for the control listener and discovery responder.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ListenerConfig {
    #[serde(rename = "BindAddress")]
    /// Address the TCP/UDP sockets are bound to.
    pub bind_address: String,

    #[serde(rename = "Port")]
    /// Shared port for the TCP control channel and UDP discovery responder.
    pub port: u16,
}

/// Runtime-only settings that do not appear on the wire.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    #[serde(rename = "MaxDataSize")]
    /// Upper bound on a single encrypted request/response payload.
    pub max_data_size: u32,

    #[serde(rename = "IoTimeout", with = "serde_secs")]
    /// Per-read/write timeout guarding a single cooperative session.
    pub io_timeout: Duration,

    #[serde(rename = "SecretRounds")]
    /// Number of SHA-256 rounds used to derive the session-authentication
    /// secret digest from `update_secret`.
    pub secret_rounds: u32,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.board.board_id.is_empty(), "BoardId must not be empty");
        ensure!(
            self.board.board_id.chars().all(|c| c.is_ascii_hexdigit()),
            "BoardId must be a hex string"
        );
        ensure!(!self.board.hostname.is_empty(), "Hostname must not be empty");

        ensure!(self.storage.sector_size > 0, "SectorSize must be > 0");
        ensure!(
            self.storage.file_size == self.storage.sector_size,
            "FileSize must equal SectorSize (single-sector settings store)"
        );
        ensure!(
            self.storage.page_size > 0
                && self.storage.sector_size % self.storage.page_size == 0,
            "PageSize must evenly divide SectorSize"
        );

        ensure!(self.listener.port != 0, "Port must be nonzero");

        ensure!(self.runtime.max_data_size > 0, "MaxDataSize must be > 0");
        ensure!(self.runtime.secret_rounds > 0, "SecretRounds must be > 0");

        Ok(())
    }
}

/// Serde helper for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
