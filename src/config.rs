// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application configuration.
//!
//! The configuration file is TOML with an `[application]` table and the two
//! reason tables `[accept_reasons]` and `[reject_reasons]`. A default file is
//! written on first start so reviewers have something to edit.

use crate::models::taxonomy::{GroupMode, ReasonCatalog, ReasonGroup, ReasonsConfig};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up next to the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Program metadata, also recorded in every annotation file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: String,
    /// Refuse to apply annotations to a video whose contents changed.
    #[serde(default = "default_true")]
    pub enable_hashsum_validation: bool,
    #[serde(default)]
    pub enable_video_preprocessing: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ApplicationInfo {
    fn default() -> Self {
        Self {
            name: "Video Annotation Tool".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            author: "Zulution.AI".to_string(),
            enable_hashsum_validation: true,
            enable_video_preprocessing: false,
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub application: ApplicationInfo,
    #[serde(default)]
    pub accept_reasons: ReasonsConfig,
    #[serde(default)]
    pub reject_reasons: ReasonsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut accept_groups = IndexMap::new();
        accept_groups.insert(
            "3".to_string(),
            ReasonGroup {
                name: "3".to_string(),
                mode: GroupMode::CheckBox,
                options: strings(&["3.1", "3.2", "3.3"]),
            },
        );

        let mut reject_groups = IndexMap::new();
        reject_groups.insert(
            "1".to_string(),
            ReasonGroup {
                name: "1".to_string(),
                mode: GroupMode::CheckBox,
                options: strings(&["1.1", "1.2"]),
            },
        );

        Self {
            application: ApplicationInfo::default(),
            accept_reasons: ReasonsConfig {
                simple: strings(&["1", "2", "3", "4"]),
                groups: accept_groups,
            },
            reject_reasons: ReasonsConfig {
                simple: strings(&["1", "2"]),
                groups: reject_groups,
            },
        }
    }
}

impl AppConfig {
    /// Parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config =
            toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to encode configuration")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Load the configuration, creating the default file if none exists.
    ///
    /// A file that cannot be read or parsed is reported and the built-in
    /// default is used instead, so a typo in the taxonomy never blocks
    /// reviewing.
    pub fn load_or_init(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => log::info!("[Config] Created default configuration at {}", path.display()),
                Err(e) => log::error!("[Config] Could not write default configuration: {:#}", e),
            }
            return config;
        }

        match Self::load(path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("[Config] Error loading configuration: {:#}", e);
                log::info!("[Config] Using default configuration");
                Self::default()
            }
        }
    }

    /// Resolve both reason tables into lookup taxonomies.
    pub fn catalog(&self) -> ReasonCatalog {
        ReasonCatalog::new(&self.accept_reasons, &self.reject_reasons)
    }
}
