use std::path::Path;

use serde::{Deserialize, Serialize};

/// When the placement graph is checked for cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleCheck {
    /// Every placement that would close a cycle is rejected.
    #[default]
    Eager,

    /// Placements are accepted regardless; cycles are reported by
    /// [`Model::cycles`](crate::domain::Model::cycles).
    Deferred,
}

/// Configuration for model building.
///
/// Controls how strictly placements are validated and what the model does on
/// its own behalf when placements are installed or subtrees are copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// When the dependency graph is checked for cycles.
    pub cycle_check: CycleCheck,

    /// Whether placing a feature also places its sub-features in terms of
    /// it (a frame's orientation and origin, for example).
    pub derive_subfeature_placements: bool,

    /// Whether a copied feature whose original placement was owned outside
    /// the copied subtree is re-placed with the same value.
    ///
    /// When `false` such copies are left unplaced.
    pub copy_external_placements: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cycle_check: CycleCheck::default(),
            derive_subfeature_placements: true,
            copy_external_placements: true,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }
}

const fn default_true() -> bool {
    true
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        cycle_check: CycleCheck,

        #[serde(default = "default_true")]
        derive_subfeature_placements: bool,

        #[serde(default = "default_true")]
        copy_external_placements: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                cycle_check,
                derive_subfeature_placements,
                copy_external_placements,
            } => Self {
                cycle_check,
                derive_subfeature_placements,
                copy_external_placements,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            cycle_check: config.cycle_check,
            derive_subfeature_placements: config.derive_subfeature_placements,
            copy_external_placements: config.copy_external_placements,
        }
    }
}
