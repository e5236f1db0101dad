use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::codec;
use crate::error::{Error, Result};

pub const COLLECTION_VERSION: &str = "1.0";

/// A saved layout. `config` is a full displayplacer command line and is
/// replayed verbatim.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub config: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotkey: Option<String>,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl Preset {
    pub fn new(name: &str, config: &str, hotkey: Option<String>) -> Result<Self> {
        Ok(Preset {
            id: uuid::Uuid::new_v4().to_string(),
            name: validate_name(name)?,
            config: validate_config(config)?,
            hotkey,
            created_at: Utc::now(),
        })
    }
}

pub fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidConfig("preset name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

/// A preset config must be a displayplacer command line with at least one
/// display argument.
pub fn validate_config(config: &str) -> Result<String> {
    let config = config.trim();
    codec::to_args(config, codec::TOOL_NAME)?;
    Ok(config.to_string())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PresetCollection {
    pub version: String,
    pub presets: Vec<Preset>,
}

impl Default for PresetCollection {
    fn default() -> Self {
        PresetCollection {
            version: COLLECTION_VERSION.to_string(),
            presets: Vec::new(),
        }
    }
}

impl PresetCollection {
    pub fn get(&self, id: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Preset> {
        self.presets.iter_mut().find(|p| p.id == id)
    }

    /// Look a preset up by id, falling back to an exact (then
    /// case-insensitive) name match.
    pub fn find(&self, id_or_name: &str) -> Option<&Preset> {
        self.get(id_or_name)
            .or_else(|| self.presets.iter().find(|p| p.name == id_or_name))
            .or_else(|| self.presets.iter().find(|p| p.name.eq_ignore_ascii_case(id_or_name)))
    }

    pub fn remove(&mut self, id: &str) -> Option<Preset> {
        let idx = self.presets.iter().position(|p| p.id == id)?;
        Some(self.presets.remove(idx))
    }
}

/// Where preset collections live between runs.
pub trait PresetStorage {
    fn load_presets(&mut self) -> Result<PresetCollection>;
    fn save_presets(&mut self, presets: &PresetCollection) -> Result<()>;
}

/// `presets.json` under the dpui config directory.
pub struct JsonPresetFile {
    path: PathBuf,
}

impl JsonPresetFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonPresetFile { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dpui")
            .join("presets.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PresetStorage for JsonPresetFile {
    fn load_presets(&mut self) -> Result<PresetCollection> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No preset file yet");
            return Ok(PresetCollection::default());
        }
        let json = fs::read_to_string(&self.path)
            .map_err(|e| Error::storage(&format!("failed to read {}", self.path.display()), e))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::storage(&format!("failed to parse {}", self.path.display()), e))
    }

    fn save_presets(&mut self, presets: &PresetCollection) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| Error::storage(&format!("failed to create {}", dir.display()), e))?;
        }
        let json = serde_json::to_string_pretty(presets)
            .map_err(|e| Error::storage("failed to serialize presets", e))?;
        fs::write(&self.path, json)
            .map_err(|e| Error::storage(&format!("failed to write {}", self.path.display()), e))
    }
}
