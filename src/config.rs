use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::canvas::CanvasBounds;
use crate::codec::TOOL_NAME;
use crate::error::{Error, Result};
use crate::preset::JsonPresetFile;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Program name or path of displayplacer.
    pub tool: String,
    pub presets_path: Option<PathBuf>,
    pub debug: bool,
    pub canvas: CanvasConfig,
}

/// Canvas scaling for the terminal, in cells.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CanvasConfig {
    pub scale_cap: f64,
    pub margin: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tool: TOOL_NAME.to_string(),
            presets_path: None,
            debug: false,
            canvas: CanvasConfig::default(),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        CanvasConfig { scale_cap: 0.1, margin: 1.0 }
    }
}

impl CanvasConfig {
    /// Bounds for a drawable area of `width` x `height`. The margin is taken
    /// off both sides so the far edges stay inside the area.
    pub fn bounds(&self, width: f64, height: f64) -> CanvasBounds {
        CanvasBounds {
            max_width: (width - 2.0 * self.margin).max(0.0),
            max_height: (height - 2.0 * self.margin).max(0.0),
            scale_cap: self.scale_cap,
            margin: self.margin,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dpui")
            .join("config.json")
    }

    /// Read the config file. A missing file gives the defaults. A file that
    /// cannot be read or parsed is an error; callers fall back to the
    /// defaults and log it once logging is up.
    pub fn load(path: &Path) -> Result<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AppConfig::default()),
            Err(e) => return Err(Error::storage(&format!("failed to read {}", path.display()), e)),
        };
        serde_json::from_str(&json).map_err(|e| Error::storage(&format!("invalid config {}", path.display()), e))
    }

    pub fn presets_path(&self) -> PathBuf {
        self.presets_path.clone().unwrap_or_else(JsonPresetFile::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.tool, "displayplacer");
        assert_eq!(config.presets_path(), JsonPresetFile::default_path());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"tool": "/opt/homebrew/bin/displayplacer", "canvas": {"margin": 2.0}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.tool, "/opt/homebrew/bin/displayplacer");
        assert_eq!(config.canvas.margin, 2.0);
        assert_eq!(config.canvas.scale_cap, 0.1);
        assert!(!config.debug);
    }

    #[test]
    fn test_broken_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "tool = displayplacer").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_unreadable_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        assert!(matches!(AppConfig::load(dir.path()), Err(Error::Storage(_))));
    }

    #[test]
    fn test_presets_path_override() {
        let config = AppConfig {
            presets_path: Some(PathBuf::from("/tmp/p.json")),
            ..Default::default()
        };
        assert_eq!(config.presets_path(), PathBuf::from("/tmp/p.json"));
    }

    #[test]
    fn test_canvas_bounds() {
        let b = CanvasConfig::default().bounds(80.0, 48.0);
        assert_eq!((b.max_width, b.max_height, b.scale_cap, b.margin), (78.0, 46.0, 0.1, 1.0));
        assert_eq!(CanvasConfig::default().bounds(1.0, 1.0).max_width, 0.0);
    }

    #[test]
    fn test_fitted_layout_stays_inside_area() {
        use crate::canvas::CanvasTransform;
        use crate::display::{DeviceSet, Display};

        let a = Display::new("1", (2560, 1440), (0, 0)).unwrap();
        let b = Display::new("2", (1920, 1080), (2560, 0)).unwrap();
        let set = DeviceSet::new(vec![a, b], "").unwrap();
        let config = CanvasConfig { scale_cap: 1.0, margin: 2.0 };
        let (w, h) = (80.0, 48.0);

        let t = CanvasTransform::fit(&set, config.bounds(w, h));
        for d in set.displays() {
            let (x, y, dw, dh) = t.rect(d);
            assert!(x >= 0.0 && y >= 0.0);
            assert!(x + dw <= w + 1e-9, "right edge {} past {}", x + dw, w);
            assert!(y + dh <= h + 1e-9, "bottom edge {} past {}", y + dh, h);
        }
    }
}
