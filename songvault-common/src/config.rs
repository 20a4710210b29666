//! Content root resolution and canonical folder layout

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Cosmetic asset categories accepted alongside songs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    Backgrounds,
    Colors,
    Highways,
}

impl AssetType {
    /// Subfolder name under the content root
    pub fn folder(&self) -> &'static str {
        match self {
            AssetType::Backgrounds => "backgrounds",
            AssetType::Colors => "colors",
            AssetType::Highways => "highways",
        }
    }
}

impl std::str::FromStr for AssetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "backgrounds" => Ok(AssetType::Backgrounds),
            "colors" => Ok(AssetType::Colors),
            "highways" => Ok(AssetType::Highways),
            other => Err(Error::InvalidInput(format!(
                "Unknown asset type: {other}"
            ))),
        }
    }
}

/// Canonical on-disk layout of the content library.
///
/// All accepted content lives under a single root folder, keyed by content
/// type and, for songs, by artist:
///
/// ```text
/// <root>/songs/<artist>/<title>_<token>/
/// <root>/backgrounds/   colors/   highways/
/// <root>/generator/<song>/notes.chart
/// <root>/temp/          (scratch extraction workspaces)
/// ```
#[derive(Debug, Clone)]
pub struct ContentLayout {
    root: PathBuf,
}

impl ContentLayout {
    /// Create a layout rooted at `root`, creating the folder tree if missing
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Self { root: root.into() };
        for dir in [
            layout.songs_dir(),
            layout.generator_dir(),
            layout.temp_dir(),
            layout.asset_dir(AssetType::Backgrounds),
            layout.asset_dir(AssetType::Colors),
            layout.asset_dir(AssetType::Highways),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-artist song storage root
    pub fn songs_dir(&self) -> PathBuf {
        self.root.join("songs")
    }

    /// Folder for a cosmetic asset type
    pub fn asset_dir(&self, asset: AssetType) -> PathBuf {
        self.root.join(asset.folder())
    }

    /// Output folder for generated chart skeletons
    pub fn generator_dir(&self) -> PathBuf {
        self.root.join("generator")
    }

    /// Parent folder for request-scoped scratch directories
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Database file location
    pub fn database_path(&self) -> PathBuf {
        self.root.join("songvault.db")
    }
}

/// Content root resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `SONGVAULT_CONTENT_DIR` environment variable
/// 3. TOML config file (`root_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_content_root(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var("SONGVAULT_CONTENT_DIR") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = locate_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_content_root()
}

/// Locate the configuration file for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("songvault").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/songvault/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default content root
fn default_content_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("songvault"))
        .unwrap_or_else(|| PathBuf::from("./songvault_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_creates_folder_tree() {
        let temp = tempfile::tempdir().unwrap();
        let layout = ContentLayout::new(temp.path().join("content")).unwrap();

        assert!(layout.songs_dir().is_dir());
        assert!(layout.generator_dir().is_dir());
        assert!(layout.temp_dir().is_dir());
        assert!(layout.asset_dir(AssetType::Backgrounds).is_dir());
        assert!(layout.asset_dir(AssetType::Colors).is_dir());
        assert!(layout.asset_dir(AssetType::Highways).is_dir());
    }

    #[test]
    fn test_cli_arg_takes_priority() {
        let resolved = resolve_content_root(Some("/tmp/songvault-cli"));
        assert_eq!(resolved, PathBuf::from("/tmp/songvault-cli"));
    }

    #[test]
    fn test_asset_type_parsing() {
        assert_eq!(
            "Backgrounds".parse::<AssetType>().unwrap(),
            AssetType::Backgrounds
        );
        assert_eq!("colors".parse::<AssetType>().unwrap(), AssetType::Colors);
        assert!("generator".parse::<AssetType>().is_err());
    }
}
