use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::warn;

use crate::error::{DraftError, DraftResult};
use crate::history::MAX_HISTORY_SIZE;

const QUALIFIER: &str = "net.draft-editor";
const ORGANIZATION: &str = "DraftEditor";
const APPLICATION: &str = "draft-editor";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Tunables of the media selectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    pub image_page_size: usize,
    pub video_page_size: usize,
    pub site_image_page_size: usize,
    pub debounce_ms: u64,
    /// Initial slideshow delay in seconds
    pub default_delay: f64,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        SelectorSettings {
            image_page_size: 6,
            video_page_size: 6,
            site_image_page_size: 18,
            debounce_ms: 300,
            default_delay: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub selector: SelectorSettings,
    pub history_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            selector: SelectorSettings::default(),
            history_limit: MAX_HISTORY_SIZE,
        }
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load the configuration. A missing file means defaults; a broken one is an error.
pub fn load_config(path: &Path) -> DraftResult<EditorConfig> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "no config file, using defaults");
            return Ok(EditorConfig::default());
        }
        Err(err) => return Err(DraftError::io(path, err)),
    };

    toml::from_str::<EditorConfig>(&contents)
        .map_err(|err| DraftError::Config(format!("{}: {err}", path.display())))
}

pub fn save_config(path: &Path, config: &EditorConfig) -> DraftResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| DraftError::io(parent, err))?;
    }

    let toml = toml::to_string_pretty(config)
        .map_err(|err| DraftError::Config(format!("toml serialization error: {err}")))?;

    fs::write(path, toml).map_err(|err| DraftError::io(path, err))
}
