use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Game configuration: where class descriptions and instance content live.
/// Relative paths are resolved against the config file's own directory.
#[derive(Debug, Default, Deserialize)]
pub struct GameConfig {
    /// FGD class-description files to load.
    #[serde(default)]
    pub fgd: Vec<PathBuf>,

    /// Content root for locating instance files.
    #[serde(default)]
    pub instance_dir: Option<PathBuf>,
}

impl GameConfig {
    pub fn load(path: &Path) -> Result<GameConfig, String> {
        let source = fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        let mut config: GameConfig = toml::from_str(&source)
            .map_err(|e| format!("invalid game config '{}': {}", path.display(), e))?;

        let base = path.parent().unwrap_or(Path::new("."));
        config.fgd = config.fgd.into_iter().map(|p| base.join(p)).collect();
        config.instance_dir = config.instance_dir.map(|p| base.join(p));
        Ok(config)
    }
}
