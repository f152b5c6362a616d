//! Runner configuration, kept as `config.toml` in the platform config
//! directory unless a path is given on the command line.
//!
//! ```toml
//! timer_period = 280896
//! recent_images = ["/home/user/demo.bin"]
//!
//! [reset]
//! entry_point = 0x08000000
//!
//! [[regions]]
//! name = "iwram"
//! base = 0x03000000
//! span = 0x01000000
//! size = 0x8000
//! writable = true
//! timing = { nonseq16 = 1, seq16 = 1, nonseq32 = 1, seq32 = 1 }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use arm_core::{MemoryMap, RegionConfig, ResetConfig};
use serde::{Deserialize, Serialize};

/// Cycles between timer interrupts; one GBA video frame.
pub const DEFAULT_TIMER_PERIOD: i32 = 280_896;
const MAX_RECENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Zero turns the timer off.
    pub timer_period: i32,
    pub recent_images: Vec<PathBuf>,
    pub reset: ResetConfig,
    pub regions: Vec<RegionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer_period: DEFAULT_TIMER_PERIOD,
            recent_images: Vec::new(),
            reset: ResetConfig::default(),
            regions: MemoryMap::default_regions(),
        }
    }
}

impl Config {
    /// Moves `path` to the front of the recent list, dropping duplicates and
    /// anything past the tenth entry.
    pub fn add_recent(&mut self, path: PathBuf) {
        if let Some(index) = self.recent_images.iter().position(|p| p == &path) {
            self.recent_images.remove(index);
        }
        self.recent_images.insert(0, path);
        self.recent_images.truncate(MAX_RECENT);
    }
}

fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "armrun", "armrun")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Parses a config file body. Anything malformed yields the defaults.
pub fn parse_config(text: &str) -> Config {
    toml::from_str(text).unwrap_or_else(|e| {
        log::warn!("ignoring malformed config: {e}");
        Config::default()
    })
}

pub fn load_config(explicit: Option<&Path>) -> Config {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(default_path) else {
        return Config::default();
    };
    let Ok(text) = fs::read_to_string(&path) else {
        log::debug!("no config at {}", path.display());
        return Config::default();
    };
    parse_config(&text)
}

pub fn save_config(config: &Config, explicit: Option<&Path>) -> io::Result<()> {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(default_path) else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string(config).map_err(io::Error::other)?;
    fs::write(&path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let config = parse_config("timer_period = 1000\n[reset]\nentry_point = 0x08000000\n");
        assert_eq!(config.timer_period, 1000);
        assert_eq!(config.reset.entry_point, 0x0800_0000);
        assert_eq!(config.reset.sp_sys, ResetConfig::default().sp_sys);
        assert_eq!(config.regions, MemoryMap::default_regions());
        assert!(config.recent_images.is_empty());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        assert_eq!(parse_config("timer_period = \"soon\""), Config::default());
        assert_eq!(parse_config("[[[["), Config::default());
    }

    #[test]
    fn regions_table_replaces_the_default_map() {
        let text = r#"
            [[regions]]
            name = "ram"
            base = 0
            span = 0x10000
            size = 0x10000
            writable = true
            timing = { nonseq16 = 1, seq16 = 1, nonseq32 = 2, seq32 = 2 }
        "#;
        let config = parse_config(text);
        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.regions[0].name, "ram");
        assert_eq!(config.regions[0].timing.nonseq32, 2);
    }

    #[test]
    fn saved_file_reads_back() {
        let dir = std::env::temp_dir().join(format!("armrun-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let mut config = Config::default();
        config.add_recent(PathBuf::from("/tmp/a.bin"));
        config.timer_period = 0;

        save_config(&config, Some(&path)).expect("save");
        assert_eq!(load_config(Some(&path)), config);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn recent_list_is_deduplicated_and_bounded() {
        let mut config = Config::default();
        for i in 0..12 {
            config.add_recent(PathBuf::from(format!("{i}.bin")));
        }
        config.add_recent(PathBuf::from("5.bin"));

        assert_eq!(config.recent_images.len(), MAX_RECENT);
        assert_eq!(config.recent_images[0], PathBuf::from("5.bin"));
        assert_eq!(config.recent_images[1], PathBuf::from("11.bin"));
        assert_eq!(config.recent_images.iter().filter(|p| p.ends_with("5.bin")).count(), 1);
    }
}
