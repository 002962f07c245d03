use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Default Kroki server used when no `--engine-url` is configured.
pub const DEFAULT_ENGINE_URL: &str = "https://kroki.io";

/// Default per-request timeout for the rendering engine, in seconds.
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub no_images: bool,
    pub perf: bool,
    pub force_half_cell: bool,
    pub engine_url: Option<String>,
    pub engine_timeout_secs: Option<u64>,
    pub render_debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            no_images: self.no_images || other.no_images,
            perf: self.perf || other.perf,
            force_half_cell: self.force_half_cell || other.force_half_cell,
            engine_url: other.engine_url.clone().or_else(|| self.engine_url.clone()),
            engine_timeout_secs: other.engine_timeout_secs.or(self.engine_timeout_secs),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("flowless").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("flowless")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("flowless").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("flowless")
                .join("config");
        }
    }

    PathBuf::from(".flowlessrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".flowlessrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# flowless defaults (saved with --save)".to_string());
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.no_images {
        lines.push("--no-images".to_string());
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if flags.force_half_cell {
        lines.push("--force-half-cell".to_string());
    }
    if let Some(url) = &flags.engine_url {
        lines.push(format!("--engine-url {url}"));
    }
    if let Some(secs) = flags.engine_timeout_secs {
        lines.push(format!("--engine-timeout-secs {secs}"));
    }
    if let Some(path) = &flags.render_debug_log {
        lines.push(format!("--render-debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token == "--watch" {
            flags.watch = true;
        } else if token == "--no-images" {
            flags.no_images = true;
        } else if token == "--perf" {
            flags.perf = true;
        } else if token == "--force-half-cell" {
            flags.force_half_cell = true;
        } else if token == "--engine-url" {
            if let Some(next) = tokens.get(i + 1) {
                flags.engine_url = Some(next.clone());
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--engine-url=") {
            flags.engine_url = Some(value.to_string());
        } else if token == "--engine-timeout-secs" {
            if let Some(next) = tokens.get(i + 1) {
                flags.engine_timeout_secs = next.parse().ok();
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--engine-timeout-secs=") {
            flags.engine_timeout_secs = value.parse().ok();
        } else if token == "--render-debug-log" {
            if let Some(next) = tokens.get(i + 1) {
                flags.render_debug_log = Some(PathBuf::from(next));
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--render-debug-log=") {
            flags.render_debug_log = Some(PathBuf::from(value));
        }
        i += 1;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let args = vec![
            "flowless".to_string(),
            "--watch".to_string(),
            "--no-images".to_string(),
            "--engine-url".to_string(),
            "http://localhost:8000".to_string(),
            "--engine-timeout-secs=45".to_string(),
            "--render-debug-log=render.log".to_string(),
            "--force-half-cell".to_string(),
            "diagram.mmd".to_string(),
        ];
        let flags = parse_flag_tokens(&args);
        assert!(flags.watch);
        assert!(flags.no_images);
        assert!(flags.force_half_cell);
        assert_eq!(
            flags.engine_url,
            Some("http://localhost:8000".to_string())
        );
        assert_eq!(flags.engine_timeout_secs, Some(45));
        assert_eq!(flags.render_debug_log, Some(PathBuf::from("render.log")));
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            watch: true,
            engine_url: Some("http://file:8000".to_string()),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            no_images: true,
            engine_url: Some("http://cli:8000".to_string()),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.no_images);
        assert_eq!(merged.engine_url, Some("http://cli:8000".to_string()));
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".flowlessrc");
        let flags = ConfigFlags {
            watch: true,
            no_images: true,
            perf: true,
            force_half_cell: true,
            engine_url: Some("http://localhost:8000".to_string()),
            engine_timeout_secs: Some(12),
            render_debug_log: Some(PathBuf::from("render.log")),
        };

        save_config_flags(&path, &flags).unwrap();
        let loaded = load_config_flags(&path).unwrap();
        assert_eq!(loaded, flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
    }
}
