//! Configuration file handling – reads/writes `~/.freefloor/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use freefloor_runtime::FloorConfig;

/// Where the configuration came from.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: FloorConfig,
    pub path: PathBuf,
    /// `true` when the file did not exist and a default was written.
    pub created: bool,
}

/// Return the path to `~/.freefloor/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".freefloor").join("config.toml")
}

/// Load `path`, writing the default configuration there first if it does
/// not exist.  Environment overrides are applied in both cases.
pub fn load_or_create(path: &Path) -> Result<LoadedConfig, String> {
    let created = !path.exists();
    let mut config = if created {
        let config = FloorConfig::default();
        save_to(&config, path)?;
        config
    } else {
        FloorConfig::load(path).map_err(|e| e.to_string())?
    };
    apply_env_overrides(&mut config);
    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        created,
    })
}

/// Apply `FREEFLOOR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FREEFLOOR_FLOOR_HEIGHT` | `Z_CLIPPING_PLANES.floor_height` |
/// | `FREEFLOOR_CEILING_HEIGHT` | `Z_CLIPPING_PLANES.ceiling_height` |
/// | `FREEFLOOR_PERIOD_S` | `period_s` |
/// | `FREEFLOOR_SNAPSHOT_DIR` | `snapshot_dir` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut FloorConfig) {
    if let Ok(v) = std::env::var("FREEFLOOR_FLOOR_HEIGHT")
        && let Ok(h) = v.parse::<f32>()
    {
        cfg.clipping.floor_height = h;
    }
    if let Ok(v) = std::env::var("FREEFLOOR_CEILING_HEIGHT")
        && let Ok(h) = v.parse::<f32>()
    {
        cfg.clipping.ceiling_height = h;
    }
    if let Ok(v) = std::env::var("FREEFLOOR_PERIOD_S")
        && let Ok(p) = v.parse::<f64>()
    {
        cfg.period_s = p;
    }
    if let Ok(v) = std::env::var("FREEFLOOR_SNAPSHOT_DIR")
        && !v.is_empty()
    {
        cfg.snapshot_dir = Some(PathBuf::from(v));
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub(crate) fn save_to(cfg: &FloorConfig, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = cfg.to_toml_string().map_err(|e| e.to_string())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
