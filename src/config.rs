use std::path::PathBuf;

pub const DEFAULT_MAX_SYMLINKS: usize = 20;
pub const DEFAULT_MAX_DELETE_DEPTH: usize = 256;
pub const DEFAULT_MOUNT_TABLE: &str = "/proc/self/mounts";
pub const FALLBACK_MOUNT_TABLE: &str = "/etc/mtab";

const ENV_MOUNT_TABLE: &str = "PERMTRACE_MOUNT_TABLE";
const ENV_MAX_SYMLINKS: &str = "PERMTRACE_MAX_SYMLINKS";
const ENV_MAX_DELETE_DEPTH: &str = "PERMTRACE_MAX_DELETE_DEPTH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConfig {
    pub max_symlinks: usize,
    /// `None` leaves the directory-delete scan unbounded.
    pub max_delete_depth: Option<usize>,
    pub mount_table: PathBuf,
    /// Set when `mount_table` came from the caller rather than the default.
    pub mount_table_explicit: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_symlinks: DEFAULT_MAX_SYMLINKS,
            max_delete_depth: Some(DEFAULT_MAX_DELETE_DEPTH),
            mount_table: PathBuf::from(DEFAULT_MOUNT_TABLE),
            mount_table_explicit: false,
        }
    }
}

impl CheckConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_MOUNT_TABLE).filter(|p| !p.is_empty()) {
            config.mount_table = PathBuf::from(path);
            config.mount_table_explicit = true;
        }
        if let Some(raw) = lookup(ENV_MAX_SYMLINKS) {
            match raw.parse::<usize>() {
                Ok(value) if value > 0 => config.max_symlinks = value,
                _ => log::warn!("ignoring {ENV_MAX_SYMLINKS}={raw:?}; expected a positive integer"),
            }
        }
        if let Some(raw) = lookup(ENV_MAX_DELETE_DEPTH) {
            match raw.parse::<usize>() {
                Ok(0) => config.max_delete_depth = None,
                Ok(value) => config.max_delete_depth = Some(value),
                Err(_) => log::warn!("ignoring {ENV_MAX_DELETE_DEPTH}={raw:?}; expected an integer"),
            }
        }
        config
    }
}
