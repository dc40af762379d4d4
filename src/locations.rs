//! Well-known base directories the category providers resolve their roots
//! from. Built from the environment at startup, or by hand in tests.

use crate::categories::recycle_bin;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct Locations {
    pub home: Option<PathBuf>,
    /// Current user's temp directories, possibly overlapping.
    pub user_temp: Vec<PathBuf>,
    /// Parent of every user profile (`C:\Users`).
    pub users_root: Option<PathBuf>,
    pub windows_dir: Option<PathBuf>,
    pub system_temp: Vec<PathBuf>,
    /// Directories whose entries are recycled items.
    pub recycle_bins: Vec<PathBuf>,
    /// `%LOCALAPPDATA%`, `~/.local/share`, `~/Library/Application Support`.
    pub local_data: Option<PathBuf>,
    /// `%APPDATA%`, `~/.config`.
    pub roaming_data: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

impl Locations {
    pub fn from_env() -> Self {
        let env_path = |name: &str| std::env::var_os(name).map(PathBuf::from);

        let mut user_temp = vec![std::env::temp_dir()];
        user_temp.extend(env_path("TEMP"));
        user_temp.extend(env_path("TMP"));

        let windows_dir = if cfg!(windows) {
            Some(env_path("WINDIR").unwrap_or_else(|| PathBuf::from(r"C:\Windows")))
        } else {
            None
        };

        let users_root = if cfg!(windows) {
            let drive = std::env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
            Some(PathBuf::from(format!(r"{drive}\Users")))
        } else {
            None
        };

        let system_temp = match &windows_dir {
            Some(windir) => vec![windir.join("Temp")],
            None => vec![PathBuf::from("/var/tmp")],
        };

        let local_data = if cfg!(windows) {
            env_path("LOCALAPPDATA").or_else(dirs::data_local_dir)
        } else {
            dirs::data_local_dir()
        };
        if cfg!(windows) {
            if let Some(local) = &local_data {
                user_temp.push(local.join("Temp"));
            }
        }

        Self {
            home: dirs::home_dir(),
            user_temp,
            users_root,
            windows_dir,
            system_temp,
            recycle_bins: recycle_bin::system_bins(),
            local_data,
            roaming_data: dirs::config_dir(),
            cache: dirs::cache_dir(),
        }
    }
}
