//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\voice-doa\
//!   macOS:   ~/Library/Application Support/voice-doa/
//!   Linux:   ~/.config/voice-doa/
//!
//! Data dir (CSV captures):
//!   Windows: %LOCALAPPDATA%\voice-doa\captures\
//!   macOS:   ~/Library/Application Support/voice-doa/captures/
//!   Linux:   ~/.local/share/voice-doa/captures/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default directory for exported CSV captures.
    pub captures_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-doa";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let captures_dir = data_dir.join("captures");

        Self {
            config_dir,
            settings_file,
            captures_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
