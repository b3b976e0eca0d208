//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each pipeline
//! stage, `AppPaths` for cross-platform directories, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and `AppConfig::validate`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, ArrayConfig, AudioConfig, BeamformingConfig, CaptureSourceKind, ConfigError,
    ExportConfig, FrameConfig, ScheduleConfig, SchedulePolicyKind, SyntheticConfig,
};
