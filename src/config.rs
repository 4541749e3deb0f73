use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const POWER_PREFERENCE_ENV: &str = "VIEWFINDER_POWER_PREFERENCE";
pub const BACKEND_ENV: &str = "VIEWFINDER_BACKEND";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Adapter-selection settings for the compute context.
///
/// Loaded from the user config file with `VIEWFINDER_*` environment
/// variables taking precedence; missing or malformed values fall back to
/// defaults rather than erroring.
pub struct GpuSettings {
    pub power_preference: Option<String>,
    pub backend: Option<String>,
    pub force_fallback_adapter: Option<bool>,
}

impl GpuSettings {
    /// Returns the user config file path, if a config directory is
    /// available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("viewfinder").join("config.toml"))
    }

    /// Loads settings from disk and applies environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::load_file();
        if let Ok(raw) = std::env::var(POWER_PREFERENCE_ENV) {
            settings.power_preference = Some(raw);
        }
        if let Ok(raw) = std::env::var(BACKEND_ENV) {
            settings.backend = Some(raw);
        }
        settings
    }

    fn load_file() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_default()
    }

    pub fn power_preference(&self) -> wgpu::PowerPreference {
        match self.power_preference.as_deref().map(str::trim) {
            Some(raw) if raw.eq_ignore_ascii_case("low") => wgpu::PowerPreference::LowPower,
            Some(raw) if raw.eq_ignore_ascii_case("low_power") => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        }
    }

    pub fn backends(&self) -> wgpu::Backends {
        match self
            .backend
            .as_deref()
            .map(|raw| raw.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("vulkan") => wgpu::Backends::VULKAN,
            Some("metal") => wgpu::Backends::METAL,
            Some("dx12") => wgpu::Backends::DX12,
            Some("gl") => wgpu::Backends::GL,
            Some("primary") => wgpu::Backends::PRIMARY,
            _ => wgpu::Backends::all(),
        }
    }

    pub fn force_fallback_adapter(&self) -> bool {
        self.force_fallback_adapter.unwrap_or(false)
    }
}
