//! Runtime settings (spec §6 Configuration), grounded in original_source
//! `backend/app/config.py` and the teacher's TOML-plus-env-override idiom
//! in `model_catalog.rs`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrDevice {
    Cpu,
    Gpu,
}

impl Default for OcrDevice {
    fn default() -> Self {
        OcrDevice::Cpu
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub upload_max_size_mb: u64,
    pub pipeline_version: String,
    pub ocr_device: OcrDevice,
    pub ocr_use_gpu_override: Option<bool>,
    pub vl_max_new_tokens: u32,
    pub vl_max_pixels: u32,
    pub vl_min_pixels: Option<u32>,
    pub object_store_endpoint: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            upload_max_size_mb: 15,
            pipeline_version: "v1".to_string(),
            ocr_device: OcrDevice::Cpu,
            ocr_use_gpu_override: None,
            vl_max_new_tokens: 128,
            vl_max_pixels: 400_000,
            vl_min_pixels: None,
            object_store_endpoint: None,
        }
    }
}

impl Settings {
    /// Load from an optional TOML file, then apply environment overrides.
    /// Mirrors the teacher's "try the configured path, fall back to
    /// defaults" idiom in `model_catalog::ModelCatalog::load_default`.
    pub fn load(toml_path: Option<&std::path::Path>) -> Self {
        let mut settings = match toml_path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
                    eprintln!("[config] failed to parse {}: {err}", path.display());
                    Settings::default()
                }),
                Err(_) => Settings::default(),
            },
            None => Settings::default(),
        };

        settings.apply_env_overrides();
        settings
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("OCR_DEVICE") {
            self.ocr_device = match raw.to_lowercase().as_str() {
                "gpu" => OcrDevice::Gpu,
                _ => OcrDevice::Cpu,
            };
        }
        if let Ok(raw) = std::env::var("OCR_USE_GPU") {
            self.ocr_use_gpu_override = Some(matches!(raw.as_str(), "1" | "true" | "TRUE"));
        }
        if let Ok(raw) = std::env::var("UPLOAD_MAX_SIZE_MB") {
            if let Ok(parsed) = raw.parse() {
                self.upload_max_size_mb = parsed;
            }
        }
        if let Ok(raw) = std::env::var("PIPELINE_VERSION") {
            self.pipeline_version = raw;
        }
    }

    pub fn upload_max_size_bytes(&self) -> u64 {
        self.upload_max_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let settings = Settings::default();
        assert_eq!(settings.upload_max_size_mb, 15);
        assert_eq!(settings.pipeline_version, "v1");
        assert_eq!(settings.vl_max_new_tokens, 128);
        assert_eq!(settings.vl_max_pixels, 400_000);
    }

    #[test]
    fn env_override_changes_device() {
        std::env::set_var("OCR_DEVICE", "gpu");
        let mut settings = Settings::default();
        settings.apply_env_overrides();
        assert_eq!(settings.ocr_device, OcrDevice::Gpu);
        std::env::remove_var("OCR_DEVICE");
    }
}
