//! Spoofed values
//!
//! The generic, non-identifying answers spoofers give in place of real
//! machine data.

use serde::{Deserialize, Serialize};

/// Rectangle reported by every geometry query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for SyntheticRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        }
    }
}

/// Values and noise bounds used by the spoofers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpoofProfile {
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub hardware_concurrency: u8,
    /// Gigabytes
    pub device_memory: u8,
    pub rect: SyntheticRect,
    /// XOR bound for pixel reads
    pub canvas_read_noise: u8,
    /// XOR bound for data-URL export
    pub canvas_export_noise: u8,
    /// Jitter amplitude for frequency data
    pub frequency_jitter: f32,
    /// Jitter amplitude for channel copies
    pub sample_jitter: f32,
}

impl Default for SpoofProfile {
    fn default() -> Self {
        Self {
            webgl_vendor: "Google Inc.".to_string(),
            webgl_renderer:
                "ANGLE (Google, Vulkan 1.3.0 (SwiftShader Device (LLVM 15.0.0)), SwiftShader driver)"
                    .to_string(),
            hardware_concurrency: 4,
            device_memory: 4,
            rect: SyntheticRect::default(),
            canvas_read_noise: 7,
            canvas_export_noise: 3,
            frequency_jitter: 0.1,
            sample_jitter: 0.005,
        }
    }
}
