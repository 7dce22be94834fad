//! Fingerprint records submitted by browsers, and the identity derived from them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest identity component accepted from a caller.
pub const MAX_ID_LEN: usize = 256;

/// Stable caller identity: a per-browser fingerprint id plus a cross-browser
/// hardware id.
///
/// Used to derive cache keys and rate-limit buckets. Never mutated by the
/// pipeline once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintKey {
    fingerprint_id: String,
    hardware_id: String,
}

impl FingerprintKey {
    pub fn new(fingerprint_id: impl Into<String>, hardware_id: impl Into<String>) -> Result<Self> {
        let fingerprint_id = fingerprint_id.into().trim().to_string();
        let hardware_id = hardware_id.into().trim().to_string();

        validate_component("fingerprintId", &fingerprint_id)?;
        validate_component("hardwareId", &hardware_id)?;

        Ok(Self {
            fingerprint_id,
            hardware_id,
        })
    }

    pub fn fingerprint_id(&self) -> &str {
        &self.fingerprint_id
    }

    pub fn hardware_id(&self) -> &str {
        &self.hardware_id
    }

    /// Rate-limit bucket for this identity. The fingerprint id is length
    /// prefixed so that `:` inside a component cannot shift the boundary.
    pub fn as_caller_id(&self) -> String {
        format!(
            "fp:{}:{}:{}",
            self.fingerprint_id.len(),
            self.fingerprint_id,
            self.hardware_id
        )
    }
}

impl fmt::Display for FingerprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.fingerprint_id, self.hardware_id)
    }
}

fn validate_component(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidRequest(format!("{} must not be empty", name)));
    }
    if value.len() > MAX_ID_LEN {
        return Err(Error::InvalidRequest(format!(
            "{} exceeds {} bytes",
            name, MAX_ID_LEN
        )));
    }
    Ok(())
}

/// Device and browser characteristics collected client-side.
///
/// Only `fingerprint_id` and `hardware_id` are required; every other field is
/// whatever the browser managed to collect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FingerprintRecord {
    pub fingerprint_id: String,
    pub hardware_id: String,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub languages: Vec<String>,
    pub timezone: Option<String>,
    pub screen: Option<ScreenInfo>,
    pub hardware_concurrency: Option<u32>,
    /// Device memory in GiB, as reported by `navigator.deviceMemory`.
    pub device_memory: Option<f64>,
    pub gpu_vendor: Option<String>,
    pub gpu_renderer: Option<String>,
    pub max_touch_points: Option<u32>,
    pub fonts: Vec<String>,
    pub do_not_track: Option<bool>,
    pub ad_blocker: Option<bool>,
    pub cookies_enabled: Option<bool>,
    pub webgpu: Option<bool>,
    pub wasm: Option<bool>,
    pub battery: Option<BatteryInfo>,
    pub connection: Option<NetworkInfo>,
    pub geo: Option<GeoEnrichment>,
}

impl FingerprintRecord {
    /// Build the identity key, rejecting records without usable ids.
    pub fn key(&self) -> Result<FingerprintKey> {
        FingerprintKey::new(self.fingerprint_id.as_str(), self.hardware_id.as_str())
    }

    /// Lower-cased platform string, empty when unknown.
    pub fn platform_lower(&self) -> String {
        self.platform
            .as_deref()
            .or(self.user_agent.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Lower-cased concatenation of the GPU vendor and renderer strings.
    pub fn gpu_lower(&self) -> String {
        format!(
            "{} {}",
            self.gpu_vendor.as_deref().unwrap_or_default(),
            self.gpu_renderer.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }

    pub fn is_touch_device(&self) -> bool {
        self.max_touch_points.unwrap_or(0) > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub color_depth: Option<u32>,
    pub pixel_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatteryInfo {
    pub charging: Option<bool>,
    /// Charge level between 0.0 and 1.0.
    pub level: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInfo {
    pub effective_type: Option<String>,
    /// Downlink estimate in Mbit/s.
    pub downlink: Option<f64>,
}

/// Geolocation fields resolved upstream and attached to the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoEnrichment {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
}
