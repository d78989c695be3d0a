use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const CONFIG_ENV: &str = "MARKGRIDD_CONFIG";

/// Heuristic thresholds and markers used by column detection, cataloguing and marking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionPolicy {
    /// Share of scanned rows that must look like names for a column to qualify.
    pub name_ratio: f64,
    /// Share of scanned rows that must be id-shaped for a column to qualify.
    pub id_ratio: f64,
    pub scan_window_rows: u32,
    pub name_scan_columns: u32,
    pub header_scan_first_row: u32,
    pub header_scan_last_row: u32,
    pub fallback_id_column: u32,
    /// Identifiers are all digits and at least this long.
    pub min_id_digits: usize,
    pub section_marker: String,
    pub lecture_marker: String,
    pub mark_sentinel: f64,
    pub default_highlight: String,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            name_ratio: 0.5,
            id_ratio: 0.5,
            scan_window_rows: 50,
            name_scan_columns: 10,
            header_scan_first_row: 2,
            header_scan_last_row: 5,
            fallback_id_column: 2,
            min_id_digits: 6,
            section_marker: "attendance section".to_string(),
            lecture_marker: "attendance lecture".to_string(),
            mark_sentinel: 1.0,
            default_highlight: "FFFF00".to_string(),
        }
    }
}

impl DetectionPolicy {
    pub fn validate(&self) -> Result<(), String> {
        for (name, ratio) in [("nameRatio", self.name_ratio), ("idRatio", self.id_ratio)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(format!("{name} must be in (0, 1]"));
            }
        }
        if self.scan_window_rows == 0 {
            return Err("scanWindowRows must be >= 1".to_string());
        }
        if self.name_scan_columns == 0 {
            return Err("nameScanColumns must be >= 1".to_string());
        }
        if self.header_scan_first_row < 2 || self.header_scan_last_row < self.header_scan_first_row
        {
            return Err("header scan rows must satisfy 2 <= first <= last".to_string());
        }
        if self.fallback_id_column == 0 {
            return Err("fallbackIdColumn must be >= 1".to_string());
        }
        if self.min_id_digits == 0 {
            return Err("minIdDigits must be >= 1".to_string());
        }
        if self.section_marker.trim().is_empty() || self.lecture_marker.trim().is_empty() {
            return Err("area markers must not be empty".to_string());
        }
        if crate::apply::parse_fill_color(&self.default_highlight).is_none() {
            return Err("defaultHighlight must be 6 hex digits".to_string());
        }
        Ok(())
    }

    /// Merges a partial camelCase patch over this policy and validates the result.
    pub fn patched(&self, patch: &Value) -> Result<Self, String> {
        let Some(patch) = patch.as_object() else {
            return Err("policy patch must be an object".to_string());
        };
        let mut merged = serde_json::to_value(self).map_err(|e| e.to_string())?;
        if let Some(obj) = merged.as_object_mut() {
            for (k, v) in patch {
                if !obj.contains_key(k) {
                    return Err(format!("unknown policy field: {k}"));
                }
                obj.insert(k.clone(), v.clone());
            }
        }
        let next: DetectionPolicy = serde_json::from_value(merged).map_err(|e| e.to_string())?;
        next.validate()?;
        Ok(next)
    }

    /// Best-effort startup load; a missing or unreadable file falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(policy) => policy,
            Err(e) => {
                log::warn!(
                    "ignoring detection policy {}: {e:#}",
                    path.to_string_lossy()
                );
                Self::default()
            }
        }
    }

    fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path).context("failed to read policy file")?;
        let policy: DetectionPolicy =
            serde_json::from_str(&text).context("failed to parse policy file")?;
        policy.validate().map_err(anyhow::Error::msg)?;
        Ok(policy)
    }
}
