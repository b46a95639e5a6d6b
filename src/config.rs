//! Runtime configuration.
//!
//! Service settings come from the environment (`.env` is loaded by `main`);
//! import tuning and extra header synonyms come from an optional JSON file
//! named by `IMPORT_CONFIG`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::schema::ColumnRole;
use crate::synonyms::SynonymDictionary;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Tuning knobs for the import pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSettings {
    /// How many leading rows are considered when locating the header.
    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,
    /// Data rows sampled for statistical column inference.
    #[serde(default = "default_inference_sample_rows")]
    pub inference_sample_rows: usize,
    /// Non-empty rows scored when choosing a split delimiter.
    #[serde(default = "default_shape_probe_rows")]
    pub shape_probe_rows: usize,
    /// Extra header strings per role, appended to the built-in dictionary.
    #[serde(default)]
    pub extra_synonyms: HashMap<ColumnRole, Vec<String>>,
}

fn default_header_scan_rows() -> usize {
    30
}

fn default_inference_sample_rows() -> usize {
    9
}

fn default_shape_probe_rows() -> usize {
    10
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            header_scan_rows: default_header_scan_rows(),
            inference_sample_rows: default_inference_sample_rows(),
            shape_probe_rows: default_shape_probe_rows(),
            extra_synonyms: HashMap::new(),
        }
    }
}

impl ImportSettings {
    /// Load settings from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read import config: {:?}", path))?;
        let settings: ImportSettings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse import config: {:?}", path))?;
        info!(
            "Loaded import config from {:?} ({} role(s) with extra synonyms)",
            path,
            settings.extra_synonyms.len()
        );
        Ok(settings)
    }

    pub fn synonyms(&self) -> SynonymDictionary {
        SynonymDictionary::with_extras(&self.extra_synonyms)
    }
}

/// Connection settings for the Supabase report store.
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_role_key: String,
    pub schema: String,
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    /// `None` runs against the in-memory store.
    pub supabase: Option<SupabaseSettings>,
    pub import: ImportSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES is not a number: {}", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => Some(SupabaseSettings {
                url,
                service_role_key,
                schema: get("SUPABASE_SCHEMA").unwrap_or_else(|| "public".to_string()),
            }),
            (Some(_), None) => anyhow::bail!("SUPABASE_URL set but SUPABASE_SERVICE_ROLE_KEY not set"),
            _ => None,
        };

        let import = match get("IMPORT_CONFIG") {
            Some(path) => ImportSettings::load_from_file(Path::new(&path))?,
            None => ImportSettings::default(),
        };

        Ok(Self {
            bind_addr,
            max_upload_bytes,
            supabase,
            import,
        })
    }
}
