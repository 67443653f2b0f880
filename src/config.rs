//! # Render Options
//!
//! The handful of switches the report family allows: header mode, row
//! padding, preview density, the print trigger, and how signature images are
//! fetched. Everything is defaulted so an empty JSON object is a valid
//! configuration.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Options shared by both renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// What the checklist column headers show.
    #[serde(default)]
    pub header_mode: HeaderMode,

    /// Pad the matrix to the paper form's pre-printed row counts. When false,
    /// empty equipment and observation rows are dropped instead.
    #[serde(default = "default_true")]
    pub pad_rows: bool,

    /// Compress fonts and row heights in the preview for on-screen density.
    #[serde(default)]
    pub compact: bool,

    /// Trigger the host's print action as soon as the preview has loaded.
    #[serde(default)]
    pub auto_print: bool,

    /// Cap on active checklist columns. `None` uses the whole vocabulary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist_columns: Option<usize>,

    /// Image reference for the header band logo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,

    /// Replaces the fixed note paragraph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_text: Option<String>,

    /// Replaces the fixed footer text. Supports `**bold**` and line breaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_text: Option<String>,

    #[serde(default)]
    pub fetch: FetchOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            header_mode: HeaderMode::Codes,
            pad_rows: true,
            compact: false,
            auto_print: false,
            checklist_columns: None,
            logo: None,
            note_text: None,
            footer_text: None,
            fetch: FetchOptions::default(),
        }
    }
}

impl RenderOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Engine-wide checklist header mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// `CHK-01` .. `CHK-14`.
    #[default]
    Codes,
    /// Full regulatory item description, wrapped.
    Text,
}

/// How the signature image loader reaches remote references.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum concurrent fetches. `1` loads sequentially.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
    /// Whether references may point at local files.
    #[serde(default = "default_true")]
    pub allow_file_paths: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            fan_out: default_fan_out(),
            allow_file_paths: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_fan_out() -> usize {
    4
}
