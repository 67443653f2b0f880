//! # Inspection Records
//!
//! The raw shape of an inspection as the storage layer hands it over, and the
//! single read-only interface the engine needs from that layer. Every field is
//! optional or defaulted: the model builder decides what a missing value looks
//! like, not the parser.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::error::{ReportError, SourceError};

/// An inspection record with its equipment and observation children.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInspection {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub form_code: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub inspector_name: Option<String>,
    #[serde(default)]
    pub inspection_date: Option<InspectionDate>,
    #[serde(default)]
    pub equipment: Vec<RawEquipment>,
    /// Observations recorded explicitly by the inspector.
    #[serde(default)]
    pub observations: Vec<RawObservation>,
    #[serde(default)]
    pub supervisor_name: Option<String>,
    #[serde(default)]
    pub supervisor_signature_url: Option<String>,
    #[serde(default)]
    pub supervisor_signed_at: Option<InspectionDate>,
    #[serde(default)]
    pub mechanic_name: Option<String>,
    #[serde(default)]
    pub mechanic_signature_url: Option<String>,
    #[serde(default)]
    pub mechanic_signed_at: Option<InspectionDate>,
}

impl RawInspection {
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One inspected piece of ground-support equipment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEquipment {
    #[serde(default)]
    pub code: String,
    /// Display time as entered (`HH:MM`, `HH:MM:SS`, or a date-time string).
    #[serde(default)]
    pub hour: Option<String>,
    #[serde(default)]
    pub inspected_at: Option<InspectionDate>,
    /// Item code to recorded outcome.
    #[serde(default)]
    pub checklist: BTreeMap<String, RawCheck>,
    #[serde(default)]
    pub inspector_signature_url: Option<String>,
    /// Advisory ordering hint from the editor. Never used to reorder.
    #[serde(default)]
    pub order_index: Option<i64>,
}

/// A checklist entry: either a bare status or a status with remarks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawCheck {
    Status(String),
    Detailed {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        remarks: Option<String>,
    },
    Blank,
}

impl RawCheck {
    pub fn status(&self) -> Option<&str> {
        match self {
            RawCheck::Status(s) => Some(s),
            RawCheck::Detailed { status, .. } => status.as_deref(),
            RawCheck::Blank => None,
        }
    }

    /// Free-text remarks, if any non-blank text was entered.
    pub fn remarks(&self) -> Option<&str> {
        match self {
            RawCheck::Detailed { remarks: Some(r), .. } if !r.trim().is_empty() => Some(r.trim()),
            _ => None,
        }
    }
}

/// An explicit observation record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObservation {
    #[serde(default)]
    pub item_code: String,
    #[serde(default)]
    pub equipment_code: String,
    #[serde(default)]
    pub operator_text: Option<String>,
    /// `None` until maintenance has answered.
    #[serde(default)]
    pub maintenance_text: Option<String>,
    #[serde(default)]
    pub order_index: Option<i64>,
}

/// A date as it arrives from the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InspectionDate {
    /// `2024-01-05`, `2024-01-05T23:40:00Z`, `05/01/2024 08:15`, ...
    Text(String),
    /// Milliseconds since the Unix epoch.
    EpochMillis(i64),
    /// A structured value already expressed in local calendar fields.
    #[serde(skip)]
    Calendar(NaiveDateTime),
}

/// Read-only access to persisted inspections.
pub trait InspectionSource {
    fn fetch_inspection(&self, id: &str) -> Result<RawInspection, SourceError>;
}

/// Inspections stored as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl InspectionSource for JsonDirSource {
    fn fetch_inspection(&self, id: &str) -> Result<RawInspection, SourceError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(SourceError::NotFound(id.to_string()));
        }
        let path = self.dir.join(format!("{}.json", id));
        let json = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(id.to_string()),
            _ => SourceError::Unavailable(format!("{}: {}", path.display(), e)),
        })?;
        serde_json::from_str(&json)
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", path.display(), e)))
    }
}

/// Inspections held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: HashMap<String, RawInspection>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, inspection: RawInspection) {
        self.records.insert(id.to_string(), inspection);
    }
}

impl InspectionSource for MemorySource {
    fn fetch_inspection(&self, id: &str) -> Result<RawInspection, SourceError> {
        self.records
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checklist_entry_shapes() {
        let eq: RawEquipment = serde_json::from_str(
            r#"{ "code": "TUG-01", "checklist": {
                "CHK-01": "conforme",
                "CHK-02": { "status": "no_conforme", "remarks": "faro roto" },
                "CHK-03": { "remarks": "  " },
                "CHK-04": null
            } }"#,
        )
        .unwrap();
        assert_eq!(eq.checklist["CHK-01"].status(), Some("conforme"));
        assert_eq!(eq.checklist["CHK-02"].remarks(), Some("faro roto"));
        assert_eq!(eq.checklist["CHK-03"].remarks(), None);
        assert_eq!(eq.checklist["CHK-03"].status(), None);
        assert_eq!(eq.checklist["CHK-04"], RawCheck::Blank);
    }

    #[test]
    fn test_dates_deserialize_as_text_or_millis() {
        let raw: RawInspection = serde_json::from_str(
            r#"{ "inspection_date": "2024-01-05", "supervisor_signed_at": 1704412800000 }"#,
        )
        .unwrap();
        assert_eq!(raw.inspection_date, Some(InspectionDate::Text("2024-01-05".into())));
        assert_eq!(raw.supervisor_signed_at, Some(InspectionDate::EpochMillis(1704412800000)));
    }

    #[test]
    fn test_memory_source_not_found() {
        let mut source = MemorySource::new();
        source.insert("a1", RawInspection::default());
        assert!(source.fetch_inspection("a1").is_ok());
        assert!(matches!(source.fetch_inspection("b2"), Err(SourceError::NotFound(id)) if id == "b2"));
    }

    #[test]
    fn test_json_dir_source_rejects_paths() {
        let source = JsonDirSource::new(std::env::temp_dir());
        assert!(matches!(
            source.fetch_inspection("../etc/passwd"),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_json_dir_source_reads_file() {
        let dir = std::env::temp_dir().join(format!("planilla_source_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("insp-7.json"), r#"{ "station": "LIM" }"#).unwrap();
        let raw = JsonDirSource::new(&dir).fetch_inspection("insp-7").unwrap();
        assert_eq!(raw.station.as_deref(), Some("LIM"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
