//! # Checklist Vocabulary
//!
//! The FOR-ATA-057 checklist is a fixed, ordered list of 14 inspection
//! points. The table is a versioned value handed to the model builder and the
//! matrix layout rather than a global, so a future form revision is a new
//! table and not a code change.

use std::fmt;

/// Checkmark drawn for a compliant item.
pub const CHECK_MARK: &str = "✓";

/// Longest prefix of an unrecognized status that is shown in a cell.
pub const UNRECOGNIZED_MAX_CHARS: usize = 10;

/// One inspection point of the checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub code: String,
    pub description: String,
}

/// An immutable, ordered checklist table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistVocabulary {
    version: String,
    items: Vec<ChecklistItem>,
}

const ATA_057_V2: [(&str, &str); 14] = [
    ("CHK-01", "Estado general de carrocería y chasis"),
    ("CHK-02", "Luces, balizas y luz estroboscópica"),
    ("CHK-03", "Frenos de servicio y de estacionamiento"),
    ("CHK-04", "Neumáticos, aros y presión de inflado"),
    ("CHK-05", "Fugas de combustible, aceite o hidráulico"),
    ("CHK-06", "Extintor cargado y con inspección vigente"),
    ("CHK-07", "Bocina y alarma de retroceso"),
    ("CHK-08", "Espejos retrovisores y parabrisas"),
    ("CHK-09", "Cinturón de seguridad y asiento"),
    ("CHK-10", "Defensas y protecciones de contacto con aeronave"),
    ("CHK-11", "Sistema de dirección"),
    ("CHK-12", "Controles, instrumentos y paro de emergencia"),
    ("CHK-13", "Identificación y señalización del equipo"),
    ("CHK-14", "Orden y limpieza de cabina y plataforma"),
];

impl ChecklistVocabulary {
    /// Build a vocabulary from `(code, description)` pairs, in column order.
    pub fn new<I, C, D>(version: &str, items: I) -> Self
    where
        I: IntoIterator<Item = (C, D)>,
        C: Into<String>,
        D: Into<String>,
    {
        Self {
            version: version.to_string(),
            items: items
                .into_iter()
                .map(|(code, description)| ChecklistItem {
                    code: code.into(),
                    description: description.into(),
                })
                .collect(),
        }
    }

    /// The table printed on the current revision of FOR-ATA-057.
    pub fn ata_057() -> Self {
        Self::new("FOR-ATA-057/02", ATA_057_V2)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.items.iter().any(|item| item.code == code)
    }
}

impl Default for ChecklistVocabulary {
    fn default() -> Self {
        Self::ata_057()
    }
}

/// Outcome recorded for one checklist item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Conforme,
    NoConforme,
    NoAplica,
    /// A value the form does not define, kept verbatim so it stays visible.
    Unrecognized(String),
}

impl CheckStatus {
    /// Parse a raw status. Blank input means "not inspected" and yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.to_lowercase().as_str() {
            "conforme" => CheckStatus::Conforme,
            "no_conforme" => CheckStatus::NoConforme,
            "no_aplica" => CheckStatus::NoAplica,
            _ => CheckStatus::Unrecognized(trimmed.to_string()),
        })
    }

    /// The cell content for this status.
    pub fn mark(&self) -> String {
        match self {
            CheckStatus::Conforme => CHECK_MARK.to_string(),
            CheckStatus::NoConforme => "X".to_string(),
            CheckStatus::NoAplica => "N/A".to_string(),
            CheckStatus::Unrecognized(raw) => raw.chars().take(UNRECOGNIZED_MAX_CHARS).collect(),
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Conforme => f.write_str("conforme"),
            CheckStatus::NoConforme => f.write_str("no_conforme"),
            CheckStatus::NoAplica => f.write_str("no_aplica"),
            CheckStatus::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Cell content for an optional status; absent renders empty.
pub fn status_mark(status: Option<&CheckStatus>) -> String {
    status.map(CheckStatus::mark).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_fourteen_ordered_codes() {
        let vocab = ChecklistVocabulary::ata_057();
        assert_eq!(vocab.len(), 14);
        let codes: Vec<&str> = vocab.items().iter().map(|i| i.code.as_str()).collect();
        let expected: Vec<String> = (1..=14).map(|n| format!("CHK-{:02}", n)).collect();
        assert_eq!(codes, expected);
        assert!(vocab.contains("CHK-07"));
        assert!(!vocab.contains("CHK-15"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_mark(Some(&CheckStatus::Conforme)), "✓");
        assert_eq!(status_mark(Some(&CheckStatus::NoConforme)), "X");
        assert_eq!(status_mark(Some(&CheckStatus::NoAplica)), "N/A");
        assert_eq!(status_mark(None), "");
    }

    #[test]
    fn test_parse_is_case_and_space_insensitive() {
        assert_eq!(CheckStatus::parse(" Conforme "), Some(CheckStatus::Conforme));
        assert_eq!(CheckStatus::parse("NO_CONFORME"), Some(CheckStatus::NoConforme));
        assert_eq!(CheckStatus::parse("no_aplica"), Some(CheckStatus::NoAplica));
        assert_eq!(CheckStatus::parse("   "), None);
    }

    #[test]
    fn test_unrecognized_status_is_truncated_not_dropped() {
        let status = CheckStatus::parse("pendiente_de_revision").unwrap();
        assert_eq!(status, CheckStatus::Unrecognized("pendiente_de_revision".to_string()));
        assert_eq!(status.mark(), "pendiente_");
        assert_eq!(CheckStatus::parse("ok").unwrap().mark(), "ok");
    }
}
