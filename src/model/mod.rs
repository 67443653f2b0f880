//! # Report Model
//!
//! The canonical, renderer-agnostic form of one inspection report. It is
//! built fresh for every render request from a [`RawInspection`], read by
//! both renderers, and then dropped. Nothing in here is ever mutated after
//! [`ReportModel::build`] returns.
//!
//! All derivation happens while building: observation synthesis, date and
//! hour normalization, status parsing, placeholder choice. Renderers only
//! copy strings into their medium.

pub mod builder;
pub mod dates;

use std::collections::BTreeMap;

use crate::checklist::{CheckStatus, ChecklistVocabulary};
use crate::config::RenderOptions;
use crate::source::RawInspection;

pub use dates::CalendarStamp;

pub const FORM_CODE: &str = "FOR-ATA-057";
pub const FORM_VERSION: &str = "02";
pub const FORM_ISSUE_DATE: &str = "15/03/2023";
pub const REPORT_TITLE: &str = "INSPECCIÓN DE EQUIPOS DE SERVICIO EN TIERRA";

pub const LEGEND_TEXT: &str = "✓ = CONFORME     X = NO CONFORME     N/A = NO APLICA";

pub const NOTE_TEXT: &str = "NOTA: Todo ítem marcado como NO CONFORME (X) debe registrarse en la \
sección de observaciones y reportarse de inmediato al supervisor de turno. El equipo no podrá \
operar en plataforma hasta que mantenimiento registre la corrección.";

pub const FOOTER_TEXT: &str = "**Declaración del inspector:** la información registrada corresponde \
al estado real de cada equipo al momento de la inspección.\n**Documento controlado:** prohibida su \
reproducción o modificación sin autorización de Calidad.";

/// Operator text of a derived observation for a non-compliant item without remarks.
pub const NOT_COMPLIANT_FALLBACK: &str = "Ítem no conforme";

/// File name prefix when the inspection carries no form code.
pub const DEFAULT_FILE_PREFIX: &str = "Inspeccion";

/// The complete content of one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportModel {
    pub form_code: String,
    pub form_version: String,
    pub form_issue_date: String,
    pub title: String,
    pub inspection_date: Option<CalendarStamp>,
    pub inspector_name: String,
    pub station: String,
    pub legend_text: String,
    pub note_text: String,
    /// Supports `**bold**` and line breaks.
    pub footer_text: String,
    /// In source order.
    pub equipment: Vec<Equipment>,
    /// In source order (explicit) or equipment/item scan order (derived).
    pub observations: Vec<Observation>,
    pub supervisor: SignOff,
    pub mechanic: SignOff,
    /// `{form code or "Inspeccion"}_{station}`
    pub file_stem: String,
}

impl ReportModel {
    /// Normalize a raw inspection into a report model. Never fails: absent
    /// data becomes empty strings or `-` placeholders.
    pub fn build(
        raw: &RawInspection,
        vocabulary: &ChecklistVocabulary,
        options: &RenderOptions,
    ) -> Self {
        builder::build(raw, vocabulary, options)
    }

    /// `dd/mm/yyyy`, or `-`.
    pub fn inspection_date_display(&self) -> String {
        self.inspection_date
            .map(|d| d.date_display())
            .unwrap_or_else(|| dates::MISSING.to_string())
    }

    /// Default export file name.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.file_stem, ext)
    }
}

/// One row of the checklist matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Equipment {
    pub code: String,
    /// `HH:MM`, or empty when no time was recorded.
    pub hour: String,
    /// Item code to outcome. May hold codes outside the vocabulary; the
    /// matrix ignores those.
    pub checklist: BTreeMap<String, CheckStatus>,
    pub inspector_signature: Option<String>,
}

impl Equipment {
    /// Whether anything printable was recorded for this equipment: a status
    /// for one of `item_codes`, a signature or an hour.
    pub fn has_content(&self, item_codes: &[&str]) -> bool {
        item_codes.iter().any(|code| self.checklist.contains_key(*code))
            || self.inspector_signature.is_some()
            || !self.hour.is_empty()
    }

    pub fn status(&self, item_code: &str) -> Option<&CheckStatus> {
        self.checklist.get(item_code)
    }
}

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationOrigin {
    Explicit,
    Derived,
}

/// A remark on one (equipment, item) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub equipment_code: String,
    pub item_code: String,
    pub operator_text: String,
    /// `None` until maintenance answers.
    pub maintenance_text: Option<String>,
    pub origin: ObservationOrigin,
}

impl Observation {
    pub fn has_text(&self) -> bool {
        !self.operator_text.trim().is_empty()
            || self
                .maintenance_text
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
    }
}

/// A signature block at the bottom of the report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignOff {
    pub name: String,
    pub signature: Option<String>,
    pub signed_at: Option<CalendarStamp>,
}

impl SignOff {
    /// `dd/mm/yyyy HH:MM`, or empty when unsigned.
    pub fn signed_at_display(&self) -> String {
        match self.signed_at {
            Some(stamp) => match stamp.hour_display() {
                Some(hour) => format!("{} {}", stamp.date_display(), hour),
                None => stamp.date_display(),
            },
            None => String::new(),
        }
    }
}
