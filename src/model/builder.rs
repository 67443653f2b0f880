//! Canonical model builder.
//!
//! Turns a raw inspection into a [`ReportModel`]. The only non-trivial step
//! is the observation list:
//!
//! - If the inspection carries any explicit observation, that list is the
//!   report's observation list, unchanged and in source order. Nothing is
//!   derived, even for non-compliant items that lack an explicit record.
//! - Otherwise one observation is derived per (equipment, item) pair whose
//!   status is `no_conforme` or that carries remarks, scanning equipment in
//!   source order and items in vocabulary order. Each pair appears once.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};

use super::{
    dates, Equipment, Observation, ObservationOrigin, ReportModel, SignOff, DEFAULT_FILE_PREFIX,
    FOOTER_TEXT, FORM_CODE, FORM_ISSUE_DATE, FORM_VERSION, LEGEND_TEXT, NOTE_TEXT,
    NOT_COMPLIANT_FALLBACK, REPORT_TITLE,
};
use crate::checklist::{CheckStatus, ChecklistVocabulary};
use crate::config::RenderOptions;
use crate::source::{InspectionDate, RawEquipment, RawInspection, RawObservation};

pub(crate) fn build(
    raw: &RawInspection,
    vocabulary: &ChecklistVocabulary,
    options: &RenderOptions,
) -> ReportModel {
    let equipment: Vec<Equipment> = raw
        .equipment
        .iter()
        .map(|eq| build_equipment(eq, vocabulary))
        .collect();

    let observations = if raw.observations.is_empty() {
        derive_observations(&raw.equipment, vocabulary, &HashSet::new())
    } else {
        raw.observations.iter().map(explicit_observation).collect()
    };

    let source_form_code = non_blank(raw.form_code.as_deref());
    let station = text_or_empty(raw.station.as_deref());
    let file_stem = format!(
        "{}_{}",
        source_form_code.unwrap_or(DEFAULT_FILE_PREFIX),
        station
    );

    debug!(
        equipment = equipment.len(),
        observations = observations.len(),
        derived = raw.observations.is_empty(),
        "built report model"
    );

    ReportModel {
        form_code: source_form_code.unwrap_or(FORM_CODE).to_string(),
        form_version: FORM_VERSION.to_string(),
        form_issue_date: FORM_ISSUE_DATE.to_string(),
        title: REPORT_TITLE.to_string(),
        inspection_date: raw.inspection_date.as_ref().and_then(dates::stamp),
        inspector_name: text_or_empty(raw.inspector_name.as_deref()),
        station,
        legend_text: LEGEND_TEXT.to_string(),
        note_text: non_blank(options.note_text.as_deref())
            .unwrap_or(NOTE_TEXT)
            .to_string(),
        footer_text: non_blank(options.footer_text.as_deref())
            .unwrap_or(FOOTER_TEXT)
            .to_string(),
        equipment,
        observations,
        supervisor: sign_off(
            raw.supervisor_name.as_deref(),
            raw.supervisor_signature_url.as_deref(),
            raw.supervisor_signed_at.as_ref(),
        ),
        mechanic: sign_off(
            raw.mechanic_name.as_deref(),
            raw.mechanic_signature_url.as_deref(),
            raw.mechanic_signed_at.as_ref(),
        ),
        file_stem,
    }
}

fn build_equipment(raw: &RawEquipment, vocabulary: &ChecklistVocabulary) -> Equipment {
    let mut checklist = BTreeMap::new();
    for (code, check) in &raw.checklist {
        let Some(status) = check.status().and_then(CheckStatus::parse) else {
            continue;
        };
        if !vocabulary.contains(code) {
            warn!(equipment = %raw.code, code = %code, "checklist code outside vocabulary ignored by matrix");
        }
        if let CheckStatus::Unrecognized(value) = &status {
            warn!(equipment = %raw.code, code = %code, value = %value, "unrecognized checklist status");
        }
        checklist.insert(code.clone(), status);
    }

    let hour = raw
        .hour
        .as_deref()
        .and_then(dates::normalize_hour)
        .or_else(|| dates::display_hour(raw.inspected_at.as_ref()))
        .unwrap_or_default();

    Equipment {
        code: raw.code.trim().to_string(),
        hour,
        checklist,
        inspector_signature: non_blank(raw.inspector_signature_url.as_deref()).map(str::to_string),
    }
}

/// Synthesize observations from checklist data. Pairs already in `existing`
/// are skipped, and each derived pair is added to the seen set so it is
/// produced at most once.
pub fn derive_observations(
    equipment: &[RawEquipment],
    vocabulary: &ChecklistVocabulary,
    existing: &HashSet<(String, String)>,
) -> Vec<Observation> {
    let mut seen = existing.clone();
    let mut derived = Vec::new();

    for eq in equipment {
        let equipment_code = eq.code.trim();
        for item in vocabulary.items() {
            let Some(check) = eq.checklist.get(&item.code) else {
                continue;
            };
            let status = check.status().and_then(CheckStatus::parse);
            let remarks = check.remarks();
            let non_compliant = status == Some(CheckStatus::NoConforme);
            if !non_compliant && remarks.is_none() {
                continue;
            }
            let key = (equipment_code.to_string(), item.code.clone());
            if !seen.insert(key) {
                continue;
            }
            let operator_text = match remarks {
                Some(text) => text.to_string(),
                None if non_compliant => NOT_COMPLIANT_FALLBACK.to_string(),
                None => String::new(),
            };
            derived.push(Observation {
                equipment_code: equipment_code.to_string(),
                item_code: item.code.clone(),
                operator_text,
                maintenance_text: None,
                origin: ObservationOrigin::Derived,
            });
        }
    }

    derived
}

fn explicit_observation(raw: &RawObservation) -> Observation {
    Observation {
        equipment_code: raw.equipment_code.trim().to_string(),
        item_code: raw.item_code.trim().to_string(),
        operator_text: text_or_empty(raw.operator_text.as_deref()),
        maintenance_text: non_blank(raw.maintenance_text.as_deref()).map(str::to_string),
        origin: ObservationOrigin::Explicit,
    }
}

fn sign_off(
    name: Option<&str>,
    signature: Option<&str>,
    signed_at: Option<&InspectionDate>,
) -> SignOff {
    SignOff {
        name: text_or_empty(name),
        signature: non_blank(signature).map(str::to_string),
        signed_at: signed_at.and_then(dates::stamp),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn text_or_empty(value: Option<&str>) -> String {
    non_blank(value).unwrap_or_default().to_string()
}
