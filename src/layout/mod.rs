//! # Matrix Layout Engine
//!
//! Turns a [`ReportModel`] into the renderer-agnostic description of the
//! printed form: the header band, the checklist matrix columns, an ordered
//! list of typed rows with pre-formatted cell strings, and the two signature
//! blocks.
//!
//! Every string either renderer prints comes out of this module, already
//! reduced by [`text::printable`] to what the standard PDF fonts can draw.
//! The preview and the export renderer only decide *where* a cell goes,
//! never *what* it says.
//!
//! ## Row order
//!
//! ```text
//! Legend
//! Equipment x max(N, 17)      (padded) | equipment with content (unpadded)
//! Spacer
//! Note
//! ObservationHeader
//! Observation x max(M, 7)     (padded) | observations with text (unpadded)
//! Spacer
//! Footer
//! ```

pub mod markup;

use tracing::debug;

use crate::checklist::{status_mark, ChecklistVocabulary};
use crate::config::{HeaderMode, RenderOptions};
use crate::model::{dates::MISSING, Equipment, Observation, ReportModel};
use crate::text::{self, Face};

pub use markup::{MarkupLine, Span};

/// A4 landscape, in points.
pub const PAGE_WIDTH: f64 = 841.89;
pub const PAGE_HEIGHT: f64 = 595.28;
pub const MARGIN: f64 = 20.0;
pub const TABLE_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;

pub const CODE_COLUMN_WIDTH: f64 = 64.0;
pub const HOUR_COLUMN_WIDTH: f64 = 40.0;
pub const SIGNATURE_COLUMN_WIDTH: f64 = 96.0;

pub const OBSERVATION_EQUIPMENT_WIDTH: f64 = 80.0;
pub const OBSERVATION_ITEM_WIDTH: f64 = 70.0;

/// Rows pre-printed on the paper form.
pub const MIN_EQUIPMENT_ROWS: usize = 17;
pub const MIN_OBSERVATION_ROWS: usize = 7;

/// Equipment code of a padding row.
pub const EQUIPMENT_PLACEHOLDER: &str = "-";
/// Equipment cell of a padding observation row.
pub const OBSERVATION_PLACEHOLDER: &str = "EQ-";

/// Font size and inner padding used when wrapping checklist header text.
pub const HEADER_FONT_SIZE: f64 = 5.5;
pub const CELL_PADDING: f64 = 2.0;

pub const SUPERVISOR_CAPTION: &str = "SUPERVISOR";
pub const MECHANIC_CAPTION: &str = "MECÁNICO";

const CODE_HEADER: &str = "EQUIPO";
const HOUR_HEADER: &str = "HORA";
const SIGNATURE_HEADER: &str = "FIRMA INSPECTOR";
const OBSERVATION_HEADERS: [&str; 4] = [
    "EQUIPO",
    "ÍTEM",
    "OBSERVACIÓN DEL OPERADOR",
    "RESPUESTA DE MANTENIMIENTO",
];

/// The complete, renderer-agnostic description of one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    /// `{form code} {station}`, for window titles and document metadata.
    pub document_title: String,
    pub header: HeaderBand,
    pub header_mode: HeaderMode,
    /// Matrix columns, left to right. Widths sum to [`TABLE_WIDTH`].
    pub columns: Vec<Column>,
    /// Observation table columns. Widths sum to [`TABLE_WIDTH`].
    pub observation_columns: Vec<Column>,
    pub rows: Vec<MatrixRow>,
    pub signatures: Vec<SignatureBlock>,
    /// Image reference for the logo slot of the header band.
    pub logo: Option<String>,
}

/// Title, form identification box and the metadata line.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBand {
    pub title: String,
    /// `Código`, `Versión` and `Fecha de emisión` rows of the box.
    pub form_box: [String; 3],
    pub meta_line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Code,
    Hour,
    /// Index into the vocabulary.
    Checklist(usize),
    Signature,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub kind: ColumnKind,
    pub header: String,
    /// The header as printed: one line in codes mode, wrapped in text mode.
    pub header_lines: Vec<String>,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Legend,
    Note,
    Footer,
}

/// One row of the printed form.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixRow {
    Equipment {
        code: String,
        hour: String,
        /// One mark per active checklist column.
        marks: Vec<String>,
        signature: Option<String>,
        placeholder: bool,
    },
    Spacer,
    ObservationHeader {
        cells: Vec<String>,
    },
    Observation {
        cells: Vec<String>,
        placeholder: bool,
    },
    Text {
        kind: TextKind,
        lines: Vec<MarkupLine>,
    },
}

impl MatrixRow {
    /// The printed text of every cell, left to right. Image cells contribute
    /// nothing, text rows contribute one entry per line.
    pub fn cell_text(&self) -> Vec<String> {
        match self {
            MatrixRow::Equipment {
                code, hour, marks, ..
            } => {
                let mut cells = Vec::with_capacity(marks.len() + 2);
                cells.push(code.clone());
                cells.push(hour.clone());
                cells.extend(marks.iter().cloned());
                cells
            }
            MatrixRow::Spacer => Vec::new(),
            MatrixRow::ObservationHeader { cells } | MatrixRow::Observation { cells, .. } => {
                cells.clone()
            }
            MatrixRow::Text { lines, .. } => lines.iter().map(MarkupLine::plain_text).collect(),
        }
    }
}

/// Supervisor or mechanic sign-off.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureBlock {
    pub caption: String,
    pub name: String,
    /// Empty when unsigned.
    pub signed_at: String,
    pub image_ref: Option<String>,
}

impl ReportLayout {
    /// Every image reference the report draws, in drawing order: logo,
    /// equipment signatures, then sign-off signatures. May repeat.
    pub fn image_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        if let Some(logo) = &self.logo {
            refs.push(logo.as_str());
        }
        for row in &self.rows {
            if let MatrixRow::Equipment {
                signature: Some(sig),
                ..
            } = row
            {
                refs.push(sig.as_str());
            }
        }
        refs.extend(self.signatures.iter().filter_map(|s| s.image_ref.as_deref()));
        refs
    }

    pub fn equipment_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, MatrixRow::Equipment { .. }))
            .count()
    }

    pub fn observation_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, MatrixRow::Observation { .. }))
            .count()
    }
}

/// Lay out a report model.
pub fn layout_report(
    model: &ReportModel,
    vocabulary: &ChecklistVocabulary,
    options: &RenderOptions,
) -> ReportLayout {
    let columns = matrix_columns(vocabulary, options);
    let active: Vec<&str> = columns
        .iter()
        .filter_map(|c| match c.kind {
            ColumnKind::Checklist(i) => Some(vocabulary.items()[i].code.as_str()),
            _ => None,
        })
        .collect();

    let mut rows = vec![MatrixRow::Text {
        kind: TextKind::Legend,
        lines: prose(&model.legend_text),
    }];

    let equipment: Vec<&Equipment> = if options.pad_rows {
        model.equipment.iter().collect()
    } else {
        model
            .equipment
            .iter()
            .filter(|e| e.has_content(&active))
            .collect()
    };
    for eq in &equipment {
        rows.push(equipment_row(eq, &active));
    }
    if options.pad_rows {
        for _ in equipment.len()..MIN_EQUIPMENT_ROWS {
            rows.push(MatrixRow::Equipment {
                code: EQUIPMENT_PLACEHOLDER.to_string(),
                hour: String::new(),
                marks: vec![String::new(); active.len()],
                signature: None,
                placeholder: true,
            });
        }
    }

    rows.push(MatrixRow::Spacer);
    rows.push(MatrixRow::Text {
        kind: TextKind::Note,
        lines: prose(&model.note_text),
    });
    rows.push(MatrixRow::ObservationHeader {
        cells: OBSERVATION_HEADERS.iter().map(|h| h.to_string()).collect(),
    });

    let observations: Vec<&Observation> = if options.pad_rows {
        model.observations.iter().collect()
    } else {
        model.observations.iter().filter(|o| o.has_text()).collect()
    };
    for obs in &observations {
        rows.push(MatrixRow::Observation {
            cells: vec![
                text::printable(&obs.equipment_code),
                text::printable(&obs.item_code),
                text::printable(&obs.operator_text),
                text::printable(obs.maintenance_text.as_deref().unwrap_or(MISSING)),
            ],
            placeholder: false,
        });
    }
    if options.pad_rows {
        for _ in observations.len()..MIN_OBSERVATION_ROWS {
            rows.push(MatrixRow::Observation {
                cells: vec![
                    OBSERVATION_PLACEHOLDER.to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                ],
                placeholder: true,
            });
        }
    }

    rows.push(MatrixRow::Spacer);
    rows.push(MatrixRow::Text {
        kind: TextKind::Footer,
        lines: prose(&model.footer_text),
    });

    let layout = ReportLayout {
        document_title: text::printable(format!("{} {}", model.form_code, model.station).trim()),
        header: header_band(model),
        header_mode: options.header_mode,
        columns,
        observation_columns: observation_columns(),
        rows,
        signatures: vec![
            signature_block(SUPERVISOR_CAPTION, &model.supervisor),
            signature_block(MECHANIC_CAPTION, &model.mechanic),
        ],
        logo: options.logo.clone().filter(|l| !l.trim().is_empty()),
    };

    debug!(
        rows = layout.rows.len(),
        equipment_rows = layout.equipment_rows(),
        observation_rows = layout.observation_rows(),
        checklist_columns = active.len(),
        "laid out report"
    );
    layout
}

fn equipment_row(eq: &Equipment, active: &[&str]) -> MatrixRow {
    MatrixRow::Equipment {
        code: text::printable(&eq.code),
        hour: text::printable(&eq.hour),
        marks: active
            .iter()
            .map(|code| text::printable_mark(&status_mark(eq.status(code))))
            .collect(),
        signature: eq.inspector_signature.clone(),
        placeholder: false,
    }
}

/// Number of checklist columns drawn for this vocabulary and options.
pub fn active_checklist_columns(vocabulary: &ChecklistVocabulary, options: &RenderOptions) -> usize {
    let total = vocabulary.len();
    match options.checklist_columns {
        Some(cap) if total > 0 => cap.clamp(1, total),
        _ => total,
    }
}

/// Fixed code, hour and signature columns; the rest of the table width is
/// split evenly across the active checklist columns.
pub fn matrix_columns(vocabulary: &ChecklistVocabulary, options: &RenderOptions) -> Vec<Column> {
    let active = active_checklist_columns(vocabulary, options);
    let remaining = TABLE_WIDTH - CODE_COLUMN_WIDTH - HOUR_COLUMN_WIDTH - SIGNATURE_COLUMN_WIDTH;
    let checklist_width = if active > 0 { remaining / active as f64 } else { 0.0 };

    let mut columns = vec![
        single_line(ColumnKind::Code, CODE_HEADER, CODE_COLUMN_WIDTH),
        single_line(ColumnKind::Hour, HOUR_HEADER, HOUR_COLUMN_WIDTH),
    ];
    for (i, item) in vocabulary.items().iter().take(active).enumerate() {
        let column = match options.header_mode {
            HeaderMode::Codes => {
                single_line(ColumnKind::Checklist(i), &text::printable(&item.code), checklist_width)
            }
            HeaderMode::Text => Column {
                kind: ColumnKind::Checklist(i),
                header: text::printable(&item.description),
                header_lines: text::wrap(
                    &text::printable(&item.description),
                    checklist_width - 2.0 * CELL_PADDING,
                    HEADER_FONT_SIZE,
                    Face::Bold,
                ),
                width: checklist_width,
            },
        };
        columns.push(column);
    }
    let signature_width = if active > 0 {
        SIGNATURE_COLUMN_WIDTH
    } else {
        SIGNATURE_COLUMN_WIDTH + remaining
    };
    columns.push(single_line(ColumnKind::Signature, SIGNATURE_HEADER, signature_width));
    columns
}

fn observation_columns() -> Vec<Column> {
    let text_width = (TABLE_WIDTH - OBSERVATION_EQUIPMENT_WIDTH - OBSERVATION_ITEM_WIDTH) / 2.0;
    vec![
        single_line(ColumnKind::Code, OBSERVATION_HEADERS[0], OBSERVATION_EQUIPMENT_WIDTH),
        single_line(ColumnKind::Text, OBSERVATION_HEADERS[1], OBSERVATION_ITEM_WIDTH),
        single_line(ColumnKind::Text, OBSERVATION_HEADERS[2], text_width),
        single_line(ColumnKind::Text, OBSERVATION_HEADERS[3], text_width),
    ]
}

fn single_line(kind: ColumnKind, header: &str, width: f64) -> Column {
    Column {
        kind,
        header: header.to_string(),
        header_lines: vec![header.to_string()],
        width,
    }
}

fn header_band(model: &ReportModel) -> HeaderBand {
    HeaderBand {
        title: text::printable(&model.title),
        form_box: [
            text::printable(&format!("Código: {}", model.form_code)),
            text::printable(&format!("Versión: {}", model.form_version)),
            text::printable(&format!("Fecha de emisión: {}", model.form_issue_date)),
        ],
        meta_line: text::printable(&format!(
            "Fecha: {}     Inspector: {}     Estación: {}",
            model.inspection_date_display(),
            or_missing(&model.inspector_name),
            or_missing(&model.station),
        )),
    }
}

fn signature_block(caption: &str, sign_off: &crate::model::SignOff) -> SignatureBlock {
    SignatureBlock {
        caption: caption.to_string(),
        name: text::printable(or_missing(&sign_off.name)),
        signed_at: text::printable(&sign_off.signed_at_display()),
        image_ref: sign_off.signature.clone(),
    }
}

fn prose(source: &str) -> Vec<MarkupLine> {
    markup::parse(&text::printable_words(source))
}

fn or_missing(value: &str) -> &str {
    if value.trim().is_empty() {
        MISSING
    } else {
        value
    }
}
