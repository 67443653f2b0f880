//! # Preview Renderer
//!
//! Renders a [`ReportLayout`] as a single self-contained HTML page sized for
//! A4 landscape. The browser's print dialog is the physical export: the page
//! carries a print button and, in auto-print mode, triggers the dialog once
//! the page has finished loading.
//!
//! Signature images are inlined as data URIs from an already loaded
//! [`ImageSet`], so nothing is fetched after the page is produced and the
//! load event cannot fire ahead of a pending image.

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

use crate::config::{HeaderMode, RenderOptions};
use crate::error::ReportError;
use crate::image_loader::ImageSet;
use crate::layout::{MarkupLine, MatrixRow, ReportLayout, TextKind};
use crate::text;

const TEMPLATE_NAME: &str = "report";
const TEMPLATE: &str = include_str!("report.hbs");

static TEXT_ROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<div class="text-row [a-z]+" data-row="(\d+)">((?:<div class="line">.*?</div>)*)</div>"#).unwrap()
});

static TEXT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<div class="line">(.*?)</div>"#).unwrap());

static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<tr data-row="(\d+)"[^>]*>(.*?)</tr>"#).unwrap());

static TABLE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<t[dh](?: class="([a-z]+)")?>(.*?)</t[dh]>"#).unwrap());

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(?:#x([0-9a-fA-F]+)|#([0-9]+)|(amp|lt|gt|quot|apos|nbsp));").unwrap());

/// A rendered preview page plus the view model it was rendered from.
#[derive(Debug, Clone)]
pub struct PreviewDocument {
    view: PreviewView,
    html: String,
}

impl PreviewDocument {
    pub fn to_html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    pub fn view(&self) -> &PreviewView {
        &self.view
    }

    /// Text of every row as the page shows it, keyed by layout row index.
    /// Read back from the rendered HTML: tags are stripped, entities decoded
    /// and whitespace collapsed the way a browser lays it out. Signature
    /// cells are skipped.
    pub fn table_text(&self) -> Vec<(usize, Vec<String>)> {
        let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
        for caps in TEXT_ROW.captures_iter(&self.html) {
            let lines = TEXT_LINE
                .captures_iter(&caps[2])
                .map(|line| visible_text(&line[1]))
                .collect();
            rows.push((caps[1].parse().unwrap_or_default(), lines));
        }
        for caps in TABLE_ROW.captures_iter(&self.html) {
            let cells = TABLE_CELL
                .captures_iter(&caps[2])
                .filter(|cell| cell.get(1).map(|class| class.as_str()) != Some("signature"))
                .map(|cell| visible_text(&cell[2]))
                .collect();
            rows.push((caps[1].parse().unwrap_or_default(), cells));
        }
        rows.sort_by_key(|(index, _)| *index);
        rows
    }
}

fn visible_text(html: &str) -> String {
    let stripped = TAG.replace_all(html, "");
    let decoded = ENTITY.replace_all(&stripped, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(hex), _, _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec), _) => dec.as_str().parse().ok(),
            (_, _, Some(name)) => Some(match name.as_str() {
                "amp" => '&' as u32,
                "lt" => '<' as u32,
                "gt" => '>' as u32,
                "quot" => '"' as u32,
                "apos" => '\'' as u32,
                _ => 0xA0,
            }),
            _ => None,
        };
        code.and_then(char::from_u32).map(String::from).unwrap_or_default()
    });
    text::collapse_whitespace(&decoded)
}

/// Everything the template reads.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewView {
    pub document_title: String,
    pub title: String,
    pub form_box: Vec<String>,
    pub meta_line: String,
    pub logo: Option<String>,
    pub compact: bool,
    pub auto_print: bool,
    pub columns: Vec<PreviewColumn>,
    pub observation_columns: Vec<PreviewColumn>,
    pub blocks: Vec<PreviewBlock>,
    pub signatures: Vec<PreviewSignature>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewColumn {
    pub header_lines: Vec<String>,
    /// Points, two decimals.
    pub width: String,
    pub wrapped: bool,
}

/// A contiguous run of layout rows drawn as one unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreviewBlock {
    pub text: Option<PreviewText>,
    pub spacer: bool,
    pub matrix: Option<PreviewMatrix>,
    pub observations: Option<PreviewObservations>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewText {
    pub index: usize,
    pub kind: &'static str,
    pub lines: Vec<MarkupLine>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreviewMatrix {
    pub rows: Vec<PreviewRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewObservations {
    pub header: PreviewRow,
    pub rows: Vec<PreviewRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewRow {
    pub index: usize,
    pub cells: Vec<PreviewCell>,
    /// Data URI of the row's signature, when it loaded.
    pub signature: Option<String>,
    pub placeholder: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewCell {
    pub text: String,
    pub mark: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewSignature {
    pub caption: String,
    pub name: String,
    pub signed_at: String,
    pub image: Option<String>,
}

/// Render the preview page.
pub fn render(
    layout: &ReportLayout,
    images: &ImageSet,
    options: &RenderOptions,
) -> Result<PreviewDocument, ReportError> {
    let view = build_view(layout, images, options);

    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    registry
        .register_template_string(TEMPLATE_NAME, TEMPLATE)
        .map_err(|e| ReportError::Render(format!("preview template: {}", e)))?;
    let html = registry
        .render(TEMPLATE_NAME, &view)
        .map_err(|e| ReportError::Render(format!("preview template: {}", e)))?;

    debug!(bytes = html.len(), compact = view.compact, "rendered preview");
    Ok(PreviewDocument { view, html })
}

fn build_view(layout: &ReportLayout, images: &ImageSet, options: &RenderOptions) -> PreviewView {
    let image = |src: Option<&str>| src.and_then(|s| images.get(s)).map(|img| img.data_uri());
    let wrapped = layout.header_mode == HeaderMode::Text;

    let mut blocks: Vec<PreviewBlock> = Vec::new();
    for (index, row) in layout.rows.iter().enumerate() {
        match row {
            MatrixRow::Text { kind, lines } => {
                blocks.push(PreviewBlock {
                    text: Some(PreviewText {
                        index,
                        kind: text_kind(*kind),
                        lines: lines.clone(),
                    }),
                    ..Default::default()
                });
                // The matrix header is drawn even when no equipment row follows.
                if *kind == TextKind::Legend {
                    blocks.push(PreviewBlock {
                        matrix: Some(PreviewMatrix::default()),
                        ..Default::default()
                    });
                }
            }
            MatrixRow::Spacer => blocks.push(PreviewBlock {
                spacer: true,
                ..Default::default()
            }),
            MatrixRow::Equipment {
                code,
                hour,
                marks,
                signature,
                placeholder,
            } => {
                let mut cells = vec![plain(code), plain(hour)];
                cells.extend(marks.iter().map(|m| PreviewCell {
                    text: m.clone(),
                    mark: true,
                }));
                let preview_row = PreviewRow {
                    index,
                    cells,
                    signature: image(signature.as_deref()),
                    placeholder: *placeholder,
                };
                match blocks.last_mut().and_then(|b| b.matrix.as_mut()) {
                    Some(matrix) => matrix.rows.push(preview_row),
                    None => blocks.push(PreviewBlock {
                        matrix: Some(PreviewMatrix {
                            rows: vec![preview_row],
                        }),
                        ..Default::default()
                    }),
                }
            }
            MatrixRow::ObservationHeader { cells } => blocks.push(PreviewBlock {
                observations: Some(PreviewObservations {
                    header: PreviewRow {
                        index,
                        cells: cells.iter().map(|c| plain(c)).collect(),
                        signature: None,
                        placeholder: false,
                    },
                    rows: Vec::new(),
                }),
                ..Default::default()
            }),
            MatrixRow::Observation { cells, placeholder } => {
                let preview_row = PreviewRow {
                    index,
                    cells: cells.iter().map(|c| plain(c)).collect(),
                    signature: None,
                    placeholder: *placeholder,
                };
                if let Some(obs) = blocks.last_mut().and_then(|b| b.observations.as_mut()) {
                    obs.rows.push(preview_row);
                }
            }
        }
    }

    PreviewView {
        document_title: layout.document_title.clone(),
        title: layout.header.title.clone(),
        form_box: layout.header.form_box.to_vec(),
        meta_line: layout.header.meta_line.clone(),
        logo: image(layout.logo.as_deref()),
        compact: options.compact,
        auto_print: options.auto_print,
        columns: layout
            .columns
            .iter()
            .map(|c| PreviewColumn {
                header_lines: c.header_lines.clone(),
                width: format!("{:.2}", c.width),
                wrapped: wrapped && matches!(c.kind, crate::layout::ColumnKind::Checklist(_)),
            })
            .collect(),
        observation_columns: layout
            .observation_columns
            .iter()
            .map(|c| PreviewColumn {
                header_lines: c.header_lines.clone(),
                width: format!("{:.2}", c.width),
                wrapped: false,
            })
            .collect(),
        blocks,
        signatures: layout
            .signatures
            .iter()
            .map(|s| PreviewSignature {
                caption: s.caption.clone(),
                name: s.name.clone(),
                signed_at: s.signed_at.clone(),
                image: image(s.image_ref.as_deref()),
            })
            .collect(),
    }
}

fn plain(text: &str) -> PreviewCell {
    PreviewCell {
        text: text.to_string(),
        mark: false,
    }
}

fn text_kind(kind: TextKind) -> &'static str {
    match kind {
        TextKind::Legend => "legend",
        TextKind::Note => "note",
        TextKind::Footer => "footer",
    }
}
