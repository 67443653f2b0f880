//! # Export Composition
//!
//! Places a [`ReportLayout`] on fixed A4-landscape pages as a flat list of
//! draw operations for the PDF serializer. Coordinates are in points with
//! the origin at the top-left corner of the page; the serializer flips them.
//!
//! The page is filled top to bottom: header band, metadata line, legend,
//! checklist matrix, note, observation table, footer, signatures. The
//! matrix and the observation table never split. The only page break is
//! before the signatures block: when it does not fit below the footer, a new
//! page is opened, the header band is redrawn, and the signatures go there.

use tracing::{debug, warn};

use crate::checklist::CHECK_MARK;
use crate::image_loader::ImageSet;
use crate::layout::{
    Column, ColumnKind, HeaderBand, MarkupLine, MatrixRow, ReportLayout, SignatureBlock, TextKind,
    CELL_PADDING, HEADER_FONT_SIZE, MARGIN, PAGE_HEIGHT, PAGE_WIDTH, TABLE_WIDTH,
};
use crate::text::{self, Face};

pub const BAND_HEIGHT: f64 = 54.0;
pub const LOGO_BOX_WIDTH: f64 = 110.0;
pub const FORM_BOX_WIDTH: f64 = 150.0;
pub const TITLE_FONT_SIZE: f64 = 11.0;
pub const META_FONT_SIZE: f64 = 8.0;

pub const ROW_HEIGHT: f64 = 13.0;
pub const HEADER_ROW_HEIGHT: f64 = 14.0;
pub const CELL_FONT_SIZE: f64 = 6.5;
pub const CELL_LINE_HEIGHT: f64 = 8.0;
pub const PROSE_FONT_SIZE: f64 = 6.0;
pub const PROSE_LINE_HEIGHT: f64 = 8.0;
pub const LEGEND_FONT_SIZE: f64 = 7.0;
pub const SPACER_HEIGHT: f64 = 8.0;

pub const SIGNATURE_BLOCK_HEIGHT: f64 = 68.0;
pub const SIGNATURE_BLOCK_WIDTH: f64 = 220.0;
pub const SIGNATURE_IMAGE_HEIGHT: f64 = 34.0;

const HEADER_FILL: f64 = 0.9;

/// A composed, paginated report ready for serialization.
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub title: String,
    pub pages: Vec<ExportPage>,
    cells: Vec<(usize, Vec<String>)>,
}

impl ExportDocument {
    /// Text of every row as drawn, keyed by layout row index. A cell is the
    /// text of the draw operations inside it, read left to right; runs that
    /// do not touch are joined with one space.
    pub fn table_text(&self) -> Vec<(usize, Vec<String>)> {
        self.cells.clone()
    }
}

#[derive(Debug, Clone)]
pub struct ExportPage {
    pub width: f64,
    pub height: f64,
    pub ops: Vec<DrawOp>,
}

impl ExportPage {
    fn new() -> Self {
        Self {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            ops: Vec::new(),
        }
    }
}

/// One primitive drawing operation. `y` of text is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f64,
        y: f64,
        size: f64,
        face: Face,
        text: String,
    },
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        /// Gray level of the fill, `None` for outline only.
        fill: Option<f64>,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        width: f64,
    },
    Image {
        /// Slot in the [`ImageSet`] the document was composed with.
        slot: usize,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    },
}

/// Whether a block goes on the current page or the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDecision {
    Place,
    MoveToNextPage,
}

pub fn decide_break(cursor: f64, block_height: f64) -> BreakDecision {
    if cursor + block_height <= PAGE_HEIGHT - MARGIN {
        BreakDecision::Place
    } else {
        BreakDecision::MoveToNextPage
    }
}

struct Composer<'a> {
    layout: &'a ReportLayout,
    images: &'a ImageSet,
    pages: Vec<ExportPage>,
    cells: Vec<(usize, Vec<String>)>,
    cursor: f64,
    overflow_reported: bool,
}

/// Compose the export pages. Images must already be loaded.
pub fn compose(layout: &ReportLayout, images: &ImageSet) -> ExportDocument {
    let mut composer = Composer {
        layout,
        images,
        pages: vec![ExportPage::new()],
        cells: Vec::new(),
        cursor: MARGIN,
        overflow_reported: false,
    };

    composer.header_band(&layout.header);
    composer.meta_line(&layout.header.meta_line);
    for (index, row) in layout.rows.iter().enumerate() {
        composer.row(index, row);
    }
    composer.signatures(&layout.signatures);

    debug!(pages = composer.pages.len(), "composed export document");
    ExportDocument {
        title: layout.document_title.clone(),
        pages: composer.pages,
        cells: composer.cells,
    }
}

impl Composer<'_> {
    fn ops(&mut self) -> &mut Vec<DrawOp> {
        // `pages` starts non-empty and only grows.
        let last = self.pages.len() - 1;
        &mut self.pages[last].ops
    }

    fn op_count(&self) -> usize {
        self.pages.last().map_or(0, |page| page.ops.len())
    }

    /// Text drawn on the current page since op `start`.
    fn drawn_since(&self, start: usize) -> String {
        let Some(page) = self.pages.last() else {
            return String::new();
        };
        let mut out = String::new();
        // (baseline, right edge) of the previous run
        let mut previous: Option<(f64, f64)> = None;
        for op in &page.ops[start..] {
            let DrawOp::Text {
                x,
                y,
                size,
                face,
                text,
            } = op
            else {
                continue;
            };
            if let Some((baseline, end)) = previous {
                if (baseline - y).abs() > 0.01 || *x > end + 0.01 {
                    out.push(' ');
                }
            }
            out.push_str(text);
            previous = Some((*y, x + text::text_width(text, *size, *face)));
        }
        text::collapse_whitespace(&out)
    }

    fn text(&mut self, x: f64, y: f64, size: f64, face: Face, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ops().push(DrawOp::Text {
            x,
            y,
            size,
            face,
            text: text.to_string(),
        });
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: Option<f64>) {
        self.ops().push(DrawOp::Rect { x, y, w, h, fill });
    }

    fn centered(&mut self, x: f64, w: f64, baseline: f64, size: f64, face: Face, text: &str) {
        let tw = text::text_width(text, size, face);
        self.text(x + (w - tw) / 2.0, baseline, size, face, text);
    }

    /// Baseline that centers one line of `size` text in a box.
    fn middle(top: f64, h: f64, size: f64) -> f64 {
        top + (h + size * 0.7) / 2.0
    }

    /// Draw a referenced image fitted into a box. A reference that failed to
    /// load leaves an empty rectangle; no reference leaves nothing.
    fn image(&mut self, src: Option<&str>, x: f64, y: f64, w: f64, h: f64) {
        let Some(src) = src else {
            return;
        };
        let images = self.images;
        let (slot, img) = match images.slot(src) {
            Some(slot) => (slot, images.by_slot(slot)),
            None => (0, None),
        };
        match img {
            Some(img) if img.width_px > 0 && img.height_px > 0 => {
                let scale = (w / img.width_px as f64).min(h / img.height_px as f64);
                let iw = img.width_px as f64 * scale;
                let ih = img.height_px as f64 * scale;
                self.ops().push(DrawOp::Image {
                    slot,
                    x: x + (w - iw) / 2.0,
                    y: y + (h - ih) / 2.0,
                    w: iw,
                    h: ih,
                });
            }
            _ => self.rect(x, y, w, h, None),
        }
    }

    fn header_band(&mut self, band: &HeaderBand) {
        let top = MARGIN;
        let x = MARGIN;
        self.rect(x, top, TABLE_WIDTH, BAND_HEIGHT, None);
        self.rect(x, top, LOGO_BOX_WIDTH, BAND_HEIGHT, None);
        let layout = self.layout;
        self.image(
            layout.logo.as_deref(),
            x + 5.0,
            top + 4.0,
            LOGO_BOX_WIDTH - 10.0,
            BAND_HEIGHT - 8.0,
        );

        let title_x = x + LOGO_BOX_WIDTH;
        let title_w = TABLE_WIDTH - LOGO_BOX_WIDTH - FORM_BOX_WIDTH;
        self.centered(
            title_x,
            title_w,
            Self::middle(top, BAND_HEIGHT, TITLE_FONT_SIZE),
            TITLE_FONT_SIZE,
            Face::Bold,
            &band.title,
        );

        let box_x = x + TABLE_WIDTH - FORM_BOX_WIDTH;
        let row_h = BAND_HEIGHT / band.form_box.len() as f64;
        for (i, line) in band.form_box.iter().enumerate() {
            let row_top = top + i as f64 * row_h;
            self.rect(box_x, row_top, FORM_BOX_WIDTH, row_h, None);
            self.text(box_x + 4.0, Self::middle(row_top, row_h, 7.0), 7.0, Face::Regular, line);
        }
        self.cursor = top + BAND_HEIGHT;
    }

    fn meta_line(&mut self, line: &str) {
        let baseline = self.cursor + 12.0;
        self.text(MARGIN, baseline, META_FONT_SIZE, Face::Regular, line);
        self.cursor = baseline + 6.0;
    }

    fn advance(&mut self, height: f64) {
        self.cursor += height;
        if self.cursor > PAGE_HEIGHT - MARGIN && !self.overflow_reported {
            warn!(
                overflow_pt = self.cursor - (PAGE_HEIGHT - MARGIN),
                "report content overflows the page"
            );
            self.overflow_reported = true;
        }
    }

    fn row(&mut self, index: usize, row: &MatrixRow) {
        let cells = match row {
            MatrixRow::Text { kind, lines } => {
                let drawn = self.prose(*kind, lines);
                if *kind == TextKind::Legend {
                    self.matrix_header();
                }
                drawn
            }
            MatrixRow::Spacer => {
                self.advance(SPACER_HEIGHT);
                Vec::new()
            }
            MatrixRow::Equipment {
                code,
                hour,
                marks,
                signature,
                ..
            } => self.equipment_row(code, hour, marks, signature.as_deref()),
            MatrixRow::ObservationHeader { cells } => self.observation_header(cells),
            MatrixRow::Observation { cells, .. } => self.observation_row(cells),
        };
        if !cells.is_empty() {
            self.cells.push((index, cells));
        }
    }

    /// Returns the drawn text of each markup line.
    fn prose(&mut self, kind: TextKind, lines: &[MarkupLine]) -> Vec<String> {
        let (size, line_height, force_bold) = match kind {
            TextKind::Legend => (LEGEND_FONT_SIZE, 9.0, true),
            TextKind::Note | TextKind::Footer => (PROSE_FONT_SIZE, PROSE_LINE_HEIGHT, false),
        };
        let top = self.cursor + 2.0;
        let mut printed = 0usize;
        let mut drawn = Vec::with_capacity(lines.len());
        for line in lines {
            let start = self.op_count();
            printed += self.flow_line(line, top + printed as f64 * line_height, line_height, size, force_bold);
            drawn.push(self.drawn_since(start));
        }
        self.advance(printed as f64 * line_height + 4.0);
        drawn
    }

    /// Flow one markup line word by word across the table width. Returns the
    /// number of printed lines.
    fn flow_line(&mut self, line: &MarkupLine, top: f64, line_height: f64, size: f64, force_bold: bool) -> usize {
        let mut printed = 1usize;
        let mut x = MARGIN;
        for span in &line.spans {
            let weight = if span.bold || force_bold { Face::Bold } else { Face::Regular };
            for word in span.text.split_inclusive(' ') {
                let face = if word.trim_end() == CHECK_MARK { Face::Symbol } else { weight };
                let w = text::text_width(word, size, face);
                let visible = text::text_width(word.trim_end(), size, face);
                if x > MARGIN && x + visible > MARGIN + TABLE_WIDTH {
                    printed += 1;
                    x = MARGIN;
                }
                let baseline = top + (printed - 1) as f64 * line_height + size;
                self.text(x, baseline, size, face, word.trim_end());
                x += w;
            }
        }
        printed
    }

    fn matrix_header(&mut self) {
        let layout = self.layout;
        let columns = &layout.columns;
        let max_lines = columns.iter().map(|c| c.header_lines.len()).max().unwrap_or(1);
        let height = HEADER_ROW_HEIGHT.max(max_lines as f64 * (HEADER_FONT_SIZE + 1.0) + 2.0 * CELL_PADDING);
        let top = self.cursor;
        let mut x = MARGIN;
        for column in columns {
            self.rect(x, top, column.width, height, Some(HEADER_FILL));
            self.header_cell(column, x, top, height);
            x += column.width;
        }
        self.advance(height);
    }

    /// Single-line headers are centered; wrapped checklist descriptions sit
    /// on the bottom edge.
    fn header_cell(&mut self, column: &Column, x: f64, top: f64, height: f64) {
        if column.header_lines.len() <= 1 {
            let label = column.header_lines.first().map(String::as_str).unwrap_or("");
            self.centered(x, column.width, Self::middle(top, height, CELL_FONT_SIZE), CELL_FONT_SIZE, Face::Bold, label);
            return;
        }
        let line_height = HEADER_FONT_SIZE + 1.0;
        let block = column.header_lines.len() as f64 * line_height;
        let mut baseline = top + height - CELL_PADDING - block + HEADER_FONT_SIZE;
        for line in &column.header_lines {
            self.centered(x, column.width, baseline, HEADER_FONT_SIZE, Face::Bold, line);
            baseline += line_height;
        }
    }

    fn equipment_row(&mut self, code: &str, hour: &str, marks: &[String], signature: Option<&str>) -> Vec<String> {
        let top = self.cursor;
        let mut drawn = Vec::with_capacity(marks.len() + 2);
        let baseline = Self::middle(top, ROW_HEIGHT, CELL_FONT_SIZE);
        let mut x = MARGIN;
        let mut marks = marks.iter();
        let layout = self.layout;
        for column in &layout.columns {
            self.rect(x, top, column.width, ROW_HEIGHT, None);
            let start = self.op_count();
            match column.kind {
                ColumnKind::Code | ColumnKind::Text => {
                    self.text(x + CELL_PADDING, baseline, CELL_FONT_SIZE, Face::Regular, code)
                }
                ColumnKind::Hour => self.centered(x, column.width, baseline, CELL_FONT_SIZE, Face::Regular, hour),
                ColumnKind::Checklist(_) => {
                    if let Some(mark) = marks.next() {
                        let face = if mark == CHECK_MARK { Face::Symbol } else { Face::Regular };
                        self.centered(x, column.width, baseline, CELL_FONT_SIZE, face, mark);
                    }
                }
                ColumnKind::Signature => {
                    self.image(signature, x + 1.0, top + 1.0, column.width - 2.0, ROW_HEIGHT - 2.0)
                }
            }
            if column.kind != ColumnKind::Signature {
                drawn.push(self.drawn_since(start));
            }
            x += column.width;
        }
        self.advance(ROW_HEIGHT);
        drawn
    }

    fn observation_header(&mut self, cells: &[String]) -> Vec<String> {
        let top = self.cursor;
        let mut x = MARGIN;
        let mut drawn = Vec::with_capacity(cells.len());
        let layout = self.layout;
        for (column, cell) in layout.observation_columns.iter().zip(cells) {
            self.rect(x, top, column.width, HEADER_ROW_HEIGHT, Some(HEADER_FILL));
            let start = self.op_count();
            self.centered(
                x,
                column.width,
                Self::middle(top, HEADER_ROW_HEIGHT, CELL_FONT_SIZE),
                CELL_FONT_SIZE,
                Face::Bold,
                cell,
            );
            drawn.push(self.drawn_since(start));
            x += column.width;
        }
        self.advance(HEADER_ROW_HEIGHT);
        drawn
    }

    fn observation_row(&mut self, cells: &[String]) -> Vec<String> {
        let layout = self.layout;
        let columns = &layout.observation_columns;
        let wrapped: Vec<Vec<String>> = columns
            .iter()
            .zip(cells)
            .map(|(column, cell)| text::wrap(cell, column.width - 2.0 * CELL_PADDING, CELL_FONT_SIZE, Face::Regular))
            .collect();
        let max_lines = wrapped.iter().map(Vec::len).max().unwrap_or(0);
        let height = ROW_HEIGHT.max(max_lines as f64 * CELL_LINE_HEIGHT + 5.0);

        let top = self.cursor;
        let mut x = MARGIN;
        let mut drawn = Vec::with_capacity(wrapped.len());
        for (column, lines) in columns.iter().zip(&wrapped) {
            self.rect(x, top, column.width, height, None);
            let start = self.op_count();
            let mut baseline = if lines.len() <= 1 {
                Self::middle(top, height, CELL_FONT_SIZE)
            } else {
                top + 2.5 + CELL_FONT_SIZE
            };
            for line in lines {
                self.text(x + CELL_PADDING, baseline, CELL_FONT_SIZE, Face::Regular, line);
                baseline += CELL_LINE_HEIGHT;
            }
            drawn.push(self.drawn_since(start));
            x += column.width;
        }
        self.advance(height);
        drawn
    }

    fn signatures(&mut self, blocks: &[SignatureBlock]) {
        if decide_break(self.cursor, SIGNATURE_BLOCK_HEIGHT) == BreakDecision::MoveToNextPage {
            debug!(cursor = self.cursor, "signatures moved to a new page");
            self.pages.push(ExportPage::new());
            let layout = self.layout;
            self.header_band(&layout.header);
            self.cursor += 10.0;
        }

        let top = self.cursor + 6.0;
        let slot_width = TABLE_WIDTH / blocks.len().max(1) as f64;
        for (i, block) in blocks.iter().enumerate() {
            let x = MARGIN + i as f64 * slot_width + (slot_width - SIGNATURE_BLOCK_WIDTH) / 2.0;
            self.image(
                block.image_ref.as_deref(),
                x + 10.0,
                top,
                SIGNATURE_BLOCK_WIDTH - 20.0,
                SIGNATURE_IMAGE_HEIGHT,
            );
            let rule_y = top + SIGNATURE_IMAGE_HEIGHT + 2.0;
            self.ops().push(DrawOp::Line {
                x1: x,
                y1: rule_y,
                x2: x + SIGNATURE_BLOCK_WIDTH,
                y2: rule_y,
                width: 0.8,
            });
            self.centered(x, SIGNATURE_BLOCK_WIDTH, rule_y + 9.0, 7.0, Face::Regular, &block.name);
            self.centered(x, SIGNATURE_BLOCK_WIDTH, rule_y + 17.0, 7.0, Face::Bold, &block.caption);
            self.centered(x, SIGNATURE_BLOCK_WIDTH, rule_y + 25.0, 6.0, Face::Regular, &block.signed_at);
        }
        self.cursor += SIGNATURE_BLOCK_HEIGHT;
    }
}
