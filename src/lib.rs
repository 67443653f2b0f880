//! # Planilla
//!
//! Compliance-report rendering for FOR-ATA-057, the daily inspection form
//! for ground-support equipment.
//!
//! An inspection record goes in; a printable preview page or a standalone
//! PDF comes out. Both outputs are drawn from the same laid-out rows, so a
//! cell reads the same on screen and on paper.
//!
//! ## Architecture
//!
//! ```text
//! Inspection (JSON / InspectionSource)
//!       ↓
//!   [model]         Report Model: normalized dates, derived observations
//!       ↓
//!   [layout]        Matrix rows, columns, header band, signature blocks
//!       ↓
//!   [image_loader]  Every signature loaded once, before composition
//!       ↓                        ↓
//!   [preview]               [export] → [pdf]
//!   HTML print page         page geometry → PDF bytes
//! ```

pub mod checklist;
pub mod config;
pub mod error;
pub mod export;
pub mod image_loader;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod preview;
pub mod source;
pub mod text;

use tracing::debug;

use checklist::ChecklistVocabulary;
use config::RenderOptions;
use error::ReportError;
use export::ExportDocument;
use image_loader::{ImageSet, SignatureLoader};
use layout::ReportLayout;
use model::ReportModel;
use pdf::PdfWriter;
use preview::PreviewDocument;
use source::{InspectionSource, RawInspection};

/// A configured renderer: checklist vocabulary, render options and the
/// image loader they imply.
#[derive(Debug)]
pub struct ReportEngine {
    vocabulary: ChecklistVocabulary,
    options: RenderOptions,
    loader: SignatureLoader,
}

impl ReportEngine {
    pub fn new(options: RenderOptions) -> Self {
        Self::with_vocabulary(ChecklistVocabulary::ata_057(), options)
    }

    pub fn with_vocabulary(vocabulary: ChecklistVocabulary, options: RenderOptions) -> Self {
        let loader = SignatureLoader::new(options.fetch.clone());
        Self {
            vocabulary,
            options,
            loader,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn vocabulary(&self) -> &ChecklistVocabulary {
        &self.vocabulary
    }

    pub fn build_model(&self, raw: &RawInspection) -> ReportModel {
        ReportModel::build(raw, &self.vocabulary, &self.options)
    }

    pub fn layout(&self, model: &ReportModel) -> ReportLayout {
        layout::layout_report(model, &self.vocabulary, &self.options)
    }

    /// Load every image the layout references. Returns only once all loads
    /// have finished.
    pub fn load_images(&self, layout: &ReportLayout) -> ImageSet {
        self.loader.load_set(layout.image_refs())
    }

    pub fn render_preview(&self, model: &ReportModel) -> Result<PreviewDocument, ReportError> {
        let layout = self.layout(model);
        let images = self.load_images(&layout);
        preview::render(&layout, &images, &self.options)
    }

    /// Compose and serialize the PDF.
    pub fn render_export(&self, model: &ReportModel) -> Result<Vec<u8>, ReportError> {
        let (doc, images) = self.compose(model);
        PdfWriter::new().write(&doc, &images)
    }

    /// The composed pages before serialization, with the images they draw.
    pub fn compose(&self, model: &ReportModel) -> (ExportDocument, ImageSet) {
        let layout = self.layout(model);
        let images = self.load_images(&layout);
        let doc = export::compose(&layout, &images);
        (doc, images)
    }

    /// Fetch an inspection and render its preview. Source failures are
    /// returned unchanged and nothing is rendered.
    pub fn preview_inspection(
        &self,
        source: &dyn InspectionSource,
        id: &str,
    ) -> Result<PreviewDocument, ReportError> {
        let raw = source.fetch_inspection(id)?;
        debug!(id, "fetched inspection for preview");
        self.render_preview(&self.build_model(&raw))
    }

    /// Fetch an inspection and export it. Returns the default file name and
    /// the PDF bytes.
    pub fn export_inspection(
        &self,
        source: &dyn InspectionSource,
        id: &str,
    ) -> Result<(String, Vec<u8>), ReportError> {
        let raw = source.fetch_inspection(id)?;
        debug!(id, "fetched inspection for export");
        let model = self.build_model(&raw);
        let bytes = self.render_export(&model)?;
        Ok((export_filename(&model, "pdf"), bytes))
    }
}

impl Default for ReportEngine {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

/// Render the preview page of a model with the standard vocabulary.
pub fn render_preview(model: &ReportModel, options: &RenderOptions) -> Result<PreviewDocument, ReportError> {
    ReportEngine::new(options.clone()).render_preview(model)
}

/// Render a model to PDF bytes with the standard vocabulary.
pub fn render_export(model: &ReportModel, options: &RenderOptions) -> Result<Vec<u8>, ReportError> {
    ReportEngine::new(options.clone()).render_export(model)
}

/// `{form code or "Inspeccion"}_{station}.{ext}`
pub fn export_filename(model: &ReportModel, ext: &str) -> String {
    model.file_name(ext)
}
