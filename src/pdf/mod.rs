//! # PDF Serializer
//!
//! Writes a composed [`ExportDocument`] as a PDF 1.7 file. The writer is
//! hand-rolled: every page uses the same three standard Type1 fonts, so no
//! font program is ever embedded and the object graph stays small.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- Catalog
//! 2 0 obj ... endobj  <- Pages
//! 3..5                <- F0 Helvetica, F1 Helvetica-Bold, F2 ZapfDingbats
//! ...                 <- image XObjects, then content stream + page per page
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object and /Info
//! %%EOF
//! ```
//!
//! Text is encoded as WinAnsi with octal escapes for the upper half, so
//! accented Spanish text survives without a font program. The check mark is
//! drawn from ZapfDingbats.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use miniz_oxide::deflate::compress_to_vec_zlib;
use tracing::debug;

use crate::error::ReportError;
use crate::export::{DrawOp, ExportDocument, ExportPage};
use crate::image_loader::{ImagePixelData, ImageSet, JpegColorSpace, LoadedImage};
use crate::text::{unicode_to_winansi, Face};

pub const PRODUCER: &str = "planilla";

const FONTS: [(&str, &str); 3] = [
    ("F0", "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"),
    ("F1", "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"),
    ("F2", "<< /Type /Font /Subtype /Type1 /BaseFont /ZapfDingbats >>"),
];

#[derive(Debug, Default)]
pub struct PdfWriter;

struct PdfBuilder {
    objects: Vec<PdfObject>,
    /// Image set slot to XObject id.
    image_objects: HashMap<usize, usize>,
}

struct PdfObject {
    data: Vec<u8>,
}

impl PdfBuilder {
    fn push(&mut self, data: Vec<u8>) -> usize {
        let id = self.objects.len();
        self.objects.push(PdfObject { data });
        id
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Serialize every page of `doc`. Image ops refer to slots in `images`,
    /// which must be the set the document was composed with.
    pub fn write(&self, doc: &ExportDocument, images: &ImageSet) -> Result<Vec<u8>, ReportError> {
        if doc.pages.is_empty() {
            return Err(ReportError::Render("export document has no pages".to_string()));
        }

        // 0 = placeholder (PDF objects are 1-indexed), 1 = Catalog, 2 = Pages
        let mut builder = PdfBuilder {
            objects: Vec::new(),
            image_objects: HashMap::new(),
        };
        for _ in 0..3 {
            builder.push(Vec::new());
        }

        let font_ids: Vec<usize> = FONTS
            .iter()
            .map(|(_, dict)| builder.push(dict.as_bytes().to_vec()))
            .collect();
        let font_resources = FONTS
            .iter()
            .zip(&font_ids)
            .map(|((name, _), id)| format!("/{} {} 0 R", name, id))
            .collect::<Vec<_>>()
            .join(" ");

        self.register_images(&mut builder, doc, images)?;

        let mut page_obj_ids: Vec<usize> = Vec::new();
        for page in &doc.pages {
            let content = self.build_content_stream(page, &builder);
            let compressed = compress_to_vec_zlib(content.as_bytes(), 6);

            let mut content_data: Vec<u8> = Vec::new();
            write!(
                content_data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            )?;
            content_data.extend_from_slice(&compressed);
            content_data.extend_from_slice(b"\nendstream");
            let content_obj_id = builder.push(content_data);

            let xobjects = Self::build_xobject_resource_dict(page, &builder);
            let resources = if xobjects.is_empty() {
                format!("/Font << {} >>", font_resources)
            } else {
                format!("/Font << {} >> /XObject << {} >>", font_resources, xobjects)
            };
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << {} >> >>",
                page.width, page.height, content_obj_id, resources
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let mut info = String::from("<< ");
        if !doc.title.is_empty() {
            let _ = write!(info, "/Title ({}) ", encode_winansi(&doc.title));
        }
        let _ = write!(info, "/Producer ({}) /Creator ({}) >>", PRODUCER, PRODUCER);
        let info_obj_id = builder.push(info.into_bytes());

        let bytes = self.serialize(&builder, info_obj_id)?;
        debug!(
            pages = page_obj_ids.len(),
            images = builder.image_objects.len(),
            bytes = bytes.len(),
            "wrote pdf"
        );
        Ok(bytes)
    }

    /// Write one XObject per image slot drawn anywhere in the document.
    fn register_images(
        &self,
        builder: &mut PdfBuilder,
        doc: &ExportDocument,
        images: &ImageSet,
    ) -> Result<(), ReportError> {
        let slots: BTreeSet<usize> = doc
            .pages
            .iter()
            .flat_map(|p| &p.ops)
            .filter_map(|op| match op {
                DrawOp::Image { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect();
        for slot in slots {
            let image = images.by_slot(slot).ok_or_else(|| {
                ReportError::Render(format!("image slot {} was drawn but never loaded", slot))
            })?;
            let obj_id = Self::write_image_xobject(builder, image)?;
            builder.image_objects.insert(slot, obj_id);
        }
        Ok(())
    }

    /// Write a single image as one or two XObject PDF objects.
    /// Returns the main XObject ID.
    fn write_image_xobject(builder: &mut PdfBuilder, image: &LoadedImage) -> Result<usize, ReportError> {
        match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let color_space_str = match color_space {
                    JpegColorSpace::DeviceRGB => "/DeviceRGB",
                    JpegColorSpace::DeviceGray => "/DeviceGray",
                };
                let mut obj_data: Vec<u8> = Vec::new();
                write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace {} \
                     /BitsPerComponent 8 \
                     /Filter /DCTDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    color_space_str,
                    data.len()
                )?;
                obj_data.extend_from_slice(data);
                obj_data.extend_from_slice(b"\nendstream");
                Ok(builder.push(obj_data))
            }

            ImagePixelData::Decoded { rgb, alpha } => {
                let smask_id = match alpha {
                    Some(alpha_data) => {
                        let compressed_alpha = compress_to_vec_zlib(alpha_data, 6);
                        let mut smask_data: Vec<u8> = Vec::new();
                        write!(
                            smask_data,
                            "<< /Type /XObject /Subtype /Image \
                             /Width {} /Height {} \
                             /ColorSpace /DeviceGray \
                             /BitsPerComponent 8 \
                             /Filter /FlateDecode \
                             /Length {} >>\nstream\n",
                            image.width_px,
                            image.height_px,
                            compressed_alpha.len()
                        )?;
                        smask_data.extend_from_slice(&compressed_alpha);
                        smask_data.extend_from_slice(b"\nendstream");
                        Some(builder.push(smask_data))
                    }
                    None => None,
                };

                let compressed_rgb = compress_to_vec_zlib(rgb, 6);
                let smask_ref = smask_id
                    .map(|id| format!(" /SMask {} 0 R", id))
                    .unwrap_or_default();
                let mut obj_data: Vec<u8> = Vec::new();
                write!(
                    obj_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace /DeviceRGB \
                     /BitsPerComponent 8 \
                     /Filter /FlateDecode \
                     /Length {}{} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    compressed_rgb.len(),
                    smask_ref
                )?;
                obj_data.extend_from_slice(&compressed_rgb);
                obj_data.extend_from_slice(b"\nendstream");
                Ok(builder.push(obj_data))
            }
        }
    }

    /// `/ImN` entries for the images drawn on one page.
    fn build_xobject_resource_dict(page: &ExportPage, builder: &PdfBuilder) -> String {
        let slots: BTreeSet<usize> = page
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect();
        slots
            .iter()
            .filter_map(|slot| {
                builder
                    .image_objects
                    .get(slot)
                    .map(|obj_id| format!("/Im{} {} 0 R", slot, obj_id))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// PDF operators for one page. Composition coordinates run top-down, so
    /// every y is flipped against the page height.
    fn build_content_stream(&self, page: &ExportPage, builder: &PdfBuilder) -> String {
        let mut stream = String::new();
        let page_height = page.height;

        for op in &page.ops {
            match op {
                DrawOp::Text {
                    x,
                    y,
                    size,
                    face,
                    text,
                } => {
                    let encoded = match face {
                        Face::Symbol => encode_dingbats(text),
                        _ => encode_winansi(text),
                    };
                    if encoded.is_empty() {
                        continue;
                    }
                    let _ = write!(
                        stream,
                        "BT\n0 0 0 rg\n/{} {:.1} Tf\n{:.2} {:.2} Td\n({}) Tj\nET\n",
                        font_resource(*face),
                        size,
                        x,
                        page_height - y,
                        encoded
                    );
                }

                DrawOp::Rect { x, y, w, h, fill } => {
                    let pdf_y = page_height - y - h;
                    match fill {
                        Some(gray) => {
                            let _ = write!(
                                stream,
                                "q\n{:.3} g\n0 G\n0.5 w\n{:.2} {:.2} {:.2} {:.2} re\nB\nQ\n",
                                gray, x, pdf_y, w, h
                            );
                        }
                        None => {
                            let _ = write!(
                                stream,
                                "q\n0 G\n0.5 w\n{:.2} {:.2} {:.2} {:.2} re\nS\nQ\n",
                                x, pdf_y, w, h
                            );
                        }
                    }
                }

                DrawOp::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    width,
                } => {
                    let _ = write!(
                        stream,
                        "q\n0 G\n{:.2} w\n{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ\n",
                        width,
                        x1,
                        page_height - y1,
                        x2,
                        page_height - y2
                    );
                }

                DrawOp::Image { slot, x, y, w, h } => {
                    if !builder.image_objects.contains_key(slot) {
                        continue;
                    }
                    let _ = write!(
                        stream,
                        "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
                        w,
                        h,
                        x,
                        page_height - y - h,
                        slot
                    );
                }
            }
        }

        stream
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, builder: &PdfBuilder, info_obj_id: usize) -> Result<Vec<u8>, ReportError> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            write!(output, "{} 0 obj\n", i)?;
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        write!(output, "xref\n0 {}\n", builder.objects.len())?;
        write!(output, "0000000000 65535 f \n")?;
        for offset in offsets.iter().skip(1) {
            write!(output, "{:010} 00000 n \n", offset)?;
        }
        write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        )?;

        Ok(output)
    }
}

fn font_resource(face: Face) -> &'static str {
    match face {
        Face::Regular => "F0",
        Face::Bold => "F1",
        Face::Symbol => "F2",
    }
}

/// Escape special characters in a PDF string.
fn escape_pdf_byte(out: &mut String, byte: u8) {
    match byte {
        b'\\' => out.push_str("\\\\"),
        b'(' => out.push_str("\\("),
        b')' => out.push_str("\\)"),
        0x20..=0x7E => out.push(byte as char),
        _ => {
            let _ = write!(out, "\\{:03o}", byte);
        }
    }
}

/// Body of a literal string in WinAnsiEncoding. Layout text is already
/// reduced to the encoding; anything else still becomes `?`.
pub fn encode_winansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        escape_pdf_byte(&mut out, unicode_to_winansi(ch).unwrap_or(b'?'));
    }
    out
}

/// ZapfDingbats codes for the marks drawn with [`Face::Symbol`].
fn encode_dingbats(text: &str) -> String {
    text.chars()
        .filter_map(|ch| match ch {
            '✓' => Some('3'),
            '✔' => Some('4'),
            '✗' => Some('7'),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checklist::ChecklistVocabulary;
    use crate::config::RenderOptions;
    use crate::export::compose;
    use crate::layout::layout_report;
    use crate::model::ReportModel;
    use crate::source::RawInspection;
    use miniz_oxide::inflate::decompress_to_vec_zlib;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn write_raw(raw: &RawInspection) -> Vec<u8> {
        let vocab = ChecklistVocabulary::ata_057();
        let options = RenderOptions::default();
        let model = ReportModel::build(raw, &vocab, &options);
        let layout = layout_report(&model, &vocab, &options);
        let images = ImageSet::empty();
        let doc = compose(&layout, &images);
        PdfWriter::new().write(&doc, &images).unwrap()
    }

    /// Inflate every FlateDecode stream that decodes as zlib.
    fn inflated_streams(pdf: &[u8]) -> Vec<String> {
        let mut streams = Vec::new();
        let mut rest = pdf;
        while let Some(start) = rest.windows(7).position(|w| w == b"stream\n") {
            let body = &rest[start + 7..];
            let Some(end) = body.windows(10).position(|w| w == b"\nendstream") else {
                break;
            };
            if let Ok(bytes) = decompress_to_vec_zlib(&body[..end]) {
                streams.push(String::from_utf8_lossy(&bytes).into_owned());
            }
            rest = &body[end + 10..];
        }
        streams
    }

    #[test]
    fn test_escape_and_winansi() {
        assert_eq!(encode_winansi("Hello (World)"), "Hello \\(World\\)");
        assert_eq!(encode_winansi("back\\slash"), "back\\\\slash");
        assert_eq!(encode_winansi("Código"), "C\\363digo");
        assert_eq!(encode_winansi("ÍTEM"), "\\315TEM");
        assert_eq!(encode_winansi("✓"), "?");
        assert_eq!(encode_dingbats("✓"), "3");
    }

    #[test]
    fn test_report_is_valid_pdf() {
        let bytes = write_raw(&RawInspection {
            station: Some("LIM".into()),
            ..Default::default()
        });
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(contains(&bytes, b"%%EOF"));
        assert!(contains(&bytes, b"xref"));
        assert!(contains(&bytes, b"/Count 1"));
        assert!(contains(&bytes, b"/BaseFont /Helvetica-Bold"));
        assert!(contains(&bytes, b"/BaseFont /ZapfDingbats"));
        assert!(contains(&bytes, b"/Title (FOR-ATA-057 LIM)"));
        assert!(contains(&bytes, b"/Producer (planilla)"));
        assert!(contains(&bytes, b"/MediaBox [0 0 841.89 595.28]"));
    }

    #[test]
    fn test_content_stream_carries_report_text() {
        let bytes = write_raw(&RawInspection::default());
        let streams = inflated_streams(&bytes);
        assert_eq!(streams.len(), 1);
        let content = &streams[0];
        assert!(content.contains("(INSPECCI\\323N DE EQUIPOS DE SERVICIO EN TIERRA) Tj"));
        assert!(content.contains("(SUPERVISOR) Tj"));
        assert!(content.contains("/F2 7.0 Tf"));
        assert!(content.contains("(3) Tj"));
    }

    #[test]
    fn test_empty_document_is_an_error() {
        let vocab = ChecklistVocabulary::ata_057();
        let options = RenderOptions::default();
        let model = ReportModel::build(&RawInspection::default(), &vocab, &options);
        let mut doc = compose(&layout_report(&model, &vocab, &options), &ImageSet::empty());
        doc.pages.clear();
        assert!(PdfWriter::new().write(&doc, &ImageSet::empty()).is_err());
    }
}
