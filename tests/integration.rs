//! Integration tests for the planilla rendering pipeline.
//!
//! These tests exercise the full path from an inspection record to the
//! preview page and the PDF. They verify:
//! - Row padding and filtering match the paper form
//! - Observations are taken as recorded or derived from the checklist
//! - Dates render the same calendar day however they arrive
//! - Preview and export print the same cell text
//! - PDF output is structurally valid and paginates only for signatures

use std::io::Cursor;

use base64::Engine;
use miniz_oxide::inflate::decompress_to_vec_zlib;

use planilla::checklist::ChecklistVocabulary;
use planilla::config::{HeaderMode, RenderOptions};
use planilla::error::{ReportError, SourceError};
use planilla::layout::MatrixRow;
use planilla::model::{Observation, ObservationOrigin, ReportModel, NOT_COMPLIANT_FALLBACK};
use planilla::source::{
    InspectionDate, MemorySource, RawCheck, RawEquipment, RawInspection, RawObservation,
};
use planilla::ReportEngine;

// ─── Helpers ────────────────────────────────────────────────────

fn equipment(code: &str, checks: &[(&str, &str)]) -> RawEquipment {
    RawEquipment {
        code: code.to_string(),
        checklist: checks
            .iter()
            .map(|(item, status)| (item.to_string(), RawCheck::Status(status.to_string())))
            .collect(),
        ..Default::default()
    }
}

fn inspection(equipment: Vec<RawEquipment>) -> RawInspection {
    RawInspection {
        station: Some("LIM".into()),
        inspector_name: Some("Luis Rojas".into()),
        inspection_date: Some(InspectionDate::Text("2024-01-05".into())),
        equipment,
        ..Default::default()
    }
}

fn engine(options: RenderOptions) -> ReportEngine {
    ReportEngine::new(options)
}

fn equipment_codes(engine: &ReportEngine, model: &ReportModel) -> Vec<String> {
    engine
        .layout(model)
        .rows
        .iter()
        .filter(|r| matches!(r, MatrixRow::Equipment { .. }))
        .map(|r| r.cell_text()[0].clone())
        .collect()
}

fn observation_cells(engine: &ReportEngine, model: &ReportModel) -> Vec<Vec<String>> {
    engine
        .layout(model)
        .rows
        .iter()
        .filter(|r| matches!(r, MatrixRow::Observation { .. }))
        .map(MatrixRow::cell_text)
        .collect()
}

fn png_data_uri(width: u32, height: u32) -> String {
    let img = image::RgbaImage::from_fn(width, height, |x, _| {
        if x % 2 == 0 {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    )
}

fn jpeg_data_uri(width: u32, height: u32) -> String {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([20, 40, 200]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Jpeg(85))
        .unwrap();
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    )
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 50, "PDF too small to be valid");
    assert!(bytes.starts_with(b"%PDF-1.7"), "Missing PDF header");
    assert!(
        bytes.windows(5).any(|w| w == b"%%EOF"),
        "Missing %%EOF marker"
    );
    assert!(bytes.windows(4).any(|w| w == b"xref"), "Missing xref table");
    assert!(bytes.windows(7).any(|w| w == b"trailer"), "Missing trailer");
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

/// Concatenated text of every zlib stream in the file.
fn inflated_content(pdf: &[u8]) -> String {
    let mut out = String::new();
    let mut rest = pdf;
    while let Some(start) = rest.windows(7).position(|w| w == b"stream\n") {
        let body = &rest[start + 7..];
        let Some(end) = body.windows(10).position(|w| w == b"\nendstream") else {
            break;
        };
        if let Ok(bytes) = decompress_to_vec_zlib(&body[..end]) {
            if bytes.is_ascii() {
                out.push_str(&String::from_utf8_lossy(&bytes));
            }
        }
        rest = &body[end + 10..];
    }
    out
}

// ─── Padding ────────────────────────────────────────────────────

#[test]
fn test_padded_matrix_has_minimum_rows() {
    let engine = engine(RenderOptions::default());
    for n in [0, 1, 17] {
        let raw = inspection(
            (0..n)
                .map(|i| equipment(&format!("TUG-{:02}", i), &[("CHK-01", "conforme")]))
                .collect(),
        );
        let layout = engine.layout(&engine.build_model(&raw));
        assert_eq!(layout.equipment_rows(), 17, "with {} equipment", n);
        assert_eq!(layout.observation_rows(), 7, "with {} equipment", n);
    }
}

#[test]
fn test_padded_matrix_never_truncates() {
    let engine = engine(RenderOptions::default());
    let raw = inspection((0..23).map(|i| equipment(&format!("EQ{}", i), &[])).collect());
    let model = engine.build_model(&raw);
    let codes = equipment_codes(&engine, &model);
    assert_eq!(codes.len(), 23);
    assert_eq!(codes[0], "EQ0");
    assert_eq!(codes[22], "EQ22");
}

#[test]
fn test_unpadded_drops_empty_rows_in_order() {
    let engine = engine(RenderOptions {
        pad_rows: false,
        ..Default::default()
    });
    let mut with_hour = equipment("BELT-2", &[]);
    with_hour.hour = Some("07:05".into());
    let mut with_signature = equipment("STAIR-9", &[]);
    with_signature.inspector_signature_url = Some("https://example.invalid/s.png".into());
    let raw = inspection(vec![
        equipment("GPU-1", &[("CHK-04", "no_aplica")]),
        equipment("EMPTY-1", &[]),
        with_hour,
        equipment("EMPTY-2", &[]),
        with_signature,
    ]);
    let model = engine.build_model(&raw);
    assert_eq!(equipment_codes(&engine, &model), vec!["GPU-1", "BELT-2", "STAIR-9"]);
    assert!(observation_cells(&engine, &model).is_empty());
}

// ─── Observations ───────────────────────────────────────────────

#[test]
fn test_explicit_observations_win() {
    let engine = engine(RenderOptions {
        pad_rows: false,
        ..Default::default()
    });
    let mut raw = inspection(vec![equipment(
        "TUG-01",
        &[("CHK-01", "no_conforme"), ("CHK-05", "no_conforme")],
    )]);
    raw.observations = vec![
        RawObservation {
            item_code: "CHK-09".into(),
            equipment_code: "GPU-7".into(),
            operator_text: Some("Cable pelado".into()),
            maintenance_text: Some("Cambiado".into()),
            ..Default::default()
        },
        RawObservation {
            item_code: "CHK-02".into(),
            equipment_code: "TUG-01".into(),
            operator_text: Some("Luz rota".into()),
            ..Default::default()
        },
    ];
    let model = engine.build_model(&raw);
    assert!(model
        .observations
        .iter()
        .all(|o| o.origin == ObservationOrigin::Explicit));
    assert_eq!(
        observation_cells(&engine, &model),
        vec![
            vec!["GPU-7", "CHK-09", "Cable pelado", "Cambiado"],
            vec!["TUG-01", "CHK-02", "Luz rota", "-"],
        ]
    );
}

#[test]
fn test_derived_observation_uses_fallback_text() {
    let engine = engine(RenderOptions::default());
    let mut with_remarks = equipment("GPU-2", &[]);
    with_remarks.checklist.insert(
        "CHK-06".into(),
        RawCheck::Detailed {
            status: Some("no_conforme".into()),
            remarks: Some("Manguera con fuga".into()),
        },
    );
    let raw = inspection(vec![
        equipment("TUG-01", &[("CHK-03", "no_conforme"), ("CHK-01", "conforme")]),
        with_remarks,
    ]);
    let model = engine.build_model(&raw);
    assert_eq!(model.observations.len(), 2);
    assert_eq!(model.observations[0].equipment_code, "TUG-01");
    assert_eq!(model.observations[0].item_code, "CHK-03");
    assert_eq!(model.observations[0].operator_text, NOT_COMPLIANT_FALLBACK);
    assert_eq!(model.observations[0].maintenance_text, None);
    assert_eq!(model.observations[1].operator_text, "Manguera con fuga");
    assert!(model
        .observations
        .iter()
        .all(|o| o.origin == ObservationOrigin::Derived));
}

// ─── Marks and dates ────────────────────────────────────────────

#[test]
fn test_status_marks() {
    let engine = engine(RenderOptions::default());
    let raw = inspection(vec![equipment(
        "TUG-01",
        &[
            ("CHK-01", "conforme"),
            ("CHK-02", "NO_CONFORME"),
            ("CHK-03", " no_aplica "),
            ("CHK-05", "pendiente_de_revision"),
        ],
    )]);
    let layout = engine.layout(&engine.build_model(&raw));
    let cells = layout.rows[1].cell_text();
    assert_eq!(cells[0], "TUG-01");
    assert_eq!(&cells[2..7], &["✓", "X", "N/A", "", "pendiente_"]);
}

#[test]
fn test_dates_render_as_recorded() {
    let engine = engine(RenderOptions::default());
    for date in ["2024-01-05", "2024-01-05T23:40:00", "2024-01-05T23:40:00Z", "05/01/2024"] {
        let mut raw = inspection(vec![]);
        raw.inspection_date = Some(InspectionDate::Text(date.into()));
        let model = engine.build_model(&raw);
        assert_eq!(model.inspection_date_display(), "05/01/2024", "for {}", date);
    }

    let mut late = equipment("TUG-01", &[("CHK-01", "conforme")]);
    late.inspected_at = Some(InspectionDate::Text("2024-01-05T23:40:00".into()));
    let model = engine.build_model(&inspection(vec![late]));
    assert_eq!(model.equipment[0].hour, "23:40");
}

// ─── Preview / export parity ────────────────────────────────────

#[test]
fn test_preview_and_export_print_the_same_cells() {
    let engine = engine(RenderOptions::default());
    let mut signed = equipment("TUG-01", &[("CHK-01", "conforme"), ("CHK-03", "no_conforme")]);
    signed.hour = Some("06:15".into());
    signed.inspector_signature_url = Some(png_data_uri(8, 4));
    let unsigned = equipment("GPU-02", &[("CHK-02", "no_aplica")]);

    let mut model = engine.build_model(&inspection(vec![signed, unsigned]));
    assert_eq!(model.observations.len(), 1);
    model.observations.push(Observation {
        equipment_code: "GPU-02".into(),
        item_code: "CHK-02".into(),
        operator_text: "Revisar toma de corriente".into(),
        maintenance_text: Some("Conector reemplazado".into()),
        origin: ObservationOrigin::Explicit,
    });

    let preview = engine.render_preview(&model).unwrap();
    let (export, _) = engine.compose(&model);
    let preview_rows = preview.table_text();
    assert_eq!(preview_rows, export.table_text());

    let texts: Vec<&Vec<String>> = preview_rows.iter().map(|(_, cells)| cells).collect();
    assert!(texts.iter().any(|c| c[0] == "TUG-01" && c[1] == "06:15"));
    assert!(texts
        .iter()
        .any(|c| c.len() == 4 && c[2] == NOT_COMPLIANT_FALLBACK));
    assert!(texts
        .iter()
        .any(|c| c.len() == 4 && c[3] == "Conector reemplazado"));
}

#[test]
fn test_text_outside_the_pdf_fonts_reads_the_same_in_both_outputs() {
    let engine = engine(RenderOptions::default());
    let mut raw = inspection(vec![equipment(
        "TUG-01",
        &[("CHK-01", "✔"), ("CHK-02", "conforme")],
    )]);
    raw.observations = vec![RawObservation {
        item_code: "CHK-03".into(),
        equipment_code: "TUG-01".into(),
        operator_text: Some("Presion ≥ 30 psi".into()),
        maintenance_text: Some("Válvula → ajustada".into()),
        ..Default::default()
    }];
    let model = engine.build_model(&raw);

    let preview = engine.render_preview(&model).unwrap();
    let (doc, _) = engine.compose(&model);
    let rows = preview.table_text();
    assert_eq!(rows, doc.table_text());

    let matrix_row = rows
        .iter()
        .map(|(_, cells)| cells)
        .find(|cells| cells.len() == 16 && cells[0] == "TUG-01")
        .unwrap();
    assert_eq!(&matrix_row[2..4], &["✓", "✓"]);
    assert!(rows.iter().any(|(_, cells)| cells
        == &vec!["TUG-01", "CHK-03", "Presion >= 30 psi", "Válvula -> ajustada"]));

    let bytes = engine.render_export(&model).unwrap();
    let content = inflated_content(&bytes);
    assert!(content.contains("(Presion >= 30 psi) Tj"));
    assert!(content.contains("(V\\341lvula -> ajustada) Tj"));
    assert!(!content.contains('?'));
}

// ─── Export ─────────────────────────────────────────────────────

#[test]
fn test_empty_inspection_exports_one_page() {
    let engine = engine(RenderOptions::default());
    let model = engine.build_model(&RawInspection::default());
    let bytes = engine.render_export(&model).unwrap();
    assert_valid_pdf(&bytes);
    assert!(contains(&bytes, "/Count 1"));

    let content = inflated_content(&bytes);
    assert!(content.contains("(INSPECCI\\323N DE EQUIPOS DE SERVICIO EN TIERRA) Tj"));
    assert!(content.contains("(Fecha: -     Inspector: -     Estaci\\363n: -) Tj"));
    assert!(content.contains("(C\\363digo: FOR-ATA-057) Tj"));
    assert_eq!(content.matches("(EQ-) Tj").count(), 7);
}

#[test]
fn test_signatures_overflow_to_second_page() {
    let engine = engine(RenderOptions {
        header_mode: HeaderMode::Text,
        ..Default::default()
    });
    let raw = inspection(
        (0..24)
            .map(|i| equipment(&format!("TUG-{:02}", i), &[("CHK-01", "conforme")]))
            .collect(),
    );
    let model = engine.build_model(&raw);
    let (doc, _) = engine.compose(&model);
    assert_eq!(doc.pages.len(), 2);

    let bytes = engine.render_export(&model).unwrap();
    assert_valid_pdf(&bytes);
    assert!(contains(&bytes, "/Count 2"));
}

#[test]
fn test_codes_header_keeps_report_on_one_page() {
    let engine = engine(RenderOptions::default());
    let raw = inspection((0..17).map(|i| equipment(&format!("T{}", i), &[])).collect());
    let (doc, _) = engine.compose(&engine.build_model(&raw));
    assert_eq!(doc.pages.len(), 1);
}

#[test]
fn test_signature_images_are_embedded() {
    let engine = engine(RenderOptions::default());
    let png = png_data_uri(8, 4);
    let jpeg = jpeg_data_uri(16, 8);
    let mut first = equipment("TUG-01", &[("CHK-01", "conforme")]);
    first.inspector_signature_url = Some(png.clone());
    let mut second = equipment("TUG-02", &[("CHK-01", "conforme")]);
    second.inspector_signature_url = Some(png.clone());
    let mut raw = inspection(vec![first, second]);
    raw.supervisor_signature_url = Some(jpeg);
    raw.mechanic_signature_url = Some("data:image/png;base64,bm90IGFuIGltYWdl".into());

    let model = engine.build_model(&raw);
    let bytes = engine.render_export(&model).unwrap();
    assert_valid_pdf(&bytes);
    assert!(contains(&bytes, "/Filter /DCTDecode"));
    assert!(contains(&bytes, "/SMask"));

    let content = inflated_content(&bytes);
    // One XObject per distinct reference, drawn once per use.
    assert_eq!(content.matches("/Im0 Do").count(), 2);
    assert_eq!(content.matches("/Im1 Do").count(), 1);
    assert!(!content.contains("/Im2 Do"));

    let html = engine.render_preview(&model).unwrap().into_html();
    assert_eq!(html.matches(png.as_str()).count(), 2);
    assert!(html.contains("data:image/jpeg;base64,"));
}

// ─── Sources ────────────────────────────────────────────────────

#[test]
fn test_export_from_source() {
    let mut source = MemorySource::new();
    let mut raw = inspection(vec![equipment("TUG-01", &[("CHK-01", "conforme")])]);
    raw.form_code = Some(" FOR-ATA-057 ".into());
    source.insert("42", raw);

    let engine = engine(RenderOptions::default());
    let (name, bytes) = engine.export_inspection(&source, "42").unwrap();
    assert_eq!(name, "FOR-ATA-057_LIM.pdf");
    assert_valid_pdf(&bytes);

    let html = engine.preview_inspection(&source, "42").unwrap();
    assert!(html.to_html().contains("TUG-01"));
}

#[test]
fn test_source_failure_is_surfaced() {
    let engine = engine(RenderOptions::default());
    let err = engine
        .export_inspection(&MemorySource::new(), "missing")
        .unwrap_err();
    assert!(matches!(err, ReportError::Source(SourceError::NotFound(ref id)) if id == "missing"));
}

#[test]
fn test_options_from_json() {
    let options = RenderOptions::from_json(
        r#"{ "headerMode": "text", "padRows": false, "checklistColumns": 12, "compact": true }"#,
    )
    .unwrap();
    assert_eq!(options.header_mode, HeaderMode::Text);
    assert!(!options.pad_rows);
    assert!(!options.auto_print);

    let engine = engine(options);
    let layout = engine.layout(&engine.build_model(&RawInspection::default()));
    assert_eq!(layout.columns.len(), 12 + 3);
    assert_eq!(engine.vocabulary(), &ChecklistVocabulary::ata_057());
}
