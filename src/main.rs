//! # Planilla CLI
//!
//! Usage:
//!   planilla inspection.json -o report.pdf
//!   planilla --source ./inspections --id 42 --preview -o report.html
//!   echo '{ ... }' | planilla --header text --columns 12
//!   planilla --example > inspection.json
//!
//! Flags:
//!   --preview        write the HTML print page instead of the PDF
//!   -o PATH          output file (default: `{form}_{station}.pdf|html`)
//!   --options FILE   render options as JSON; flags below override it
//!   --no-pad         drop empty rows instead of padding to the paper form
//!   --header text    full item descriptions as column headers
//!   --compact        denser preview
//!   --auto-print     preview opens the print dialog once loaded
//!   --columns N      cap on checklist columns
//!
//! Logging goes to stderr. `RUST_LOG` overrides the default `planilla=info`
//! filter and `PLANILLA_LOG_JSON=1` switches to JSON lines.

use std::env;
use std::fs;
use std::io::{self, Read};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use planilla::config::{HeaderMode, RenderOptions};
use planilla::error::ReportError;
use planilla::source::{InspectionSource, JsonDirSource, RawInspection};
use planilla::ReportEngine;

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_inspection_json());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("planilla=info"));
    let log_json = env::var("PLANILLA_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Flags that consume the following argument.
const VALUE_FLAGS: [&str; 6] = ["-o", "--options", "--source", "--id", "--header", "--columns"];

fn input_path(args: &[String]) -> Option<&str> {
    let mut skip_next = false;
    for arg in args.iter().skip(1) {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if !arg.starts_with('-') {
            return Some(arg);
        }
    }
    None
}

fn render_options(args: &[String]) -> Result<RenderOptions, ReportError> {
    let mut options = match flag_value(args, "--options") {
        Some(path) => RenderOptions::from_json(&fs::read_to_string(path)?)?,
        None => RenderOptions::default(),
    };
    if has_flag(args, "--no-pad") {
        options.pad_rows = false;
    }
    if has_flag(args, "--compact") {
        options.compact = true;
    }
    if has_flag(args, "--auto-print") {
        options.auto_print = true;
    }
    match flag_value(args, "--header") {
        Some("text") => options.header_mode = HeaderMode::Text,
        Some("codes") => options.header_mode = HeaderMode::Codes,
        Some(other) => {
            return Err(ReportError::Render(format!(
                "unknown header mode '{}', expected 'codes' or 'text'",
                other
            )))
        }
        None => {}
    }
    if let Some(n) = flag_value(args, "--columns") {
        let n = n
            .parse::<usize>()
            .map_err(|_| ReportError::Render(format!("--columns expects a number, got '{}'", n)))?;
        options.checklist_columns = Some(n);
    }
    Ok(options)
}

fn run(args: &[String]) -> Result<(), ReportError> {
    let engine = ReportEngine::new(render_options(args)?);
    let preview = has_flag(args, "--preview");

    let raw = match (flag_value(args, "--source"), flag_value(args, "--id")) {
        (Some(dir), Some(id)) => JsonDirSource::new(dir).fetch_inspection(id)?,
        (Some(_), None) | (None, Some(_)) => {
            return Err(ReportError::Render("--source and --id must be given together".to_string()))
        }
        (None, None) => {
            let json = match input_path(args) {
                Some(path) => fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            RawInspection::from_json(&json)?
        }
    };

    let model = engine.build_model(&raw);
    let ext = if preview { "html" } else { "pdf" };
    let output_path = flag_value(args, "-o")
        .map(str::to_string)
        .unwrap_or_else(|| planilla::export_filename(&model, ext));

    let bytes = if preview {
        engine.render_preview(&model)?.into_html().into_bytes()
    } else {
        engine.render_export(&model)?
    };
    fs::write(&output_path, &bytes)?;
    info!(path = %output_path, bytes = bytes.len(), "report written");
    Ok(())
}

fn example_inspection_json() -> &'static str {
    r##"{
  "id": "2024-0105-LIM",
  "form_code": "FOR-ATA-057",
  "station": "LIM",
  "inspector_name": "Luis Rojas",
  "inspection_date": "2024-01-05",
  "equipment": [
    {
      "code": "TUG-01",
      "hour": "06:15",
      "checklist": {
        "CHK-01": "conforme",
        "CHK-02": "conforme",
        "CHK-03": { "status": "no_conforme", "remarks": "Freno de estacionamiento no retiene" },
        "CHK-04": "no_aplica",
        "CHK-05": "conforme"
      }
    },
    {
      "code": "GPU-03",
      "inspected_at": "2024-01-05T06:40:00",
      "checklist": {
        "CHK-01": "conforme",
        "CHK-07": "no_conforme",
        "CHK-14": "conforme"
      }
    }
  ],
  "observations": [],
  "supervisor_name": "Ana Quispe",
  "supervisor_signed_at": "2024-01-05T07:30:00",
  "mechanic_name": "Jorge Huamán"
}
"##
}
