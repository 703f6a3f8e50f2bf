//! Cardio XAI CLI - Assess one patient record against a model bundle
//!
//! Usage:
//!   cardio-xai <BUNDLE_JSON> [PAYLOAD_JSON]
//!
//! The payload is a flat JSON object of attribute values; it is read from
//! stdin when no file is given. Prints the assessment as pretty JSON.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use cardio_xai_core::constants::{APP_NAME, APP_VERSION};
use cardio_xai_core::{assess, load_bundle, AttributeMap, ExplainConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None => {
            print_usage();
            ExitCode::from(1)
        }
        Some("help" | "--help" | "-h") => {
            print_usage();
            ExitCode::SUCCESS
        }
        Some("--version" | "-V") => {
            println!("{} {}", APP_NAME, APP_VERSION);
            ExitCode::SUCCESS
        }
        Some(bundle) => match run(Path::new(bundle), args.get(2).map(Path::new)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(2)
            }
        },
    }
}

fn print_usage() {
    eprintln!(
        r#"{} - heart-disease risk prediction with explanations

USAGE:
    cardio-xai <BUNDLE_JSON> [PAYLOAD_JSON]

ARGS:
    <BUNDLE_JSON>     Model bundle (schema, preprocessor, forest)
    [PAYLOAD_JSON]    Attribute map; read from stdin when omitted

ENVIRONMENT:
    MODEL_BUNDLE_SHA256   Expected hex digest of the bundle file
    RUST_LOG              Log filter (default: info)

EXAMPLES:
    cardio-xai core-service/models/demo_bundle.json patient.json
    echo '{{"age": 75, "smoker": 1}}' | cardio-xai core-service/models/demo_bundle.json"#,
        APP_NAME
    );
}

fn run(bundle: &Path, payload: Option<&Path>) -> Result<()> {
    let expected = std::env::var("MODEL_BUNDLE_SHA256").ok().filter(|s| !s.trim().is_empty());
    let artifacts = load_bundle(bundle, expected.as_deref(), ExplainConfig::default())
        .with_context(|| format!("failed to load bundle {}", bundle.display()))?;

    let raw = match payload {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("failed to read payload from stdin")?;
            buf
        }
    };
    let attributes: AttributeMap = serde_json::from_str(&raw).context("payload is not a flat JSON object")?;

    let assessment = assess(&artifacts, &attributes)?;
    for notice in assessment.explanation.unavailable_notices() {
        eprintln!("{}", notice);
    }
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}
