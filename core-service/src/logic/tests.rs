//! Pipeline scenario tests against the demo bundle
//!
//! Prediction scenarios, per-engine failure isolation, determinism and the
//! concurrent path.

use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;

use log::Level;

use ndarray::{Array2, ArrayView1, ArrayView2};

use super::artifacts::FittedArtifacts;
use super::explain::{
    explain_tree, ExplainError, GaussianSampler, LimeConfig, NeighborhoodSampler,
};
use super::features::{AttributeMap, AttributeValue, FeatureSchema};
use super::model::{ForestClassifier, InferenceError, ModelBundle, RiskModel};
use super::pipeline::{assess, assess_concurrent, assess_concurrent_with, assess_with, explain, predict, prepare, PredictionFailure};
use super::preprocess::ColumnTransformer;
use super::ExplainConfig;

const DEMO_BUNDLE: &str = include_str!("../../models/demo_bundle.json");

// ============================================================================
// FIXTURES
// ============================================================================

fn demo_artifacts() -> FittedArtifacts {
    ModelBundle::from_json_str(DEMO_BUNDLE)
        .unwrap()
        .into_artifacts(ExplainConfig::default())
        .unwrap()
}

/// Records every log line with the emitting thread so a test can inspect its own output
struct CaptureLogger;

static CAPTURED: Mutex<Vec<(ThreadId, Level, String)>> = Mutex::new(Vec::new());
static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Ok(mut lines) = CAPTURED.lock() {
            lines.push((std::thread::current().id(), record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

fn captured_on_this_thread() -> Vec<(Level, String)> {
    let me = std::thread::current().id();
    CAPTURED
        .lock()
        .unwrap()
        .iter()
        .filter(|(id, _, _)| *id == me)
        .map(|(_, level, line)| (*level, line.clone()))
        .collect()
}

fn attrs(pairs: &[(&str, AttributeValue)]) -> AttributeMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn scenario_a() -> AttributeMap {
    attrs(&[
        ("age", 75.into()),
        ("sex", 1.into()),
        ("diabetes", 1.into()),
        ("phys_activity", 0.into()),
        ("smoker", 1.into()),
        ("bmi", 32.into()),
        ("sleep_hours", 5.into()),
        ("gen_health", 2.into()),
    ])
}

fn scenario_b() -> AttributeMap {
    attrs(&[
        ("age", 25.into()),
        ("sex", 0.into()),
        ("diabetes", 0.into()),
        ("phys_activity", 1.into()),
        ("smoker", 0.into()),
        ("bmi", 21.into()),
        ("sleep_hours", 8.into()),
        ("gen_health", 5.into()),
    ])
}

/// Same forest, but hides its trees from introspection
struct OpaqueModel(ForestClassifier);

impl RiskModel for OpaqueModel {
    fn predict_positive(&self, row: ArrayView1<'_, f64>) -> Result<f64, InferenceError> {
        self.0.predict_positive(row)
    }

    fn predict_proba(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError> {
        self.0.predict_proba(rows)
    }
}

/// Introspection itself blows up
struct PanickingIntrospection(ForestClassifier);

impl RiskModel for PanickingIntrospection {
    fn predict_positive(&self, row: ArrayView1<'_, f64>) -> Result<f64, InferenceError> {
        self.0.predict_positive(row)
    }

    fn predict_proba(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError> {
        self.0.predict_proba(rows)
    }

    fn tree_ensemble(&self) -> Option<&super::model::Forest> {
        panic!("tree introspection unsupported by backend")
    }
}

fn artifacts_with_model<M, F>(wrap: F) -> FittedArtifacts
where
    M: RiskModel + 'static,
    F: FnOnce(ForestClassifier) -> M,
{
    let bundle = ModelBundle::from_json_str(DEMO_BUNDLE).unwrap();
    let schema = FeatureSchema::new(bundle.schema.features.clone());
    let transform = ColumnTransformer::new(&schema, bundle.preprocessor.clone()).unwrap();
    let inner = ForestClassifier::new(bundle.forest.clone(), transform.output_width()).unwrap();
    FittedArtifacts::new(schema, transform, wrap(inner))
}

struct FailingSampler;

impl NeighborhoodSampler for FailingSampler {
    fn sample(
        &self,
        _instance: ArrayView1<'_, f64>,
        _scale: ArrayView1<'_, f64>,
        _num_samples: usize,
        _seed: u64,
    ) -> Result<Array2<f64>, ExplainError> {
        Err(ExplainError::Sampler("random source unavailable".to_string()))
    }
}

struct SlowSampler(Duration);

impl NeighborhoodSampler for SlowSampler {
    fn sample(
        &self,
        instance: ArrayView1<'_, f64>,
        scale: ArrayView1<'_, f64>,
        num_samples: usize,
        seed: u64,
    ) -> Result<Array2<f64>, ExplainError> {
        std::thread::sleep(self.0);
        GaussianSampler.sample(instance, scale, num_samples, seed)
    }
}

// ============================================================================
// PREDICTION SCENARIOS
// ============================================================================

#[test]
fn test_scenario_a_high_risk() {
    let artifacts = demo_artifacts();
    let prediction = predict(&artifacts, &scenario_a()).unwrap();

    assert_eq!(prediction.decision, 1);
    assert!(prediction.probability >= 0.5);
    assert!((prediction.probability - 0.85).abs() < 1e-9);
    assert_eq!(prediction.threshold, 0.5);
    assert_eq!(
        prediction.features_used,
        vec!["age", "bmi", "sleep_hours", "gen_health", "sex", "diabetes", "phys_activity", "smoker"]
    );
}

#[test]
fn test_scenario_b_low_risk() {
    let artifacts = demo_artifacts();
    let prediction = predict(&artifacts, &scenario_b()).unwrap();

    assert_eq!(prediction.decision, 0);
    assert!(prediction.probability < 0.5);
    assert!((prediction.probability - 0.15).abs() < 1e-9);
}

#[test]
fn test_scenario_c_empty_map_uses_imputation() {
    let artifacts = demo_artifacts();
    let empty = AttributeMap::new();

    let prediction = predict(&artifacts, &empty).unwrap();
    assert!((prediction.probability - 0.15).abs() < 1e-9);
    assert_eq!(prediction.decision, 0);

    let assessment = assess(&artifacts, &empty).unwrap();
    assert_eq!(assessment.prediction, prediction);
    assert!(assessment.explanation.shap.is_some());
}

#[test]
fn test_unknown_keys_do_not_change_anything() {
    let artifacts = demo_artifacts();
    let mut noisy = scenario_a();
    noisy.insert("favorite_color".to_string(), "blue".into());
    noisy.insert("num__age".to_string(), 1000.into());

    let clean = assess(&artifacts, &scenario_a()).unwrap();
    let with_noise = assess(&artifacts, &noisy).unwrap();
    assert_eq!(clean, with_noise);

    let json = serde_json::to_string(&with_noise).unwrap();
    assert!(!json.contains("favorite_color"));
}

#[test]
fn test_unparsable_numeric_is_fatal() {
    let artifacts = demo_artifacts();
    let mut bad = scenario_a();
    bad.insert("age".to_string(), "seventy".into());

    assert!(matches!(predict(&artifacts, &bad), Err(PredictionFailure::Transform(_))));
    assert!(matches!(explain(&artifacts, &bad), Err(PredictionFailure::Transform(_))));
}

#[test]
fn test_numeric_text_is_accepted() {
    let artifacts = demo_artifacts();
    let mut text = scenario_a();
    text.insert("age".to_string(), "75".into());

    let prediction = predict(&artifacts, &text).unwrap();
    assert!((prediction.probability - 0.85).abs() < 1e-9);
}

#[test]
fn test_boolean_flags_match_numeric_codes() {
    let artifacts = demo_artifacts();
    let mut flags = scenario_a();
    for key in ["sex", "diabetes", "smoker"] {
        flags.insert(key.to_string(), AttributeValue::Flag(true));
    }
    flags.insert("phys_activity".to_string(), AttributeValue::Flag(false));

    let numeric = predict(&artifacts, &scenario_a()).unwrap();
    let flagged = predict(&artifacts, &flags).unwrap();
    assert!((flagged.probability - 0.85).abs() < 1e-9);
    assert_eq!(flagged, numeric);

    let single: AttributeMap = serde_json::from_str(r#"{"smoker": true}"#).unwrap();
    let coded: AttributeMap = serde_json::from_str(r#"{"smoker": 1}"#).unwrap();
    assert_eq!(
        predict(&artifacts, &single).unwrap(),
        predict(&artifacts, &coded).unwrap()
    );
}

// ============================================================================
// EXPLANATIONS
// ============================================================================

#[test]
fn test_explanation_lists_are_bounded_and_sorted() {
    let artifacts = demo_artifacts();
    let explanation = explain(&artifacts, &scenario_a()).unwrap();

    let shap = explanation.shap.unwrap();
    let lime = explanation.lime.unwrap();
    assert!(explanation.shap_error.is_none());
    assert!(explanation.lime_error.is_none());

    assert_eq!(shap.len(), 10);
    assert!(lime.len() <= 10 && !lime.is_empty());
    assert!(shap.windows(2).all(|w| w[0].contribution.abs() >= w[1].contribution.abs()));
    assert!(lime.windows(2).all(|w| w[0].weight.abs() >= w[1].weight.abs()));
    assert!(lime.iter().all(|w| w.weight.is_finite()));
}

#[test]
fn test_tree_attribution_reconstructs_probability() {
    let artifacts = demo_artifacts();
    let row = prepare(&artifacts, &scenario_a()).unwrap();
    let attribution = explain_tree(&artifacts, &row, 12).unwrap();

    let total: f64 = attribution.contributions.iter().map(|c| c.contribution).sum();
    assert!((attribution.base_value + total - 0.85).abs() < 1e-9);
    // every active path raises the risk for this patient
    assert!(attribution.contributions.iter().all(|c| c.contribution >= -1e-12));
    assert!(attribution.contributions[0].contribution > 0.0);
}

#[test]
fn test_low_risk_attributions_point_down() {
    let artifacts = demo_artifacts();
    let shap = explain(&artifacts, &scenario_b()).unwrap().shap.unwrap();
    assert!(shap[0].contribution < 0.0);
    assert!(shap.iter().all(|c| c.contribution <= 1e-12));
}

#[test]
fn test_scenario_d_sampler_failure_is_isolated() {
    let artifacts = demo_artifacts();
    let assessment = assess_with(&artifacts, &scenario_a(), &FailingSampler).unwrap();

    assert_eq!(assessment.prediction, predict(&artifacts, &scenario_a()).unwrap());
    assert!(assessment.explanation.lime.is_none());
    assert_eq!(
        assessment.explanation.lime_error.as_deref(),
        Some("neighborhood sampling failed: random source unavailable")
    );
    let shap = assessment.explanation.shap.unwrap();
    assert!(!shap.is_empty());
}

#[test]
fn test_opaque_model_isolates_tree_failure() {
    let artifacts = artifacts_with_model(OpaqueModel);
    let assessment = assess(&artifacts, &scenario_a()).unwrap();

    assert_eq!(assessment.prediction.decision, 1);
    assert!(assessment.explanation.shap.is_none());
    assert_eq!(
        assessment.explanation.shap_error.as_deref(),
        Some("model does not expose a tree ensemble")
    );
    assert!(assessment.explanation.lime.is_some());
    assert_eq!(
        assessment.explanation.unavailable_notices(),
        vec!["explanation unavailable for method shap, reason: model does not expose a tree ensemble"]
    );
}

#[test]
fn test_panicking_introspection_is_isolated() {
    let artifacts = artifacts_with_model(PanickingIntrospection);
    let assessment = assess(&artifacts, &scenario_a()).unwrap();

    assert!((assessment.prediction.probability - 0.85).abs() < 1e-9);
    let reason = assessment.explanation.shap_error.unwrap();
    assert!(reason.contains("tree introspection unsupported"), "{}", reason);
    assert!(assessment.explanation.lime.is_some());
}

#[test]
fn test_both_engines_can_fail_together() {
    let artifacts = artifacts_with_model(OpaqueModel);
    let assessment = assess_with(&artifacts, &scenario_b(), &FailingSampler).unwrap();

    assert_eq!(assessment.prediction.decision, 0);
    assert!(assessment.explanation.shap.is_none() && assessment.explanation.lime.is_none());
    assert_eq!(assessment.explanation.failed_engines().len(), 2);
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[test]
fn test_attribute_values_stay_out_of_info_log() {
    let _ = log::set_logger(&CAPTURE_LOGGER);
    log::set_max_level(log::LevelFilter::Debug);

    let artifacts = demo_artifacts();
    let mut record = scenario_a();
    record.insert("bmi".to_string(), 31.7.into());
    prepare(&artifacts, &record).unwrap();

    let lines = captured_on_this_thread();
    assert!(lines.iter().any(|(level, line)| *level == Level::Info && line.contains("0 of 8")));
    assert!(lines
        .iter()
        .filter(|(level, _)| *level <= Level::Info)
        .all(|(_, line)| !line.contains("31.7")));
    assert!(lines.iter().any(|(level, line)| *level == Level::Debug && line.contains("31.7")));
}

#[test]
fn test_pipeline_is_idempotent() {
    let artifacts = demo_artifacts();
    let first = assess(&artifacts, &scenario_a()).unwrap();
    let second = assess(&artifacts, &scenario_a()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_surrogate_seed_policy() {
    let seeded = |seed| {
        let config = ExplainConfig {
            lime: LimeConfig { seed, ..LimeConfig::default() },
            ..ExplainConfig::default()
        };
        let artifacts = ModelBundle::from_json_str(DEMO_BUNDLE)
            .unwrap()
            .into_artifacts(config)
            .unwrap();
        explain(&artifacts, &scenario_a()).unwrap().lime.unwrap()
    };

    assert_eq!(seeded(7), seeded(7));
    assert_ne!(seeded(7), seeded(8));
}

// ============================================================================
// CONCURRENT PATH
// ============================================================================

#[tokio::test]
async fn test_concurrent_matches_sequential() {
    let artifacts = Arc::new(demo_artifacts());
    let sequential = assess(&artifacts, &scenario_a()).unwrap();
    let concurrent = assess_concurrent(Arc::clone(&artifacts), &scenario_a(), Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_concurrent_timeout_is_an_engine_failure() {
    let artifacts = Arc::new(demo_artifacts());
    let assessment = assess_concurrent_with(
        artifacts,
        &scenario_a(),
        Duration::from_millis(50),
        Arc::new(SlowSampler(Duration::from_millis(500))),
    )
    .await
    .unwrap();

    assert_eq!(assessment.prediction.decision, 1);
    assert_eq!(assessment.explanation.lime_error.as_deref(), Some("timed out after 50 ms"));
    assert!(assessment.explanation.shap.is_some());
}

#[tokio::test]
async fn test_concurrent_prediction_failure_is_fatal() {
    let artifacts = Arc::new(demo_artifacts());
    let mut bad = scenario_b();
    bad.insert("bmi".to_string(), "heavy".into());

    let outcome = assess_concurrent(artifacts, &bad, Duration::from_secs(1)).await;
    assert!(matches!(outcome, Err(PredictionFailure::Transform(_))));
}
