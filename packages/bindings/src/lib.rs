use napi::Result as NapiResult;
use napi_derive::napi;
use std::sync::{Mutex, OnceLock};

use underwriting_core::cache::AnalysisCache;
use underwriting_core::Scenario;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_scenario(scenario_json: &str) -> NapiResult<Scenario> {
    serde_json::from_str(scenario_json).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Deal analysis
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_deal(scenario_json: String) -> NapiResult<String> {
    let scenario = parse_scenario(&scenario_json)?;
    let output = underwriting_core::analyze_deal(&scenario).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

fn shared_cache() -> &'static Mutex<AnalysisCache> {
    static CACHE: OnceLock<Mutex<AnalysisCache>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(AnalysisCache::default()))
}

/// Same as `analyzeDeal`, memoized by scenario fingerprint across calls.
#[napi]
pub fn analyze_deal_cached(scenario_json: String) -> NapiResult<String> {
    let scenario = parse_scenario(&scenario_json)?;
    let output = {
        let mut cache = shared_cache().lock().map_err(to_napi_error)?;
        cache.get_or_analyze(&scenario).map_err(to_napi_error)?
    };
    serde_json::to_string(&*output).map_err(to_napi_error)
}

#[napi]
pub fn clear_analysis_cache() -> NapiResult<()> {
    shared_cache().lock().map_err(to_napi_error)?.clear();
    Ok(())
}

#[napi]
pub fn scenario_fingerprint(scenario_json: String) -> NapiResult<String> {
    Ok(parse_scenario(&scenario_json)?.fingerprint())
}

#[napi]
pub fn run_sensitivity(scenario_json: String) -> NapiResult<String> {
    let scenario = parse_scenario(&scenario_json)?;
    let output = underwriting_core::investment::sensitivity::run_sensitivity(&scenario)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Standalone calculators
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_waterfall(input_json: String) -> NapiResult<String> {
    let input: underwriting_core::investment::waterfall::WaterfallInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = underwriting_core::investment::waterfall::calculate_waterfall(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: underwriting_core::financing::amortization::AmortizationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = underwriting_core::financing::amortization::build_amortization_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_returns(input_json: String) -> NapiResult<String> {
    let input: underwriting_core::investment::returns::ReturnsInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = underwriting_core::investment::returns::calculate_returns(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
