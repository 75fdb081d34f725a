//! wasm-bindgen exports.
//!
//! This module exposes the Flow type stripper to JavaScript via `wasm-bindgen`.
//! The underlying logic lives in the `flow-strip` crate.

use wasm_bindgen::prelude::*;

use flow_strip::{
    LineMapping as LineMappingInner, SourceMapMode as SourceMapModeInner,
    StripOptions as StripOptionsInner, strip,
};

/// Whether and how a sourcemap is produced.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize, tsify::Tsify)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    #[default]
    None,
    /// Return the sourcemap JSON alongside the code.
    External,
    /// Append the sourcemap to the code as a data URL comment.
    Inline,
}

impl From<SourceMapMode> for SourceMapModeInner {
    fn from(val: SourceMapMode) -> Self {
        match val {
            SourceMapMode::None => SourceMapModeInner::None,
            SourceMapMode::External => SourceMapModeInner::External,
            SourceMapMode::Inline => SourceMapModeInner::Inline,
        }
    }
}

/// Configuration options for type stripping.
#[derive(Debug, Clone, Default, serde::Deserialize, tsify::Tsify)]
#[tsify(from_wasm_abi)]
#[serde(default, rename_all = "camelCase")]
pub struct StripOptions {
    /// Delete stripped code and collapse the blank lines left behind
    #[tsify(optional)]
    pub pretty: bool,
    /// Strip even without an `@flow` pragma
    #[tsify(optional)]
    pub ignore_pragma: bool,
    #[tsify(optional)]
    pub source_maps: SourceMapMode,
    /// Source name recorded in the sourcemap (defaults to `<stdin>`)
    #[tsify(optional)]
    pub source_filename: Option<String>,
}

impl From<StripOptions> for StripOptionsInner {
    fn from(val: StripOptions) -> Self {
        StripOptionsInner {
            pretty: val.pretty,
            ignore_pragma: val.ignore_pragma,
            source_maps: val.source_maps.into(),
            source_filename: val.source_filename,
        }
    }
}

/// An output line and the input line it came from, both 1-based.
#[derive(Debug, Clone, Copy, serde::Serialize, tsify::Tsify)]
#[serde(rename_all = "camelCase")]
pub struct LineMapping {
    pub generated_line: usize,
    pub original_line: usize,
}

impl From<LineMappingInner> for LineMapping {
    fn from(val: LineMappingInner) -> Self {
        LineMapping {
            generated_line: val.generated_line,
            original_line: val.original_line,
        }
    }
}

/// Output from the wasm API.
#[derive(Debug, Clone, serde::Serialize, tsify::Tsify)]
#[tsify(into_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct StripOutput {
    /// The stripped JavaScript source.
    pub code: String,
    /// Per-line mappings, present when a sourcemap was requested.
    #[tsify(optional)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Vec<LineMapping>>,
    /// The sourcemap JSON for the `external` mode.
    #[tsify(optional)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
}

/// Strip Flow type syntax, optionally producing a sourcemap.
#[wasm_bindgen]
pub fn strip_flow_types(code: String, options: StripOptions) -> Result<StripOutput, JsValue> {
    console_error_panic_hook::set_once();

    let res = strip(&code, &options.into()).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(StripOutput {
        code: res.code,
        mappings: res
            .mappings
            .map(|m| m.into_iter().map(LineMapping::from).collect()),
        source_map: res.source_map,
    })
}

/// Strip Flow type syntax without producing a sourcemap.
///
/// `options.sourceMaps` is ignored.
#[wasm_bindgen]
pub fn strip_flow_types_no_sourcemap(code: String, options: StripOptions) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let options = StripOptionsInner {
        source_maps: SourceMapModeInner::None,
        ..options.into()
    };
    let res = strip(&code, &options).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(res.code)
}
