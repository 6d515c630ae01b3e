use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::AnalysisResult;
use crate::error::{MeasureError, Result};

const JSON_DEFAULT_CONFIDENCE: f64 = 0.5;
const JSON_DEFAULT_DESCRIPTION: &str = "AI detected measurements";
const TEXT_DEFAULT_CONFIDENCE: f64 = 0.3;
const TEXT_DEFAULT_DESCRIPTION: &str = "Extracted from AI text response";

struct TextPatterns {
    width: Regex,
    height: Regex,
    area: Regex,
    confidence: Regex,
}

fn text_patterns() -> &'static TextPatterns {
    static PATTERNS: OnceLock<TextPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let number = r"[:\s]+(\d+\.?\d*)";
        let build = |label: &str| {
            Regex::new(&format!("(?i){label}{number}")).expect("static pattern compiles")
        };
        TextPatterns {
            width: build("width"),
            height: build("(?:height|depth)"),
            area: build("area"),
            confidence: build("confidence"),
        }
    })
}

/// Map the service's free-form reply to measurements.
///
/// A `{...}` block is read as JSON; otherwise `label: number` pairs are
/// scraped from the text. A JSON block that does not parse is a service error.
pub fn parse_analysis_text(text: &str) -> Result<AnalysisResult> {
    match json_block(text) {
        Some(block) => parse_json_block(block),
        None => Ok(parse_plain_text(text)),
    }
}

/// From the first `{` to the last `}`.
fn json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_json_block(block: &str) -> Result<AnalysisResult> {
    let value: Value = serde_json::from_str(block).map_err(|err| {
        MeasureError::AnalysisServiceError(format!("malformed measurement JSON: {err}"))
    })?;
    let Value::Object(fields) = value else {
        return Err(MeasureError::AnalysisServiceError(
            "measurement JSON is not an object".into(),
        ));
    };

    let number = |key: &str| fields.get(key).and_then(positive_number);
    let depth = number("depth");

    Ok(AnalysisResult {
        width: number("width"),
        height: number("height").or(depth),
        depth,
        area: number("area"),
        confidence: number("confidence").or(Some(JSON_DEFAULT_CONFIDENCE)),
        description: fields
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .or_else(|| Some(JSON_DEFAULT_DESCRIPTION.to_owned())),
    })
}

fn parse_plain_text(text: &str) -> AnalysisResult {
    let patterns = text_patterns();
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    AnalysisResult {
        width: capture(&patterns.width),
        height: capture(&patterns.height),
        depth: None,
        area: capture(&patterns.area),
        confidence: capture(&patterns.confidence).or(Some(TEXT_DEFAULT_CONFIDENCE)),
        description: Some(TEXT_DEFAULT_DESCRIPTION.to_owned()),
    }
}

/// Numbers or numeric strings; zero, negatives and junk count as missing.
fn positive_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => leading_float(s)?,
        _ => return None,
    };
    (n.is_finite() && n > 0.0).then_some(n)
}

/// Parses the numeric prefix of a string such as `"12.5 cm"`.
fn leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);
    s[..end].parse().ok()
}
