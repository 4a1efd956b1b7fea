//! Pulls the JSON answer out of free-form model output.
//!
//! The primary match spans the first `{` to the last `}` in the text. When that
//! span does not decode, brace-balanced objects are tried left to right and the
//! first one that decodes is used. Text without any `{ ... }` span means the
//! model found nothing, and yields [`AnalysisResults::empty`].

use crate::error::{ExtractError, MalformedCause};
use crate::types::AnalysisResults;
use serde_json::Value;

pub fn extract_json_from_text(text: &str) -> Result<Value, ExtractError> {
    let Some(span) = greedy_span(text) else {
        tracing::info!("No JSON block found in AI response. Assuming no issues.");
        return serde_json::to_value(AnalysisResults::empty())
            .map_err(|e| ExtractError::MalformedModelOutput(MalformedCause::Decode(e)));
    };

    let greedy_err = match serde_json::from_str::<Value>(span) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(value) =
        balanced_objects(text).find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
    {
        tracing::debug!("Recovered JSON object from a balanced span");
        return Ok(value);
    }

    Err(ExtractError::MalformedModelOutput(MalformedCause::Decode(greedy_err)))
}

/// Extracts and validates the model's answer against [`AnalysisResults`].
pub fn parse_analysis(text: &str) -> Result<AnalysisResults, ExtractError> {
    let value = extract_json_from_text(text)?;
    serde_json::from_value(value).map_err(|e| ExtractError::MalformedModelOutput(MalformedCause::Schema(e)))
}

fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Yields every `{ ... }` span whose braces balance, skipping braces inside
/// JSON string literals.
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.match_indices('{')
        .filter_map(move |(start, _)| balanced_end(&text[start..]).map(|len| &text[start..start + len]))
}

fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
