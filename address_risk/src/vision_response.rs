//! Turns the vision model's free-text answer into a [`VisualInput`].
//!
//! The model is asked for a JSON object but often wraps it in prose or a
//! markdown fence, so everything from the first `{` to the last `}` is taken
//! as the payload. Field names and enum values are accepted in English and in
//! the Portuguese the prompt uses. Fields are read one by one: a missing or
//! unrecognised value falls back to its [`VisualAnalysis`] default without
//! discarding the rest of the scene.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use risk_engine::model::{
    ApparentZone, CompatibilityLevel, RiskTier, RoadType, VisualAnalysis, VisualInput,
};

lazy_static::lazy_static! {
    static ref JSON_OBJECT: Regex = Regex::new(r"\{[\s\S]*\}").unwrap();
}

const ERROR_FIELDS: [&str; 2] = ["erro", "error"];

type Accepts = fn(&Value) -> bool;

/// Token fields, under both accepted names.
const TOKEN_FIELDS: [([&str; 2], Accepts); 4] = [
    (["zone", "zona_aparente"], accepts::<ApparentZone>),
    (["road", "tipo_via"], accepts::<RoadType>),
    (["reported_compatibility", "compatibilidade_cnae"], accepts::<CompatibilityLevel>),
    (["suggested_risk", "sugestao_nivel_risco"], accepts::<RiskTier>),
];

const FLAG_FIELDS: [[&str; 2]; 3] = [
    ["commercial_signage", "presenca_placas_comerciais"],
    ["storefront", "presenca_vitrines_ou_lojas"],
    ["residential_houses", "presenca_casas_residenciais"],
];

const REASON_FIELDS: [&str; 2] = ["incompatibility_reasons", "motivos_incompatibilidade"];
const NARRATIVE_FIELDS: [&str; 2] = ["narrative", "analise_detalhada"];

#[derive(Debug, Error)]
pub enum VisionParseError {
    #[error("vision response is empty")]
    Empty,

    #[error("vision response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("vision response JSON is not an object")]
    NotAnObject,
}

pub fn parse_vision_response(text: &str) -> Result<VisualInput, VisionParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(VisionParseError::Empty);
    }

    let payload = JSON_OBJECT
        .find(trimmed)
        .map(|m| m.as_str())
        .unwrap_or(trimmed);
    let Value::Object(mut object) = serde_json::from_str::<Value>(payload)? else {
        return Err(VisionParseError::NotAnObject);
    };

    if let Some(reason) = reported_error(&object) {
        debug!(%reason, "Vision model reported an error");
        return Ok(VisualInput::unavailable(reason));
    }

    normalize_fields(&mut object);
    let analysis: VisualAnalysis = serde_json::from_value(Value::Object(object))?;
    Ok(VisualInput::Analyzed(analysis))
}

fn accepts<T: DeserializeOwned>(value: &Value) -> bool {
    serde_json::from_value::<T>(value.clone()).is_ok()
}

/// Coerces every known field into a shape [`VisualAnalysis`] accepts,
/// dropping values that cannot be read so they take their default.
fn normalize_fields(object: &mut Map<String, Value>) {
    let pairs = TOKEN_FIELDS
        .map(|(names, _)| names)
        .into_iter()
        .chain(FLAG_FIELDS)
        .chain([REASON_FIELDS, NARRATIVE_FIELDS]);
    for [english, portuguese] in pairs {
        // Both spellings at once would be a duplicate field.
        if object.contains_key(english) {
            object.remove(portuguese);
        }
    }

    for (names, accepts) in TOKEN_FIELDS {
        for name in names {
            let Some(value) = object.get_mut(name) else { continue };
            if let Value::String(token) = value {
                *token = token.trim().to_uppercase();
            }
            if !accepts(value) {
                debug!(field = name, value = %value, "Unrecognised vision value ignored");
                object.remove(name);
            }
        }
    }

    for name in FLAG_FIELDS.iter().flatten() {
        if let Some(value) = object.get_mut(*name) {
            *value = Value::Bool(truthy(value));
        }
    }

    for name in REASON_FIELDS {
        let Some(value) = object.remove(name) else { continue };
        let reasons: Vec<Value> = match value {
            Value::Array(items) => items.into_iter().filter(Value::is_string).collect(),
            Value::String(reason) if !reason.trim().is_empty() => vec![Value::String(reason)],
            _ => Vec::new(),
        };
        object.insert(name.to_string(), Value::Array(reasons));
    }

    for name in NARRATIVE_FIELDS {
        if object.get(name).is_some_and(|v| !v.is_string()) {
            object.remove(name);
        }
    }
}

/// Loose truthiness: empty, zero and null values read as `false`.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// A non-blank error string from the collaborator marks the scene unavailable.
fn reported_error(object: &Map<String, Value>) -> Option<String> {
    ERROR_FIELDS
        .iter()
        .filter_map(|field| object.get(*field))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|reason| !reason.is_empty())
        .map(str::to_string)
}
