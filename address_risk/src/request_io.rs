//! JSON-lines input format of the `analyzer` binary.
//!
//! A line carries either an already-structured `visual` or the vision
//! model's raw `vision_response` text, and either explicit `auxiliary`
//! signals or raw `contact` facts to derive them from (or both, in which
//! case any signal raised by either source is raised).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::warn;

use risk_engine::model::{
    ActivityCode, AnalysisRequest, AuxiliaryFlags, AuxiliarySignal, VisualInput,
};

use crate::{
    signals::{ContactFacts, SignalDeriver},
    vision_response::parse_vision_response,
};

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("line {line}: invalid request: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressRecord {
    pub request_id: String,
    #[serde(default)]
    pub cnpj: Option<String>,
    #[serde(alias = "cnaes")]
    pub activities: Vec<ActivityCode>,
    #[serde(default)]
    pub visual: Option<VisualInput>,
    #[serde(default)]
    pub vision_response: Option<String>,
    #[serde(default)]
    pub auxiliary: AuxiliaryFlags,
    #[serde(default)]
    pub contact: Option<ContactFacts>,
}

impl AddressRecord {
    pub fn into_request(self, deriver: &SignalDeriver, evaluated_at: DateTime<Utc>) -> AnalysisRequest {
        let visual = match (self.visual, self.vision_response) {
            (Some(visual), _) => visual,
            (None, Some(text)) => parse_vision_response(&text).unwrap_or_else(|e| {
                warn!(request_id = %self.request_id, error = %e, "Unusable vision response");
                VisualInput::unavailable(e.to_string())
            }),
            (None, None) => VisualInput::unavailable("no visual analysis supplied"),
        };

        let mut auxiliary = self
            .contact
            .map(|facts| deriver.derive(&facts, evaluated_at))
            .unwrap_or_default();
        for signal in AuxiliarySignal::iter().filter(|s| self.auxiliary.get(*s)) {
            auxiliary.set(signal, true);
        }

        AnalysisRequest {
            request_id: self.request_id,
            cnpj: self.cnpj,
            activities: self.activities,
            visual,
            auxiliary,
        }
    }
}

/// Parses one input line; `line` is 1-based and only used for error reporting.
pub fn parse_record(line: usize, text: &str) -> Result<AddressRecord, RequestError> {
    serde_json::from_str(text).map_err(|source| RequestError::Json { line, source })
}
