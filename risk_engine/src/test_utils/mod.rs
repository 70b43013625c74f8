//! Fixture builders shared by unit and integration tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    analyzer::RiskAnalyzer,
    error::EngineError,
    model::{
        ActivityCode, AnalysisRequest, ApparentZone, AuxiliaryFlags, CompatibilityLevel,
        RoadType, VisualAnalysis, VisualInput,
    },
    processor::{AnalysisOutcome, ResultSink},
    tables::RiskTables,
};

pub fn activity(code: &str) -> ActivityCode {
    ActivityCode::new(code, "")
}

pub fn default_analyzer() -> RiskAnalyzer {
    RiskAnalyzer::from_tables(RiskTables::with_defaults().expect("default tables are valid"))
}

/// Request for a single activity with an undefined-zone scene.
pub fn request(request_id: &str, code: &str) -> AnalysisRequest {
    AnalysisRequest {
        request_id: request_id.to_string(),
        cnpj: None,
        activities: vec![activity(code)],
        visual: VisualBuilder::new().build().into(),
        auxiliary: AuxiliaryFlags::new(),
    }
}

pub fn request_with_visual(request_id: &str, code: &str, visual: VisualInput) -> AnalysisRequest {
    AnalysisRequest {
        visual,
        ..request(request_id, code)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisualBuilder {
    visual: VisualAnalysis,
}

impl VisualBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn residential() -> Self {
        Self::new().zone(ApparentZone::Residential)
    }

    pub fn commercial() -> Self {
        Self::new().zone(ApparentZone::Commercial)
    }

    pub fn zone(mut self, zone: ApparentZone) -> Self {
        self.visual.zone = zone;
        self
    }

    pub fn road(mut self, road: RoadType) -> Self {
        self.visual.road = road;
        self
    }

    pub fn signage(mut self, present: bool) -> Self {
        self.visual.commercial_signage = present;
        self
    }

    pub fn storefront(mut self, present: bool) -> Self {
        self.visual.storefront = present;
        self
    }

    pub fn houses(mut self, present: bool) -> Self {
        self.visual.residential_houses = present;
        self
    }

    pub fn compatibility(mut self, level: CompatibilityLevel) -> Self {
        self.visual.reported_compatibility = level;
        self
    }

    pub fn build(self) -> VisualAnalysis {
        self.visual
    }
}

/// Sink that keeps every outcome in memory.
#[derive(Default)]
pub struct CollectingSink {
    outcomes: Mutex<Vec<AnalysisOutcome>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn outcomes(&self) -> Vec<AnalysisOutcome> {
        self.outcomes.lock().await.clone()
    }
}

#[async_trait]
impl ResultSink for CollectingSink {
    async fn emit(&self, outcome: &AnalysisOutcome) -> Result<(), EngineError> {
        self.outcomes.lock().await.push(outcome.clone());
        Ok(())
    }
}
