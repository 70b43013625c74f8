use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

pub mod flags;

pub use flags::{AuxiliaryFlags, AuxiliarySignal, FlagSet, RiskFlag};

/// A declared business activity (CNAE). Identity is the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCode {
    #[serde(alias = "codigo")]
    pub code: String,
    #[serde(default, alias = "descricao")]
    pub description: String,
}

impl ActivityCode {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

impl PartialEq for ActivityCode {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for ActivityCode {}

/// Premises category an activity is expected to operate from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter, IntoStaticStr, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpectedLocationType {
    Commercial,
    Office,
    Industrial,
    HomeOfficeOk,
    #[default]
    Unknown,
}

impl ExpectedLocationType {
    /// Higher means the activity places stricter demands on the premises.
    pub fn restrictiveness(self) -> u8 {
        match self {
            Self::Industrial => 4,
            Self::Commercial => 3,
            Self::Office => 2,
            Self::HomeOfficeOk => 1,
            Self::Unknown => 0,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApparentZone {
    #[serde(alias = "COMERCIAL")]
    Commercial,
    #[serde(alias = "RESIDENCIAL")]
    Residential,
    Industrial,
    Rural,
    #[default]
    #[serde(alias = "INDEFINIDO")]
    Undefined,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RoadType {
    #[serde(alias = "ASFALTADA")]
    Paved,
    #[serde(alias = "TERRA")]
    Unpaved,
    #[default]
    #[serde(alias = "NAO_VISIVEL")]
    NotVisible,
}

/// The vision model's own opinion of scene/activity fit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    #[serde(alias = "ALTA")]
    High,
    #[serde(alias = "MEDIA")]
    Medium,
    #[serde(alias = "BAIXA")]
    Low,
    #[default]
    #[serde(alias = "DESCONHECIDA")]
    Unknown,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    #[serde(alias = "ALTO")]
    High,
    #[default]
    #[serde(alias = "MEDIO")]
    Medium,
    #[serde(alias = "BAIXO")]
    Low,
}

/// Structured read of one façade photograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualAnalysis {
    #[serde(default, alias = "zona_aparente")]
    pub zone: ApparentZone,
    #[serde(default, alias = "tipo_via")]
    pub road: RoadType,
    #[serde(default, alias = "presenca_placas_comerciais")]
    pub commercial_signage: bool,
    #[serde(default, alias = "presenca_vitrines_ou_lojas")]
    pub storefront: bool,
    #[serde(default, alias = "presenca_casas_residenciais")]
    pub residential_houses: bool,
    #[serde(default, alias = "compatibilidade_cnae")]
    pub reported_compatibility: CompatibilityLevel,
    #[serde(default, alias = "motivos_incompatibilidade")]
    pub incompatibility_reasons: Vec<String>,
    #[serde(default, alias = "sugestao_nivel_risco")]
    pub suggested_risk: RiskTier,
    #[serde(default, alias = "analise_detalhada")]
    pub narrative: String,
}

impl Default for VisualAnalysis {
    fn default() -> Self {
        Self {
            zone: ApparentZone::Undefined,
            road: RoadType::NotVisible,
            commercial_signage: false,
            storefront: false,
            residential_houses: false,
            reported_compatibility: CompatibilityLevel::Unknown,
            incompatibility_reasons: Vec::new(),
            suggested_risk: RiskTier::Medium,
            narrative: String::new(),
        }
    }
}

/// Whether a scene could be analyzed at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VisualInput {
    Analyzed(VisualAnalysis),
    Unavailable { reason: String },
}

impl VisualInput {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn analysis(&self) -> Option<&VisualAnalysis> {
        match self {
            Self::Analyzed(visual) => Some(visual),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn compatibility_level(&self) -> CompatibilityLevel {
        self.analysis()
            .map(|v| v.reported_compatibility)
            .unwrap_or_default()
    }
}

impl From<VisualAnalysis> for VisualInput {
    fn from(visual: VisualAnalysis) -> Self {
        Self::Analyzed(visual)
    }
}

impl From<VisualAnalysis> for Arc<VisualInput> {
    fn from(visual: VisualAnalysis) -> Self {
        Arc::new(VisualInput::Analyzed(visual))
    }
}

/// One address to evaluate, as handed in by collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub request_id: String,
    #[serde(default)]
    pub cnpj: Option<String>,
    pub activities: Vec<ActivityCode>,
    pub visual: VisualInput,
    #[serde(default)]
    pub auxiliary: AuxiliaryFlags,
}

/// Score and tier, only ever produced together from one thresholds table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub(crate) score: u8,
    pub(crate) tier: RiskTier,
}

impl RiskAssessment {
    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn tier(&self) -> RiskTier {
        self.tier
    }
}

/// Final, immutable engine output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskResult {
    #[serde(skip)]
    pub(crate) visual: Arc<VisualInput>,
    pub(crate) risk_tier: RiskTier,
    pub(crate) score: u8,
    pub(crate) flags: FlagSet,
    pub(crate) expected_location_type: ExpectedLocationType,
    pub(crate) compatibility_level: CompatibilityLevel,
}

impl RiskResult {
    pub(crate) fn new(
        visual: Arc<VisualInput>,
        expected_location_type: ExpectedLocationType,
        compatibility_level: CompatibilityLevel,
        flags: FlagSet,
        assessment: RiskAssessment,
    ) -> Self {
        Self {
            visual,
            risk_tier: assessment.tier,
            score: assessment.score,
            flags,
            expected_location_type,
            compatibility_level,
        }
    }

    pub fn visual(&self) -> &VisualInput {
        &self.visual
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn expected_location_type(&self) -> ExpectedLocationType {
        self.expected_location_type
    }

    pub fn compatibility_level(&self) -> CompatibilityLevel {
        self.compatibility_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_screaming_snake() {
        assert_eq!(ExpectedLocationType::HomeOfficeOk.to_string(), "HOME_OFFICE_OK");
        assert_eq!(
            "HOME_OFFICE_OK".parse::<ExpectedLocationType>().unwrap(),
            ExpectedLocationType::HomeOfficeOk
        );
        assert_eq!(
            serde_json::to_string(&RoadType::NotVisible).unwrap(),
            "\"NOT_VISIBLE\""
        );
    }

    #[test]
    fn test_visual_analysis_accepts_portuguese_payload() {
        let json = r#"{
            "zona_aparente": "RESIDENCIAL",
            "tipo_via": "TERRA",
            "presenca_placas_comerciais": false,
            "presenca_vitrines_ou_lojas": false,
            "presenca_casas_residenciais": true,
            "compatibilidade_cnae": "BAIXA",
            "motivos_incompatibilidade": ["rua de terra"],
            "sugestao_nivel_risco": "ALTO",
            "analise_detalhada": "casas simples"
        }"#;
        let visual: VisualAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(visual.zone, ApparentZone::Residential);
        assert_eq!(visual.road, RoadType::Unpaved);
        assert!(visual.residential_houses);
        assert_eq!(visual.reported_compatibility, CompatibilityLevel::Low);
        assert_eq!(visual.suggested_risk, RiskTier::High);
        assert_eq!(visual.incompatibility_reasons, vec!["rua de terra".to_string()]);
    }

    #[test]
    fn test_visual_analysis_defaults_for_missing_fields() {
        let visual: VisualAnalysis = serde_json::from_str("{}").unwrap();
        assert_eq!(visual, VisualAnalysis::default());
        assert_eq!(visual.suggested_risk, RiskTier::Medium);
    }

    #[test]
    fn test_visual_input_is_explicitly_tagged() {
        let input: VisualInput =
            serde_json::from_str(r#"{"status": "unavailable", "reason": "no image"}"#).unwrap();
        assert_eq!(input, VisualInput::unavailable("no image"));
        assert_eq!(input.compatibility_level(), CompatibilityLevel::Unknown);

        let input: VisualInput =
            serde_json::from_str(r#"{"status": "analyzed", "zone": "RURAL", "reported_compatibility": "HIGH"}"#)
                .unwrap();
        assert_eq!(input.analysis().map(|v| v.zone), Some(ApparentZone::Rural));
        assert_eq!(input.compatibility_level(), CompatibilityLevel::High);
    }

    #[test]
    fn test_restrictiveness_order() {
        use strum::IntoEnumIterator;
        let mut types: Vec<_> = ExpectedLocationType::iter().collect();
        types.sort_by_key(|t| std::cmp::Reverse(t.restrictiveness()));
        assert_eq!(
            types,
            vec![
                ExpectedLocationType::Industrial,
                ExpectedLocationType::Commercial,
                ExpectedLocationType::Office,
                ExpectedLocationType::HomeOfficeOk,
                ExpectedLocationType::Unknown,
            ]
        );
    }
}
