use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    classifier::ExpectationScope,
    error::EngineError,
    model::{ActivityCode, AnalysisRequest, AuxiliaryFlags, RiskResult, VisualInput},
    rules::RulesEngine,
    scorers::Scorer,
    tables::{RiskTables, TableHandle},
};

/// Sequences classifier, rules and scorer. Holds no state of its own beyond
/// the table handle, so one instance can be shared by any number of workers.
pub struct RiskAnalyzer {
    tables: Arc<TableHandle>,
    rules: RulesEngine,
    scope: ExpectationScope,
}

impl RiskAnalyzer {
    pub fn new(tables: Arc<TableHandle>, rules: RulesEngine, scope: ExpectationScope) -> Self {
        Self { tables, rules, scope }
    }

    /// Default rules, principal-activity scope.
    pub fn from_tables(tables: RiskTables) -> Self {
        Self::new(
            Arc::new(TableHandle::new(tables)),
            RulesEngine::with_default_rules(),
            ExpectationScope::default(),
        )
    }

    pub fn tables(&self) -> &Arc<TableHandle> {
        &self.tables
    }

    pub fn scope(&self) -> ExpectationScope {
        self.scope
    }

    pub fn analyze(
        &self,
        activities: &[ActivityCode],
        visual: impl Into<Arc<VisualInput>>,
        auxiliary: &AuxiliaryFlags,
    ) -> Result<RiskResult, EngineError> {
        let visual = visual.into();
        let tables = self.tables.snapshot();

        let expected = tables.cnae.resolve(activities, self.scope)?;
        let evaluation = self.rules.evaluate(expected, &visual);

        let mut flags = evaluation.flags;
        flags.extend(auxiliary.raised_flags());

        let assessment = tables.scorer.score(&flags);
        debug!(
            %expected,
            compatibility = %evaluation.compatibility_level,
            flags = ?flags.tokens(),
            "Analysis assembled"
        );

        Ok(RiskResult::new(
            visual,
            expected,
            evaluation.compatibility_level,
            flags,
            assessment,
        ))
    }

    pub fn analyze_request(&self, request: &AnalysisRequest) -> Result<RiskResult, EngineError> {
        let result = self.analyze(&request.activities, request.visual.clone(), &request.auxiliary)?;
        info!(
            request_id = %request.request_id,
            score = result.score(),
            tier = %result.risk_tier(),
            "Address analyzed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{
            ApparentZone, AuxiliarySignal, CompatibilityLevel, ExpectedLocationType, RiskFlag,
            RiskTier, RoadType,
        },
        test_utils::{activity, default_analyzer, VisualBuilder},
    };

    #[test]
    fn test_scenario_commercial_code_in_residential_dirt_road() {
        let visual = VisualBuilder::residential()
            .road(RoadType::Unpaved)
            .compatibility(CompatibilityLevel::Low)
            .build();
        let result = default_analyzer()
            .analyze(&[activity("4711-3/02")], visual, &AuxiliaryFlags::new())
            .unwrap();

        for flag in [
            RiskFlag::IncompatibilityZoneCommercialResidential,
            RiskFlag::UnpavedRoadWithCommercialCnae,
            RiskFlag::AbsenceOfCommercialSigns,
            RiskFlag::AiLowCompatibility,
        ] {
            assert!(result.flags().contains(flag), "missing {flag}");
        }
        assert_eq!(result.expected_location_type(), ExpectedLocationType::Commercial);
        assert_eq!(result.risk_tier(), RiskTier::High);
        assert_eq!(result.score(), 100);
    }

    #[test]
    fn test_scenario_home_office_in_residential_street() {
        let visual = VisualBuilder::residential()
            .houses(true)
            .compatibility(CompatibilityLevel::High)
            .build();
        let result = default_analyzer()
            .analyze(&[activity("6201-5/01")], visual, &AuxiliaryFlags::new())
            .unwrap();

        assert_eq!(
            result.flags().as_slice(),
            &[RiskFlag::CompatibleHomeOffice, RiskFlag::AiHighCompatibility]
        );
        assert_eq!(result.score(), 0);
        assert_eq!(result.risk_tier(), RiskTier::Low);
    }

    #[test]
    fn test_scenario_unavailable_scene_with_recent_domain() {
        let auxiliary = AuxiliaryFlags::new().with(AuxiliarySignal::RecentDomain, true);
        let result = default_analyzer()
            .analyze(
                &[activity("4711-3/02")],
                VisualInput::unavailable("no street view coverage"),
                &auxiliary,
            )
            .unwrap();

        assert_eq!(result.flags().as_slice(), &[RiskFlag::RecentDomain]);
        assert_eq!(result.compatibility_level(), CompatibilityLevel::Unknown);
        assert_eq!(result.score(), 20);
        assert_eq!(result.risk_tier(), RiskTier::Low);
        assert!(result.visual().analysis().is_none());
    }

    #[test]
    fn test_auxiliary_flags_follow_scene_flags() {
        let visual = VisualBuilder::new().zone(ApparentZone::Undefined).build();
        let auxiliary = AuxiliaryFlags::new()
            .with(AuxiliarySignal::Typosquatting, true)
            .with(AuxiliarySignal::NonCorporateEmail, true)
            .with(AuxiliarySignal::DeliveryMarked, false);
        let result = default_analyzer()
            .analyze(&[activity("9602-5/01")], visual, &auxiliary)
            .unwrap();

        assert_eq!(result.expected_location_type(), ExpectedLocationType::Unknown);
        assert_eq!(
            result.flags().as_slice(),
            &[
                RiskFlag::UndefinedZone,
                RiskFlag::NonCorporateEmail,
                RiskFlag::TyposquattingDetected,
            ]
        );
        assert_eq!(result.score(), 75);
        assert_eq!(result.risk_tier(), RiskTier::High);
    }

    #[test]
    fn test_auxiliary_map_order_does_not_matter() {
        let forward = AuxiliaryFlags::from_named([
            ("recent_domain", true),
            ("suspicious_phone", true),
            ("mismatched_delivery_address", true),
        ])
        .unwrap();
        let backward = AuxiliaryFlags::from_named([
            ("mismatched_delivery_address", true),
            ("suspicious_phone", true),
            ("recent_domain", true),
        ])
        .unwrap();
        let analyzer = default_analyzer();
        let activities = [activity("4711-3/02")];
        let a = analyzer
            .analyze(&activities, VisualInput::unavailable("none"), &forward)
            .unwrap();
        let b = analyzer
            .analyze(&activities, VisualInput::unavailable("none"), &backward)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.score(), 55);
        assert_eq!(a.risk_tier(), RiskTier::Medium);
    }

    #[test]
    fn test_empty_activity_list_is_rejected() {
        let err = default_analyzer()
            .analyze(&[], VisualBuilder::new().build(), &AuxiliaryFlags::new())
            .unwrap_err();
        assert_eq!(err, EngineError::EmptyActivityList);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let analyzer = default_analyzer();
        let visual = Arc::new(VisualInput::from(
            VisualBuilder::residential()
                .houses(true)
                .compatibility(CompatibilityLevel::Medium)
                .build(),
        ));
        let auxiliary = AuxiliaryFlags::new().with(AuxiliarySignal::SuspiciousPhone, true);
        let activities = [activity("6202-3/00")];

        let first = analyzer.analyze(&activities, Arc::clone(&visual), &auxiliary).unwrap();
        let second = analyzer.analyze(&activities, Arc::clone(&visual), &auxiliary).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.flags().as_slice(),
            &[
                RiskFlag::OfficeInResidentialPossibleHomeOffice,
                RiskFlag::AiMediumCompatibility,
                RiskFlag::SuspiciousPhone,
            ]
        );
        assert_eq!(first.score(), 37);
    }

    #[test]
    fn test_most_restrictive_scope_uses_secondary_activities() {
        let analyzer = RiskAnalyzer::new(
            Arc::new(TableHandle::new(RiskTables::with_defaults().unwrap())),
            RulesEngine::with_default_rules(),
            ExpectationScope::MostRestrictive,
        );
        let visual = VisualBuilder::new().zone(ApparentZone::Commercial).build();
        let result = analyzer
            .analyze(
                &[activity("6201-5/01"), activity("1091-1/01")],
                visual,
                &AuxiliaryFlags::new(),
            )
            .unwrap();
        assert_eq!(result.expected_location_type(), ExpectedLocationType::Industrial);
        assert!(result.flags().contains(RiskFlag::IndustryInNonIndustrialZone));
    }
}
