use std::sync::Arc;
use tracing::info;

use common::config::EngineConfig;
use risk_engine::{
    analyzer::RiskAnalyzer,
    classifier::ExpectationScope,
    error::EngineError,
    model::ExpectedLocationType,
    rules::RulesEngine,
    scorers::{TierThresholds, WeightTable, WeightedScorer},
    tables::{default_cnae_table, RiskTables, TableHandle},
};

/// Accepts the engine tokens and the registry's Portuguese labels.
pub fn parse_location_type(name: &str) -> Result<ExpectedLocationType, EngineError> {
    let normalized = name.trim().to_ascii_uppercase();
    let token = match normalized.as_str() {
        "COMERCIAL" => "COMMERCIAL",
        "ESCRITORIO" => "OFFICE",
        "ECOMMERCE_DOMICILIAR_OK" => "HOME_OFFICE_OK",
        "INDEFINIDO" => "UNKNOWN",
        other => other,
    };
    token
        .parse()
        .map_err(|_| EngineError::UnknownLocationType {
            name: name.to_string(),
        })
}

pub fn parse_scope(name: &str) -> Result<ExpectationScope, EngineError> {
    name.trim()
        .parse()
        .map_err(|_| EngineError::UnknownExpectationScope {
            name: name.to_string(),
        })
}

/// Built-in tables with the configured overrides and thresholds applied.
pub fn build_tables(config: &EngineConfig) -> Result<RiskTables, EngineError> {
    let cnae_overrides = config
        .cnae_overrides
        .iter()
        .map(|(prefix, name)| Ok((prefix.clone(), parse_location_type(name)?)))
        .collect::<Result<Vec<_>, EngineError>>()?;
    let cnae = default_cnae_table()?.with_overrides(cnae_overrides)?;

    let weights = WeightTable::default().with_named_overrides(
        config
            .weight_overrides
            .iter()
            .map(|(flag, weight)| (flag.as_str(), *weight)),
    )?;
    let thresholds = TierThresholds::new(config.thresholds.high, config.thresholds.medium)?;

    info!(
        cnae_entries = cnae.len(),
        cnae_overrides = config.cnae_overrides.len(),
        weight_overrides = config.weight_overrides.len(),
        high = thresholds.high(),
        medium = thresholds.medium(),
        "Risk tables built"
    );
    Ok(RiskTables::new(cnae, WeightedScorer::new(weights, thresholds)))
}

pub fn build_analyzer(config: &EngineConfig) -> Result<RiskAnalyzer, EngineError> {
    let scope = config
        .expectation_scope
        .as_deref()
        .map(parse_scope)
        .transpose()?
        .unwrap_or_default();
    let tables = Arc::new(TableHandle::new(build_tables(config)?));
    Ok(RiskAnalyzer::new(tables, RulesEngine::with_default_rules(), scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::ThresholdsConfig;
    use risk_engine::{
        model::{ActivityCode, FlagSet, RiskFlag, RiskTier},
        scorers::Scorer,
    };

    #[test]
    fn test_location_type_accepts_both_vocabularies() {
        assert_eq!(parse_location_type("ESCRITORIO").unwrap(), ExpectedLocationType::Office);
        assert_eq!(parse_location_type("office").unwrap(), ExpectedLocationType::Office);
        assert_eq!(
            parse_location_type("ecommerce_domiciliar_ok").unwrap(),
            ExpectedLocationType::HomeOfficeOk
        );
        assert_eq!(
            parse_location_type("WAREHOUSE").unwrap_err(),
            EngineError::UnknownLocationType { name: "WAREHOUSE".to_string() }
        );
    }

    #[test]
    fn test_default_config_builds_default_tables() {
        assert_eq!(
            build_tables(&EngineConfig::default()).unwrap(),
            RiskTables::with_defaults().unwrap()
        );
        assert_eq!(
            build_analyzer(&EngineConfig::default()).unwrap().scope(),
            ExpectationScope::Principal
        );
    }

    #[test]
    fn test_overrides_are_applied() {
        let mut config = EngineConfig::default();
        config.thresholds = ThresholdsConfig { high: 50, medium: 20 };
        config.cnae_overrides.insert("9602".to_string(), "COMERCIAL".to_string());
        config.weight_overrides.insert("UNDEFINED_ZONE".to_string(), 20);
        config.expectation_scope = Some("most_restrictive".to_string());

        let tables = build_tables(&config).unwrap();
        assert_eq!(
            tables.cnae.classify(&ActivityCode::new("9602-5/01", "")),
            ExpectedLocationType::Commercial
        );
        let flags: FlagSet = vec![RiskFlag::UndefinedZone].into();
        let assessment = tables.scorer.score(&flags);
        assert_eq!(assessment.score(), 20);
        assert_eq!(assessment.tier(), RiskTier::Medium);

        assert_eq!(build_analyzer(&config).unwrap().scope(), ExpectationScope::MostRestrictive);
    }

    #[test]
    fn test_bad_overrides_are_rejected() {
        let mut config = EngineConfig::default();
        config.weight_overrides.insert("LOOKS_ODD".to_string(), 5);
        assert!(matches!(build_tables(&config), Err(EngineError::UnknownRiskFlag { .. })));

        let mut config = EngineConfig::default();
        config.cnae_overrides.insert("9".to_string(), "OFFICE".to_string());
        assert!(matches!(build_tables(&config), Err(EngineError::InvalidCnaePrefix { .. })));

        let mut config = EngineConfig::default();
        config.expectation_scope = Some("all_of_them".to_string());
        assert!(matches!(
            build_analyzer(&config),
            Err(EngineError::UnknownExpectationScope { .. })
        ));
    }
}
