use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::{
    error::EngineError,
    model::{FlagSet, RiskAssessment, RiskFlag, RiskTier},
    scorers::Scorer,
};

pub const MAX_SCORE: i32 = 100;
const MAX_ABS_WEIGHT: i32 = 100;

/// Score cut-offs: `score >= high` is HIGH, `score >= medium` is MEDIUM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierThresholds {
    high: i32,
    medium: i32,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { high: 60, medium: 30 }
    }
}

impl TierThresholds {
    pub fn new(high: i32, medium: i32) -> Result<Self, EngineError> {
        if medium <= 0 || medium >= high || high > MAX_SCORE {
            return Err(EngineError::InvalidThresholds { high, medium });
        }
        Ok(Self { high, medium })
    }

    pub fn high(&self) -> i32 {
        self.high
    }

    pub fn medium(&self) -> i32 {
        self.medium
    }

    pub fn tier_for(&self, score: u8) -> RiskTier {
        let score = i32::from(score);
        if score >= self.high {
            RiskTier::High
        } else if score >= self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    /// Clamps a raw weight sum into [0, 100] and tiers the clamped value.
    pub fn assess(&self, raw: i32) -> RiskAssessment {
        let score = raw.clamp(0, MAX_SCORE) as u8;
        RiskAssessment {
            score,
            tier: self.tier_for(score),
        }
    }
}

/// Signed weight for every flag in the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    weights: BTreeMap<RiskFlag, i32>,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            weights: RiskFlag::iter().map(|f| (f, default_weight(f))).collect(),
        }
    }
}

pub fn default_weight(flag: RiskFlag) -> i32 {
    use RiskFlag::*;
    match flag {
        IncompatibilityZoneCommercialResidential => 30,
        UnpavedRoadWithCommercialCnae => 25,
        AbsenceOfCommercialSigns => 22,
        ResidentialAreaWithoutCommerce => 20,
        CompatibleHomeOffice => -10,
        OfficeInResidentialSuspicious => 15,
        OfficeInResidentialPossibleHomeOffice => 5,
        IndustryInNonIndustrialZone => 32,
        UndefinedZone => 10,
        AiLowCompatibility => 35,
        AiMediumCompatibility => 17,
        AiHighCompatibility => -10,
        NonCorporateEmail => 15,
        RecentDomain => 20,
        SuspiciousPhone => 15,
        RushedApproval => 10,
        DeliveryMarked => 10,
        MismatchedDeliveryAddress => 20,
        TyposquattingDetected => 50,
    }
}

impl WeightTable {
    pub fn weight(&self, flag: RiskFlag) -> i32 {
        self.weights.get(&flag).copied().unwrap_or_else(|| default_weight(flag))
    }

    pub fn with_overrides<I>(&self, overrides: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (RiskFlag, i32)>,
    {
        let mut table = self.clone();
        for (flag, weight) in overrides {
            if !(-MAX_ABS_WEIGHT..=MAX_ABS_WEIGHT).contains(&weight) {
                return Err(EngineError::WeightOutOfRange {
                    flag: flag.to_string(),
                    weight,
                });
            }
            table.weights.insert(flag, weight);
        }
        Ok(table)
    }

    /// Overrides keyed by flag token, as they appear in config files.
    pub fn with_named_overrides<I, S>(&self, overrides: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (S, i32)>,
        S: AsRef<str>,
    {
        let parsed = overrides
            .into_iter()
            .map(|(name, weight)| {
                let name = name.as_ref();
                name.parse::<RiskFlag>()
                    .map(|flag| (flag, weight))
                    .map_err(|_| EngineError::UnknownRiskFlag {
                        name: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.with_overrides(parsed)
    }

    pub fn raw_sum(&self, flags: &FlagSet) -> i32 {
        flags.iter().map(|f| self.weight(f)).sum()
    }
}

/// Additive scorer: sum of flag weights, clamped, then tiered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightedScorer {
    weights: WeightTable,
    thresholds: TierThresholds,
}

impl WeightedScorer {
    pub fn new(weights: WeightTable, thresholds: TierThresholds) -> Self {
        Self { weights, thresholds }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn thresholds(&self) -> TierThresholds {
        self.thresholds
    }
}

impl Scorer for WeightedScorer {
    fn score(&self, flags: &FlagSet) -> RiskAssessment {
        let raw = self.weights.raw_sum(flags);
        let assessment = self.thresholds.assess(raw);
        debug!(raw, score = assessment.score, tier = %assessment.tier, "Scored flags");
        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RiskFlag::*;

    #[test]
    fn test_thresholds_validation() {
        assert!(TierThresholds::new(60, 30).is_ok());
        assert!(TierThresholds::new(100, 1).is_ok());
        assert_eq!(
            TierThresholds::new(30, 60).unwrap_err(),
            EngineError::InvalidThresholds { high: 30, medium: 60 }
        );
        assert!(TierThresholds::new(50, 50).is_err());
        assert!(TierThresholds::new(60, 0).is_err());
        assert!(TierThresholds::new(101, 30).is_err());
    }

    #[test]
    fn test_tier_boundaries() {
        let thresholds = TierThresholds::default();
        assert_eq!(thresholds.tier_for(0), RiskTier::Low);
        assert_eq!(thresholds.tier_for(29), RiskTier::Low);
        assert_eq!(thresholds.tier_for(30), RiskTier::Medium);
        assert_eq!(thresholds.tier_for(59), RiskTier::Medium);
        assert_eq!(thresholds.tier_for(60), RiskTier::High);
        assert_eq!(thresholds.tier_for(100), RiskTier::High);
    }

    #[test]
    fn test_assess_clamps_both_ends() {
        let thresholds = TierThresholds::default();
        let high = thresholds.assess(145);
        assert_eq!((high.score(), high.tier()), (100, RiskTier::High));
        let low = thresholds.assess(-20);
        assert_eq!((low.score(), low.tier()), (0, RiskTier::Low));
    }

    #[test]
    fn test_empty_flag_set_scores_zero() {
        let assessment = WeightedScorer::default().score(&FlagSet::new());
        assert_eq!(assessment.score(), 0);
        assert_eq!(assessment.tier(), RiskTier::Low);
    }

    #[test]
    fn test_score_ignores_flag_order() {
        let scorer = WeightedScorer::default();
        let forward: FlagSet = vec![UndefinedZone, AiMediumCompatibility, RecentDomain].into();
        let backward: FlagSet = vec![RecentDomain, AiMediumCompatibility, UndefinedZone].into();
        assert_eq!(scorer.score(&forward), scorer.score(&backward));
        assert_eq!(scorer.score(&forward).score(), 47);
        assert_eq!(scorer.score(&forward).tier(), RiskTier::Medium);
    }

    #[test]
    fn test_mitigating_flags_lower_the_score() {
        let scorer = WeightedScorer::default();
        let flags: FlagSet = vec![UndefinedZone, AiHighCompatibility, CompatibleHomeOffice].into();
        assert_eq!(scorer.score(&flags).score(), 0);
    }

    #[test]
    fn test_overrides_by_token() {
        let weights = WeightTable::default()
            .with_named_overrides([("UNDEFINED_ZONE", 40)])
            .unwrap();
        assert_eq!(weights.weight(UndefinedZone), 40);
        assert_eq!(weights.weight(RecentDomain), 20);

        assert_eq!(
            WeightTable::default()
                .with_named_overrides([("NOT_A_FLAG", 1)])
                .unwrap_err(),
            EngineError::UnknownRiskFlag { name: "NOT_A_FLAG".to_string() }
        );
        assert!(matches!(
            WeightTable::default().with_overrides([(RecentDomain, 150)]),
            Err(EngineError::WeightOutOfRange { weight: 150, .. })
        ));
    }

    #[test]
    fn test_override_range_boundaries() {
        let weights = WeightTable::default()
            .with_overrides([(RecentDomain, -100), (SuspiciousPhone, 100)])
            .unwrap();
        assert_eq!(weights.weight(RecentDomain), -100);
        assert_eq!(weights.weight(SuspiciousPhone), 100);

        for weight in [-101, 101, i32::MIN, i32::MAX] {
            assert!(matches!(
                WeightTable::default().with_overrides([(RecentDomain, weight)]),
                Err(EngineError::WeightOutOfRange { weight: w, .. }) if w == weight
            ));
        }
    }

    #[test]
    fn test_custom_thresholds_change_tier_only() {
        let flags: FlagSet = vec![AiLowCompatibility].into();
        let strict = WeightedScorer::new(WeightTable::default(), TierThresholds::new(35, 10).unwrap());
        let lenient = WeightedScorer::default();
        assert_eq!(strict.score(&flags).score(), lenient.score(&flags).score());
        assert_eq!(strict.score(&flags).tier(), RiskTier::High);
        assert_eq!(lenient.score(&flags).tier(), RiskTier::Medium);
    }
}
