//! Compatibility rules: an ordered decision table over the expected location
//! type and the observed scene.
//!
//! Every rule is evaluated for every scene, so unrelated conditions stack.
//! Flag order in the output follows rule order.

use tracing::debug;

use crate::model::{
    ApparentZone, CompatibilityLevel, ExpectedLocationType, FlagSet, RiskFlag, RoadType,
    VisualAnalysis, VisualInput,
};

/// Inputs every rule predicate sees.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub expected: ExpectedLocationType,
    pub visual: &'a VisualAnalysis,
}

pub type RulePredicate = Box<dyn Fn(&RuleContext<'_>) -> Option<RiskFlag> + Send + Sync>;

pub struct CompatibilityRule {
    pub name: &'static str,
    predicate: RulePredicate,
}

impl CompatibilityRule {
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&RuleContext<'_>) -> Option<RiskFlag> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            predicate: Box::new(predicate),
        }
    }

    pub fn apply(&self, ctx: &RuleContext<'_>) -> Option<RiskFlag> {
        (self.predicate)(ctx)
    }
}

impl std::fmt::Debug for CompatibilityRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatibilityRule").field("name", &self.name).finish()
    }
}

/// What the rules engine hands to the scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub compatibility_level: CompatibilityLevel,
    pub flags: FlagSet,
}

#[derive(Debug)]
pub struct RulesEngine {
    rules: Vec<CompatibilityRule>,
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl RulesEngine {
    /// An engine with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::empty();
        engine.add_rule("zone_commercial_residential", zone_commercial_residential);
        engine.add_rule("unpaved_road_commercial", unpaved_road_commercial);
        engine.add_rule("absence_of_commercial_signs", absence_of_commercial_signs);
        engine.add_rule("residential_area_without_commerce", residential_area_without_commerce);
        engine.add_rule("compatible_home_office", compatible_home_office);
        engine.add_rule("office_in_residential", office_in_residential);
        engine.add_rule("industry_in_non_industrial_zone", industry_in_non_industrial_zone);
        engine.add_rule("undefined_zone", undefined_zone);
        engine.add_rule("reported_compatibility", reported_compatibility);
        engine
    }

    pub fn add_rule(
        &mut self,
        name: &'static str,
        predicate: impl Fn(&RuleContext<'_>) -> Option<RiskFlag> + Send + Sync + 'static,
    ) {
        self.rules.push(CompatibilityRule::new(name, predicate));
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Without an analyzed scene no rule runs and compatibility stays `Unknown`.
    pub fn evaluate(&self, expected: ExpectedLocationType, visual: &VisualInput) -> Evaluation {
        let Some(analysis) = visual.analysis() else {
            debug!(%expected, "No visual analysis, skipping scene rules");
            return Evaluation {
                compatibility_level: CompatibilityLevel::Unknown,
                flags: FlagSet::new(),
            };
        };

        let ctx = RuleContext {
            expected,
            visual: analysis,
        };
        let mut flags = FlagSet::new();
        for rule in &self.rules {
            if let Some(flag) = rule.apply(&ctx) {
                debug!(rule = rule.name, %flag, "Rule fired");
                flags.insert(flag);
            }
        }

        Evaluation {
            compatibility_level: analysis.reported_compatibility,
            flags,
        }
    }
}

fn when(condition: bool, flag: RiskFlag) -> Option<RiskFlag> {
    condition.then_some(flag)
}

pub fn zone_commercial_residential(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    when(
        matches!(
            ctx.expected,
            ExpectedLocationType::Commercial | ExpectedLocationType::Industrial
        ) && ctx.visual.zone == ApparentZone::Residential,
        RiskFlag::IncompatibilityZoneCommercialResidential,
    )
}

pub fn unpaved_road_commercial(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    when(
        ctx.expected == ExpectedLocationType::Commercial
            && ctx.visual.zone == ApparentZone::Residential
            && ctx.visual.road == RoadType::Unpaved,
        RiskFlag::UnpavedRoadWithCommercialCnae,
    )
}

pub fn absence_of_commercial_signs(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    when(
        ctx.expected == ExpectedLocationType::Commercial
            && !ctx.visual.commercial_signage
            && !ctx.visual.storefront,
        RiskFlag::AbsenceOfCommercialSigns,
    )
}

pub fn residential_area_without_commerce(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    when(
        ctx.expected == ExpectedLocationType::Commercial
            && ctx.visual.residential_houses
            && !ctx.visual.storefront,
        RiskFlag::ResidentialAreaWithoutCommerce,
    )
}

pub fn compatible_home_office(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    when(
        ctx.expected == ExpectedLocationType::HomeOfficeOk
            && ctx.visual.zone == ApparentZone::Residential
            && ctx.visual.residential_houses,
        RiskFlag::CompatibleHomeOffice,
    )
}

/// Emits at most one of the two office flags; the mitigating reading is checked first.
pub fn office_in_residential(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    if ctx.expected != ExpectedLocationType::Office || ctx.visual.zone != ApparentZone::Residential {
        return None;
    }
    let looks_like_home_office = !ctx.visual.storefront
        && !ctx.visual.commercial_signage
        && ctx.visual.residential_houses;
    if looks_like_home_office {
        Some(RiskFlag::OfficeInResidentialPossibleHomeOffice)
    } else {
        Some(RiskFlag::OfficeInResidentialSuspicious)
    }
}

pub fn industry_in_non_industrial_zone(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    when(
        ctx.expected == ExpectedLocationType::Industrial
            && !matches!(ctx.visual.zone, ApparentZone::Industrial | ApparentZone::Rural),
        RiskFlag::IndustryInNonIndustrialZone,
    )
}

pub fn undefined_zone(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    when(ctx.visual.zone == ApparentZone::Undefined, RiskFlag::UndefinedZone)
}

/// Exactly one AI flag for a known opinion, none for `Unknown`.
pub fn reported_compatibility(ctx: &RuleContext<'_>) -> Option<RiskFlag> {
    match ctx.visual.reported_compatibility {
        CompatibilityLevel::Low => Some(RiskFlag::AiLowCompatibility),
        CompatibilityLevel::Medium => Some(RiskFlag::AiMediumCompatibility),
        CompatibilityLevel::High => Some(RiskFlag::AiHighCompatibility),
        CompatibilityLevel::Unknown => None,
    }
}
