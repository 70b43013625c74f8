use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::EngineError;

/// Closed vocabulary of rule triggers. The string tokens are persisted and
/// keyed on downstream, so they must never change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFlag {
    // scene-derived
    IncompatibilityZoneCommercialResidential,
    UnpavedRoadWithCommercialCnae,
    AbsenceOfCommercialSigns,
    ResidentialAreaWithoutCommerce,
    CompatibleHomeOffice,
    OfficeInResidentialSuspicious,
    OfficeInResidentialPossibleHomeOffice,
    IndustryInNonIndustrialZone,
    UndefinedZone,
    AiLowCompatibility,
    AiMediumCompatibility,
    AiHighCompatibility,
    // auxiliary
    NonCorporateEmail,
    RecentDomain,
    SuspiciousPhone,
    RushedApproval,
    DeliveryMarked,
    MismatchedDeliveryAddress,
    TyposquattingDetected,
}

/// Insertion-ordered set of flags. Adding a flag twice keeps the first position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RiskFlag>", into = "Vec<RiskFlag>")]
pub struct FlagSet {
    flags: Vec<RiskFlag>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the flag was already present.
    pub fn insert(&mut self, flag: RiskFlag) -> bool {
        if self.flags.contains(&flag) {
            return false;
        }
        self.flags.push(flag);
        true
    }

    pub fn contains(&self, flag: RiskFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = RiskFlag> + '_ {
        self.flags.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn as_slice(&self) -> &[RiskFlag] {
        &self.flags
    }

    /// Flag tokens in insertion order.
    pub fn tokens(&self) -> Vec<&'static str> {
        self.flags.iter().map(|&f| <&'static str>::from(f)).collect()
    }
}

impl Extend<RiskFlag> for FlagSet {
    fn extend<T: IntoIterator<Item = RiskFlag>>(&mut self, iter: T) {
        for flag in iter {
            self.insert(flag);
        }
    }
}

impl FromIterator<RiskFlag> for FlagSet {
    fn from_iter<T: IntoIterator<Item = RiskFlag>>(iter: T) -> Self {
        let mut set = FlagSet::new();
        set.extend(iter);
        set
    }
}

impl From<Vec<RiskFlag>> for FlagSet {
    fn from(flags: Vec<RiskFlag>) -> Self {
        flags.into_iter().collect()
    }
}

impl From<FlagSet> for Vec<RiskFlag> {
    fn from(set: FlagSet) -> Self {
        set.flags
    }
}

/// Boolean signals gathered outside the visual analysis. Declaration order
/// is the order their flags are appended to a result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuxiliarySignal {
    NonCorporateEmail,
    RecentDomain,
    SuspiciousPhone,
    RushedApproval,
    DeliveryMarked,
    MismatchedDeliveryAddress,
    Typosquatting,
}

impl AuxiliarySignal {
    pub fn flag(self) -> RiskFlag {
        match self {
            Self::NonCorporateEmail => RiskFlag::NonCorporateEmail,
            Self::RecentDomain => RiskFlag::RecentDomain,
            Self::SuspiciousPhone => RiskFlag::SuspiciousPhone,
            Self::RushedApproval => RiskFlag::RushedApproval,
            Self::DeliveryMarked => RiskFlag::DeliveryMarked,
            Self::MismatchedDeliveryAddress => RiskFlag::MismatchedDeliveryAddress,
            Self::Typosquatting => RiskFlag::TyposquattingDetected,
        }
    }
}

/// Signal name -> value. Unknown names are rejected on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, bool>", into = "BTreeMap<String, bool>")]
pub struct AuxiliaryFlags {
    values: BTreeMap<AuxiliarySignal, bool>,
}

impl AuxiliaryFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_named<I, S>(named: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let mut flags = Self::new();
        for (name, value) in named {
            let name = name.as_ref();
            let signal = name
                .parse::<AuxiliarySignal>()
                .map_err(|_| EngineError::UnknownAuxiliarySignal {
                    name: name.to_string(),
                })?;
            flags.set(signal, value);
        }
        Ok(flags)
    }

    pub fn with(mut self, signal: AuxiliarySignal, value: bool) -> Self {
        self.set(signal, value);
        self
    }

    pub fn set(&mut self, signal: AuxiliarySignal, value: bool) {
        self.values.insert(signal, value);
    }

    pub fn get(&self, signal: AuxiliarySignal) -> bool {
        self.values.get(&signal).copied().unwrap_or(false)
    }

    /// Flags of the raised signals, in canonical signal order.
    pub fn raised_flags(&self) -> impl Iterator<Item = RiskFlag> + '_ {
        AuxiliarySignal::iter()
            .filter(|signal| self.get(*signal))
            .map(AuxiliarySignal::flag)
    }
}

impl TryFrom<BTreeMap<String, bool>> for AuxiliaryFlags {
    type Error = EngineError;

    fn try_from(named: BTreeMap<String, bool>) -> Result<Self, Self::Error> {
        Self::from_named(named)
    }
}

impl From<AuxiliaryFlags> for BTreeMap<String, bool> {
    fn from(flags: AuxiliaryFlags) -> Self {
        flags
            .values
            .into_iter()
            .map(|(signal, value)| (signal.to_string(), value))
            .collect()
    }
}
