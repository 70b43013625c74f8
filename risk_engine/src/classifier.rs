use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};
use tracing::{debug, trace};

use crate::{
    error::EngineError,
    model::{ActivityCode, ExpectedLocationType},
};

const MIN_PREFIX_LEN: usize = 2;
const MAX_PREFIX_LEN: usize = 5;

lazy_static::lazy_static! {
    // Full sub-class is 7 digits; a bare 4- or 5-digit class is accepted too.
    static ref NORMALIZED_CODE: Regex = Regex::new(r"^([0-9]{4,5}|[0-9]{7})$").unwrap();
    static ref TABLE_PREFIX: Regex = Regex::new(r"^[0-9]{2,5}$").unwrap();
}

/// Which declared activities decide the expected location type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExpectationScope {
    /// Only the principal (first) activity.
    #[default]
    Principal,
    /// Every declared activity; the most restrictive type wins.
    MostRestrictive,
}

/// Strips CNAE punctuation ("6201-5/01" -> "6201501") and checks the shape.
pub fn normalize_code(raw: &str) -> Result<String, EngineError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | '/' | '.') && !c.is_whitespace())
        .collect();
    if NORMALIZED_CODE.is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err(EngineError::MalformedActivityCode {
            code: raw.to_string(),
        })
    }
}

/// CNAE class prefix -> expected location type, resolved by longest prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CnaeTable {
    entries: BTreeMap<String, ExpectedLocationType>,
}

impl CnaeTable {
    /// Builds a table from ordered entries; a repeated prefix keeps the later type.
    pub fn new<I, S>(entries: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (S, ExpectedLocationType)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (prefix, location_type) in entries {
            table.insert(prefix, location_type)?;
        }
        Ok(table)
    }

    pub fn insert(
        &mut self,
        prefix: impl Into<String>,
        location_type: ExpectedLocationType,
    ) -> Result<(), EngineError> {
        let prefix = prefix.into();
        if !TABLE_PREFIX.is_match(&prefix) {
            return Err(EngineError::InvalidCnaePrefix { prefix });
        }
        self.entries.insert(prefix, location_type);
        Ok(())
    }

    /// Copy of this table with `overrides` layered on top.
    pub fn with_overrides<I, S>(&self, overrides: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (S, ExpectedLocationType)>,
        S: Into<String>,
    {
        let mut table = self.clone();
        for (prefix, location_type) in overrides {
            table.insert(prefix, location_type)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unmapped and malformed codes resolve to `Unknown`.
    pub fn classify(&self, activity: &ActivityCode) -> ExpectedLocationType {
        self.try_classify(activity).unwrap_or_else(|e| {
            debug!(code = %activity.code, error = %e, "Unclassifiable activity code");
            ExpectedLocationType::Unknown
        })
    }

    /// Like [`CnaeTable::classify`], but rejects malformed codes.
    pub fn try_classify(&self, activity: &ActivityCode) -> Result<ExpectedLocationType, EngineError> {
        let code = normalize_code(&activity.code)?;
        let longest = code.len().min(MAX_PREFIX_LEN);
        for len in (MIN_PREFIX_LEN..=longest).rev() {
            if let Some(location_type) = self.entries.get(&code[..len]) {
                trace!(code = %code, prefix = &code[..len], %location_type, "CNAE prefix matched");
                return Ok(*location_type);
            }
        }
        Ok(ExpectedLocationType::Unknown)
    }

    /// Expected location type for a business' declared activities, principal first.
    pub fn resolve(
        &self,
        activities: &[ActivityCode],
        scope: ExpectationScope,
    ) -> Result<ExpectedLocationType, EngineError> {
        let (principal, secondary) = activities
            .split_first()
            .ok_or(EngineError::EmptyActivityList)?;

        let principal_type = self.try_classify(principal)?;
        let secondary_types = secondary
            .iter()
            .map(|activity| self.try_classify(activity))
            .collect::<Result<Vec<_>, _>>()?;

        let resolved = match scope {
            ExpectationScope::Principal => principal_type,
            ExpectationScope::MostRestrictive => secondary_types
                .into_iter()
                .fold(principal_type, |current, candidate| {
                    if candidate.restrictiveness() > current.restrictiveness() {
                        candidate
                    } else {
                        current
                    }
                }),
        };
        debug!(principal = %principal.code, %scope, expected = %resolved, "Resolved expected location type");
        Ok(resolved)
    }
}
