use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use risk_engine::model::{AuxiliaryFlags, AuxiliarySignal};

pub const DEFAULT_MIN_DOMAIN_AGE_DAYS: i64 = 180;
pub const TYPOSQUATTING_SIMILARITY: f64 = 0.8;

pub const FREE_MAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "hotmail.com",
    "hotmail.com.br",
    "outlook.com",
    "outlook.com.br",
    "live.com",
    "msn.com",
    "yahoo.com",
    "yahoo.com.br",
    "icloud.com",
    "bol.com.br",
    "uol.com.br",
    "terra.com.br",
    "ig.com.br",
    "protonmail.com",
];

lazy_static::lazy_static! {
    static ref EMAIL_DOMAIN: Regex = Regex::new(r"[^@]+@([^@]+\.[^@]+)").unwrap();
}

/// Raw facts gathered by collaborators about the registrant's contact data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactFacts {
    /// Email the business registered with us.
    #[serde(default)]
    pub registered_email: Option<String>,
    /// Email the public company registry lists for the CNPJ.
    #[serde(default)]
    pub registry_email: Option<String>,
    #[serde(default)]
    pub domain_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suspicious_phone: bool,
    #[serde(default)]
    pub rushed_approval: bool,
    #[serde(default)]
    pub delivery_marked: bool,
    #[serde(default)]
    pub mismatched_delivery_address: bool,
}

pub fn email_domain(email: &str) -> Option<String> {
    EMAIL_DOMAIN
        .captures(email.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

pub fn is_free_mail(domain: &str) -> bool {
    FREE_MAIL_DOMAINS.contains(&normalize_domain(domain).as_str())
}

pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    match lowered.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Lookalike comparison between two email domains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainSimilarity {
    pub distance: usize,
    pub similarity: f64,
    /// Positions where a look-alike character was swapped in (`o`/`0`, `l`/`1`, ...).
    pub substitutions: Vec<String>,
}

impl DomainSimilarity {
    pub fn compare(left: &str, right: &str) -> Self {
        let left = normalize_domain(left);
        let right = normalize_domain(right);
        let distance = levenshtein(&left, &right);
        let longest = left.chars().count().max(right.chars().count());
        let similarity = if longest == 0 {
            0.0
        } else {
            1.0 - distance as f64 / longest as f64
        };
        Self {
            distance,
            similarity,
            substitutions: lookalike_substitutions(&left, &right),
        }
    }

    /// Identical domains are a match, not an impersonation.
    pub fn is_typosquatting(&self) -> bool {
        self.distance > 0 && self.similarity >= TYPOSQUATTING_SIMILARITY
    }
}

fn lookalike(c: char) -> Option<char> {
    match c {
        'o' => Some('0'),
        '0' => Some('o'),
        'i' | 'l' => Some('1'),
        '1' => Some('i'),
        'e' => Some('3'),
        '3' => Some('e'),
        'a' => Some('4'),
        '4' => Some('a'),
        's' => Some('5'),
        '5' => Some('s'),
        't' => Some('7'),
        '7' => Some('t'),
        'b' => Some('8'),
        '8' => Some('b'),
        'g' => Some('9'),
        '9' => Some('g'),
        _ => None,
    }
}

fn lookalike_substitutions(left: &str, right: &str) -> Vec<String> {
    if left.chars().count() != right.chars().count() {
        return Vec::new();
    }
    left.chars()
        .zip(right.chars())
        .enumerate()
        .filter(|(_, (a, b))| a != b && (lookalike(*a) == Some(*b) || lookalike(*b) == Some(*a)))
        .map(|(i, (a, b))| format!("{i}: '{a}' -> '{b}'"))
        .collect()
}

/// Derives the auxiliary signals the engine scores.
#[derive(Debug, Clone, Copy)]
pub struct SignalDeriver {
    min_domain_age_days: i64,
}

impl Default for SignalDeriver {
    fn default() -> Self {
        Self {
            min_domain_age_days: DEFAULT_MIN_DOMAIN_AGE_DAYS,
        }
    }
}

impl SignalDeriver {
    pub fn new(min_domain_age_days: Option<i64>) -> Self {
        Self {
            min_domain_age_days: min_domain_age_days.unwrap_or(DEFAULT_MIN_DOMAIN_AGE_DAYS),
        }
    }

    /// Absent facts never raise a signal.
    pub fn derive(&self, facts: &ContactFacts, evaluated_at: DateTime<Utc>) -> AuxiliaryFlags {
        let registered = facts.registered_email.as_deref().and_then(email_domain);
        let registry = facts.registry_email.as_deref().and_then(email_domain);

        let non_corporate = registered.as_deref().is_some_and(is_free_mail);
        let recent = facts.domain_created_at.is_some_and(|created| {
            (evaluated_at - created).num_days() < self.min_domain_age_days
        });
        let typosquatting = match (&registered, &registry) {
            (Some(ours), Some(theirs)) => {
                let comparison = DomainSimilarity::compare(ours, theirs);
                debug!(
                    registered = %ours,
                    registry = %theirs,
                    similarity = comparison.similarity,
                    "Compared email domains"
                );
                comparison.is_typosquatting()
            }
            _ => false,
        };

        AuxiliaryFlags::new()
            .with(AuxiliarySignal::NonCorporateEmail, non_corporate)
            .with(AuxiliarySignal::RecentDomain, recent)
            .with(AuxiliarySignal::SuspiciousPhone, facts.suspicious_phone)
            .with(AuxiliarySignal::RushedApproval, facts.rushed_approval)
            .with(AuxiliarySignal::DeliveryMarked, facts.delivery_marked)
            .with(AuxiliarySignal::MismatchedDeliveryAddress, facts.mismatched_delivery_address)
            .with(AuxiliarySignal::Typosquatting, typosquatting)
    }
}
