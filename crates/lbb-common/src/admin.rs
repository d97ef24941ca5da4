//! Manual overrides layered on top of the bulk-imported office table.
//!
//! Imported rows are never edited in place at request time. Overrides are
//! either applied as a read-time overlay or materialised between import
//! cycles by `update_offices`.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

use crate::office::Office;

static RE_SIRET_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;\s]+").unwrap());
static RE_SIRET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{14}$").unwrap());

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OverrideError {
    #[error("invalid siret: {0}")]
    InvalidSiret(String),
    #[error("override {0} lists no siret")]
    NoSiret(i64),
    #[error("override {id} has a score outside 0..=100: {score}")]
    ScoreOutOfRange { id: i64, score: String },
}

/// Third-party updates come from partners; admin updates from back-office
/// staff and win when both touch the same field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverrideSource {
    ThirdParty,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeOverride {
    pub id: i64,
    pub source: OverrideSource,
    pub sirets: Vec<String>,
    /// `Some(0.0)` hides the office from regular-hiring searches.
    #[serde(default)]
    pub score: Option<f64>,
    /// `Some(0.0)` hides the office from apprenticeship searches.
    #[serde(default)]
    pub score_alternance: Option<f64>,
    #[serde(default)]
    pub new_email: Option<String>,
    #[serde(default)]
    pub new_phone: Option<String>,
    #[serde(default)]
    pub new_website: Option<String>,
    #[serde(default)]
    pub social_network: Option<String>,
    #[serde(default)]
    pub contact_mode: Option<String>,
    #[serde(default)]
    pub remove_email: bool,
    #[serde(default)]
    pub remove_phone: bool,
    #[serde(default)]
    pub remove_website: bool,
}

impl OfficeOverride {
    pub fn new(id: i64, source: OverrideSource, sirets: Vec<String>) -> Self {
        Self {
            id,
            source,
            sirets,
            score: None,
            score_alternance: None,
            new_email: None,
            new_phone: None,
            new_website: None,
            social_network: None,
            contact_mode: None,
            remove_email: false,
            remove_phone: false,
            remove_website: false,
        }
    }

    pub fn validate(&self) -> Result<(), OverrideError> {
        if self.sirets.is_empty() {
            return Err(OverrideError::NoSiret(self.id));
        }
        if let Some(bad) = self.sirets.iter().find(|siret| !RE_SIRET.is_match(siret)) {
            return Err(OverrideError::InvalidSiret(bad.clone()));
        }
        for score in [self.score, self.score_alternance].into_iter().flatten() {
            if !(0.0..=100.0).contains(&score) {
                return Err(OverrideError::ScoreOutOfRange {
                    id: self.id,
                    score: score.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Write this override onto an office row.
    pub fn apply(&self, office: &mut Office) {
        if let Some(score) = self.score {
            office.score = score;
        }
        if let Some(score) = self.score_alternance {
            office.score_alternance = score;
        }

        if self.remove_email {
            office.email.clear();
        } else if let Some(email) = &self.new_email {
            office.email = email.clone();
        }
        if self.remove_phone {
            office.tel.clear();
        } else if let Some(phone) = &self.new_phone {
            office.tel = phone.clone();
        }
        if self.remove_website {
            office.website.clear();
        } else if let Some(website) = &self.new_website {
            office.website = website.clone();
        }

        if let Some(social_network) = &self.social_network {
            office.social_network = social_network.clone();
        }
        if let Some(contact_mode) = &self.contact_mode {
            office.contact_mode = contact_mode.clone();
        }
    }
}

/// Sirets typed in a back-office textarea: commas, semicolons, blanks or newlines.
pub fn parse_sirets(raw: &str) -> Result<Vec<String>, OverrideError> {
    let mut sirets = Vec::new();
    for siret in RE_SIRET_SEPARATOR.split(raw.trim()).filter(|s| !s.is_empty()) {
        if !RE_SIRET.is_match(siret) {
            return Err(OverrideError::InvalidSiret(siret.to_string()));
        }
        if !sirets.iter().any(|known| known == siret) {
            sirets.push(siret.to_string());
        }
    }
    Ok(sirets)
}

/// Overrides indexed by siret, in application order.
#[derive(Debug, Clone, Default)]
pub struct AdminOverlay {
    by_siret: HashMap<String, Vec<OfficeOverride>>,
}

impl AdminOverlay {
    pub fn new(mut overrides: Vec<OfficeOverride>) -> Self {
        overrides.sort_by_key(|o| (o.source, o.id));

        let mut by_siret: HashMap<String, Vec<OfficeOverride>> = HashMap::new();
        for item in overrides {
            for siret in &item.sirets {
                by_siret.entry(siret.clone()).or_default().push(item.clone());
            }
        }
        Self { by_siret }
    }

    pub fn is_empty(&self) -> bool {
        self.by_siret.is_empty()
    }

    pub fn touches(&self, siret: &str) -> bool {
        self.by_siret.contains_key(siret)
    }

    pub fn sirets(&self) -> impl Iterator<Item = &str> {
        self.by_siret.keys().map(String::as_str)
    }

    /// Third-party overrides first, then admin ones; later ids win.
    pub fn apply(&self, office: &mut Office) {
        if let Some(overrides) = self.by_siret.get(&office.siret) {
            for item in overrides {
                item.apply(office);
            }
        }
    }

    /// Whether back-office staff took this office off La Bonne Alternance.
    /// An office with a positive apprenticeship score never is.
    pub fn is_removed_from_lba(&self, office: &Office) -> bool {
        if office.score_alternance > 0.0 {
            return false;
        }
        self.by_siret.get(&office.siret).is_some_and(|overrides| {
            overrides
                .iter()
                .any(|item| item.source == OverrideSource::Admin && item.score_alternance == Some(0.0))
        })
    }
}

/// An email address removed from an office on request. Kept so that later
/// imports do not bring it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub email: String,
    pub removed_at: NaiveDateTime,
}

impl BlacklistEntry {
    /// The address an override erased from `before`, if any. A replaced
    /// address is a correction and is not blacklisted.
    pub fn for_removal(before: &Office, after: &Office, removed_at: NaiveDateTime) -> Option<Self> {
        let email = before.email.trim();
        if email.is_empty() || !after.email.trim().is_empty() {
            return None;
        }
        Some(Self {
            email: email.to_string(),
            removed_at,
        })
    }
}
