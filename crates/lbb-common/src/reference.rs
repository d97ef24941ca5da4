//! Static reference data: sector and occupation labels, the ROME ↔ NAF
//! hiring table, headcount brackets, communes and occupation keywords.
//!
//! A copy ships with the crate; `LBB_REFERENCE_DATA` may point to a refreshed
//! file with the same layout.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::geo::GeoPoint;
use crate::mapping::RomeNafMapping;

const BUNDLED: &str = include_str!("../data/reference.json");

/// City codes under this prefix belong to Paris arrondissements, which the
/// commune table does not list individually.
const PARIS_CITY_CODE_PREFIX: &str = "75";
const PARIS_CITY_NAME: &str = "Paris";

#[derive(Debug, Error)]
pub enum ReferenceDataError {
    #[error("failed to read reference data {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed reference data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("inconsistent reference data: {0}")]
    Inconsistent(String),
}

/// A city code missing from the commune table outside the Paris range.
/// Signals corrupt office data, not a caller mistake.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown city code: {0}")]
pub struct LookupError(pub String);

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Commune {
    pub code: String,
    pub name: String,
    pub zipcode: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Commune {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// One job title ("OGR" label) pointing at its occupation code.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OgrLabel {
    pub label: String,
    pub rome_code: String,
}

#[derive(Debug, Deserialize)]
struct RawReferenceData {
    naf_labels: BTreeMap<String, String>,
    rome_labels: BTreeMap<String, String>,
    naf_rome_hirings: BTreeMap<String, BTreeMap<String, u32>>,
    #[serde(default)]
    manual_rome_naf_hirings: BTreeMap<String, BTreeMap<String, u32>>,
    headcount_labels: BTreeMap<String, String>,
    communes: Vec<Commune>,
    #[serde(default)]
    ogr_labels: Vec<OgrLabel>,
    /// Sirets of employer groups (groupements d'employeurs).
    #[serde(default)]
    groupements_employeurs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReferenceData {
    naf_labels: BTreeMap<String, String>,
    rome_labels: BTreeMap<String, String>,
    headcount_labels: BTreeMap<String, String>,
    communes: HashMap<String, Commune>,
    ogr_labels: Vec<OgrLabel>,
    groupements_employeurs: HashSet<String>,
    mapping: RomeNafMapping,
}

impl ReferenceData {
    pub fn bundled() -> Result<Self, ReferenceDataError> {
        Self::from_json_str(BUNDLED)
    }

    /// `LBB_REFERENCE_DATA` when set, the bundled copy otherwise.
    pub fn load() -> Result<Self, ReferenceDataError> {
        match std::env::var_os("LBB_REFERENCE_DATA") {
            Some(path) => Self::from_path(Path::new(&path)),
            None => Self::bundled(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ReferenceDataError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ReferenceDataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let data = Self::from_json_str(&raw)?;
        info!(path = %path.display(), "loaded reference data");
        Ok(data)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ReferenceDataError> {
        let raw: RawReferenceData = serde_json::from_str(raw)?;

        if let Some(naf) = raw
            .naf_rome_hirings
            .keys()
            .chain(raw.manual_rome_naf_hirings.values().flat_map(|m| m.keys()))
            .find(|naf| !raw.naf_labels.contains_key(*naf))
        {
            return Err(ReferenceDataError::Inconsistent(format!(
                "mapped NAF code {naf} has no label"
            )));
        }

        if let Some(rome) = raw
            .naf_rome_hirings
            .values()
            .flat_map(|m| m.keys())
            .chain(raw.manual_rome_naf_hirings.keys())
            .chain(raw.ogr_labels.iter().map(|ogr| &ogr.rome_code))
            .find(|rome| !raw.rome_labels.contains_key(*rome))
        {
            return Err(ReferenceDataError::Inconsistent(format!(
                "ROME code {rome} has no label"
            )));
        }

        let communes = raw
            .communes
            .into_iter()
            .map(|commune| (commune.code.clone(), commune))
            .collect();

        Ok(Self {
            mapping: RomeNafMapping::new(raw.naf_rome_hirings, raw.manual_rome_naf_hirings),
            naf_labels: raw.naf_labels,
            rome_labels: raw.rome_labels,
            headcount_labels: raw.headcount_labels,
            communes,
            ogr_labels: raw.ogr_labels,
            groupements_employeurs: raw.groupements_employeurs.into_iter().collect(),
        })
    }

    pub fn mapping(&self) -> &RomeNafMapping {
        &self.mapping
    }

    pub fn naf_label(&self, naf_code: &str) -> Option<&str> {
        self.naf_labels.get(naf_code).map(String::as_str)
    }

    pub fn rome_label(&self, rome_code: &str) -> Option<&str> {
        self.rome_labels.get(rome_code).map(String::as_str)
    }

    /// `(code, label)` for every known occupation, by code.
    pub fn rome_labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rome_labels
            .iter()
            .map(|(code, label)| (code.as_str(), label.as_str()))
    }

    pub fn naf_labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.naf_labels
            .iter()
            .map(|(code, label)| (code.as_str(), label.as_str()))
    }

    pub fn is_known_rome(&self, rome_code: &str) -> bool {
        self.rome_labels.contains_key(rome_code)
    }

    pub fn headcount_label(&self, headcount: &str) -> Option<&str> {
        self.headcount_labels.get(headcount).map(String::as_str)
    }

    pub fn commune(&self, commune_id: &str) -> Option<&Commune> {
        self.communes.get(commune_id)
    }

    /// City name for an office's city code, with the Paris fallback.
    pub fn city_name(&self, city_code: &str) -> Result<&str, LookupError> {
        match self.communes.get(city_code) {
            Some(commune) => Ok(commune.name.as_str()),
            None if city_code.starts_with(PARIS_CITY_CODE_PREFIX) => Ok(PARIS_CITY_NAME),
            None => Err(LookupError(city_code.to_string())),
        }
    }

    pub fn ogr_labels(&self) -> &[OgrLabel] {
        &self.ogr_labels
    }

    pub fn is_groupement_employeurs(&self, siret: &str) -> bool {
        self.groupements_employeurs.contains(siret)
    }
}
