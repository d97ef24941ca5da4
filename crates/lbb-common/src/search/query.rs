//! Search request validation.
//!
//! Every argument is checked before the index or the store is queried,
//! including the keyword lookup of a `rome_codes_keyword_search`.
//! Messages are part of the public API: consumers match on them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::departement::is_known_departement;
use crate::geo::GeoPoint;
use crate::index::IndexError;
use crate::office::{HiringType, Office};
use crate::reference::{Commune, LookupError, ReferenceData};
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Invalid request argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Backend(#[from] IndexError),
}

fn invalid(message: impl Into<String>) -> SearchError {
    SearchError::InvalidArgument(message.into())
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HeadcountFilter {
    #[default]
    All,
    Small,
    Big,
}

impl HeadcountFilter {
    /// Code the public site uses for this filter in its `h` parameter.
    pub fn site_code(self) -> u8 {
        match self {
            HeadcountFilter::All => 1,
            HeadcountFilter::Small => 2,
            HeadcountFilter::Big => 3,
        }
    }

    pub fn accepts(self, office: &Office, small_only_maximum: u32) -> bool {
        match self {
            HeadcountFilter::All => true,
            HeadcountFilter::Small => office.is_small(small_only_maximum),
            HeadcountFilter::Big => !office.is_small(small_only_maximum),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Score,
    Distance,
}

/// Where a search is centred.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Commune(Commune),
    Coordinates(GeoPoint),
}

impl Origin {
    pub fn location(&self) -> GeoPoint {
        match self {
            Origin::Commune(commune) => commune.location(),
            Origin::Coordinates(point) => *point,
        }
    }

    pub fn commune_id(&self) -> Option<&str> {
        match self {
            Origin::Commune(commune) => Some(&commune.code),
            Origin::Coordinates(_) => None,
        }
    }

    pub fn zipcode(&self) -> Option<&str> {
        match self {
            Origin::Commune(commune) => Some(&commune.zipcode),
            Origin::Coordinates(_) => None,
        }
    }
}

/// How the caller designated the occupations to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomeRequest {
    Codes(Vec<String>),
    Keyword(String),
}

/// Arguments validated independently of the searched occupations.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchArguments {
    pub distance_km: f64,
    pub headcount: HeadcountFilter,
    pub hiring_type: HiringType,
    pub departments: BTreeSet<String>,
    pub sort: SortOrder,
    pub page: usize,
    pub page_size: usize,
}

/// Query-string arguments as received, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub commune_id: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub rome_codes: Option<String>,
    pub rome_codes_keyword_search: Option<String>,
    pub naf_codes: Option<String>,
    pub distance: Option<String>,
    pub headcount: Option<String>,
    pub contract: Option<String>,
    pub departments: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub origin_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub origin: Origin,
    pub rome_codes: Vec<String>,
    /// Explicit sector filter; empty means every sector of the occupations.
    pub naf_codes: BTreeSet<String>,
    pub distance_km: f64,
    pub headcount: HeadcountFilter,
    pub hiring_type: HiringType,
    pub departments: BTreeSet<String>,
    pub sort: SortOrder,
    pub page: usize,
    pub page_size: usize,
    pub origin_user: Option<String>,
}

impl SearchQuery {
    pub fn single_rome(&self) -> Option<&str> {
        match self.rome_codes.as_slice() {
            [rome] => Some(rome),
            _ => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        if !items.iter().any(|known| known == item) {
            items.push(item.to_string());
        }
    }
    items
}

fn parse_coordinate(raw: &str, bound: f64) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.abs() <= bound)
}

fn parse_positive(raw: Option<&str>, name: &str, default: usize) -> Result<usize, SearchError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| invalid(format!("{name} must be a positive integer"))),
    }
}

impl SearchParams {
    /// Search origin, from `commune_id` or from `latitude` and `longitude`.
    pub fn origin(&self, reference: &ReferenceData) -> Result<Origin, SearchError> {
        if let Some(commune_id) = non_empty(&self.commune_id) {
            return reference
                .commune(commune_id)
                .cloned()
                .map(Origin::Commune)
                .ok_or_else(|| invalid("could not resolve latitude and longitude from given commune_id"));
        }

        match (&self.latitude, &self.longitude) {
            (Some(latitude), Some(longitude)) => {
                match (parse_coordinate(latitude, 90.0), parse_coordinate(longitude, 180.0)) {
                    (Some(lat), Some(lon)) => Ok(Origin::Coordinates(GeoPoint::new(lat, lon))),
                    _ => Err(invalid("latitude and longitude must be valid coordinates")),
                }
            }
            _ => Err(invalid(
                "missing arguments: either commune_id or latitude and longitude",
            )),
        }
    }

    pub fn rome_request(&self) -> Result<RomeRequest, SearchError> {
        if let Some(raw) = non_empty(&self.rome_codes) {
            return Ok(RomeRequest::Codes(split_list(raw)));
        }
        if let Some(keyword) = non_empty(&self.rome_codes_keyword_search) {
            return Ok(RomeRequest::Keyword(keyword.to_string()));
        }
        Err(invalid("you must use rome_codes or rome_codes_keyword_search"))
    }

    /// Checks every argument that does not depend on the occupations.
    /// Must pass before a keyword is resolved.
    pub fn arguments(&self, settings: &Settings) -> Result<SearchArguments, SearchError> {
        let distance_km = match non_empty(&self.distance) {
            None => settings.default_distance_km,
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .ok_or_else(|| invalid("distance must be a positive number of kilometers"))?,
        };

        let headcount = match non_empty(&self.headcount) {
            None => HeadcountFilter::All,
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid("headcount. Possible values : small, big, all"))?,
        };

        let hiring_type = match non_empty(&self.contract) {
            None => HiringType::Dpae,
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid("contract. Possible values : alternance, dpae"))?,
        };

        let departments = non_empty(&self.departments)
            .map(split_list)
            .unwrap_or_default();
        let unknown_departments: Vec<&str> = departments
            .iter()
            .filter(|code| !is_known_departement(code))
            .map(String::as_str)
            .collect();
        if !unknown_departments.is_empty() {
            return Err(invalid(format!(
                "departments : {}",
                unknown_departments.join(", ")
            )));
        }

        let sort = match non_empty(&self.sort) {
            None => SortOrder::Score,
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid("sort. Possible values : score, distance"))?,
        };

        let page = parse_positive(non_empty(&self.page), "page", 1)?;
        let page_size = parse_positive(
            non_empty(&self.page_size),
            "page_size",
            settings.page_size_default,
        )?;
        if page_size > settings.page_size_max {
            return Err(invalid(format!(
                "page_size is too large. Maximum value is {}",
                settings.page_size_max
            )));
        }

        Ok(SearchArguments {
            distance_km,
            headcount,
            hiring_type,
            departments: departments.into_iter().collect(),
            sort,
            page,
            page_size,
        })
    }

    /// Validates the occupations and sectors, then assembles the query.
    pub fn validate(
        &self,
        origin: Origin,
        rome_codes: Vec<String>,
        arguments: SearchArguments,
        reference: &ReferenceData,
    ) -> Result<SearchQuery, SearchError> {
        if let Some(unknown) = rome_codes.iter().find(|rome| !reference.is_known_rome(rome)) {
            return Err(invalid(format!("Unknown rome_code: {unknown}")));
        }

        let naf_codes: BTreeSet<String> = non_empty(&self.naf_codes)
            .map(split_list)
            .unwrap_or_default()
            .into_iter()
            .collect();
        if !naf_codes.is_empty() {
            let possible = reference.mapping().map_romes_to_nafs(&rome_codes);
            let rejected: Vec<&str> = naf_codes
                .iter()
                .filter(|naf| !possible.contains(*naf))
                .map(String::as_str)
                .collect();
            if !rejected.is_empty() {
                let possible: Vec<&str> = possible.iter().map(String::as_str).collect();
                return Err(invalid(format!(
                    "NAF code(s): {}. Possible values : {}",
                    rejected.join(" "),
                    possible.join(", ")
                )));
            }
        }

        let SearchArguments {
            distance_km,
            headcount,
            hiring_type,
            departments,
            sort,
            page,
            page_size,
        } = arguments;

        Ok(SearchQuery {
            origin,
            rome_codes,
            naf_codes,
            distance_km,
            headcount,
            hiring_type,
            departments,
            sort,
            page,
            page_size,
            origin_user: non_empty(&self.origin_user).map(str::to_string),
        })
    }
}
