//! Office (establishment) records and the values derived from them.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::departement::departement_from_zipcode;
use crate::mapping::RomeNafMapping;
use crate::reference::{LookupError, ReferenceData};
use crate::scoring::{ScoringConfig, score_for_rome, stars_from_score};
use crate::urls;

pub const HR_DEPARTMENT_LINE: &str = "Service des ressources humaines";
pub const MULTI_GEOLOCATION_SUFFIX: &str = ", Cette entreprise recrute aussi dans votre région.";
const UNNAMED_OFFICE: &str = "sans nom";

/// Hiring contract an office is scored for. Each kind has its own score.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HiringType {
    #[default]
    Dpae,
    Alternance,
}

impl HiringType {
    pub const ALL: [HiringType; 2] = [HiringType::Dpae, HiringType::Alternance];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub siret: String,
    pub naf: String,
    pub company_name: String,
    #[serde(default)]
    pub office_name: String,
    #[serde(default)]
    pub street_number: String,
    #[serde(default)]
    pub street_name: String,
    pub city_code: String,
    pub zipcode: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub tel: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub social_network: String,
    #[serde(default)]
    pub contact_mode: String,
    #[serde(default)]
    pub headcount: String,
    pub score: f64,
    pub score_alternance: f64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub has_multi_geolocations: bool,
    /// Cache behind [`Office::default_rome_codes`].
    #[serde(skip)]
    pub default_romes: OnceCell<Vec<String>>,
}

impl Office {
    /// Display name: office name, else company name, upper-cased.
    pub fn name(&self) -> String {
        [&self.office_name, &self.company_name]
            .into_iter()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| UNNAMED_OFFICE.to_string())
    }

    pub fn city<'r>(&self, reference: &'r ReferenceData) -> Result<&'r str, LookupError> {
        reference.city_name(&self.city_code)
    }

    pub fn google_url(&self, reference: &ReferenceData) -> Result<String, LookupError> {
        Ok(urls::google_url(&self.name(), self.city(reference)?))
    }

    pub fn kompass_url(&self) -> String {
        urls::kompass_url(&self.siret)
    }

    pub fn is_groupement_employeurs(&self, reference: &ReferenceData) -> bool {
        reference.is_groupement_employeurs(&self.siret)
    }

    pub fn naf_text<'r>(&self, reference: &'r ReferenceData) -> &'r str {
        reference.naf_label(&self.naf).unwrap_or_default()
    }

    pub fn headcount_text<'r>(&self, reference: &'r ReferenceData) -> &'r str {
        reference.headcount_label(&self.headcount).unwrap_or_default()
    }

    /// Non-numeric or missing headcount counts as small.
    pub fn is_small(&self, small_only_maximum: u32) -> bool {
        self.headcount
            .trim()
            .parse::<u32>()
            .map_or(true, |code| code < small_only_maximum)
    }

    pub fn departement(&self) -> Option<String> {
        departement_from_zipcode(&self.zipcode)
    }

    /// Phone number, repairing numbers that went through a float column
    /// upstream ("491234567.0" -> "04 91 23 45 67").
    pub fn phone(&self) -> Option<String> {
        let tel = self.tel.trim();
        if tel.is_empty() {
            return None;
        }

        if tel.len() > 2 && tel.as_bytes()[tel.len() - 2] == b'.' {
            let digits = format!("0{}", &tel[..tel.len() - 2]);
            let grouped = digits
                .as_bytes()
                .chunks(2)
                .map(|pair| String::from_utf8_lossy(pair).into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            return Some(grouped);
        }

        Some(tel.to_string())
    }

    pub fn address_fields(
        &self,
        reference: &ReferenceData,
        small_only_maximum: u32,
    ) -> Result<Vec<String>, LookupError> {
        let mut fields = Vec::with_capacity(3);
        if !self.is_small(small_only_maximum) {
            fields.push(HR_DEPARTMENT_LINE.to_string());
        }
        if !self.street_name.trim().is_empty() {
            fields.push(
                format!("{} {}", self.street_number.trim(), self.street_name.trim())
                    .trim()
                    .to_string(),
            );
        }
        fields.push(format!("{} {}", self.zipcode, self.city(reference)?));
        Ok(fields)
    }

    pub fn address_as_text(
        &self,
        reference: &ReferenceData,
        small_only_maximum: u32,
    ) -> Result<String, LookupError> {
        Ok(self.address_fields(reference, small_only_maximum)?.join(", "))
    }

    /// Whether to tell a searcher this office also hires outside its departement.
    pub fn show_multi_geolocations_msg(&self, search_zipcode: Option<&str>) -> bool {
        if !self.has_multi_geolocations {
            return false;
        }

        match (search_zipcode, self.zipcode.get(..2)) {
            (Some(zipcode), Some(own_prefix)) => !zipcode.starts_with(own_prefix),
            _ => true,
        }
    }

    pub fn score_for(&self, hiring_type: HiringType) -> f64 {
        match hiring_type {
            HiringType::Dpae => self.score,
            HiringType::Alternance => self.score_alternance,
        }
    }

    /// A zero score hides the office for that kind of hiring only.
    pub fn is_visible_for(&self, hiring_type: HiringType) -> bool {
        self.score_for(hiring_type) > 0.0
    }

    pub fn score_for_rome(
        &self,
        rome_code: Option<&str>,
        hiring_type: HiringType,
        mapping: &RomeNafMapping,
        scoring: &ScoringConfig,
    ) -> f64 {
        score_for_rome(self.score_for(hiring_type), rome_code, &self.naf, mapping, scoring)
    }

    pub fn stars_for_rome(
        &self,
        rome_code: Option<&str>,
        hiring_type: HiringType,
        mapping: &RomeNafMapping,
        scoring: &ScoringConfig,
    ) -> f64 {
        stars_from_score(self.score_for_rome(rome_code, hiring_type, mapping, scoring))
    }

    /// Occupations this office hires for absent a search context.
    /// Computed on first use and kept for the lifetime of this value.
    pub fn default_rome_codes(&self, mapping: &RomeNafMapping) -> &[String] {
        self.default_romes.get_or_init(|| {
            mapping
                .romes_for_naf(&self.naf)
                .into_iter()
                .map(|rome| rome.code)
                .collect()
        })
    }
}
