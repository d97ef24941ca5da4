//! Per-request decoration of offices and their JSON rendering.

use serde::Serialize;
use serde_json::Value;

use crate::office::{HiringType, MULTI_GEOLOCATION_SUFFIX, Office};
use crate::reference::{LookupError, ReferenceData};
use crate::settings::Settings;
use crate::text::slugify;
use crate::urls::{TrackingQuery, office_details_url};

/// An office as found by one search. Built per request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct OfficeResult {
    pub office: Office,
    /// Requested occupation this office was found for.
    pub matched_rome: Option<String>,
    /// Kilometers from the search origin, one decimal.
    pub distance: f64,
    /// Score adjusted to `matched_rome`.
    pub score: f64,
    pub boost: bool,
    /// 1-based rank in the full sorted result list.
    pub position: usize,
    pub offers: Vec<Value>,
}

impl OfficeResult {
    pub fn new(office: Office, matched_rome: Option<String>, distance: f64, score: f64) -> Self {
        Self {
            office,
            matched_rome,
            distance,
            score,
            boost: false,
            position: 0,
            offers: Vec::new(),
        }
    }
}

/// How to decide which occupation an office is rendered for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchedRome<'a> {
    /// No search context: aggregate score, no occupation fields.
    #[default]
    None,
    /// One occupation was searched; every office matched it.
    Single(&'a str),
    /// Several occupations were searched; use each result's own tag.
    PerResult,
}

impl<'a> MatchedRome<'a> {
    pub fn for_romes(rome_codes: &'a [String]) -> Self {
        match rome_codes {
            [] => MatchedRome::None,
            [rome] => MatchedRome::Single(rome),
            _ => MatchedRome::PerResult,
        }
    }

    fn resolve<'r>(&self, result: Option<&'r OfficeResult>) -> Option<&'r str>
    where
        'a: 'r,
    {
        match self {
            MatchedRome::None => None,
            MatchedRome::Single(rome) => Some(*rome),
            MatchedRome::PerResult => result.and_then(|r| r.matched_rome.as_deref()),
        }
    }
}

/// Contact fields only internal consumers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfficeJson {
    pub siret: String,
    pub naf: String,
    pub naf_text: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
    pub headcount_text: String,
    pub stars: f64,
    pub url: String,
    pub contact_mode: String,
    pub social_network: String,
    pub alternance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rome_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rome_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rome_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boosted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offers_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offers: Option<Vec<Value>>,
    #[serde(flatten)]
    pub contact: Option<ContactDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfficeAddressJson {
    pub city: String,
    pub city_code: String,
    pub street_name: String,
    pub street_number: String,
    pub zipcode: String,
}

/// Lookup aids only internal consumers receive with an office's details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalLinks {
    pub google_url: String,
    pub kompass_url: String,
    pub groupement_employeurs: bool,
}

/// One office on its own, with a structured address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfficeDetailsJson {
    pub siret: String,
    pub naf: String,
    pub name: String,
    pub raison_sociale: String,
    pub naf_text: String,
    pub url: String,
    pub lat: f64,
    pub lon: f64,
    pub headcount_text: String,
    pub stars: f64,
    pub social_network: String,
    pub address: OfficeAddressJson,
    #[serde(flatten)]
    pub contact: Option<ContactDetails>,
    #[serde(flatten)]
    pub links: Option<InternalLinks>,
}

/// Renders offices for one response; holds the request-wide context.
#[derive(Debug, Clone, Copy)]
pub struct OfficeJsonBuilder<'a> {
    settings: &'a Settings,
    reference: &'a ReferenceData,
    matched_rome: MatchedRome<'a>,
    hiring_type: HiringType,
    zipcode: Option<&'a str>,
    tracking: Option<&'a TrackingQuery>,
    include_contact: bool,
}

impl<'a> OfficeJsonBuilder<'a> {
    pub fn new(settings: &'a Settings, reference: &'a ReferenceData) -> Self {
        Self {
            settings,
            reference,
            matched_rome: MatchedRome::None,
            hiring_type: HiringType::Dpae,
            zipcode: None,
            tracking: None,
            include_contact: false,
        }
    }

    pub fn matched_rome(mut self, matched_rome: MatchedRome<'a>) -> Self {
        self.matched_rome = matched_rome;
        self
    }

    pub fn hiring_type(mut self, hiring_type: HiringType) -> Self {
        self.hiring_type = hiring_type;
        self
    }

    /// Zipcode of the searched commune, if any.
    pub fn zipcode(mut self, zipcode: Option<&'a str>) -> Self {
        self.zipcode = zipcode;
        self
    }

    pub fn tracking(mut self, tracking: Option<&'a TrackingQuery>) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn include_contact(mut self, include_contact: bool) -> Self {
        self.include_contact = include_contact;
        self
    }

    pub fn result(&self, result: &OfficeResult) -> Result<OfficeJson, LookupError> {
        let settings = self.settings;
        let reference = self.reference;
        let office = &result.office;
        let rome = self.matched_rome.resolve(Some(result));

        let mut address = office.address_as_text(reference, settings.headcount_small_only_maximum)?;
        if office.show_multi_geolocations_msg(self.zipcode) {
            address.push_str(MULTI_GEOLOCATION_SUFFIX);
        }

        let contact_mode = match office.contact_mode.trim() {
            "" => settings.default_contact_mode.clone(),
            mode => mode.to_string(),
        };

        let rome_label = rome.and_then(|code| reference.rome_label(code));
        let (offers_count, offers) = if result.offers.is_empty() {
            (None, None)
        } else {
            (Some(result.offers.len()), Some(result.offers.clone()))
        };

        Ok(OfficeJson {
            siret: office.siret.clone(),
            naf: office.naf.clone(),
            naf_text: office.naf_text(reference).to_string(),
            name: office.name(),
            address,
            city: office.city(reference)?.to_string(),
            lat: office.lat,
            lon: office.lon,
            headcount_text: office.headcount_text(reference).to_string(),
            stars: office.stars_for_rome(
                rome,
                self.hiring_type,
                reference.mapping(),
                &settings.scoring,
            ),
            url: office_details_url(settings, &office.siret, rome, self.hiring_type, self.tracking),
            contact_mode,
            social_network: office.social_network.clone(),
            alternance: office.is_visible_for(HiringType::Alternance),
            matched_rome_code: rome.map(str::to_string),
            matched_rome_label: rome_label.map(str::to_string),
            matched_rome_slug: rome_label.map(slugify),
            distance: Some(result.distance),
            boosted: Some(result.boost),
            offers_count,
            offers,
            contact: self.contact(office),
        })
    }

    /// The details payload. Only a `Single` matched occupation is used.
    pub fn details(&self, office: &Office) -> Result<OfficeDetailsJson, LookupError> {
        let settings = self.settings;
        let reference = self.reference;
        let rome = self.matched_rome.resolve(None);
        let city = office.city(reference)?;

        let links = if self.include_contact {
            Some(InternalLinks {
                google_url: office.google_url(reference)?,
                kompass_url: office.kompass_url(),
                groupement_employeurs: office.is_groupement_employeurs(reference),
            })
        } else {
            None
        };

        Ok(OfficeDetailsJson {
            siret: office.siret.clone(),
            naf: office.naf.clone(),
            name: office.name(),
            raison_sociale: office.company_name.clone(),
            naf_text: office.naf_text(reference).to_string(),
            url: office_details_url(settings, &office.siret, rome, self.hiring_type, self.tracking),
            lat: office.lat,
            lon: office.lon,
            headcount_text: office.headcount_text(reference).to_string(),
            stars: office.stars_for_rome(
                rome,
                self.hiring_type,
                reference.mapping(),
                &settings.scoring,
            ),
            social_network: office.social_network.clone(),
            address: OfficeAddressJson {
                city: city.to_string(),
                city_code: office.city_code.clone(),
                street_name: office.street_name.clone(),
                street_number: office.street_number.clone(),
                zipcode: office.zipcode.clone(),
            },
            contact: self.contact(office),
            links,
        })
    }

    fn contact(&self, office: &Office) -> Option<ContactDetails> {
        self.include_contact.then(|| ContactDetails {
            email: office.email.clone(),
            phone: office.phone().unwrap_or_default(),
            website: office.website.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Profile;

    fn office() -> Office {
        Office {
            siret: "00000000000004".into(),
            naf: "7320Z".into(),
            company_name: "Institut de sondage".into(),
            street_number: "1".into(),
            street_name: "rue Saint-Pierre".into(),
            city_code: "14118".into(),
            zipcode: "14000".into(),
            email: "contact@sondage.fr".into(),
            tel: "231000000.0".into(),
            website: "https://sondage.fr".into(),
            headcount: "11".into(),
            score: 71.0,
            score_alternance: 0.0,
            lat: 49.18,
            lon: -0.37,
            ..Default::default()
        }
    }

    #[test]
    fn renders_rome_context() {
        let settings = Settings::for_profile(Profile::Test);
        let reference = ReferenceData::bundled().unwrap();
        let romes = vec!["D1405".to_string()];
        let result = OfficeResult::new(office(), Some("D1405".into()), 1.2, 4.0);

        let json = OfficeJsonBuilder::new(&settings, &reference)
            .matched_rome(MatchedRome::for_romes(&romes))
            .result(&result)
            .unwrap();

        assert_eq!(json.matched_rome_code.as_deref(), Some("D1405"));
        assert_eq!(json.matched_rome_label.as_deref(), Some("Conseil en information médicale"));
        assert_eq!(json.matched_rome_slug.as_deref(), Some("conseil-en-information-medicale"));
        assert_eq!(json.distance, Some(1.2));
        assert_eq!(json.stars, 0.1);
        assert_eq!(json.contact_mode, "Envoyer un CV et une lettre de motivation");
        assert_eq!(json.url, "http://localhost:8090/00000000000004/details?rome_code=D1405");
        assert!(!json.alternance);
        assert!(json.contact.is_none());
    }

    #[test]
    fn contact_fields_are_gated() {
        let settings = Settings::for_profile(Profile::Test);
        let reference = ReferenceData::bundled().unwrap();
        let builder = OfficeJsonBuilder::new(&settings, &reference);

        let result = OfficeResult::new(office(), None, 3.0, 71.0);

        let public = serde_json::to_value(builder.result(&result).unwrap()).unwrap();
        for key in ["email", "phone", "website", "matched_rome_code", "offers"] {
            assert!(public.get(key).is_none(), "{key} should be absent");
        }

        let internal = serde_json::to_value(builder.include_contact(true).result(&result).unwrap()).unwrap();
        assert_eq!(internal["email"], "contact@sondage.fr");
        assert_eq!(internal["phone"], "02 31 00 00 00");
        assert_eq!(internal["website"], "https://sondage.fr");
    }

    #[test]
    fn per_result_strategy_uses_each_tag() {
        let settings = Settings::for_profile(Profile::Test);
        let reference = ReferenceData::bundled().unwrap();
        let romes = vec!["D1405".to_string(), "M1805".to_string()];
        let mut result = OfficeResult::new(office(), Some("M1805".into()), 0.0, 70.0);
        result.offers = vec![serde_json::json!({"id": "123ABC"})];

        let json = OfficeJsonBuilder::new(&settings, &reference)
            .matched_rome(MatchedRome::for_romes(&romes))
            .hiring_type(HiringType::Alternance)
            .result(&result)
            .unwrap();
        assert_eq!(json.matched_rome_code.as_deref(), Some("M1805"));
        assert_eq!(json.offers_count, Some(1));
        assert_eq!(
            json.url,
            "https://labonnealternance.pole-emploi.fr/details-entreprises/00000000000004"
        );
    }

    #[test]
    fn details_have_a_structured_address() {
        let settings = Settings::for_profile(Profile::Test);
        let reference = ReferenceData::bundled().unwrap();
        let builder = OfficeJsonBuilder::new(&settings, &reference);

        let public = serde_json::to_value(builder.details(&office()).unwrap()).unwrap();
        let mut keys: Vec<&str> = public.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "address", "headcount_text", "lat", "lon", "naf", "naf_text", "name",
                "raison_sociale", "siret", "social_network", "stars", "url",
            ]
        );
        assert_eq!(public["name"], "INSTITUT DE SONDAGE");
        assert_eq!(public["raison_sociale"], "Institut de sondage");
        assert_eq!(
            public["address"],
            serde_json::json!({
                "city": "Caen",
                "city_code": "14118",
                "street_name": "rue Saint-Pierre",
                "street_number": "1",
                "zipcode": "14000",
            })
        );

        let internal = serde_json::to_value(builder.include_contact(true).details(&office()).unwrap()).unwrap();
        assert_eq!(internal["email"], "contact@sondage.fr");
        assert_eq!(internal["phone"], "02 31 00 00 00");
        assert_eq!(internal["kompass_url"], "http://fr.kompass.com/searchCompanies?text=00000000000004");
        assert_eq!(
            internal["google_url"],
            "https://www.google.fr/search?q=INSTITUT+DE+SONDAGE+Caen"
        );
        assert_eq!(internal["groupement_employeurs"], false);
    }

    #[test]
    fn multi_geolocation_suffix_skips_the_searched_departement() {
        let settings = Settings::for_profile(Profile::Test);
        let reference = ReferenceData::bundled().unwrap();
        let mut office = office();
        office.has_multi_geolocations = true;
        let result = OfficeResult::new(office, None, 0.0, 71.0);

        let local = OfficeJsonBuilder::new(&settings, &reference)
            .zipcode(Some("14200"))
            .result(&result)
            .unwrap();
        assert!(!local.address.ends_with(MULTI_GEOLOCATION_SUFFIX));

        let elsewhere = OfficeJsonBuilder::new(&settings, &reference)
            .zipcode(Some("83000"))
            .result(&result)
            .unwrap();
        assert!(elsewhere.address.ends_with(MULTI_GEOLOCATION_SUFFIX));
    }
}
