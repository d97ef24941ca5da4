//! Links back to the public site embedded in API responses.

use urlencoding::encode;

use crate::office::HiringType;
use crate::settings::Settings;

/// `utm_*` parameters identifying the API consumer a link was served to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingQuery {
    pub user: String,
    pub origin_user: Option<String>,
}

impl TrackingQuery {
    pub fn new(user: impl Into<String>, origin_user: Option<String>) -> Self {
        Self {
            user: user.into(),
            origin_user: origin_user.filter(|origin| !origin.trim().is_empty()),
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let source = format!("api__{}", self.user);
        let campaign = match &self.origin_user {
            Some(origin) => format!("{source}__{origin}"),
            None => source.clone(),
        };
        vec![
            ("utm_medium", "web".to_string()),
            ("utm_source", source),
            ("utm_campaign", campaign),
        ]
    }
}

fn with_query(base: String, pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return base;
    }
    let query = pairs
        .iter()
        .map(|(key, value)| format!("{key}={}", encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

fn tracking_pairs(tracking: Option<&TrackingQuery>) -> Vec<(&'static str, String)> {
    tracking.map(TrackingQuery::pairs).unwrap_or_default()
}

/// Details page of an office. Apprenticeship searches link to the
/// apprenticeship site instead.
pub fn office_details_url(
    settings: &Settings,
    siret: &str,
    rome_code: Option<&str>,
    hiring_type: HiringType,
    tracking: Option<&TrackingQuery>,
) -> String {
    if hiring_type == HiringType::Alternance {
        return format!(
            "{}/details-entreprises/{}",
            settings.alternance_base_url,
            encode(siret)
        );
    }

    let mut pairs = Vec::new();
    if let Some(rome_code) = rome_code {
        pairs.push(("rome_code", rome_code.to_string()));
    }
    pairs.extend(tracking_pairs(tracking));
    with_query(
        format!("{}/{}/details", settings.site_base_url, encode(siret)),
        &pairs,
    )
}

pub fn home_url(settings: &Settings, tracking: Option<&TrackingQuery>) -> String {
    with_query(format!("{}/", settings.site_base_url), &tracking_pairs(tracking))
}

/// Search results page equivalent to an API search.
#[derive(Debug, Clone, Default)]
pub struct SearchUrl<'a> {
    pub commune_id: &'a str,
    pub rome_code: &'a str,
    pub naf_codes: &'a [String],
    pub sort: &'a str,
    pub distance_km: f64,
    /// Headcount filter as the site encodes it: 1 all, 2 small, 3 big.
    pub headcount: u8,
}

pub fn search_url(settings: &Settings, search: &SearchUrl<'_>, tracking: Option<&TrackingQuery>) -> String {
    let mut pairs = Vec::new();
    if !search.naf_codes.is_empty() {
        pairs.push(("naf", search.naf_codes.join(",")));
    }
    pairs.push(("sort", search.sort.to_string()));
    pairs.push(("d", format_distance(search.distance_km)));
    if search.headcount > 1 {
        pairs.push(("h", search.headcount.to_string()));
    }
    pairs.extend(tracking_pairs(tracking));

    with_query(
        format!(
            "{}/entreprises/commune/{}/rome/{}",
            settings.site_base_url,
            encode(search.commune_id),
            encode(search.rome_code)
        ),
        &pairs,
    )
}

/// Web search for an office by name and city.
pub fn google_url(name: &str, city: &str) -> String {
    let terms: Vec<String> = name
        .split_whitespace()
        .chain(city.split_whitespace())
        .map(|term| encode(term).into_owned())
        .collect();
    format!("https://www.google.fr/search?q={}", terms.join("+"))
}

/// Company directory entry for a siret.
pub fn kompass_url(siret: &str) -> String {
    format!("http://fr.kompass.com/searchCompanies?text={}", encode(siret))
}

fn format_distance(distance_km: f64) -> String {
    if distance_km.fract() == 0.0 {
        format!("{}", distance_km as i64)
    } else {
        format!("{distance_km}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Profile;

    fn settings() -> Settings {
        Settings::for_profile(Profile::Development)
    }

    #[test]
    fn tracking_includes_origin_user() {
        let tracking = TrackingQuery::new("emploi_store", Some("someone".into()));
        let url = home_url(&settings(), Some(&tracking));
        assert_eq!(
            url,
            "http://localhost:8090/?utm_medium=web&utm_source=api__emploi_store&utm_campaign=api__emploi_store__someone"
        );
    }

    #[test]
    fn details_url_keeps_rome_context() {
        let url = office_details_url(&settings(), "78548035101646", Some("D1405"), HiringType::Dpae, None);
        assert_eq!(url, "http://localhost:8090/78548035101646/details?rome_code=D1405");
    }

    #[test]
    fn alternance_details_point_to_apprenticeship_site() {
        let tracking = TrackingQuery::new("labonneboite", None);
        let url = office_details_url(
            &settings(),
            "78548035101646",
            Some("D1405"),
            HiringType::Alternance,
            Some(&tracking),
        );
        assert_eq!(
            url,
            "https://labonnealternance.pole-emploi.fr/details-entreprises/78548035101646"
        );
    }

    #[test]
    fn external_lookup_urls() {
        assert_eq!(
            google_url("BOULANGERIE DU PORT", "La Seyne-sur-Mer"),
            "https://www.google.fr/search?q=BOULANGERIE+DU+PORT+La+Seyne-sur-Mer"
        );
        assert_eq!(
            google_url("CAFÉ", "Metz"),
            "https://www.google.fr/search?q=CAF%C3%89+Metz"
        );
        assert_eq!(
            kompass_url("78548035101646"),
            "http://fr.kompass.com/searchCompanies?text=78548035101646"
        );
    }

    #[test]
    fn search_url_preserves_parameters() {
        let nafs = vec!["4910Z".to_string()];
        let url = search_url(
            &settings(),
            &SearchUrl {
                commune_id: "83137",
                rome_code: "N4403",
                naf_codes: &nafs,
                sort: "distance",
                distance_km: 20.0,
                headcount: 1,
            },
            None,
        );
        assert!(url.contains("/entreprises/commune/83137/rome/N4403"));
        assert!(url.contains("naf=4910Z"));
        assert!(url.contains("sort=distance"));
        assert!(url.contains("d=20"));
        assert!(!url.contains("h="));
    }
}
