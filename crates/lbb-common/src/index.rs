//! Geographic / keyword index of offices.
//!
//! The index finds candidate sirets around a point for a set of sectors and
//! tags each with the occupation it matched. It knows nothing about scores
//! or admin overrides; the office store is the source of truth for visibility.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::geo::GeoPoint;
use crate::office::Office;
use crate::reference::ReferenceData;
use crate::scoring::round_one_decimal;
use crate::text::{slugify, words};

const MAX_SUGGESTIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("office index unavailable: {0}")]
    Unavailable(String),
    #[error("office index timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub origin: GeoPoint,
    /// `None` searches all of France.
    pub distance_km: Option<f64>,
    pub naf_codes: BTreeSet<String>,
    pub rome_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub siret: String,
    /// Unrounded great-circle distance from the query origin.
    pub distance_km: f64,
    pub matched_rome: Option<String>,
    pub boost: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomeSuggestion {
    pub rome_code: String,
    pub label: String,
    pub slug: String,
}

#[async_trait]
pub trait OfficeIndex: Send + Sync {
    async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>, IndexError>;

    /// Occupations matching a free-text job title, best first.
    async fn suggest_rome(&self, keyword: &str) -> Result<Vec<RomeSuggestion>, IndexError>;
}

#[derive(Debug, Clone)]
struct IndexedOffice {
    siret: String,
    naf: String,
    location: GeoPoint,
    boost: bool,
}

/// Index held in memory, filled from the office table at startup.
#[derive(Debug, Clone)]
pub struct InMemoryOfficeIndex {
    reference: Arc<ReferenceData>,
    offices: Vec<IndexedOffice>,
}

impl InMemoryOfficeIndex {
    pub fn new(reference: Arc<ReferenceData>, offices: &[Office]) -> Self {
        Self::with_boosted(reference, offices, &HashSet::new())
    }

    pub fn with_boosted(
        reference: Arc<ReferenceData>,
        offices: &[Office],
        boosted: &HashSet<String>,
    ) -> Self {
        let offices = offices
            .iter()
            .map(|office| IndexedOffice {
                siret: office.siret.clone(),
                naf: office.naf.clone(),
                location: GeoPoint::new(office.lat, office.lon),
                boost: boosted.contains(&office.siret),
            })
            .collect();
        Self { reference, offices }
    }

    pub fn len(&self) -> usize {
        self.offices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offices.is_empty()
    }

    fn matched_rome(&self, naf: &str, rome_codes: &[String]) -> Option<String> {
        let mapping = self.reference.mapping();
        rome_codes
            .iter()
            .find(|rome| mapping.naf_hirings_for_rome(naf, rome) > 0)
            .cloned()
    }
}

#[async_trait]
impl OfficeIndex for InMemoryOfficeIndex {
    async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>, IndexError> {
        let mut hits: Vec<IndexHit> = self
            .offices
            .iter()
            .filter(|doc| query.naf_codes.contains(&doc.naf))
            .filter_map(|doc| {
                let distance_km = query.origin.distance_to(&doc.location);
                if let Some(radius) = query.distance_km {
                    if round_one_decimal(distance_km) > radius {
                        return None;
                    }
                }
                let matched_rome = self.matched_rome(&doc.naf, &query.rome_codes)?;
                Some(IndexHit {
                    siret: doc.siret.clone(),
                    distance_km,
                    matched_rome: Some(matched_rome),
                    boost: doc.boost,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.siret.cmp(&b.siret))
        });
        Ok(hits)
    }

    async fn suggest_rome(&self, keyword: &str) -> Result<Vec<RomeSuggestion>, IndexError> {
        let wanted = words(keyword);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let is_match = |label: &str| {
            let label_words = words(label);
            wanted
                .iter()
                .all(|word| label_words.iter().any(|candidate| candidate.starts_with(word.as_str())))
        };

        let job_titles = self
            .reference
            .ogr_labels()
            .iter()
            .filter(|ogr| is_match(&ogr.label))
            .map(|ogr| ogr.rome_code.as_str());
        let occupations = self
            .reference
            .rome_labels()
            .filter(|(_, label)| is_match(label))
            .map(|(code, _)| code);

        let mut seen = HashSet::new();
        let suggestions = job_titles
            .chain(occupations)
            .filter(|code| seen.insert(*code))
            .filter_map(|code| {
                let label = self.reference.rome_label(code)?;
                Some(RomeSuggestion {
                    rome_code: code.to_string(),
                    label: label.to_string(),
                    slug: slugify(label),
                })
            })
            .take(MAX_SUGGESTIONS)
            .collect();

        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> Arc<ReferenceData> {
        Arc::new(ReferenceData::bundled().unwrap())
    }

    fn office(siret: &str, naf: &str, lat: f64, lon: f64) -> Office {
        Office {
            siret: siret.into(),
            naf: naf.into(),
            lat,
            lon,
            score: 80.0,
            score_alternance: 0.0,
            ..Default::default()
        }
    }

    fn query(naf_codes: &[&str], rome_codes: &[&str], distance_km: Option<f64>) -> IndexQuery {
        IndexQuery {
            origin: GeoPoint::new(43.1242, 5.9280),
            distance_km,
            naf_codes: naf_codes.iter().map(|s| s.to_string()).collect(),
            rome_codes: rome_codes.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn filters_by_radius_and_sector() {
        let index = InMemoryOfficeIndex::new(
            reference(),
            &[
                office("00000000000001", "4910Z", 43.1242, 5.9280),
                office("00000000000002", "4910Z", 43.2965, 5.3698),
                office("00000000000003", "6201Z", 43.1242, 5.9280),
            ],
        );

        let hits = index.search(&query(&["4910Z"], &["N4403"], Some(10.0))).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].siret, "00000000000001");
        assert_eq!(hits[0].matched_rome.as_deref(), Some("N4403"));

        let hits = index.search(&query(&["4910Z"], &["N4403"], None)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn zero_radius_keeps_co_located_offices() {
        let index = InMemoryOfficeIndex::new(
            reference(),
            &[
                office("00000000000001", "4910Z", 43.1242, 5.9280),
                office("00000000000002", "4910Z", 43.1007, 5.8788),
            ],
        );
        let hits = index.search(&query(&["4910Z"], &["N4403"], Some(0.0))).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].distance_km, 0.0);
    }

    #[tokio::test]
    async fn returns_offices_whatever_their_raw_score() {
        let mut unscored = office("00000000000001", "4910Z", 43.1242, 5.9280);
        unscored.score = 0.0;
        let index = InMemoryOfficeIndex::new(reference(), &[unscored]);

        let hits = index.search(&query(&["4910Z"], &["N4403"], Some(10.0))).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn tags_the_first_matching_rome() {
        let index = InMemoryOfficeIndex::new(
            reference(),
            &[
                office("00000000000001", "6201Z", 43.1242, 5.9280),
                office("00000000000002", "5610A", 43.1242, 5.9280),
            ],
        );
        let hits = index
            .search(&query(&["6201Z", "5610A"], &["G1602", "M1805"], None))
            .await
            .unwrap();
        let tags: Vec<_> = hits.iter().map(|h| h.matched_rome.clone().unwrap()).collect();
        assert_eq!(tags, vec!["M1805", "G1602"]);
    }

    #[tokio::test]
    async fn suggests_romes_from_job_titles() {
        let index = InMemoryOfficeIndex::new(reference(), &[]);
        let suggestions = index.suggest_rome("boulang").await.unwrap();
        assert_eq!(suggestions[0].rome_code, "D1102");
        assert_eq!(suggestions[0].slug, "boulangerie-viennoiserie");
        assert_eq!(
            suggestions.iter().filter(|s| s.rome_code == "D1102").count(),
            1
        );

        let suggestions = index.suggest_rome("securite").await.unwrap();
        assert!(suggestions.iter().any(|s| s.rome_code == "K2503"));

        assert!(index.suggest_rome("astronaute").await.unwrap().is_empty());
        assert!(index.suggest_rome("  ").await.unwrap().is_empty());
    }
}
