//! Candidate retrieval: index lookup, store hydration, contextual scoring.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::index::{IndexQuery, OfficeIndex, RomeSuggestion};
use crate::office::{HiringType, Office};
use crate::reference::ReferenceData;
use crate::scoring::round_one_decimal;
use crate::search::filters::{Facets, Filters, compute_facets, paginate, sort_results};
use crate::search::query::{RomeRequest, SearchError, SearchParams, SearchQuery};
use crate::search::result::OfficeResult;
use crate::settings::Settings;
use crate::store::{OfficeStore, StoreError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// The requested page, positions already assigned.
    pub companies: Vec<OfficeResult>,
    /// Matches across all pages.
    pub companies_count: usize,
    pub facets: Option<Facets>,
}

#[derive(Clone)]
pub struct SearchEngine {
    settings: Arc<Settings>,
    reference: Arc<ReferenceData>,
    index: Arc<dyn OfficeIndex>,
    store: Arc<dyn OfficeStore>,
}

impl SearchEngine {
    pub fn new(
        settings: Arc<Settings>,
        reference: Arc<ReferenceData>,
        index: Arc<dyn OfficeIndex>,
        store: Arc<dyn OfficeStore>,
    ) -> Self {
        Self {
            settings,
            reference,
            index,
            store,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn store(&self) -> &dyn OfficeStore {
        self.store.as_ref()
    }

    /// Validates raw arguments, resolving a keyword search to its best occupation.
    pub async fn prepare(&self, params: &SearchParams) -> Result<SearchQuery, SearchError> {
        let origin = params.origin(&self.reference)?;
        let request = params.rome_request()?;
        let arguments = params.arguments(&self.settings)?;
        let rome_codes = match request {
            RomeRequest::Codes(codes) => codes,
            RomeRequest::Keyword(keyword) => vec![self.resolve_keyword(&keyword).await?.rome_code],
        };
        params.validate(origin, rome_codes, arguments, &self.reference)
    }

    /// Best occupation for a job title. An unreachable index is a backend
    /// failure, not an unknown keyword.
    #[instrument(skip(self))]
    pub async fn resolve_keyword(&self, keyword: &str) -> Result<RomeSuggestion, SearchError> {
        let suggestions = self.index.suggest_rome(keyword).await.map_err(|err| {
            warn!(error = %err, "keyword lookup failed");
            lbb_metrics::record_backend_failure("index");
            SearchError::from(err)
        })?;
        suggestions.into_iter().next().ok_or_else(|| {
            SearchError::InvalidArgument("No match found for rome_codes_keyword_search.".into())
        })
    }

    /// Offices matching every filter, sorted and paginated.
    pub async fn fetch_companies(&self, query: &SearchQuery, with_facets: bool) -> SearchOutcome {
        let filters = self.filters(query);
        let (pool, facets) = if with_facets {
            let pool = self.candidates(query, None).await;
            let facets = compute_facets(&pool, &filters, &self.reference);
            (pool, Some(facets))
        } else {
            (self.candidates(query, Some(query.distance_km)).await, None)
        };

        let mut matching: Vec<OfficeResult> = pool
            .into_iter()
            .filter(|result| filters.matches(result))
            .collect();
        sort_results(&mut matching, query.sort);
        let companies_count = matching.len();

        SearchOutcome {
            companies: paginate(matching, query.page, query.page_size),
            companies_count,
            facets,
        }
    }

    pub async fn count_companies(&self, query: &SearchQuery) -> usize {
        self.fetch_companies(query, false).await.companies_count
    }

    pub async fn fetch_filters(&self, query: &SearchQuery) -> Facets {
        let filters = self.filters(query);
        let pool = self.candidates(query, None).await;
        compute_facets(&pool, &filters, &self.reference)
    }

    /// An office by siret, unless hidden for `hiring_type`.
    pub async fn visible_office(
        &self,
        siret: &str,
        hiring_type: HiringType,
    ) -> Result<Option<Office>, StoreError> {
        Ok(self
            .store
            .get_office(siret)
            .await?
            .filter(|office| office.is_visible_for(hiring_type)))
    }

    /// Whether back-office staff took `siret` off La Bonne Alternance.
    pub async fn is_removed_from_lba(&self, siret: &str) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get_office(siret)
            .await?
            .is_some_and(|office| self.store.overlay().is_removed_from_lba(&office)))
    }

    fn filters(&self, query: &SearchQuery) -> Filters {
        Filters::from_query(query, self.settings.headcount_small_only_maximum)
    }

    /// Every office around the origin for the searched occupations, with
    /// overrides applied. `radius_km = None` searches all of France.
    ///
    /// Index and store failures yield no candidates.
    #[instrument(skip(self, query), fields(romes = ?query.rome_codes))]
    async fn candidates(&self, query: &SearchQuery, radius_km: Option<f64>) -> Vec<OfficeResult> {
        let mapping = self.reference.mapping();
        let naf_codes = mapping.map_romes_to_nafs(&query.rome_codes);
        if naf_codes.is_empty() {
            debug!("no sector hires for the requested occupations");
            return Vec::new();
        }

        let index_query = IndexQuery {
            origin: query.origin.location(),
            distance_km: radius_km,
            naf_codes,
            rome_codes: query.rome_codes.clone(),
        };
        let hits = match self.index.search(&index_query).await {
            Ok(hits) => hits,
            Err(err) => {
                warn!(error = %err, "office index search failed");
                lbb_metrics::record_backend_failure("index");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let hits: Vec<_> = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.siret.clone()))
            .collect();
        let sirets: Vec<String> = hits.iter().map(|hit| hit.siret.clone()).collect();

        let mut offices = match self.store.get_offices(&sirets).await {
            Ok(offices) => offices,
            Err(err) => {
                warn!(error = %err, "office store lookup failed");
                lbb_metrics::record_backend_failure("store");
                return Vec::new();
            }
        };

        let single_rome = query.single_rome();
        hits.into_iter()
            .filter_map(|hit| {
                let office = offices.remove(&hit.siret)?;
                let matched_rome = hit
                    .matched_rome
                    .or_else(|| single_rome.map(str::to_string));
                let score = office.score_for_rome(
                    matched_rome.as_deref(),
                    query.hiring_type,
                    mapping,
                    &self.settings.scoring,
                );
                let mut result =
                    OfficeResult::new(office, matched_rome, round_one_decimal(hit.distance_km), score);
                result.boost = hit.boost;
                Some(result)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::admin::{AdminOverlay, OfficeOverride, OverrideSource};
    use crate::index::{IndexError, IndexHit, InMemoryOfficeIndex};
    use crate::search::query::SortOrder;
    use crate::settings::Profile;
    use crate::store::InMemoryOfficeStore;

    // Toulon and a few places around it.
    const TOULON: (f64, f64) = (43.1242, 5.9280);
    const LA_SEYNE: (f64, f64) = (43.1007, 5.8788);
    const HYERES: (f64, f64) = (43.1204, 6.1286);

    fn office(siret: &str, naf: &str, at: (f64, f64), score: f64) -> Office {
        Office {
            siret: siret.into(),
            naf: naf.into(),
            company_name: format!("Office {siret}"),
            city_code: "83137".into(),
            zipcode: "83000".into(),
            headcount: "03".into(),
            score,
            score_alternance: 0.0,
            lat: at.0,
            lon: at.1,
            ..Default::default()
        }
    }

    fn engine(offices: Vec<Office>, overrides: Vec<OfficeOverride>) -> SearchEngine {
        let reference = Arc::new(ReferenceData::bundled().unwrap());
        let index = InMemoryOfficeIndex::new(reference.clone(), &offices);
        let store = InMemoryOfficeStore::new(offices, AdminOverlay::new(overrides));
        SearchEngine::new(
            Arc::new(Settings::for_profile(Profile::Test)),
            reference,
            Arc::new(index),
            Arc::new(store),
        )
    }

    fn params(pairs: &[(&str, &str)]) -> SearchParams {
        let mut params = SearchParams {
            commune_id: Some("83137".into()),
            ..Default::default()
        };
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "rome_codes" => params.rome_codes = value,
                "rome_codes_keyword_search" => params.rome_codes_keyword_search = value,
                "distance" => params.distance = value,
                "contract" => params.contract = value,
                "sort" => params.sort = value,
                "page_size" => params.page_size = value,
                "headcount" => params.headcount = value,
                other => panic!("unexpected parameter {other}"),
            }
        }
        params
    }

    fn sirets(outcome: &SearchOutcome) -> Vec<&str> {
        outcome
            .companies
            .iter()
            .map(|result| result.office.siret.as_str())
            .collect()
    }

    #[tokio::test]
    async fn zero_distance_returns_co_located_offices() {
        let engine = engine(
            vec![
                office("00000000000001", "4910Z", TOULON, 80.0),
                office("00000000000002", "4910Z", LA_SEYNE, 80.0),
            ],
            vec![],
        );
        let query = engine
            .prepare(&params(&[("rome_codes", "N4403"), ("distance", "0")]))
            .await
            .unwrap();
        let outcome = engine.fetch_companies(&query, false).await;
        assert_eq!(sirets(&outcome), ["00000000000001"]);
        assert_eq!(outcome.companies[0].distance, 0.0);
    }

    #[tokio::test]
    async fn multi_rome_distance_sort_ignores_score() {
        let engine = engine(
            vec![
                office("00000000000001", "4910Z", LA_SEYNE, 95.0),
                office("00000000000002", "6201Z", TOULON, 40.0),
            ],
            vec![],
        );

        let query = engine
            .prepare(&params(&[("rome_codes", "N4403,M1805"), ("sort", "distance")]))
            .await
            .unwrap();
        let outcome = engine.fetch_companies(&query, false).await;
        assert_eq!(sirets(&outcome), ["00000000000002", "00000000000001"]);
        assert_eq!(outcome.companies[0].matched_rome.as_deref(), Some("M1805"));
        assert_eq!(outcome.companies[1].matched_rome.as_deref(), Some("N4403"));
        assert_eq!(outcome.companies[1].position, 2);

        let mut by_score = query.clone();
        by_score.sort = SortOrder::Score;
        let outcome = engine.fetch_companies(&by_score, false).await;
        assert_eq!(sirets(&outcome), ["00000000000001", "00000000000002"]);
    }

    #[tokio::test]
    async fn overrides_hide_per_hiring_type() {
        let mut visible_both = office("00000000000001", "4910Z", TOULON, 80.0);
        visible_both.score_alternance = 60.0;
        let mut hide_alternance =
            OfficeOverride::new(1, OverrideSource::Admin, vec!["00000000000001".into()]);
        hide_alternance.score_alternance = Some(0.0);

        let engine = engine(vec![visible_both], vec![hide_alternance]);

        let dpae = engine.prepare(&params(&[("rome_codes", "N4403")])).await.unwrap();
        assert_eq!(engine.count_companies(&dpae).await, 1);

        let alternance = engine
            .prepare(&params(&[("rome_codes", "N4403"), ("contract", "alternance")]))
            .await
            .unwrap();
        assert_eq!(engine.count_companies(&alternance).await, 0);

        assert!(engine
            .visible_office("00000000000001", HiringType::Alternance)
            .await
            .unwrap()
            .is_none());
        assert!(engine
            .visible_office("00000000000001", HiringType::Dpae)
            .await
            .unwrap()
            .is_some());
        assert!(engine.is_removed_from_lba("00000000000001").await.unwrap());
        assert!(!engine.is_removed_from_lba("00000000000099").await.unwrap());
    }

    #[tokio::test]
    async fn overrides_hide_the_recruitment_side_only() {
        let mut visible_both = office("00000000000001", "4910Z", TOULON, 80.0);
        visible_both.score_alternance = 60.0;
        let mut hide_dpae =
            OfficeOverride::new(1, OverrideSource::Admin, vec!["00000000000001".into()]);
        hide_dpae.score = Some(0.0);

        let engine = engine(vec![visible_both], vec![hide_dpae]);

        let dpae = engine.prepare(&params(&[("rome_codes", "N4403")])).await.unwrap();
        assert_eq!(engine.count_companies(&dpae).await, 0);

        let alternance = engine
            .prepare(&params(&[("rome_codes", "N4403"), ("contract", "alternance")]))
            .await
            .unwrap();
        assert_eq!(engine.count_companies(&alternance).await, 1);

        assert!(engine
            .visible_office("00000000000001", HiringType::Dpae)
            .await
            .unwrap()
            .is_none());
        assert!(engine
            .visible_office("00000000000001", HiringType::Alternance)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn overrides_reveal_offices_without_raw_score() {
        let unscored = office("00000000000001", "4910Z", TOULON, 0.0);
        let mut reveal = OfficeOverride::new(1, OverrideSource::Admin, vec!["00000000000001".into()]);
        reveal.score = Some(70.0);

        let engine = engine(vec![unscored], vec![reveal]);
        let query = engine.prepare(&params(&[("rome_codes", "N4403")])).await.unwrap();

        assert_eq!(engine.count_companies(&query).await, 1);
        let outcome = engine.fetch_companies(&query, true).await;
        assert_eq!(outcome.companies_count, 1);
        assert_eq!(outcome.facets.unwrap().contract.dpae, 1);
    }

    #[tokio::test]
    async fn count_matches_list_and_pages_split_results() {
        let engine = engine(
            (1..=5)
                .map(|i| office(&format!("0000000000000{i}"), "4910Z", TOULON, 50.0 + i as f64))
                .collect(),
            vec![],
        );
        let query = engine
            .prepare(&params(&[("rome_codes", "N4403"), ("page_size", "2")]))
            .await
            .unwrap();

        let outcome = engine.fetch_companies(&query, true).await;
        assert_eq!(outcome.companies_count, 5);
        assert_eq!(outcome.companies.len(), 2);
        assert_eq!(engine.count_companies(&query).await, outcome.companies_count);
        assert_eq!(outcome.facets.unwrap().distance.less_10_km, 5);
    }

    #[tokio::test]
    async fn occupations_without_sector_yield_nothing() {
        let engine = engine(vec![office("00000000000001", "4910Z", TOULON, 80.0)], vec![]);
        let query = engine.prepare(&params(&[("rome_codes", "L1510")])).await.unwrap();
        let outcome = engine.fetch_companies(&query, true).await;
        assert_eq!(outcome.companies_count, 0);
        assert!(outcome.companies.is_empty());
    }

    #[tokio::test]
    async fn keyword_search_matches_direct_search() {
        let engine = engine(
            vec![
                office("00000000000001", "8010Z", TOULON, 80.0),
                office("00000000000002", "8010Z", HYERES, 80.0),
            ],
            vec![],
        );
        let direct = engine.prepare(&params(&[("rome_codes", "K2503")])).await.unwrap();
        let keyword = engine
            .prepare(&params(&[("rome_codes_keyword_search", "agent de sécurité")]))
            .await
            .unwrap();
        assert_eq!(keyword.rome_codes, direct.rome_codes);
        assert_eq!(
            engine.fetch_companies(&keyword, false).await,
            engine.fetch_companies(&direct, false).await
        );

        let err = engine
            .prepare(&params(&[("rome_codes_keyword_search", "unicorn")]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid request argument: No match found for rome_codes_keyword_search."
        );
    }

    struct BrokenIndex;

    #[async_trait]
    impl OfficeIndex for BrokenIndex {
        async fn search(&self, _query: &IndexQuery) -> Result<Vec<IndexHit>, IndexError> {
            Err(IndexError::Timeout)
        }

        async fn suggest_rome(&self, _keyword: &str) -> Result<Vec<RomeSuggestion>, IndexError> {
            Err(IndexError::Unavailable("connection refused".into()))
        }
    }

    /// Delegates to the bundled index, counting keyword lookups.
    struct CountingIndex {
        inner: InMemoryOfficeIndex,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl OfficeIndex for CountingIndex {
        async fn search(&self, query: &IndexQuery) -> Result<Vec<IndexHit>, IndexError> {
            self.inner.search(query).await
        }

        async fn suggest_rome(&self, keyword: &str) -> Result<Vec<RomeSuggestion>, IndexError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.suggest_rome(keyword).await
        }
    }

    #[tokio::test]
    async fn malformed_keyword_search_never_reaches_the_index() {
        let reference = Arc::new(ReferenceData::bundled().unwrap());
        let index = Arc::new(CountingIndex {
            inner: InMemoryOfficeIndex::new(reference.clone(), &[]),
            lookups: AtomicUsize::new(0),
        });
        let engine = SearchEngine::new(
            Arc::new(Settings::for_profile(Profile::Test)),
            reference,
            index.clone(),
            Arc::new(InMemoryOfficeStore::new(Vec::new(), AdminOverlay::default())),
        );

        for bad in [("page_size", "1000"), ("sort", "random"), ("contract", "cdi")] {
            let err = engine
                .prepare(&params(&[("rome_codes_keyword_search", "boulanger"), bad]))
                .await
                .unwrap_err();
            assert!(matches!(err, SearchError::InvalidArgument(_)), "{err}");
        }
        assert_eq!(index.lookups.load(Ordering::SeqCst), 0);

        engine
            .prepare(&params(&[("rome_codes_keyword_search", "boulanger")]))
            .await
            .unwrap();
        assert_eq!(index.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn index_failure_degrades_to_empty() {
        let reference = Arc::new(ReferenceData::bundled().unwrap());
        let store = InMemoryOfficeStore::new(
            [office("00000000000001", "4910Z", TOULON, 80.0)],
            AdminOverlay::default(),
        );
        let engine = SearchEngine::new(
            Arc::new(Settings::for_profile(Profile::Test)),
            reference,
            Arc::new(BrokenIndex),
            Arc::new(store),
        );

        let query = engine.prepare(&params(&[("rome_codes", "N4403")])).await.unwrap();
        let outcome = engine.fetch_companies(&query, true).await;
        assert_eq!(outcome.companies_count, 0);
        assert_eq!(outcome.facets, Some(Facets::default()));

        let err = engine
            .prepare(&params(&[("rome_codes_keyword_search", "boulanger")]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SearchError::Backend(IndexError::Unavailable("connection refused".into()))
        );
    }
}
