//! Filtering, ordering, pagination and facet counts over search results.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::office::HiringType;
use crate::reference::ReferenceData;
use crate::search::query::{HeadcountFilter, SearchQuery, SortOrder};
use crate::search::result::OfficeResult;

/// Upper bounds of the cumulative distance facet, in kilometers.
const DISTANCE_BUCKETS_KM: [f64; 4] = [10.0, 30.0, 50.0, 100.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Naf,
    Headcount,
    Contract,
    Department,
    Distance,
}

/// Active filters of a search. Dimensions combine with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    pub naf_codes: BTreeSet<String>,
    pub headcount: HeadcountFilter,
    pub hiring_type: HiringType,
    pub departments: BTreeSet<String>,
    pub distance_km: f64,
    pub headcount_small_only_maximum: u32,
}

impl Filters {
    pub fn from_query(query: &SearchQuery, headcount_small_only_maximum: u32) -> Self {
        Self {
            naf_codes: query.naf_codes.clone(),
            headcount: query.headcount,
            hiring_type: query.hiring_type,
            departments: query.departments.clone(),
            distance_km: query.distance_km,
            headcount_small_only_maximum,
        }
    }

    pub fn matches(&self, result: &OfficeResult) -> bool {
        self.matches_except(result, None)
    }

    /// Whether `result` passes every filter but `skip`.
    pub fn matches_except(&self, result: &OfficeResult, skip: Option<Dimension>) -> bool {
        let office = &result.office;
        let skipped = |dimension: Dimension| skip == Some(dimension);

        (skipped(Dimension::Naf) || self.naf_codes.is_empty() || self.naf_codes.contains(&office.naf))
            && (skipped(Dimension::Headcount)
                || self.headcount.accepts(office, self.headcount_small_only_maximum))
            && (skipped(Dimension::Contract) || office.is_visible_for(self.hiring_type))
            && (skipped(Dimension::Department)
                || self.departments.is_empty()
                || office
                    .departement()
                    .is_some_and(|code| self.departments.contains(&code)))
            && (skipped(Dimension::Distance) || result.distance <= self.distance_km)
    }
}

/// Score descending or distance ascending; siret breaks ties.
pub fn sort_results(results: &mut [OfficeResult], sort: SortOrder) {
    match sort {
        SortOrder::Score => results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.office.siret.cmp(&b.office.siret))
        }),
        SortOrder::Distance => results.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.office.siret.cmp(&b.office.siret))
        }),
    }
    for (index, result) in results.iter_mut().enumerate() {
        result.position = index + 1;
    }
}

/// Page `page` (1-based) of `results`. Past the end is an empty page.
pub fn paginate(results: Vec<OfficeResult>, page: usize, page_size: usize) -> Vec<OfficeResult> {
    let skip = page.saturating_sub(1).saturating_mul(page_size);
    results.into_iter().skip(skip).take(page_size).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DistanceFacet {
    pub less_10_km: usize,
    pub less_30_km: usize,
    pub less_50_km: usize,
    pub less_100_km: usize,
    pub france: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NafFacet {
    pub code: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeadcountFacet {
    pub small: usize,
    pub big: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractFacet {
    pub dpae: usize,
    pub alternance: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facets {
    pub distance: DistanceFacet,
    pub naf: Vec<NafFacet>,
    pub headcount: HeadcountFacet,
    pub contract: ContractFacet,
}

/// Bucket counts for filter widgets.
///
/// `candidates` must cover all of France so the wider distance buckets can be
/// filled. Each dimension is counted with every other filter applied, so a
/// count tells how many results selecting that bucket would yield.
pub fn compute_facets(candidates: &[OfficeResult], filters: &Filters, reference: &ReferenceData) -> Facets {
    let mut facets = Facets::default();
    let mut naf_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let small_only_maximum = filters.headcount_small_only_maximum;

    for result in candidates {
        if filters.matches_except(result, Some(Dimension::Distance)) {
            let distance = &mut facets.distance;
            let counters = [
                &mut distance.less_10_km,
                &mut distance.less_30_km,
                &mut distance.less_50_km,
                &mut distance.less_100_km,
            ];
            for (bound, counter) in DISTANCE_BUCKETS_KM.iter().zip(counters) {
                if result.distance <= *bound {
                    *counter += 1;
                }
            }
            distance.france += 1;
        }

        if filters.matches_except(result, Some(Dimension::Naf)) {
            *naf_counts.entry(result.office.naf.as_str()).or_default() += 1;
        }

        if filters.matches_except(result, Some(Dimension::Headcount)) {
            if result.office.is_small(small_only_maximum) {
                facets.headcount.small += 1;
            } else {
                facets.headcount.big += 1;
            }
        }

        if filters.matches_except(result, Some(Dimension::Contract)) {
            if result.office.is_visible_for(HiringType::Dpae) {
                facets.contract.dpae += 1;
            }
            if result.office.is_visible_for(HiringType::Alternance) {
                facets.contract.alternance += 1;
            }
        }
    }

    facets.naf = naf_counts
        .into_iter()
        .map(|(code, count)| NafFacet {
            code: code.to_string(),
            label: reference.naf_label(code).unwrap_or_default().to_string(),
            count,
        })
        .collect();
    facets
        .naf
        .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));

    facets
}
