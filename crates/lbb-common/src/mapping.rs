//! Weighted ROME ↔ NAF table.
//!
//! Each edge carries the number of hirings observed for an occupation (ROME)
//! inside a business sector (NAF). The table is built once from reference
//! data and only read afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomeWeight {
    pub code: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RomeNafMapping {
    /// naf -> rome -> weight, manual entries merged in.
    by_naf: BTreeMap<String, BTreeMap<String, u32>>,
    /// rome -> nafs, from the bulk table.
    by_rome: HashMap<String, BTreeSet<String>>,
    /// rome -> nafs, hand-curated entries that take precedence.
    manual_by_rome: HashMap<String, BTreeSet<String>>,
    totals: HashMap<String, u64>,
}

impl RomeNafMapping {
    /// `bulk` is keyed by NAF, `manual` by ROME.
    pub fn new(
        bulk: BTreeMap<String, BTreeMap<String, u32>>,
        manual: BTreeMap<String, BTreeMap<String, u32>>,
    ) -> Self {
        let mut by_rome: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (naf, romes) in &bulk {
            for rome in romes.keys() {
                by_rome.entry(rome.clone()).or_default().insert(naf.clone());
            }
        }

        let mut by_naf = bulk;
        let mut manual_by_rome: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (rome, nafs) in manual {
            for (naf, weight) in nafs {
                by_naf
                    .entry(naf.clone())
                    .or_default()
                    .insert(rome.clone(), weight);
                manual_by_rome.entry(rome.clone()).or_default().insert(naf);
            }
        }

        let totals = by_naf
            .iter()
            .map(|(naf, romes)| {
                let total = romes.values().map(|w| u64::from(*w)).sum();
                (naf.clone(), total)
            })
            .collect();

        Self {
            by_naf,
            by_rome,
            manual_by_rome,
            totals,
        }
    }

    /// Occupations of a sector, heaviest first, ties by code.
    pub fn romes_for_naf(&self, naf_code: &str) -> Vec<RomeWeight> {
        let mut romes = self
            .by_naf
            .get(naf_code)
            .map(|romes| {
                romes
                    .iter()
                    .map(|(code, weight)| RomeWeight {
                        code: code.clone(),
                        weight: *weight,
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        romes.sort_by(|a, b| b.weight.cmp(&a.weight).then_with(|| a.code.cmp(&b.code)));
        romes
    }

    /// Union of the sectors hiring any of the given occupations.
    pub fn map_romes_to_nafs<S: AsRef<str>>(&self, rome_codes: &[S]) -> BTreeSet<String> {
        rome_codes
            .iter()
            .filter_map(|rome| {
                let rome = rome.as_ref();
                self.manual_by_rome
                    .get(rome)
                    .or_else(|| self.by_rome.get(rome))
            })
            .flatten()
            .cloned()
            .collect()
    }

    pub fn naf_hirings_for_rome(&self, naf_code: &str, rome_code: &str) -> u32 {
        self.by_naf
            .get(naf_code)
            .and_then(|romes| romes.get(rome_code))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_naf_hirings(&self, naf_code: &str) -> u64 {
        self.totals.get(naf_code).copied().unwrap_or(0)
    }
}
