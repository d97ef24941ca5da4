use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;

use lbb_common::search::{
    Facets, MatchedRome, OfficeJson, OfficeJsonBuilder, OfficeResult, SearchParams, SearchQuery,
};
use lbb_common::urls::{SearchUrl, TrackingQuery, home_url, search_url};

use crate::SharedState;
use crate::auth::SignedUser;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct CompanyListResponse {
    pub companies_count: usize,
    pub companies: Vec<OfficeJson>,
    /// Equivalent search page on the public site.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rome_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rome_label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompanyCountResponse {
    pub companies_count: usize,
}

#[derive(Debug, Serialize)]
pub struct CompanyFiltersResponse {
    pub filters: Facets,
}

fn tracking_for(signed: &SignedUser, query: &SearchQuery) -> TrackingQuery {
    TrackingQuery::new(signed.user.clone(), query.origin_user.clone())
}

fn render_companies(
    state: &SharedState,
    query: &SearchQuery,
    results: &[OfficeResult],
    signed: &SignedUser,
    tracking: &TrackingQuery,
) -> Result<Vec<OfficeJson>, ApiError> {
    let engine = &state.engine;
    let builder = OfficeJsonBuilder::new(engine.settings(), engine.reference())
        .matched_rome(MatchedRome::for_romes(&query.rome_codes))
        .hiring_type(query.hiring_type)
        .zipcode(query.origin.zipcode())
        .tracking(Some(tracking))
        .include_contact(signed.internal);

    results
        .iter()
        .map(|result| builder.result(result).map_err(ApiError::from))
        .collect()
}

/// Link to the same search on the site. Raw coordinates have no page there,
/// and an empty search is better served by the home page.
fn page_url(
    state: &SharedState,
    query: &SearchQuery,
    companies_count: usize,
    tracking: &TrackingQuery,
) -> String {
    let settings = state.engine.settings();
    let commune_id = query.origin.commune_id();
    let rome_code = query.rome_codes.first();

    match (commune_id, rome_code) {
        (Some(commune_id), Some(rome_code)) if companies_count > 0 => {
            let naf_codes: Vec<String> = query.naf_codes.iter().cloned().collect();
            search_url(
                settings,
                &SearchUrl {
                    commune_id,
                    rome_code,
                    naf_codes: &naf_codes,
                    sort: query.sort.as_ref(),
                    distance_km: query.distance_km,
                    headcount: query.headcount.site_code(),
                },
                Some(tracking),
            )
        }
        _ => home_url(settings, Some(tracking)),
    }
}

pub async fn list_companies(
    State(state): State<SharedState>,
    signed: SignedUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<CompanyListResponse>, ApiError> {
    let query = state.engine.prepare(&params).await?;
    let outcome = state.engine.fetch_companies(&query, false).await;
    lbb_metrics::record_search("company_list", query.hiring_type.into(), outcome.companies_count);

    let tracking = tracking_for(&signed, &query);
    let companies = render_companies(&state, &query, &outcome.companies, &signed, &tracking)?;
    let rome_code = query.single_rome().map(str::to_string);
    let rome_label = rome_code
        .as_deref()
        .and_then(|rome| state.engine.reference().rome_label(rome))
        .map(str::to_string);

    Ok(Json(CompanyListResponse {
        companies_count: outcome.companies_count,
        companies,
        url: page_url(&state, &query, outcome.companies_count, &tracking),
        rome_code,
        rome_label,
    }))
}

pub async fn count_companies(
    State(state): State<SharedState>,
    _signed: SignedUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<CompanyCountResponse>, ApiError> {
    let query = state.engine.prepare(&params).await?;
    let companies_count = state.engine.count_companies(&query).await;
    lbb_metrics::record_search("company_count", query.hiring_type.into(), companies_count);

    Ok(Json(CompanyCountResponse { companies_count }))
}

pub async fn list_filters(
    State(state): State<SharedState>,
    _signed: SignedUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<CompanyFiltersResponse>, ApiError> {
    let query = state.engine.prepare(&params).await?;
    let filters = state.engine.fetch_filters(&query).await;
    lbb_metrics::record_search("company_filters", query.hiring_type.into(), filters.distance.france);

    Ok(Json(CompanyFiltersResponse { filters }))
}
