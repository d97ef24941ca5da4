use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::info;

use lbb_common::HiringType;
use lbb_common::search::{MatchedRome, OfficeDetailsJson, OfficeJsonBuilder};
use lbb_common::urls::TrackingQuery;

use crate::SharedState;
use crate::auth::SignedUser;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct OfficeDetailsQuery {
    pub contract: Option<String>,
    pub rome_code: Option<String>,
    pub origin_user: Option<String>,
}

impl OfficeDetailsQuery {
    fn hiring_type(&self) -> Result<HiringType, ApiError> {
        match self.contract.as_deref().map(str::trim) {
            None | Some("") => Ok(HiringType::default()),
            Some(raw) => raw.parse().map_err(|_| {
                ApiError::BadRequest(
                    "Invalid request argument: contract. Possible values : alternance, dpae".into(),
                )
            }),
        }
    }
}

/// One office by siret, 404 when unknown or hidden for the requested contract.
pub async fn office_details(
    State(state): State<SharedState>,
    signed: SignedUser,
    Path(siret): Path<String>,
    Query(params): Query<OfficeDetailsQuery>,
) -> Result<Json<OfficeDetailsJson>, ApiError> {
    let hiring_type = params.hiring_type()?;
    let engine = &state.engine;

    let rome_code = params.rome_code.as_deref().map(str::trim).filter(|rome| !rome.is_empty());
    if let Some(rome) = rome_code {
        if !engine.reference().is_known_rome(rome) {
            return Err(ApiError::BadRequest(format!(
                "Invalid request argument: Unknown rome_code: {rome}"
            )));
        }
    }

    let Some(office) = engine.visible_office(&siret, hiring_type).await? else {
        if hiring_type == HiringType::Alternance && engine.is_removed_from_lba(&siret).await? {
            info!(siret = %siret, "office removed from La Bonne Alternance on request");
            return Err(ApiError::NotFound(format!(
                "office {siret} was removed from La Bonne Alternance"
            )));
        }
        return Err(ApiError::NotFound(format!("office {siret} not found")));
    };

    let tracking = TrackingQuery::new(signed.user.clone(), params.origin_user.clone());
    let matched_rome = rome_code.map(MatchedRome::Single).unwrap_or_default();
    let json = OfficeJsonBuilder::new(engine.settings(), engine.reference())
        .matched_rome(matched_rome)
        .hiring_type(hiring_type)
        .tracking(Some(&tracking))
        .include_contact(signed.internal)
        .details(&office)?;

    Ok(Json(json))
}
