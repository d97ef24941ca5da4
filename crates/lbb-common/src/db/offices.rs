use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::GenericClient;
use tokio_postgres::Row;
use tracing::{info, instrument, warn};

use crate::admin::{AdminOverlay, BlacklistEntry, OfficeOverride, OverrideSource};
use crate::db::PgPool;
use crate::db::util::TimedClientExt;
use crate::office::Office;
use crate::store::{OfficeStore, StoreError};

const OFFICE_COLUMNS: &str = "siret, naf, company_name, office_name, street_number, street_name, \
     city_code, zipcode, email, tel, website, social_network, contact_mode, headcount, \
     score, score_alternance, lat, lon, has_multi_geolocations";

const OVERRIDE_COLUMNS: &str = "id, sirets, score, score_alternance, new_email, new_phone, \
     new_website, social_network, contact_mode, remove_email, remove_phone, remove_website";

fn office_from_row(row: &Row) -> Office {
    Office {
        siret: row.get("siret"),
        naf: row.get("naf"),
        company_name: row.get("company_name"),
        office_name: row.get("office_name"),
        street_number: row.get("street_number"),
        street_name: row.get("street_name"),
        city_code: row.get("city_code"),
        zipcode: row.get("zipcode"),
        email: row.get("email"),
        tel: row.get("tel"),
        website: row.get("website"),
        social_network: row.get("social_network"),
        contact_mode: row.get("contact_mode"),
        headcount: row.get("headcount"),
        score: row.get("score"),
        score_alternance: row.get("score_alternance"),
        lat: row.get("lat"),
        lon: row.get("lon"),
        has_multi_geolocations: row.get("has_multi_geolocations"),
        ..Default::default()
    }
}

fn override_from_row(row: &Row) -> Result<OfficeOverride, StoreError> {
    let source: String = row.get("source");
    let source = source
        .parse::<OverrideSource>()
        .map_err(|_| StoreError::Mapping(format!("unknown override source {source:?}")))?;

    Ok(OfficeOverride {
        id: row.get("id"),
        source,
        sirets: row.get("sirets"),
        score: row.get("score"),
        score_alternance: row.get("score_alternance"),
        new_email: row.get("new_email"),
        new_phone: row.get("new_phone"),
        new_website: row.get("new_website"),
        social_network: row.get("social_network"),
        contact_mode: row.get("contact_mode"),
        remove_email: row.get("remove_email"),
        remove_phone: row.get("remove_phone"),
        remove_website: row.get("remove_website"),
    })
}

/// Office rows as imported, without overrides. Used to build the index.
#[instrument(skip(pool))]
pub async fn fetch_all_offices(pool: &PgPool) -> Result<Vec<Office>, StoreError> {
    let client = pool.get().await?;
    let query = format!("SELECT {OFFICE_COLUMNS} FROM lbb.offices ORDER BY siret");
    let rows = client.timed_query(&query, &[], "fetch_all_offices").await?;
    Ok(rows.iter().map(office_from_row).collect())
}

async fn load_overrides_with<C: GenericClient>(client: &C) -> Result<Vec<OfficeOverride>, StoreError> {
    let query = format!(
        "SELECT 'admin' AS source, {OVERRIDE_COLUMNS} FROM lbb.office_admin_updates \
         UNION ALL \
         SELECT 'third_party' AS source, {OVERRIDE_COLUMNS} FROM lbb.office_third_party_updates"
    );
    let rows = client.timed_query(&query, &[], "load_overrides").await?;

    let mut overrides = Vec::with_capacity(rows.len());
    for row in &rows {
        let item = override_from_row(row)?;
        match item.validate() {
            Ok(()) => overrides.push(item),
            Err(err) => warn!(id = item.id, source = item.source.as_ref(), error = %err, "skipping invalid office override"),
        }
    }
    Ok(overrides)
}

/// Admin and third-party overrides, invalid rows skipped.
#[instrument(skip(pool))]
pub async fn load_overrides(pool: &PgPool) -> Result<Vec<OfficeOverride>, StoreError> {
    let client = pool.get().await?;
    load_overrides_with(&client).await
}

/// Postgres-backed office store. Overrides are loaded once and applied on read.
#[derive(Clone)]
pub struct PgOfficeStore {
    pool: PgPool,
    overlay: AdminOverlay,
}

impl PgOfficeStore {
    pub fn new(pool: PgPool, overlay: AdminOverlay) -> Self {
        Self { pool, overlay }
    }

    pub async fn connect(pool: PgPool) -> Result<Self, StoreError> {
        let overlay = AdminOverlay::new(load_overrides(&pool).await?);
        Ok(Self::new(pool, overlay))
    }
}

#[async_trait]
impl OfficeStore for PgOfficeStore {
    #[instrument(skip(self))]
    async fn get_office(&self, siret: &str) -> Result<Option<Office>, StoreError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {OFFICE_COLUMNS} FROM lbb.offices WHERE siret = $1");
        let row = client
            .timed_query_opt_cached(&query, &[&siret], "get_office")
            .await?;

        Ok(row.map(|row| {
            let mut office = office_from_row(&row);
            self.overlay.apply(&mut office);
            office
        }))
    }

    #[instrument(skip(self, sirets), fields(count = sirets.len()))]
    async fn get_offices(&self, sirets: &[String]) -> Result<HashMap<String, Office>, StoreError> {
        if sirets.is_empty() {
            return Ok(HashMap::new());
        }

        let client = self.pool.get().await?;
        let query = format!("SELECT {OFFICE_COLUMNS} FROM lbb.offices WHERE siret = ANY($1)");
        let rows = client
            .timed_query_cached(&query, &[&sirets], "get_offices")
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let mut office = office_from_row(row);
                self.overlay.apply(&mut office);
                (office.siret.clone(), office)
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.timed_query("SELECT 1", &[], "ping").await?;
        Ok(())
    }

    fn overlay(&self) -> &AdminOverlay {
        &self.overlay
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub overrides: usize,
    pub offices_updated: usize,
    pub missing_sirets: Vec<String>,
    /// Emails erased by this run, now in `lbb.history_blacklist`.
    pub blacklisted_emails: usize,
}

/// Writes every override onto the office table in a single transaction.
///
/// Rows already carrying the overridden values are left alone, so a second
/// run reports zero updates.
#[instrument(skip(pool))]
pub async fn update_offices(pool: &PgPool, run_id: &str) -> Result<UpdateReport, StoreError> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    let overrides = load_overrides_with(&tx).await?;
    let override_count = overrides.len();
    let overlay = AdminOverlay::new(overrides);
    let mut sirets: Vec<String> = overlay.sirets().map(str::to_string).collect();
    sirets.sort();

    let query = format!("SELECT {OFFICE_COLUMNS} FROM lbb.offices WHERE siret = ANY($1) FOR UPDATE");
    let rows = tx.timed_query(&query, &[&sirets], "update_offices_select").await?;
    let current: HashMap<String, Office> = rows
        .iter()
        .map(office_from_row)
        .map(|office| (office.siret.clone(), office))
        .collect();

    let mut report = UpdateReport {
        overrides: override_count,
        ..Default::default()
    };
    let now = chrono::Utc::now().naive_utc();

    for siret in &sirets {
        let Some(before) = current.get(siret) else {
            report.missing_sirets.push(siret.clone());
            continue;
        };
        let mut after = before.clone();
        overlay.apply(&mut after);
        if after == *before {
            continue;
        }

        tx.timed_execute(
            "UPDATE lbb.offices SET \
                score = $2, score_alternance = $3, email = $4, tel = $5, website = $6, \
                social_network = $7, contact_mode = $8, updated_by_run = $9, updated_at = NOW() \
             WHERE siret = $1",
            &[
                &after.siret,
                &after.score,
                &after.score_alternance,
                &after.email,
                &after.tel,
                &after.website,
                &after.social_network,
                &after.contact_mode,
                &run_id,
            ],
            "update_offices_write",
        )
        .await?;
        report.offices_updated += 1;

        if let Some(entry) = BlacklistEntry::for_removal(before, &after, now) {
            tx.timed_execute(
                "INSERT INTO lbb.history_blacklist (email, datetime_removal) VALUES ($1, $2)",
                &[&entry.email, &entry.removed_at],
                "update_offices_blacklist",
            )
            .await?;
            report.blacklisted_emails += 1;
        }
    }

    tx.commit().await?;

    if !report.missing_sirets.is_empty() {
        warn!(missing = ?report.missing_sirets, "overrides reference unknown sirets");
    }
    info!(
        run_id,
        overrides = report.overrides,
        offices_updated = report.offices_updated,
        blacklisted_emails = report.blacklisted_emails,
        "materialised office overrides"
    );
    Ok(report)
}
