//! Office records by siret.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;

use crate::admin::AdminOverlay;
use crate::office::Office;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map office row: {0}")]
    Mapping(String),
    #[error("office store unavailable: {0}")]
    Unavailable(String),
}

/// Source of truth for office rows. Implementations return rows with admin
/// overrides already applied.
#[async_trait]
pub trait OfficeStore: Send + Sync {
    async fn get_office(&self, siret: &str) -> Result<Option<Office>, StoreError>;

    /// Unknown sirets are simply absent from the map.
    async fn get_offices(&self, sirets: &[String]) -> Result<HashMap<String, Office>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Overrides applied to every row this store returns.
    fn overlay(&self) -> &AdminOverlay;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryOfficeStore {
    offices: HashMap<String, Office>,
    overlay: AdminOverlay,
}

impl InMemoryOfficeStore {
    pub fn new(offices: impl IntoIterator<Item = Office>, overlay: AdminOverlay) -> Self {
        Self {
            offices: offices
                .into_iter()
                .map(|office| (office.siret.clone(), office))
                .collect(),
            overlay,
        }
    }

    fn overlaid(&self, siret: &str) -> Option<Office> {
        let mut office = self.offices.get(siret)?.clone();
        self.overlay.apply(&mut office);
        Some(office)
    }
}

#[async_trait]
impl OfficeStore for InMemoryOfficeStore {
    async fn get_office(&self, siret: &str) -> Result<Option<Office>, StoreError> {
        Ok(self.overlaid(siret))
    }

    async fn get_offices(&self, sirets: &[String]) -> Result<HashMap<String, Office>, StoreError> {
        Ok(sirets
            .iter()
            .filter_map(|siret| self.overlaid(siret))
            .map(|office| (office.siret.clone(), office))
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn overlay(&self) -> &AdminOverlay {
        &self.overlay
    }
}
