#![allow(async_fn_in_trait)]

use std::future::Future;
use std::sync::OnceLock;
use std::time::Instant;

use deadpool_postgres::GenericClient;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, ToStatement};
use tracing::warn;

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

fn slow_query_threshold_ms() -> Option<u64> {
    static THRESHOLD: OnceLock<Option<u64>> = OnceLock::new();

    *THRESHOLD.get_or_init(|| {
        parse_threshold(std::env::var("LBB_DB_LOG_MIN_DURATION_MS").ok().as_deref())
    })
}

/// Zero, negative or unparsable thresholds disable slow-query logging.
fn parse_threshold(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|ms| *ms > 0)
}

async fn timed<T>(label: &str, query: impl Future<Output = T>) -> T {
    let started = Instant::now();
    let output = query.await;

    if let Some(threshold_ms) = slow_query_threshold_ms() {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if elapsed_ms >= threshold_ms {
            warn!(query = label, elapsed_ms, threshold_ms, "slow_query_detected");
        }
    }

    output
}

/// Query helpers that log statements slower than `LBB_DB_LOG_MIN_DURATION_MS`.
///
/// The `_cached` variants go through the connection's prepared statement
/// cache, which pays off for the per-request office lookups.
pub trait TimedClientExt: GenericClient {
    async fn timed_query<S>(
        &self,
        statement: &S,
        params: Params<'_>,
        label: &str,
    ) -> Result<Vec<Row>, tokio_postgres::Error>
    where
        S: ToStatement + Sync + Send + ?Sized,
    {
        timed(label, self.query(statement, params)).await
    }

    async fn timed_query_cached(
        &self,
        statement: &str,
        params: Params<'_>,
        label: &str,
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        timed(label, async {
            let prepared = self.prepare_cached(statement).await?;
            self.query(&prepared, params).await
        })
        .await
    }

    async fn timed_query_opt_cached(
        &self,
        statement: &str,
        params: Params<'_>,
        label: &str,
    ) -> Result<Option<Row>, tokio_postgres::Error> {
        timed(label, async {
            let prepared = self.prepare_cached(statement).await?;
            self.query_opt(&prepared, params).await
        })
        .await
    }

    async fn timed_execute<S>(
        &self,
        statement: &S,
        params: Params<'_>,
        label: &str,
    ) -> Result<u64, tokio_postgres::Error>
    where
        S: ToStatement + Sync + Send + ?Sized,
    {
        timed(label, self.execute(statement, params)).await
    }
}

impl<T: GenericClient + ?Sized> TimedClientExt for T {}
