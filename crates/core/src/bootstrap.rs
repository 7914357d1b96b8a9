use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::HealthReport;
use crate::query_controller::TransportError;
use crate::sample_catalog::SampleQueryCatalog;

#[async_trait]
pub trait HealthService: Send + Sync {
    /// Fetches `/sql/health` and returns the decoded body verbatim.
    async fn health(&self) -> Result<Value, TransportError>;
}

pub trait ConnectionIndicator: Send + Sync {
    fn set_status(&self, connected: bool);
}

pub trait SampleQuerySurface: Send + Sync {
    fn show_samples(&self, catalog: &SampleQueryCatalog, table_names: &[String]);
}

/// Runs the one-time health call: toggles the connection indicator and, on a
/// reply, hands the grouped sample queries to the listing surface.
pub async fn bootstrap<H, I, Q>(service: &H, indicator: &I, samples: &Q) -> HealthReport
where
    H: HealthService + ?Sized,
    I: ConnectionIndicator + ?Sized,
    Q: SampleQuerySurface + ?Sized,
{
    let report = match service.health().await {
        Ok(raw) => HealthReport::from_envelope(&raw),
        Err(error) => {
            warn!(%error, "health check failed");
            indicator.set_status(false);
            return HealthReport::disconnected();
        }
    };

    info!(
        connected = report.connected,
        sample_queries = report.sample_queries.len(),
        tables = report.table_names.len(),
        "health check completed"
    );
    indicator.set_status(report.connected);
    let catalog = SampleQueryCatalog::from_queries(&report.sample_queries);
    samples.show_samples(&catalog, &report.table_names);
    report
}
