//! Report persistence seam.
//!
//! The pipeline needs exactly two calls from persistence: fetch by
//! `(client_id, month)` and upsert by the same key. There is no revision check;
//! concurrent imports for the same key are last-write-wins.

use crate::schema::PerformanceReport;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_report(&self, client_id: &str, month: &str) -> Result<Option<PerformanceReport>>;
    async fn upsert_report(&self, report: &PerformanceReport) -> Result<()>;
}

/// In-memory store used when no remote store is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportStore {
    inner: Arc<RwLock<HashMap<(String, String), PerformanceReport>>>,
    upserts: Arc<AtomicUsize>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upsert calls received so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryReportStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_report(&self, client_id: &str, month: &str) -> Result<Option<PerformanceReport>> {
        let store = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("report store lock poisoned"))?;
        Ok(store
            .get(&(client_id.to_string(), month.to_string()))
            .cloned())
    }

    async fn upsert_report(&self, report: &PerformanceReport) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut store = self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("report store lock poisoned"))?;
        store.insert(
            (report.client_id.clone(), report.month.clone()),
            report.clone(),
        );
        tracing::debug!(
            "MemoryReportStore: stored report {} ({} campaigns)",
            report.id,
            report.campaigns.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{merge_report, ImportContext};
    use crate::extractor::{ExtractedCampaigns, SkipStats};
    use crate::schema::PerformanceCampaign;

    fn report(client: &str, month: &str) -> PerformanceReport {
        let ctx = ImportContext {
            client_id: client.to_string(),
            month: month.to_string(),
            source_label: "test.csv".to_string(),
            content_hash: None,
        };
        let extracted = ExtractedCampaigns {
            campaigns: vec![PerformanceCampaign::new("A")],
            period_start: None,
            period_end: None,
            skipped: SkipStats::default(),
        };
        merge_report(None, extracted, &ctx).0
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() {
        let store = MemoryReportStore::new();
        assert!(store.fetch_report("c1", "2024-05").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_then_fetch_by_key() {
        let store = MemoryReportStore::new();
        let r = report("c1", "2024-05");
        store.upsert_report(&r).await.unwrap();
        store.upsert_report(&r).await.unwrap();

        let fetched = store.fetch_report("c1", "2024-05").await.unwrap().unwrap();
        assert_eq!(fetched, r);
        assert!(store.fetch_report("c1", "2024-06").await.unwrap().is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.upsert_count(), 2);
    }
}
