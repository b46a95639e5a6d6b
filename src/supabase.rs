//! Supabase (PostgREST) implementation of [`ReportStore`].
//!
//! Table `performance_reports`, unique on `(client_id, month)`, campaigns kept
//! as a JSONB array.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SupabaseSettings;
use crate::schema::{PerformanceCampaign, PerformanceReport};
use crate::store::ReportStore;

const REPORTS_TABLE: &str = "performance_reports";

/// Supabase client configuration.
#[derive(Clone)]
pub struct SupabaseReportStore {
    client: Client,
    base_url: String,
    service_role_key: String,
    schema: String,
}

impl SupabaseReportStore {
    pub fn new(settings: &SupabaseSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            service_role_key: settings.service_role_key.clone(),
            schema: settings.schema.clone(),
        }
    }

    fn reports_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, REPORTS_TABLE)
    }
}

#[async_trait::async_trait]
impl ReportStore for SupabaseReportStore {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn fetch_report(&self, client_id: &str, month: &str) -> Result<Option<PerformanceReport>> {
        let resp = self
            .client
            .get(self.reports_url())
            .query(&[
                ("client_id", format!("eq.{}", client_id)),
                ("month", format!("eq.{}", month)),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ])
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Accept-Profile", &self.schema)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Supabase GET {} failed: {} - {}",
                REPORTS_TABLE,
                status,
                text
            ));
        }

        let rows: Vec<ReportRow> = resp
            .json()
            .await
            .context("Failed to decode performance report row")?;

        let report = rows.into_iter().next().map(PerformanceReport::from);
        debug!(
            "Fetched report for {} / {}: {}",
            client_id,
            month,
            if report.is_some() { "found" } else { "none" }
        );
        Ok(report)
    }

    async fn upsert_report(&self, report: &PerformanceReport) -> Result<()> {
        let body = ReportRow::from(report);

        let resp = self
            .client
            .post(self.reports_url())
            .query(&[("on_conflict", "client_id,month")])
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Content-Profile", &self.schema)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Failed to upsert report {}: {} - {}",
                report.id,
                status,
                text
            ));
        }

        info!(
            "Upserted report {} to Supabase ({} campaigns)",
            report.id,
            report.campaigns.len()
        );
        Ok(())
    }
}

// ============================================================================
// Supabase row types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ReportRow {
    id: String,
    client_id: String,
    month: String,
    #[serde(default)]
    campaigns: Vec<PerformanceCampaign>,
    #[serde(default)]
    total_spend: f64,
    #[serde(default)]
    total_results: f64,
    #[serde(default)]
    avg_ctr: f64,
    #[serde(default)]
    avg_cpc: f64,
    period_start: Option<String>,
    period_end: Option<String>,
    #[serde(default)]
    source_label: Option<String>,
    #[serde(default)]
    content_hash: Option<String>,
    #[serde(default)]
    imported_at: Option<String>,
}

impl From<ReportRow> for PerformanceReport {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            client_id: row.client_id,
            month: row.month,
            campaigns: row.campaigns,
            total_spend: row.total_spend,
            total_results: row.total_results,
            avg_ctr: row.avg_ctr,
            avg_cpc: row.avg_cpc,
            period_start: row.period_start,
            period_end: row.period_end,
            source_label: row.source_label.unwrap_or_default(),
            content_hash: row.content_hash,
            imported_at: row.imported_at.unwrap_or_default(),
        }
    }
}

impl From<&PerformanceReport> for ReportRow {
    fn from(report: &PerformanceReport) -> Self {
        Self {
            id: report.id.clone(),
            client_id: report.client_id.clone(),
            month: report.month.clone(),
            campaigns: report.campaigns.clone(),
            total_spend: report.total_spend,
            total_results: report.total_results,
            avg_ctr: report.avg_ctr,
            avg_cpc: report.avg_cpc,
            period_start: report.period_start.clone(),
            period_end: report.period_end.clone(),
            source_label: Some(report.source_label.clone()),
            content_hash: report.content_hash.clone(),
            imported_at: Some(report.imported_at.clone()),
        }
    }
}
