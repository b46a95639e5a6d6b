//! Reconciles freshly extracted campaigns against the stored report for the
//! same `(client_id, month)`.
//!
//! Campaign identity is the trimmed, case-sensitive name. A matching name
//! replaces the stored values but keeps the stored id; a new name is appended.
//! Nothing from earlier imports is dropped.

use crate::aggregate::aggregate;
use crate::extractor::ExtractedCampaigns;
use crate::schema::{new_report_id, now_iso8601, PerformanceCampaign, PerformanceReport};
use std::collections::HashMap;
use tracing::info;

/// Import-level facts stored alongside the report.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub client_id: String,
    pub month: String,
    pub source_label: String,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub replaced: usize,
    pub inserted: usize,
}

/// Replace-or-insert `incoming` into `existing`, keyed by name.
pub fn reconcile_campaigns(
    existing: Vec<PerformanceCampaign>,
    incoming: Vec<PerformanceCampaign>,
) -> (Vec<PerformanceCampaign>, MergeCounts) {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name_key().to_string(), i))
        .collect();
    let mut counts = MergeCounts::default();

    for mut campaign in incoming {
        let key = campaign.name_key().to_string();
        match index.get(&key) {
            Some(&slot) => {
                campaign.id = std::mem::take(&mut merged[slot].id);
                merged[slot] = campaign;
                counts.replaced += 1;
            }
            None => {
                index.insert(key, merged.len());
                merged.push(campaign);
                counts.inserted += 1;
            }
        }
    }

    (merged, counts)
}

/// Build the report to upsert: a new one, or `existing` with campaigns merged.
pub fn merge_report(
    existing: Option<PerformanceReport>,
    extracted: ExtractedCampaigns,
    ctx: &ImportContext,
) -> (PerformanceReport, MergeCounts) {
    let mut report = existing.unwrap_or_else(|| PerformanceReport {
        id: new_report_id(),
        client_id: ctx.client_id.clone(),
        month: ctx.month.clone(),
        campaigns: Vec::new(),
        total_spend: 0.0,
        total_results: 0.0,
        avg_ctr: 0.0,
        avg_cpc: 0.0,
        period_start: None,
        period_end: None,
        source_label: String::new(),
        content_hash: None,
        imported_at: String::new(),
    });

    let (campaigns, counts) =
        reconcile_campaigns(std::mem::take(&mut report.campaigns), extracted.campaigns);
    report.campaigns = campaigns;
    aggregate(&report.campaigns).apply_to(&mut report);

    if extracted.period_start.is_some() {
        report.period_start = extracted.period_start;
    }
    if extracted.period_end.is_some() {
        report.period_end = extracted.period_end;
    }
    report.source_label = ctx.source_label.clone();
    report.content_hash = ctx.content_hash.clone();
    report.imported_at = now_iso8601();

    info!(
        "Merged report {} ({} / {}): {} replaced, {} inserted, {} total",
        report.id,
        report.client_id,
        report.month,
        counts.replaced,
        counts.inserted,
        report.campaigns.len()
    );

    (report, counts)
}
