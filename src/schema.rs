//! Canonical ad-performance data model.
//!
//! `Cell`/`RawMatrix` only live for the duration of one import call;
//! `PerformanceCampaign`/`PerformanceReport` are what gets persisted.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate ISO8601 timestamp for current time.
pub fn now_iso8601() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let days_since_epoch = (secs / 86400) as i64;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = civil_from_days(days_since_epoch);

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hours, minutes, seconds
    )
}

/// Convert days since 1970-01-01 into a (year, month, day) triple.
pub fn civil_from_days(days_since_epoch: i64) -> (i32, u32, u32) {
    let mut year = 1970i32;
    let mut remaining = days_since_epoch;

    if remaining >= 0 {
        loop {
            let diy = if is_leap_year(year) { 366 } else { 365 };
            if remaining < diy {
                break;
            }
            remaining -= diy;
            year += 1;
        }
    } else {
        loop {
            year -= 1;
            let diy = if is_leap_year(year) { 366 } else { 365 };
            remaining += diy;
            if remaining >= 0 {
                break;
            }
        }
    }

    let mut month = 1u32;
    for d in days_in_months(year) {
        if remaining < d as i64 {
            break;
        }
        remaining -= d as i64;
        month += 1;
    }

    (year, month, remaining as u32 + 1)
}

pub fn days_in_months(year: i32) -> [u32; 12] {
    if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

// ============================================================================
// Raw input
// ============================================================================

/// A single raw cell as decoded from a spreadsheet or pasted text.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// Render the cell as a string. Whole numbers drop their trailing `.0`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    format!("{}", *f as i64)
                } else {
                    format!("{}", f)
                }
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

/// Ordered rows of cells. Rows may be ragged.
pub type RawMatrix = Vec<Vec<Cell>>;

/// Returns true if a row has at least one non-blank cell.
pub fn row_has_content(row: &[Cell]) -> bool {
    row.iter().any(|c| !c.is_blank())
}

// ============================================================================
// Column roles
// ============================================================================

/// Canonical fields a source column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnRole {
    Name,
    Spend,
    Impressions,
    Reach,
    Frequency,
    Clicks,
    Ctr,
    Cpc,
    Cpm,
    Results,
    CostPerResult,
    ResultType,
    Status,
    PeriodStart,
    PeriodEnd,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 15] = [
        ColumnRole::Name,
        ColumnRole::Spend,
        ColumnRole::Impressions,
        ColumnRole::Reach,
        ColumnRole::Frequency,
        ColumnRole::Clicks,
        ColumnRole::Ctr,
        ColumnRole::Cpc,
        ColumnRole::Cpm,
        ColumnRole::Results,
        ColumnRole::CostPerResult,
        ColumnRole::ResultType,
        ColumnRole::Status,
        ColumnRole::PeriodStart,
        ColumnRole::PeriodEnd,
    ];

    /// Roles without which no record can be built.
    pub const REQUIRED: [ColumnRole; 2] = [ColumnRole::Name, ColumnRole::Spend];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Name => "name",
            ColumnRole::Spend => "spend",
            ColumnRole::Impressions => "impressions",
            ColumnRole::Reach => "reach",
            ColumnRole::Frequency => "frequency",
            ColumnRole::Clicks => "clicks",
            ColumnRole::Ctr => "ctr",
            ColumnRole::Cpc => "cpc",
            ColumnRole::Cpm => "cpm",
            ColumnRole::Results => "results",
            ColumnRole::CostPerResult => "costPerResult",
            ColumnRole::ResultType => "resultType",
            ColumnRole::Status => "status",
            ColumnRole::PeriodStart => "periodStart",
            ColumnRole::PeriodEnd => "periodEnd",
        }
    }
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Canonical records
// ============================================================================

/// One campaign row in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceCampaign {
    pub id: String,
    pub name: String,
    pub spend: f64,
    pub impressions: f64,
    pub reach: f64,
    pub frequency: f64,
    pub clicks: f64,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub results: f64,
    pub cost_per_result: f64,
    #[serde(default)]
    pub result_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl PerformanceCampaign {
    /// Fresh record with a generated id and zeroed metrics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_campaign_id(),
            name: name.into(),
            spend: 0.0,
            impressions: 0.0,
            reach: 0.0,
            frequency: 0.0,
            clicks: 0.0,
            ctr: 0.0,
            cpc: 0.0,
            cpm: 0.0,
            results: 0.0,
            cost_per_result: 0.0,
            result_type: String::new(),
            status: None,
        }
    }

    /// Identity used when reconciling against a stored report.
    pub fn name_key(&self) -> &str {
        self.name.trim()
    }
}

pub fn new_campaign_id() -> String {
    format!("cmp_{}", Uuid::new_v4().simple())
}

/// Aggregated monthly report for one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub id: String,
    pub client_id: String,
    /// `YYYY-MM`
    pub month: String,
    pub campaigns: Vec<PerformanceCampaign>,
    pub total_spend: f64,
    pub total_results: f64,
    pub avg_ctr: f64,
    pub avg_cpc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<String>,
    #[serde(default)]
    pub source_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub imported_at: String,
}

pub fn new_report_id() -> String {
    format!("rpt_{}", Uuid::new_v4().simple())
}

/// Check a month key is `YYYY-MM` with a month in 01..=12.
pub fn is_valid_month(month: &str) -> bool {
    let bytes = month.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(|b| b.is_ascii_digit()) {
        return false;
    }
    matches!(month[5..].parse::<u32>(), Ok(1..=12))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_as_text_drops_trailing_zero() {
        assert_eq!(Cell::Number(1500.0).as_text(), "1500");
        assert_eq!(Cell::Number(12.5).as_text(), "12.5");
        assert_eq!(Cell::Empty.as_text(), "");
    }

    #[test]
    fn test_month_validation() {
        assert!(is_valid_month("2024-05"));
        assert!(is_valid_month("2024-12"));
        assert!(!is_valid_month("2024-13"));
        assert!(!is_valid_month("2024-5"));
        assert!(!is_valid_month("24-05-01"));
        assert!(!is_valid_month("abcd-ef"));
    }

    #[test]
    fn test_civil_from_days() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_844), (2024, 5, 1));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }

    #[test]
    fn test_campaign_serializes_camel_case() {
        let mut c = PerformanceCampaign::new("Campanha A");
        c.cost_per_result = 2.0;
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["costPerResult"], 2.0);
        assert!(json.get("status").is_none());
    }
}
