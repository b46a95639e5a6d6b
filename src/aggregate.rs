//! Report-level aggregates, always recomputed from the full campaign list.

use crate::schema::{PerformanceCampaign, PerformanceReport};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregates {
    pub total_spend: f64,
    pub total_results: f64,
    /// Unweighted mean of per-campaign CTR.
    pub avg_ctr: f64,
    /// Unweighted mean of per-campaign CPC.
    pub avg_cpc: f64,
}

pub fn aggregate(campaigns: &[PerformanceCampaign]) -> Aggregates {
    if campaigns.is_empty() {
        return Aggregates::default();
    }

    let n = campaigns.len() as f64;
    Aggregates {
        total_spend: campaigns.iter().map(|c| c.spend).sum(),
        total_results: campaigns.iter().map(|c| c.results).sum(),
        avg_ctr: campaigns.iter().map(|c| c.ctr).sum::<f64>() / n,
        avg_cpc: campaigns.iter().map(|c| c.cpc).sum::<f64>() / n,
    }
}

impl Aggregates {
    pub fn apply_to(&self, report: &mut PerformanceReport) {
        report.total_spend = self.total_spend;
        report.total_results = self.total_results;
        report.avg_ctr = self.avg_ctr;
        report.avg_cpc = self.avg_cpc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(spend: f64, results: f64, ctr: f64, cpc: f64) -> PerformanceCampaign {
        let mut c = PerformanceCampaign::new("c");
        c.spend = spend;
        c.results = results;
        c.ctr = ctr;
        c.cpc = cpc;
        c
    }

    #[test]
    fn test_totals_and_unweighted_means() {
        let list = vec![campaign(1000.0, 10.0, 1.0, 2.0), campaign(10.0, 1.0, 3.0, 4.0)];
        let agg = aggregate(&list);
        assert_eq!(agg.total_spend, 1010.0);
        assert_eq!(agg.total_results, 11.0);
        // not spend-weighted
        assert_eq!(agg.avg_ctr, 2.0);
        assert_eq!(agg.avg_cpc, 3.0);
    }

    #[test]
    fn test_empty_list_is_all_zero() {
        assert_eq!(aggregate(&[]), Aggregates::default());
    }
}
