//! Header synonym dictionary for pt-BR and en-US ad-platform exports
//! (Meta Ads, Google Ads, TikTok Ads).

use crate::schema::ColumnRole;
use std::collections::{BTreeMap, HashMap};

fn builtin(role: ColumnRole) -> &'static [&'static str] {
    match role {
        ColumnRole::Name => &[
            "nome da campanha",
            "campaign name",
            "campanha",
            "campaign",
            "nome do conjunto de anúncios",
            "ad set name",
            "nome do anúncio",
            "ad name",
        ],
        ColumnRole::Spend => &[
            "valor usado (brl)",
            "valor usado",
            "valor gasto",
            "amount spent (brl)",
            "amount spent (usd)",
            "amount spent",
            "gasto",
            "investimento",
            "custo",
            "cost",
            "spend",
        ],
        ColumnRole::Impressions => &["impressões", "impressoes", "impressions", "impr."],
        ColumnRole::Reach => &["alcance", "reach"],
        ColumnRole::Frequency => &["frequência", "frequencia", "frequency"],
        ColumnRole::Clicks => &[
            "cliques no link",
            "link clicks",
            "cliques (todos)",
            "clicks (all)",
            "cliques",
            "clicks",
        ],
        ColumnRole::Ctr => &[
            "ctr (taxa de cliques no link)",
            "ctr (link click-through rate)",
            "ctr (todos)",
            "ctr (all)",
            "ctr",
        ],
        ColumnRole::Cpc => &[
            "cpc (custo por clique no link)",
            "cpc (cost per link click)",
            "cpc (todos)",
            "cpc (all)",
            "cpc médio",
            "avg. cpc",
            "cpc",
        ],
        ColumnRole::Cpm => &[
            "cpm (custo por 1.000 impressões)",
            "cpm (cost per 1,000 impressions)",
            "cpm",
        ],
        ColumnRole::Results => &["resultados", "results", "conversões", "conversions"],
        ColumnRole::CostPerResult => &[
            "custo por resultado",
            "cost per result",
            "custo por conversão",
            "cost / conv.",
            "cost per conversion",
        ],
        ColumnRole::ResultType => &[
            "tipo de resultado",
            "result type",
            "indicador de resultado",
            "result indicator",
        ],
        ColumnRole::Status => &[
            "veiculação da campanha",
            "campaign delivery",
            "veiculação",
            "delivery",
            "status da campanha",
            "campaign status",
            "status",
        ],
        ColumnRole::PeriodStart => &[
            "início dos relatórios",
            "reporting starts",
            "data de início",
            "start date",
        ],
        ColumnRole::PeriodEnd => &[
            "término dos relatórios",
            "reporting ends",
            "data de término",
            "end date",
        ],
    }
}

/// Per-role lists of lowercase header strings.
#[derive(Debug, Clone)]
pub struct SynonymDictionary {
    entries: BTreeMap<ColumnRole, Vec<String>>,
}

impl Default for SynonymDictionary {
    fn default() -> Self {
        let entries = ColumnRole::ALL
            .iter()
            .map(|&role| {
                (
                    role,
                    builtin(role).iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self { entries }
    }
}

impl SynonymDictionary {
    /// Built-in dictionary plus configured extras (appended after the built-ins).
    pub fn with_extras(extras: &HashMap<ColumnRole, Vec<String>>) -> Self {
        let mut dict = Self::default();
        for (role, words) in extras {
            let list = dict.entries.entry(*role).or_default();
            for w in words {
                let w = normalize_header(w);
                if !w.is_empty() && !list.contains(&w) {
                    list.push(w);
                }
            }
        }
        dict
    }

    pub fn get(&self, role: ColumnRole) -> &[String] {
        self.entries.get(&role).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// True if `header` (already normalized) contains a synonym of `role`.
    pub fn header_mentions(&self, role: ColumnRole, header: &str) -> bool {
        !header.is_empty()
            && self
                .get(role)
                .iter()
                .any(|s| header.contains(s.as_str()))
    }
}

/// Trim and lowercase a header cell for comparison.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}
