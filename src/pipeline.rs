//! Import orchestration.
//!
//! Reader → shape repair → header location → column mapping → extraction run
//! synchronously; the only awaits are the report fetch and the final upsert.
//! Any error aborts before the upsert, so a failed import never touches the
//! stored report.

use crate::column_mapper::map_matrix;
use crate::config::ImportSettings;
use crate::error::ImportError;
use crate::extractor::{extract_campaigns, ExtractedCampaigns};
use crate::header::locate_header;
use crate::merge::{merge_report, ImportContext, MergeCounts};
use crate::schema::{is_valid_month, PerformanceReport, RawMatrix};
use crate::shape;
use crate::sheet_parser::{parse_file, parse_pasted, RawSheet};
use crate::store::ReportStore;
use crate::synonyms::SynonymDictionary;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

const PASTED_LABEL: &str = "pasted data";

/// Where the rows come from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    File { filename: String, data: Vec<u8> },
    Pasted { text: String },
}

impl ImportSource {
    fn default_label(&self) -> String {
        match self {
            ImportSource::File { filename, .. } => filename.clone(),
            ImportSource::Pasted { .. } => PASTED_LABEL.to_string(),
        }
    }

    fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        match self {
            ImportSource::File { data, .. } => hasher.update(data),
            ImportSource::Pasted { text } => hasher.update(text.as_bytes()),
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub client_id: String,
    /// `YYYY-MM`
    pub month: String,
    pub source: ImportSource,
    /// Audit label; defaults to the file name or "pasted data".
    pub source_label: Option<String>,
}

/// Result of a successful import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub report: PerformanceReport,
    pub sheet: String,
    pub extracted: usize,
    pub replaced: usize,
    pub inserted: usize,
    pub skipped_rows: usize,
}

/// Campaigns extracted from the best sheet of a source.
#[derive(Debug, Clone)]
pub struct SheetExtraction {
    pub sheet: String,
    pub extracted: ExtractedCampaigns,
}

pub struct ImportPipeline {
    store: Arc<dyn ReportStore>,
    settings: ImportSettings,
    synonyms: SynonymDictionary,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn ReportStore>, settings: ImportSettings) -> Self {
        let synonyms = settings.synonyms();
        Self {
            store,
            settings,
            synonyms,
        }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Run a full import and upsert the merged report.
    pub async fn import(&self, request: ImportRequest) -> Result<ImportOutcome, ImportError> {
        if !is_valid_month(&request.month) {
            return Err(ImportError::InvalidMonth(request.month));
        }

        let source_label = request
            .source_label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| request.source.default_label());

        info!(
            "Importing '{}' for client {} / {}",
            source_label, request.client_id, request.month
        );

        let SheetExtraction { sheet, extracted } = self.extract(&request.source)?;
        let extracted_count = extracted.campaigns.len();
        let skipped_rows = extracted.skipped.total();

        let existing = self
            .store
            .fetch_report(&request.client_id, &request.month)
            .await?;
        debug!(
            "Existing report for {} / {}: {}",
            request.client_id,
            request.month,
            existing.as_ref().map(|r| r.id.as_str()).unwrap_or("none")
        );

        let ctx = ImportContext {
            client_id: request.client_id,
            month: request.month,
            source_label,
            content_hash: Some(request.source.content_hash()),
        };
        let (report, MergeCounts { replaced, inserted }) = merge_report(existing, extracted, &ctx);

        self.store.upsert_report(&report).await?;

        Ok(ImportOutcome {
            report,
            sheet,
            extracted: extracted_count,
            replaced,
            inserted,
            skipped_rows,
        })
    }

    /// Read and extract without touching the store.
    pub fn extract(&self, source: &ImportSource) -> Result<SheetExtraction, ImportError> {
        let sheets = match source {
            ImportSource::File { filename, data } => parse_file(filename, data)?,
            ImportSource::Pasted { text } => vec![parse_pasted(text)?],
        };
        self.extract_from_sheets(sheets)
    }

    /// Pick the sheet with the strongest header and extract its campaigns.
    pub fn extract_from_sheets(&self, sheets: Vec<RawSheet>) -> Result<SheetExtraction, ImportError> {
        let mut best: Option<(String, RawMatrix, usize, u32)> = None;

        for sheet in sheets {
            let rows = shape::normalize(&sheet.rows, self.settings.shape_probe_rows);
            let loc = locate_header(&rows, &self.synonyms, self.settings.header_scan_rows);
            debug!(
                "Sheet '{}' ({:?}): header at row {} score {}",
                sheet.name, sheet.source_type, loc.index, loc.score
            );
            if best.as_ref().map_or(true, |(_, _, _, score)| loc.score > *score) {
                best = Some((sheet.name, rows, loc.index, loc.score));
            }
        }

        let Some((sheet, rows, header_index, _)) = best else {
            return Err(ImportError::EmptySource);
        };
        info!("Using sheet '{}' (header row {})", sheet, header_index);

        let mapping = map_matrix(
            &rows,
            header_index,
            &self.synonyms,
            self.settings.inference_sample_rows,
        )?;
        let extracted = extract_campaigns(&rows, header_index, &mapping)?;

        Ok(SheetExtraction { sheet, extracted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cell;
    use crate::sheet_parser::SourceType;
    use crate::store::MemoryReportStore;

    fn pipeline() -> (ImportPipeline, MemoryReportStore) {
        let store = MemoryReportStore::new();
        let pipeline = ImportPipeline::new(Arc::new(store.clone()), ImportSettings::default());
        (pipeline, store)
    }

    fn csv_request(month: &str, body: &str) -> ImportRequest {
        ImportRequest {
            client_id: "client-1".to_string(),
            month: month.to_string(),
            source: ImportSource::File {
                filename: "meta-ads.csv".to_string(),
                data: body.as_bytes().to_vec(),
            },
            source_label: None,
        }
    }

    fn pasted_request(text: &str) -> ImportRequest {
        ImportRequest {
            client_id: "client-1".to_string(),
            month: "2024-05".to_string(),
            source: ImportSource::Pasted {
                text: text.to_string(),
            },
            source_label: None,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_semicolon_csv() {
        let (pipeline, store) = pipeline();
        let body = "Nome da campanha;Valor usado (BRL);Resultados\nCampanha A;1.500,00;10\n";
        let outcome = pipeline.import(csv_request("2024-05", body)).await.unwrap();

        assert_eq!(outcome.extracted, 1);
        let c = &outcome.report.campaigns[0];
        assert_eq!(c.name, "Campanha A");
        assert_eq!(c.spend, 1500.0);
        assert_eq!(c.results, 10.0);
        assert_eq!(outcome.report.total_spend, 1500.0);
        assert_eq!(outcome.report.total_results, 10.0);
        assert_eq!(outcome.report.source_label, "meta-ads.csv");
        assert_eq!(outcome.report.content_hash.as_ref().map(|h| h.len()), Some(64));
        assert_eq!(store.upsert_count(), 1);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let (pipeline, store) = pipeline();
        let body = "Campaign name,Amount spent,Impressions,Link clicks,Results\n\
                    Alpha,\"1,200.50\",10000,150,12\n\
                    Beta,300,2500,40,3\n";

        let first = pipeline.import(csv_request("2024-05", body)).await.unwrap().report;
        let second = pipeline.import(csv_request("2024-05", body)).await.unwrap().report;

        assert_eq!(second.id, first.id);
        assert_eq!(second.total_spend, first.total_spend);
        assert_eq!(second.total_results, first.total_results);
        assert_eq!(second.avg_ctr, first.avg_ctr);
        assert_eq!(second.avg_cpc, first.avg_cpc);
        assert_eq!(second.campaigns.len(), first.campaigns.len());
        assert_eq!(second.campaigns, first.campaigns);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_merge_across_sources() {
        let (pipeline, store) = pipeline();
        let a = "Campaign name\tAmount spent\tResults\nX\t10\t1\nY\t20\t2\n";
        let b = "Campaign name\tAmount spent\tResults\nY\t25\t5\nZ\t30\t3\n";

        let first = pipeline.import(pasted_request(a)).await.unwrap().report;
        let outcome = pipeline.import(pasted_request(b)).await.unwrap();
        let report = &outcome.report;

        assert_eq!((outcome.replaced, outcome.inserted), (1, 1));
        let names: Vec<&str> = report.campaigns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "Z"]);
        assert_eq!(report.campaigns[0], first.campaigns[0]);
        assert_eq!(report.campaigns[1].id, first.campaigns[1].id);
        assert_eq!(report.campaigns[1].spend, 25.0);
        assert_eq!(report.campaigns[1].results, 5.0);
        assert_eq!(report.total_spend, 65.0);
        assert_eq!(report.total_results, 9.0);
        assert_eq!(report.source_label, "pasted data");
        assert_eq!(store.upsert_count(), 2);
    }

    #[tokio::test]
    async fn test_failures_never_write() {
        let (pipeline, store) = pipeline();

        let err = pipeline.import(csv_request("2024-05", "")).await.unwrap_err();
        assert!(matches!(err, ImportError::EmptySource));

        let err = pipeline
            .import(csv_request("2024-05", "foo;bar\nalpha;beta\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::SchemaUnresolved { .. }));

        let err = pipeline
            .import(csv_request("2024-05", "Campaign name;Amount spent\nTotal;10\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::NoDataExtracted));

        let err = pipeline
            .import(csv_request("May 2024", "Campaign name;Amount spent\nA;10\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidMonth(_)));

        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_reimport_keeps_prior_report() {
        let (pipeline, store) = pipeline();
        let ok = pipeline
            .import(csv_request("2024-05", "Campaign name;Amount spent\nA;10\n"))
            .await
            .unwrap()
            .report;
        let _ = pipeline
            .import(csv_request("2024-05", "Campaign name;Amount spent\nResumo;10\n"))
            .await
            .unwrap_err();

        let stored = store.fetch_report("client-1", "2024-05").await.unwrap().unwrap();
        assert_eq!(stored, ok);
        assert_eq!(store.upsert_count(), 1);
    }

    #[tokio::test]
    async fn test_custom_source_label() {
        let (pipeline, _) = pipeline();
        let mut req = pasted_request("Campaign name\tAmount spent\nA\t1\n");
        req.source_label = Some("export maio.xlsx".to_string());
        let outcome = pipeline.import(req).await.unwrap();
        assert_eq!(outcome.report.source_label, "export maio.xlsx");
    }

    #[test]
    fn test_best_sheet_wins() {
        let (pipeline, _) = pipeline();
        let notes = RawSheet {
            name: "Notas".to_string(),
            rows: vec![vec![Cell::text("Status")], vec![Cell::text("ok")]],
            source_type: SourceType::Excel,
        };
        let data = RawSheet {
            name: "Campanhas".to_string(),
            rows: vec![
                vec![Cell::text("Relatório")],
                vec![
                    Cell::text("Nome da campanha"),
                    Cell::text("Valor usado (BRL)"),
                    Cell::text("Resultados"),
                ],
                vec![Cell::text("Campanha A"), Cell::Number(1500.0), Cell::Number(10.0)],
            ],
            source_type: SourceType::Excel,
        };

        let out = pipeline.extract_from_sheets(vec![notes, data]).unwrap();
        assert_eq!(out.sheet, "Campanhas");
        assert_eq!(out.extracted.campaigns[0].spend, 1500.0);
    }

    #[test]
    fn test_headerless_paste_uses_inference() {
        let (pipeline, _) = pipeline();
        let source = ImportSource::Pasted {
            text: "Alpha  250,00  12000  300\nBeta  100,00  8000  90\n".to_string(),
        };
        let out = pipeline.extract(&source).unwrap();
        // the first row doubles as the header, so only Beta is a data row
        let names: Vec<&str> = out.extracted.campaigns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Beta"]);
        assert_eq!(out.extracted.campaigns[0].spend, 8000.0);
    }
}
