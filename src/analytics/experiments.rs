use serde::{Deserialize, Serialize};

/// One experiment to report on.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSpec {
    pub id: String,
    pub variants: Vec<String>,
}

/// Optional time restriction for experiment counts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRange {
    /// A single UTC calendar day, `YYYY-MM-DD`.
    pub day: Option<String>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

/// `POST /api/experiments` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentsRequest {
    pub project_id: String,
    pub experiments: Vec<ExperimentSpec>,
    pub button_id: Option<String>,
    pub goal: Option<String>,
    pub range: Option<ExperimentRange>,
}

/// Exposure/click/conversion counts for one variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRow {
    pub variant: String,
    pub exposures: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub ctr: f64,
    pub cvr: f64,
}

impl VariantRow {
    pub fn new(variant: impl Into<String>, exposures: u64, clicks: u64, conversions: u64) -> Self {
        Self {
            variant: variant.into(),
            exposures,
            clicks,
            conversions,
            ctr: ratio(clicks, exposures),
            cvr: ratio(conversions, exposures),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExperimentTotals {
    pub exposures: u64,
    pub clicks: u64,
    pub conversions: u64,
}

/// All variants of one experiment plus their sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResult {
    pub exp_id: String,
    pub rows: Vec<VariantRow>,
    pub totals: ExperimentTotals,
}

impl ExperimentResult {
    pub fn from_rows(exp_id: impl Into<String>, rows: Vec<VariantRow>) -> Self {
        let totals = rows
            .iter()
            .fold(ExperimentTotals::default(), |acc, r| ExperimentTotals {
                exposures: acc.exposures + r.exposures,
                clicks: acc.clicks + r.clicks,
                conversions: acc.conversions + r.conversions,
            });
        Self {
            exp_id: exp_id.into(),
            rows,
            totals,
        }
    }
}

/// `POST /api/experiments` response.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentsReport {
    pub results: Vec<ExperimentResult>,
}

/// `part / whole`, or 0 when `whole` is 0.
fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let r = part as f64 / whole as f64;
    r
}
