//! Dataset overview shown after an upload: shape, payee picker, monthly trend.

use crate::{
    config::LedgerColumns,
    dataset::{Column, ColumnType, Dataset},
    types::{Amount, PayeeId},
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyTotal {
    /// `YYYY-MM`.
    pub month: String,
    pub total: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyTrend {
    pub column: String,
    pub months: Vec<MonthlyTotal>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetOverview {
    pub row_count:     usize,
    pub columns:       Vec<Column>,
    pub payee_options: Vec<PayeeId>,
    pub trend:         Option<MonthlyTrend>,
}

/// Distinct non-null payee ids, stringified, in first-seen order.
pub fn payee_options(dataset: &Dataset, id_column: &str) -> Vec<PayeeId> {
    let Some(col) = dataset.column_index(id_column) else {
        return Vec::new();
    };
    let mut out: Vec<PayeeId> = Vec::new();
    for cell in dataset.column_values(col).filter(|v| !v.is_null()) {
        let key = cell.display_key();
        if !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

/// Per-month sum of the first numeric column, bucketed by `date_column`.
/// None when either column is missing. Rows with no usable date or
/// amount are left out.
pub fn monthly_trend(dataset: &Dataset, date_column: &str) -> Option<MonthlyTrend> {
    let date_col = dataset.column_index(date_column)?;
    let amount_col = dataset
        .columns()
        .iter()
        .position(|c| c.kind == ColumnType::Numeric)?;

    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for row in dataset.rows() {
        let cells = row.cells();
        let (Some(date), Some(amount)) = (cells[date_col].as_date(), cells[amount_col].as_f64()) else {
            continue;
        };
        *buckets.entry((date.year(), date.month())).or_insert(0.0) += amount;
    }

    Some(MonthlyTrend {
        column: dataset.columns()[amount_col].name.clone(),
        months: buckets
            .into_iter()
            .map(|((y, m), total)| MonthlyTotal { month: format!("{y:04}-{m:02}"), total })
            .collect(),
    })
}

pub fn overview(dataset: &Dataset, columns: &LedgerColumns) -> DatasetOverview {
    DatasetOverview {
        row_count:     dataset.row_count(),
        columns:       dataset.columns().to_vec(),
        payee_options: payee_options(dataset, &columns.payee_id),
        trend:         monthly_trend(dataset, &columns.payout_date),
    }
}
