//! Amount-column selection for anomaly detection.
//!
//! Candidates are ranked: keyword-matching columns first (dataset order),
//! then every column (dataset order). The first numeric candidate wins.

use crate::{
    dataset::{ColumnType, Dataset},
    error::{LedgerError, LedgerResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChoice {
    pub index: usize,
    pub name:  String,
    /// False when the pick came from the any-numeric fallback.
    pub keyword_match: bool,
}

fn matches_keyword(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

pub fn select_amount_column(dataset: &Dataset, keywords: &[String]) -> LedgerResult<ColumnChoice> {
    let columns = dataset.columns();
    let keyword_ranked = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| matches_keyword(&c.name, keywords))
        .map(|(i, _)| (i, true));
    let fallback = (0..columns.len()).map(|i| (i, false));

    keyword_ranked
        .chain(fallback)
        .find(|&(i, _)| columns[i].kind == ColumnType::Numeric)
        .map(|(index, keyword_match)| ColumnChoice {
            index,
            name: columns[index].name.clone(),
            keyword_match,
        })
        .ok_or(LedgerError::NoNumericColumn)
}
