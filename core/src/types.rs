//! Shared primitive types used across both engines.

/// A payee identifier in its stringified form.
/// Lookups always compare this form, never the raw cell.
pub type PayeeId = String;

/// Monetary amount. Rounded to cents only at the edges.
pub type Amount = f64;

/// Index of a row in a dataset.
pub type RowIndex = usize;
