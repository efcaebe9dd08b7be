use crate::{
    error::{LedgerError, LedgerResult},
    schedule_engine::PaymentFrequency,
};
use serde::{Deserialize, Serialize};

// ── Ledger column names ─────────────────────────────────────────────────────

/// Where each recorded field lives in an uploaded ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerColumns {
    pub payee_id:        String,
    pub total_incentive: String,
    pub cap_percent:     String,
    pub term_months:     String,
    pub start_date:      String,
    pub payout_date:     String,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        Self {
            payee_id:        "Payee ID".into(),
            total_incentive: "Total Incentive".into(),
            cap_percent:     "Cap %".into(),
            term_months:     "Term".into(),
            start_date:      "Payment Start Date".into(),
            payout_date:     "payout_date".into(),
        }
    }
}

// ── Schedule engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub default_cap_percent: f64,
    pub default_term_months: i64,
    pub default_frequency:   PaymentFrequency,
    pub columns:             LedgerColumns,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_cap_percent: 100.0,
            default_term_months: 12,
            default_frequency:   PaymentFrequency::Monthly,
            columns:             LedgerColumns::default(),
        }
    }
}

// ── Anomaly engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Expected share of outliers; sets the model's decision offset.
    pub contamination: f64,
    pub n_trees:       usize,
    /// Per-tree subsample cap.
    pub max_samples:   usize,
    pub seed:          u64,
    pub z_threshold:   f64,
    /// Ranked substrings used to pick the amount column.
    pub column_keywords: Vec<String>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            contamination:   0.02,
            n_trees:         200,
            max_samples:     256,
            seed:            42,
            z_threshold:     3.0,
            column_keywords: ["payment", "payout", "amount", "incentive"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ── Top level ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub schedule: ScheduleConfig,
    pub anomaly:  AnomalyConfig,
}

impl EngineConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    /// In tests, use EngineConfig::default().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let a = &self.anomaly;
        if !(a.contamination > 0.0 && a.contamination <= 0.5) {
            return Err(invalid(format!("contamination {} outside (0, 0.5]", a.contamination)));
        }
        if a.n_trees == 0 {
            return Err(invalid("n_trees must be > 0"));
        }
        if a.max_samples < 2 {
            return Err(invalid("max_samples must be >= 2"));
        }
        if !(a.z_threshold.is_finite() && a.z_threshold > 0.0) {
            return Err(invalid(format!("z_threshold {} must be positive", a.z_threshold)));
        }

        let s = &self.schedule;
        if !(s.default_cap_percent.is_finite() && s.default_cap_percent >= 0.0) {
            return Err(invalid(format!("default_cap_percent {} must be >= 0", s.default_cap_percent)));
        }
        if s.default_term_months <= 0 {
            return Err(invalid(format!("default_term_months {} must be > 0", s.default_term_months)));
        }
        if s.columns.payee_id.trim().is_empty() {
            return Err(invalid("columns.payee_id must be set"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> LedgerError {
    LedgerError::InvalidConfig { reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"anomaly": {"seed": 7}, "schedule": {"default_frequency": "quarterly"}}"#)
                .unwrap();
        assert_eq!(cfg.anomaly.seed, 7);
        assert_eq!(cfg.anomaly.n_trees, 200);
        assert_eq!(cfg.schedule.default_frequency, PaymentFrequency::Quarterly);
        assert_eq!(cfg.schedule.columns.payee_id, "Payee ID");
    }

    #[test]
    fn rejects_bad_contamination() {
        let mut cfg = EngineConfig::default();
        cfg.anomaly.contamination = 0.0;
        assert!(matches!(cfg.validate(), Err(LedgerError::InvalidConfig { .. })));
    }
}
