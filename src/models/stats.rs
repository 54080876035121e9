//! Reporting aggregates

use serde::{Deserialize, Serialize};

/// Bucketing granularity for count reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Month,
    Quarter,
    Year,
}

/// Labels and counts, index-aligned, ready for a chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<i32>,
    pub data: Vec<i64>,
}

impl ChartSeries {
    pub fn total(&self) -> i64 {
        self.data.iter().sum()
    }
}

/// Which timestamps a report counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSubject {
    /// Users by `last_login`
    Logins,
    /// Posts by `created_at`
    Posts,
    /// Accommodations by `created_at`
    Accommodations,
}
