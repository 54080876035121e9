//! Reporting aggregates for administrators
//!
//! Month and quarter buckets count across all years. The yearly series runs
//! from the first year present to the current year, so quiet years show up
//! as zeros.

use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;

use crate::db::repositories::StatsRepository;
use crate::models::{ChartSeries, Period, ReportSubject, User};

#[derive(Debug, thiserror::Error)]
pub enum StatsServiceError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Count `timestamps` into `period` buckets
pub fn bucket(timestamps: &[DateTime<Utc>], period: Period, current_year: i32) -> ChartSeries {
    match period {
        Period::Month => fixed_buckets(timestamps, 12, |ts| ts.month0() as usize),
        Period::Quarter => fixed_buckets(timestamps, 4, |ts| (ts.month0() / 3) as usize),
        Period::Year => yearly(timestamps, current_year),
    }
}

fn fixed_buckets(
    timestamps: &[DateTime<Utc>],
    count: usize,
    index: impl Fn(&DateTime<Utc>) -> usize,
) -> ChartSeries {
    let mut data = vec![0i64; count];
    for ts in timestamps {
        data[index(ts)] += 1;
    }
    ChartSeries {
        labels: (1..=count as i32).collect(),
        data,
    }
}

fn yearly(timestamps: &[DateTime<Utc>], current_year: i32) -> ChartSeries {
    let Some(first) = timestamps.iter().map(|ts| ts.year()).min() else {
        return ChartSeries {
            labels: Vec::new(),
            data: Vec::new(),
        };
    };
    let last = timestamps
        .iter()
        .map(|ts| ts.year())
        .max()
        .unwrap_or(first)
        .max(current_year);

    let mut data = vec![0i64; (last - first + 1) as usize];
    for ts in timestamps {
        data[(ts.year() - first) as usize] += 1;
    }
    ChartSeries {
        labels: (first..=last).collect(),
        data,
    }
}

pub struct StatsService {
    repo: Arc<dyn StatsRepository>,
}

impl StatsService {
    pub fn new(repo: Arc<dyn StatsRepository>) -> Self {
        Self { repo }
    }

    pub async fn report(
        &self,
        user: &User,
        subject: ReportSubject,
        period: Period,
    ) -> Result<ChartSeries, StatsServiceError> {
        if !user.is_admin() {
            return Err(StatsServiceError::Forbidden(
                "Only administrators can view reports".to_string(),
            ));
        }
        let timestamps = self.repo.timestamps(subject).await?;
        Ok(bucket(&timestamps, period, Utc::now().year()))
    }
}
