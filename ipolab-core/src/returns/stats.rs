//! Per-horizon summary statistics over a return matrix.
//!
//! Each column is summarised over its populated cells only; missing cells are
//! not treated as zero. Columns with no populated cells report `count == 0`
//! and `None` for every statistic.

use super::matrix::ReturnMatrix;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonStats {
    /// Horizon day (1-based).
    pub day: usize,
    /// Number of populated cells in the column.
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; needs at least two observations.
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Fraction of populated cells with a strictly positive return.
    pub hit_rate: Option<f64>,
}

impl HorizonStats {
    fn from_values(day: usize, mut values: Vec<f64>) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                day,
                count,
                mean: None,
                median: None,
                std_dev: None,
                min: None,
                max: None,
                hit_rate: None,
            };
        }

        values.sort_by(f64::total_cmp);
        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;

        let median = if count % 2 == 1 {
            values[count / 2]
        } else {
            (values[count / 2 - 1] + values[count / 2]) / 2.0
        };

        let std_dev = (count > 1).then(|| {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        });

        let hits = values.iter().filter(|v| **v > 0.0).count();

        Self {
            day,
            count,
            mean: Some(mean),
            median: Some(median),
            std_dev,
            min: values.first().copied(),
            max: values.last().copied(),
            hit_rate: Some(hits as f64 / n),
        }
    }
}

/// Summary statistics for every horizon column, day 1 first.
pub fn horizon_stats(matrix: &ReturnMatrix) -> Vec<HorizonStats> {
    matrix
        .horizons()
        .map(|day| {
            let values: Vec<f64> = matrix
                .rows()
                .filter_map(|(_, row)| row[day - 1])
                .collect();
            HorizonStats::from_values(day, values)
        })
        .collect()
}
