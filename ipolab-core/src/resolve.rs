//! Canonical price field resolution.
//!
//! The resolver walks an ordered list of candidate field names and picks the
//! first one the table actually carries. The default order prefers the
//! adjusted close and falls back to the plain close, because the upstream may
//! omit the adjusted field depending on request parameters.

use crate::data::provider::{fields, RawDailyRecord};
use crate::domain::PriceSeries;
use std::collections::BTreeSet;
use thiserror::Error;

/// None of the candidate fields were present.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no price field among {candidates:?} (available: {available:?})")]
pub struct FieldNotFound {
    pub candidates: Vec<String>,
    pub available: Vec<String>,
}

/// A resolved series and the field it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSeries {
    pub field: String,
    pub series: PriceSeries,
}

/// Ordered candidate list of price fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResolver {
    candidates: Vec<String>,
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self::new([fields::ADJ_CLOSE, fields::CLOSE])
    }
}

impl FieldResolver {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Pick the first candidate the table carries.
    ///
    /// A field counts as present when at least one row holds a finite value
    /// for it; a column of nothing but nulls is treated as absent.
    pub fn select_field(&self, records: &[RawDailyRecord]) -> Option<&str> {
        self.candidates
            .iter()
            .find(|name| {
                records
                    .iter()
                    .any(|r| r.get(name).is_some_and(f64::is_finite))
            })
            .map(String::as_str)
    }

    /// Resolve the table into an ordered `(date, price)` series.
    ///
    /// Rows lacking the chosen field, or carrying an unusable price, are
    /// dropped; the result is sorted with one entry per date.
    pub fn resolve(&self, records: &[RawDailyRecord]) -> Result<ResolvedSeries, FieldNotFound> {
        let field = self.select_field(records).ok_or_else(|| FieldNotFound {
            candidates: self.candidates.clone(),
            available: available_fields(records),
        })?;

        let series =
            PriceSeries::from_observations(records.iter().map(|r| (r.date, r.get(field))));

        Ok(ResolvedSeries {
            field: field.to_string(),
            series,
        })
    }
}

fn available_fields(records: &[RawDailyRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.fields.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(day: u32) -> RawDailyRecord {
        RawDailyRecord::new(NaiveDate::from_ymd_opt(2024, 6, day).unwrap())
    }

    #[test]
    fn prefers_adjusted_close() {
        let records = vec![
            rec(3).with_field(fields::CLOSE, 10.0).with_field(fields::ADJ_CLOSE, 9.5),
            rec(4).with_field(fields::CLOSE, 11.0).with_field(fields::ADJ_CLOSE, 10.5),
        ];
        let resolved = FieldResolver::default().resolve(&records).unwrap();
        assert_eq!(resolved.field, fields::ADJ_CLOSE);
        assert_eq!(resolved.series.prices().collect::<Vec<_>>(), vec![9.5, 10.5]);
    }

    #[test]
    fn falls_back_to_plain_close() {
        let records = vec![
            rec(3).with_field(fields::CLOSE, 10.0).with_field(fields::OPEN, 9.0),
            rec(4).with_field(fields::CLOSE, 11.0),
        ];
        let resolved = FieldResolver::default().resolve(&records).unwrap();
        assert_eq!(resolved.field, fields::CLOSE);
        assert_eq!(resolved.series.len(), 2);
    }

    #[test]
    fn all_null_adjusted_column_counts_as_absent() {
        let records = vec![
            rec(3).with_field(fields::CLOSE, 10.0).with_field(fields::ADJ_CLOSE, f64::NAN),
            rec(4).with_field(fields::CLOSE, 11.0).with_field(fields::ADJ_CLOSE, f64::NAN),
        ];
        let resolved = FieldResolver::default().resolve(&records).unwrap();
        assert_eq!(resolved.field, fields::CLOSE);
    }

    #[test]
    fn neither_field_is_field_not_found() {
        let records = vec![rec(3).with_field(fields::OPEN, 10.0).with_field(fields::VOLUME, 5.0)];
        let err = FieldResolver::default().resolve(&records).unwrap_err();
        assert_eq!(err.available, vec!["Open".to_string(), "Volume".to_string()]);
        assert_eq!(err.candidates.len(), 2);
    }

    #[test]
    fn empty_table_is_field_not_found() {
        assert!(FieldResolver::default().resolve(&[]).is_err());
    }

    #[test]
    fn rows_missing_the_chosen_field_are_dropped() {
        let records = vec![
            rec(5).with_field(fields::ADJ_CLOSE, 12.0),
            rec(3).with_field(fields::ADJ_CLOSE, 10.0),
            rec(4).with_field(fields::CLOSE, 11.0),
        ];
        let resolved = FieldResolver::default().resolve(&records).unwrap();
        assert_eq!(resolved.series.len(), 2);
        assert!(resolved.series.is_strictly_increasing());
        assert_eq!(resolved.series.price_at(0), Some(10.0));
    }

    #[test]
    fn custom_candidate_order() {
        let records = vec![rec(3).with_field(fields::CLOSE, 10.0).with_field(fields::OPEN, 9.0)];
        let resolver = FieldResolver::new([fields::OPEN, fields::CLOSE]);
        assert_eq!(resolver.resolve(&records).unwrap().field, fields::OPEN);
    }
}
