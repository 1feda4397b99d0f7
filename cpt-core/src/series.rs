use crate::{
    error::GatewayError,
    gateway::PeriodValue,
    units::kelvin_to_celsius,
    year_month::{MonthRange, YearMonth},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Monthly temperatures in degrees Celsius keyed by month.
///
/// A series may start late, end early or have interior gaps; absent months
/// simply have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries(BTreeMap<YearMonth, f64>);

impl MonthlySeries {
    pub fn new() -> MonthlySeries {
        MonthlySeries(BTreeMap::new())
    }

    /// Ingest a raw gateway answer given in Kelvin.
    ///
    /// This is the only place where Kelvin becomes Celsius. Months outside
    /// `window` are discarded and `null` values are left as gaps. Unparseable
    /// labels, repeated labels and non-finite values make the whole payload
    /// malformed.
    pub fn from_kelvin_rows(
        rows: Vec<PeriodValue>,
        window: MonthRange,
    ) -> Result<MonthlySeries, GatewayError> {
        let mut seen: BTreeMap<YearMonth, Option<f64>> = BTreeMap::new();
        for row in rows {
            let month: YearMonth = row
                .period
                .parse()
                .map_err(|e| GatewayError::Malformed(format!("{e}")))?;
            if let Some(value) = row.value {
                if !value.is_finite() {
                    return Err(GatewayError::Malformed(format!(
                        "non-finite value for {month}"
                    )));
                }
            }
            if seen.insert(month, row.value).is_some() {
                return Err(GatewayError::Malformed(format!(
                    "duplicate entry for {month}"
                )));
            }
        }
        Ok(MonthlySeries(
            seen.into_iter()
                .filter(|(month, _)| window.contains(month))
                .filter_map(|(month, kelvin)| kelvin.map(|k| (month, kelvin_to_celsius(k))))
                .collect(),
        ))
    }

    /// Build a series from values that are already in Celsius.
    pub fn from_celsius(values: impl IntoIterator<Item = (YearMonth, f64)>) -> MonthlySeries {
        MonthlySeries(values.into_iter().collect())
    }

    pub fn get(&self, month: &YearMonth) -> Option<f64> {
        self.0.get(month).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_month(&self) -> Option<YearMonth> {
        self.0.keys().next().copied()
    }

    pub fn last_month(&self) -> Option<YearMonth> {
        self.0.keys().next_back().copied()
    }

    /// Entries in month order.
    pub fn iter(&self) -> impl Iterator<Item = (YearMonth, f64)> + '_ {
        self.0.iter().map(|(month, value)| (*month, *value))
    }
}
