//! Delimited-text rendition of an [`AggregatedTable`].

use crate::table::AggregatedTable;
use std::io;

fn field(value: Option<f64>) -> String {
    value.map_or(String::new(), |v| v.to_string())
}

/// Write `table` as CSV.
///
/// Columns are `date,historical,<model ids>,ensemble_mean,ensemble_std,
/// ensemble_upper,ensemble_lower`. Missing values are empty fields and
/// numbers keep full precision.
pub fn write_csv<W: io::Write>(table: &AggregatedTable, writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["date".to_string(), "historical".to_string()];
    header.extend(table.model_ids().iter().cloned());
    header.extend(
        ["ensemble_mean", "ensemble_std", "ensemble_upper", "ensemble_lower"]
            .map(str::to_string),
    );
    wtr.write_record(&header)?;

    for row in table.rows() {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.month.to_string());
        record.push(field(row.observed));
        record.extend(row.models.iter().map(|v| field(*v)));
        record.push(field(row.ensemble.mean));
        record.push(field(row.ensemble.std_dev));
        record.push(field(row.ensemble.upper));
        record.push(field(row.ensemble.lower));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ensemble::StdDevKind, table::aggregate};
    use cpt_core::{
        dataset::PointDataset,
        params::{QueryParameters, Scenario},
        series::MonthlySeries,
        year_month::YearMonth,
    };
    use std::collections::BTreeMap;

    fn render(dataset: &PointDataset) -> String {
        let mut out = Vec::new();
        write_csv(&aggregate(dataset, StdDevKind::Population), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_and_missing_fields() {
        let params = QueryParameters::new(40.0, -105.0, 2010, 2021, Scenario::Ssp585).unwrap();
        let jan = YearMonth::new(2010, 1).unwrap();
        let feb = YearMonth::new(2010, 2).unwrap();
        let projected = BTreeMap::from([
            (
                "ACCESS-CM2".to_string(),
                MonthlySeries::from_celsius([(jan, 10.0), (feb, 11.5)]),
            ),
            (
                "MIROC6".to_string(),
                MonthlySeries::from_celsius([(jan, 20.0)]),
            ),
        ]);
        let observed = MonthlySeries::from_celsius([(jan, -1.25)]);
        let csv = render(&PointDataset::new(params, observed, projected, Vec::new()));
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "date,historical,ACCESS-CM2,MIROC6,ensemble_mean,ensemble_std,ensemble_upper,ensemble_lower"
        );
        assert_eq!(lines[1], "2010-01,-1.25,10,20,15,5,25,5");
        assert_eq!(lines[2], "2010-02,,11.5,,11.5,0,11.5,11.5");
        assert_eq!(lines[3], "2010-03,,,,,,,");
        assert_eq!(lines.len(), 1 + 12 * 12);
    }

    #[test]
    fn test_full_precision() {
        let params = QueryParameters::new(0.0, 0.0, 2010, 2021, Scenario::Ssp126).unwrap();
        let jan = YearMonth::new(2010, 1).unwrap();
        let observed = MonthlySeries::from_celsius([(jan, 1.0 / 3.0)]);
        let csv = render(&PointDataset::new(params, observed, BTreeMap::new(), Vec::new()));

        let first = csv.lines().nth(1).unwrap();
        assert_eq!(first, format!("2010-01,{},,,,", 1.0_f64 / 3.0));
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "date,historical,ensemble_mean,ensemble_std,ensemble_upper,ensemble_lower"
        );
    }
}
