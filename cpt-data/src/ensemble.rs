use serde::{Deserialize, Serialize};

/// Which standard deviation formula the ensemble spread uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdDevKind {
    /// Divide by `n`.
    #[default]
    Population,
    /// Divide by `n - 1`; undefined for a single value.
    Sample,
}

/// Cross-model statistics for one month. Every field is `None` when no
/// model has a value for the month.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EnsembleStats {
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    /// `mean + 2 * std_dev`
    pub upper: Option<f64>,
    /// `mean - 2 * std_dev`
    pub lower: Option<f64>,
}

impl EnsembleStats {
    /// Statistics of the values present this month, in the order given.
    /// The order is fixed by the caller so results are bit-reproducible.
    pub fn from_values(values: &[f64], kind: StdDevKind) -> EnsembleStats {
        if values.is_empty() {
            return EnsembleStats::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let squares: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        let std_dev = match kind {
            StdDevKind::Population => Some((squares / n).sqrt()),
            StdDevKind::Sample if values.len() > 1 => Some((squares / (n - 1.0)).sqrt()),
            StdDevKind::Sample => None,
        };
        EnsembleStats {
            mean: Some(mean),
            std_dev,
            upper: std_dev.map(|s| mean + 2.0 * s),
            lower: std_dev.map(|s| mean - 2.0 * s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_three_models_population() {
        let stats = EnsembleStats::from_values(&[10.0, 20.0, 30.0], StdDevKind::Population);
        let std_dev = (200.0_f64 / 3.0).sqrt();
        assert_eq!(stats.mean, Some(20.0));
        assert!(close(stats.std_dev.unwrap(), std_dev));
        assert!(close(stats.upper.unwrap(), 20.0 + 2.0 * std_dev));
        assert!(close(stats.lower.unwrap(), 20.0 - 2.0 * std_dev));
    }

    #[test]
    fn test_three_models_sample() {
        let stats = EnsembleStats::from_values(&[10.0, 20.0, 30.0], StdDevKind::Sample);
        assert_eq!(stats.mean, Some(20.0));
        assert_eq!(stats.std_dev, Some(10.0));
        assert_eq!(stats.upper, Some(40.0));
        assert_eq!(stats.lower, Some(0.0));
    }

    #[test]
    fn test_two_models_population_is_half_the_gap() {
        let stats = EnsembleStats::from_values(&[10.0, 20.0], StdDevKind::Population);
        assert_eq!(stats.mean, Some(15.0));
        assert_eq!(stats.std_dev, Some(5.0));
        assert_eq!(stats.upper, Some(25.0));
        assert_eq!(stats.lower, Some(5.0));
    }

    #[test]
    fn test_no_models_is_missing_not_zero() {
        for kind in [StdDevKind::Population, StdDevKind::Sample] {
            assert_eq!(EnsembleStats::from_values(&[], kind), EnsembleStats::default());
            assert_eq!(EnsembleStats::from_values(&[], kind).mean, None);
        }
    }

    #[test]
    fn test_single_model() {
        let population = EnsembleStats::from_values(&[12.5], StdDevKind::Population);
        assert_eq!(population.mean, Some(12.5));
        assert_eq!(population.std_dev, Some(0.0));

        let sample = EnsembleStats::from_values(&[12.5], StdDevKind::Sample);
        assert_eq!(sample.mean, Some(12.5));
        assert_eq!(sample.std_dev, None);
        assert_eq!(sample.upper, None);
    }
}
