use super::error::{EngineError, EngineResult};
use super::model::{outer_join, Column, RenderType, Table};
use super::spline::{resample, MIN_SPLINE_POINTS};

/// Parameters of a peak extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakParams {
    /// Resampling step, in frequency units (MHz).
    pub target_resolution: f64,
    /// Exclusive lower intensity bound.
    pub intensity_min: f64,
    /// Exclusive upper intensity bound.
    pub intensity_max: f64,
}

impl PeakParams {
    fn validate(&self) -> EngineResult<()> {
        if !self.target_resolution.is_finite() || self.target_resolution <= 0.0 {
            return Err(EngineError::Validation(format!(
                "target resolution must be positive, got {}",
                self.target_resolution
            )));
        }
        if self.intensity_min.is_nan() || self.intensity_max.is_nan() {
            return Err(EngineError::Validation("intensity bounds must be numbers".into()));
        }
        if self.intensity_min >= self.intensity_max {
            return Err(EngineError::Validation(format!(
                "intensity band ({}, {}) is empty",
                self.intensity_min, self.intensity_max
            )));
        }
        Ok(())
    }
}

/// Turn each visible trace of `table` into a sparse list of peaks.
///
/// Every value column not tagged [`RenderType::Hidden`] is resampled to
/// `target_resolution` with a natural cubic spline, then scanned for strict
/// local maxima inside the open intensity band. The per-column peak lists
/// are outer-joined on frequency into a new table called `name`.
pub fn pick_peaks(table: &Table, name: &str, params: PeakParams) -> EngineResult<Table> {
    params.validate()?;
    table.assert_sorted_by_frequency()?;

    let axis = table.frequency_axis();
    let freq = table.frequencies();
    let mut result = Table::from_columns(name, vec![Column::new(axis, Vec::new())], axis)?;

    for col in table.value_columns() {
        if table.render_type(&col.name) == Some(RenderType::Hidden) {
            log::debug!("peak pick: skipping hidden column '{}'", col.name);
            continue;
        }

        let (x, y): (Vec<f64>, Vec<f64>) = freq
            .iter()
            .zip(&col.values)
            .filter(|(_, v)| !v.is_nan())
            .map(|(f, v)| (*f, *v))
            .unzip();
        if x.len() < MIN_SPLINE_POINTS {
            return Err(EngineError::Data(format!(
                "column '{}' has {} samples; at least {MIN_SPLINE_POINTS} are needed to interpolate",
                col.name,
                x.len()
            )));
        }

        let (xs, ys) = resample(&x, &y, params.target_resolution).map_err(|e| match e {
            EngineError::Data(msg) => EngineError::Data(format!("column '{}': {msg}", col.name)),
            other => other,
        })?;
        let (peak_x, peak_y) = local_maxima(&xs, &ys, params.intensity_min, params.intensity_max);
        log::debug!(
            "peak pick: '{}' resampled to {} points, {} peaks",
            col.name,
            xs.len(),
            peak_x.len()
        );

        let peaks = Table::from_columns(
            name,
            vec![Column::new(axis, peak_x), Column::new(col.name.clone(), peak_y)],
            axis,
        )?;
        result = outer_join(&result, &peaks)?;
    }

    log::info!(
        "picked {} peak rows from '{}' into '{name}'",
        result.len(),
        table.name
    );
    Ok(result)
}

/// Strict interior maxima with `min < y < max`.
fn local_maxima(xs: &[f64], ys: &[f64], min: f64, max: f64) -> (Vec<f64>, Vec<f64>) {
    let mut px = Vec::new();
    let mut py = Vec::new();
    for k in 1..ys.len().saturating_sub(1) {
        let v = ys[k];
        if min < v && v < max && v > ys[k - 1] && v > ys[k + 1] {
            px.push(xs[k]);
            py.push(v);
        }
    }
    (px, py)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{table, FREQ};

    fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
        amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
    }

    fn two_line_spectrum() -> Table {
        let freq: Vec<f64> = (0..=40).map(|i| 100.0 + f64::from(i) * 0.5).collect();
        let a: Vec<f64> = freq.iter().map(|&f| gaussian(f, 105.0, 1.0, 1.0)).collect();
        let b: Vec<f64> = freq.iter().map(|&f| gaussian(f, 112.0, 1.0, 0.8)).collect();
        table("scan", &[(FREQ, freq.as_slice()), ("A", a.as_slice()), ("B", b.as_slice())])
    }

    fn params() -> PeakParams {
        PeakParams {
            target_resolution: 0.01,
            intensity_min: 0.5,
            intensity_max: 2.0,
        }
    }

    #[test]
    fn finds_one_peak_per_line_and_joins_columns() {
        let peaks = pick_peaks(&two_line_spectrum(), "peaks", params()).unwrap();
        assert_eq!(peaks.name, "peaks");
        assert_eq!(peaks.frequency_axis(), FREQ);
        assert_eq!(peaks.len(), 2);

        let f = peaks.frequencies();
        assert!((f[0] - 105.0).abs() < 0.02, "got {}", f[0]);
        assert!((f[1] - 112.0).abs() < 0.02, "got {}", f[1]);
        assert!(peaks.column("A").unwrap()[1].is_nan());
        assert!(peaks.column("B").unwrap()[0].is_nan());
    }

    #[test]
    fn every_peak_lies_strictly_inside_the_band() {
        let p = PeakParams {
            intensity_min: 0.05,
            intensity_max: 0.9,
            ..params()
        };
        let peaks = pick_peaks(&two_line_spectrum(), "peaks", p).unwrap();
        for col in peaks.value_columns() {
            for v in col.values.iter().filter(|v| !v.is_nan()) {
                assert!(0.05 < *v && *v < 0.9);
            }
        }
        // The 1.0 line is above the band, only the 0.8 line survives.
        assert!(peaks.column("A").unwrap().iter().all(|v| v.is_nan()));
        assert!(peaks.column("B").unwrap().iter().any(|v| !v.is_nan()));
    }

    #[test]
    fn hidden_columns_are_skipped() {
        let mut t = two_line_spectrum();
        t.set_render_type("B", RenderType::Hidden).unwrap();
        let peaks = pick_peaks(&t, "peaks", params()).unwrap();
        assert!(peaks.has_column("A"));
        assert!(!peaks.has_column("B"));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let t = two_line_spectrum();
        let first = pick_peaks(&t, "p", params()).unwrap();
        let second = pick_peaks(&t, "p", params()).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.columns().iter().zip(second.columns()) {
            assert_eq!(a.name, b.name);
            assert!(a
                .values
                .iter()
                .zip(&b.values)
                .all(|(x, y)| x == y || (x.is_nan() && y.is_nan())));
        }
    }

    #[test]
    fn too_few_samples_is_a_data_error() {
        let t = table("tiny", &[(FREQ, &[1.0, 2.0, 3.0]), ("I", &[0.0, 1.0, 0.0])]);
        assert!(matches!(
            pick_peaks(&t, "p", params()),
            Err(EngineError::Data(_))
        ));
    }

    #[test]
    fn tiny_resolution_is_rejected_not_allocated() {
        let t = table(
            "scan",
            &[(FREQ, &[8000.0, 8010.0, 8020.0, 8100.0]), ("I", &[0.0, 1.0, 0.5, 0.2])],
        );
        let p = PeakParams {
            target_resolution: 1e-18,
            ..params()
        };
        assert!(matches!(
            pick_peaks(&t, "p", p),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_resolution_fails_validation() {
        let p = PeakParams {
            target_resolution: 0.0,
            ..params()
        };
        assert!(matches!(
            pick_peaks(&two_line_spectrum(), "p", p),
            Err(EngineError::Validation(_))
        ));
    }
}
