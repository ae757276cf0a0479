use super::error::{EngineError, EngineResult};

/// Fewest knots a cubic fit accepts.
pub const MIN_SPLINE_POINTS: usize = 4;

/// Largest resampled curve [`resample`] will build.
pub const MAX_RESAMPLE_POINTS: usize = 10_000_000;

// ---------------------------------------------------------------------------
// Natural cubic spline
// ---------------------------------------------------------------------------

/// Interpolating cubic spline with zero second derivative at both ends.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit through `(x, y)`. `x` must be finite and strictly increasing.
    pub fn natural(x: &[f64], y: &[f64]) -> EngineResult<Self> {
        if x.len() != y.len() {
            return Err(EngineError::Shape(format!(
                "spline input has {} x values but {} y values",
                x.len(),
                y.len()
            )));
        }
        let n = x.len();
        if n < MIN_SPLINE_POINTS {
            return Err(EngineError::Data(format!(
                "cubic spline needs at least {MIN_SPLINE_POINTS} samples, got {n}"
            )));
        }
        if let Some(bad) = x.iter().chain(y).find(|v| !v.is_finite()) {
            return Err(EngineError::Data(format!(
                "cubic spline input must be finite, got {bad}"
            )));
        }
        if let Some(k) = x.windows(2).position(|w| w[1] <= w[0]) {
            return Err(EngineError::Data(format!(
                "spline knots must be strictly increasing: x[{}] = {} follows {}",
                k + 1,
                x[k + 1],
                x[k]
            )));
        }

        // Tridiagonal system for the interior second derivatives, solved with
        // the Thomas algorithm. m[0] = m[n-1] = 0.
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let mut diag = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        let mut upper = vec![0.0; n];
        for i in 1..n - 1 {
            diag[i] = 2.0 * (h[i - 1] + h[i]);
            upper[i] = h[i];
            rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        }
        for i in 2..n - 1 {
            let w = h[i - 1] / diag[i - 1];
            diag[i] -= w * upper[i - 1];
            rhs[i] -= w * rhs[i - 1];
        }
        let mut m = vec![0.0; n];
        for i in (1..n - 1).rev() {
            m[i] = (rhs[i] - upper[i] * m[i + 1]) / diag[i];
        }

        Ok(CubicSpline {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Evaluate at `t`. Outside the knot range the end polynomials extrapolate.
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.x.len();
        let k = self
            .x
            .partition_point(|&xi| xi <= t)
            .saturating_sub(1)
            .min(n - 2);
        let (x0, x1) = (self.x[k], self.x[k + 1]);
        let h = x1 - x0;
        let (a, b) = (x1 - t, t - x0);
        self.m[k] * a.powi(3) / (6.0 * h)
            + self.m[k + 1] * b.powi(3) / (6.0 * h)
            + (self.y[k] / h - self.m[k] * h / 6.0) * a
            + (self.y[k + 1] / h - self.m[k + 1] * h / 6.0) * b
    }
}

// ---------------------------------------------------------------------------
// Uniform resampling
// ---------------------------------------------------------------------------

/// Resample a frequency-sorted curve to a uniform `resolution` on `[min, max)`.
///
/// The sample count is `floor(scale * len)` with
/// `scale = ((max - min) / len) / resolution`; sample `k` sits at
/// `min + k * resolution`. A count above [`MAX_RESAMPLE_POINTS`] is a
/// validation error.
pub fn resample(x: &[f64], y: &[f64], resolution: f64) -> EngineResult<(Vec<f64>, Vec<f64>)> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(EngineError::Validation(format!(
            "target resolution must be positive, got {resolution}"
        )));
    }
    let spline = CubicSpline::natural(x, y)?;

    let len = x.len() as f64;
    let (min, max) = (x[0], x[x.len() - 1]);
    let scale = ((max - min) / len) / resolution;
    let count = (scale * len).floor();
    if count > MAX_RESAMPLE_POINTS as f64 {
        return Err(EngineError::Validation(format!(
            "resolution {resolution} over [{min}, {max}] needs {count} samples, \
             more than the limit of {MAX_RESAMPLE_POINTS}"
        )));
    }
    let count = count as usize;

    let xs: Vec<f64> = (0..count).map(|k| min + k as f64 * resolution).collect();
    let ys = xs.iter().map(|&t| spline.eval(t)).collect();
    Ok((xs, ys))
}
