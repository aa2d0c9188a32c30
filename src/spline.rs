use nalgebra::{DMatrix, DVector};

use crate::error::RatingError;

/// Natural cubic spline (zero curvature at both ends).
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    // second derivatives at the knots
    moments: Vec<f64>,
}

impl CubicSpline {
    pub fn natural(xs: &[f64], ys: &[f64]) -> Result<Self, RatingError> {
        if xs.len() != ys.len() {
            return Err(RatingError::Spline(format!(
                "knot count mismatch: {} xs, {} ys",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(RatingError::Spline("need at least two knots".to_string()));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RatingError::Spline(
                "knots must be strictly increasing".to_string(),
            ));
        }

        let n = xs.len();
        let mut moments = vec![0.0; n];
        let interior = n - 2;
        if interior > 0 {
            let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
            let mut a = DMatrix::<f64>::zeros(interior, interior);
            let mut rhs = DVector::<f64>::zeros(interior);
            for row in 0..interior {
                let i = row + 1;
                a[(row, row)] = 2.0 * (h[i - 1] + h[i]);
                if row > 0 {
                    a[(row, row - 1)] = h[i - 1];
                }
                if row + 1 < interior {
                    a[(row, row + 1)] = h[i];
                }
                rhs[row] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
            }
            let solved = a
                .lu()
                .solve(&rhs)
                .ok_or_else(|| RatingError::Spline("singular moment system".to_string()))?;
            moments[1..n - 1].copy_from_slice(solved.as_slice());
        }

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            moments,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let k = self
            .xs
            .partition_point(|&knot| knot <= x)
            .saturating_sub(1)
            .min(n - 2);

        let (x0, x1) = (self.xs[k], self.xs[k + 1]);
        let (y0, y1) = (self.ys[k], self.ys[k + 1]);
        let (m0, m1) = (self.moments[k], self.moments[k + 1]);
        let h = x1 - x0;
        let left = x1 - x;
        let right = x - x0;

        m0 * left.powi(3) / (6.0 * h)
            + m1 * right.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * left
            + (y1 / h - m1 * h / 6.0) * right
    }
}
