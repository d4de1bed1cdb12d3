use crate::error::{Result, SurfcastError};
use crate::models::Estimate;
use chrono::NaiveDate;
use std::f64::consts::PI;

pub const YEARLY_PERIOD_DAYS: f64 = 365.25;
const RIDGE_LAMBDA: f64 = 1e-8;
const MIN_SIGMA: f64 = 1e-6;

/// One training observation with its explanatory variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub date: NaiveDate,
    pub value: f64,
    pub regressors: Vec<f64>,
}

impl Sample {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            regressors: Vec::new(),
        }
    }

    pub fn with_regressor(mut self, value: f64) -> Self {
        self.regressors.push(value);
        self
    }
}

/// Additive regression: linear trend + yearly Fourier seasonality + extra regressors.
#[derive(Debug, Clone)]
pub struct SeasonalModel {
    pub period_days: f64,
    pub fourier_order: usize,
    /// Central coverage of the prediction interval, e.g. 0.9.
    pub interval_width: f64,
}

impl SeasonalModel {
    pub fn yearly(fourier_order: usize, interval_width: f64) -> Self {
        Self {
            period_days: YEARLY_PERIOD_DAYS,
            fourier_order,
            interval_width,
        }
    }

    pub fn fit(&self, samples: &[Sample]) -> Result<FittedModel> {
        let Some(first) = samples.first() else {
            return Err(SurfcastError::InsufficientData(
                "no training samples".into(),
            ));
        };
        let n_regressors = first.regressors.len();
        if samples.iter().any(|s| s.regressors.len() != n_regressors) {
            return Err(SurfcastError::InputValidation(
                "training samples have differing regressor counts".into(),
            ));
        }
        if samples.iter().any(|s| !s.value.is_finite()) {
            return Err(SurfcastError::InputValidation(
                "training values must be finite".into(),
            ));
        }

        let t0 = samples.iter().map(|s| s.date).min().unwrap_or(first.date);
        let t_end = samples.iter().map(|s| s.date).max().unwrap_or(first.date);
        let t_scale = ((t_end - t0).num_days() as f64).max(1.0);

        let scaling: Vec<(f64, f64)> = (0..n_regressors)
            .map(|j| standardisation(samples.iter().map(|s| s.regressors[j])))
            .collect();

        let mut fitted = FittedModel {
            t0,
            t_scale,
            period_days: self.period_days,
            fourier_order: self.fourier_order,
            scaling,
            beta: Vec::new(),
            sigma: MIN_SIGMA,
            z: normal_quantile(0.5 + self.interval_width / 2.0),
        };

        let x: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| fitted.features(s.date, &s.regressors))
            .collect();
        let y: Vec<f64> = samples.iter().map(|s| s.value).collect();
        fitted.beta = solve_ridge(&x, &y);

        let sse: f64 = x
            .iter()
            .zip(&y)
            .map(|(row, yi)| {
                let r = yi - dot(row, &fitted.beta);
                r * r
            })
            .sum();
        fitted.sigma = (sse / y.len() as f64).sqrt().max(MIN_SIGMA);

        Ok(fitted)
    }
}

/// Mean and standard deviation used to standardise a regressor column.
fn standardisation(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count().max(1) as f64;
    let mean = values.clone().sum::<f64>() / n;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let std = var.sqrt();
    (mean, if std > 1e-12 { std } else { 1.0 })
}

#[derive(Debug, Clone)]
pub struct FittedModel {
    t0: NaiveDate,
    t_scale: f64,
    period_days: f64,
    fourier_order: usize,
    scaling: Vec<(f64, f64)>,
    beta: Vec<f64>,
    sigma: f64,
    z: f64,
}

impl FittedModel {
    fn features(&self, date: NaiveDate, regressors: &[f64]) -> Vec<f64> {
        let t_days = (date - self.t0).num_days() as f64;
        let mut row = Vec::with_capacity(2 + 2 * self.fourier_order + regressors.len());
        row.push(1.0);
        row.push(t_days / self.t_scale);
        for k in 1..=self.fourier_order {
            let angle = 2.0 * PI * k as f64 * t_days / self.period_days;
            row.push(angle.sin());
            row.push(angle.cos());
        }
        for (value, (mean, std)) in regressors.iter().zip(&self.scaling) {
            row.push((value - mean) / std);
        }
        row
    }

    pub fn regressor_count(&self) -> usize {
        self.scaling.len()
    }

    /// RMS of the training residuals.
    pub fn residual_sigma(&self) -> f64 {
        self.sigma
    }

    pub fn predict(&self, date: NaiveDate, regressors: &[f64]) -> Result<Estimate> {
        if regressors.len() != self.scaling.len() {
            return Err(SurfcastError::InputValidation(format!(
                "expected {} regressors, got {}",
                self.scaling.len(),
                regressors.len()
            )));
        }
        let point = dot(&self.features(date, regressors), &self.beta);
        let half = self.z * self.sigma;
        Ok(Estimate::new(point, point - half, point + half))
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve (XᵀX + λI)β = Xᵀy by Gauss-Jordan elimination with partial pivoting.
fn solve_ridge(x: &[Vec<f64>], y: &[f64]) -> Vec<f64> {
    let Some(p) = x.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut a = vec![vec![0.0; p]; p];
    let mut b = vec![0.0; p];
    for (row, yi) in x.iter().zip(y) {
        for i in 0..p {
            b[i] += row[i] * yi;
            for j in 0..p {
                a[i][j] += row[i] * row[j];
            }
        }
    }
    for (i, a_row) in a.iter_mut().enumerate() {
        a_row[i] += RIDGE_LAMBDA;
    }

    for col in 0..p {
        let pivot_row = (col..p)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        if pivot_row != col {
            a.swap(col, pivot_row);
            b.swap(col, pivot_row);
        }
        let pivot = a[col][col];
        if pivot.abs() < 1e-12 {
            continue;
        }
        for j in col..p {
            a[col][j] /= pivot;
        }
        b[col] /= pivot;
        for r in 0..p {
            if r == col {
                continue;
            }
            let factor = a[r][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..p {
                a[r][j] -= factor * a[col][j];
            }
            b[r] -= factor * b[col];
        }
    }
    b
}

/// Inverse CDF of the standard normal distribution (Acklam's rational approximation).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

/// Mean absolute error over paired values; `None` when there are no pairs.
pub fn mean_absolute_error(pairs: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, n) = pairs
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), (actual, predicted)| {
            (sum + (actual - predicted).abs(), n + 1)
        });
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    #[test]
    fn normal_quantiles() {
        assert!((normal_quantile(0.5)).abs() < 1e-9);
        assert!((normal_quantile(0.95) - 1.644854).abs() < 1e-5);
        assert!((normal_quantile(0.85) - 1.036433).abs() < 1e-5);
        assert!((normal_quantile(0.975) - 1.959964).abs() < 1e-5);
        assert!((normal_quantile(0.01) + 2.326348).abs() < 1e-5);
    }

    #[test]
    fn recovers_trend_and_yearly_cycle() {
        let samples: Vec<Sample> = (0..730)
            .map(|i| {
                let t = i as f64;
                let y = 15.0 + 0.002 * t + 4.0 * (2.0 * PI * t / YEARLY_PERIOD_DAYS).sin();
                Sample::new(day(i), y)
            })
            .collect();
        let fitted = SeasonalModel::yearly(3, 0.9).fit(&samples).unwrap();
        assert!(fitted.residual_sigma() < 1e-3);

        // Extrapolate a year beyond the training data
        let t = 900.0;
        let expected = 15.0 + 0.002 * t + 4.0 * (2.0 * PI * t / YEARLY_PERIOD_DAYS).sin();
        let est = fitted.predict(day(900), &[]).unwrap();
        assert!((est.point - expected).abs() < 1e-2, "{} vs {}", est.point, expected);
        assert!(est.is_ordered());
    }

    #[test]
    fn learns_regressor_effect() {
        let samples: Vec<Sample> = (0..400)
            .map(|i| {
                let x = ((i * 37) % 11) as f64;
                Sample::new(day(i), 1.0 + 0.3 * x).with_regressor(x)
            })
            .collect();
        let fitted = SeasonalModel::yearly(2, 0.7).fit(&samples).unwrap();
        assert_eq!(fitted.regressor_count(), 1);

        let low = fitted.predict(day(410), &[0.0]).unwrap();
        let high = fitted.predict(day(410), &[10.0]).unwrap();
        assert!((high.point - low.point - 3.0).abs() < 1e-3);
    }

    #[test]
    fn interval_width_scales_with_residuals() {
        let samples: Vec<Sample> = (0..200)
            .map(|i| Sample::new(day(i), if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        let narrow = SeasonalModel::yearly(1, 0.7).fit(&samples).unwrap();
        let wide = SeasonalModel::yearly(1, 0.9).fit(&samples).unwrap();
        let n = narrow.predict(day(250), &[]).unwrap();
        let w = wide.predict(day(250), &[]).unwrap();
        assert!(n.is_ordered() && w.is_ordered());
        assert!((w.upper - w.lower) > (n.upper - n.lower));
        let ratio = (w.upper - w.lower) / (n.upper - n.lower);
        assert!((ratio - 1.644854 / 1.036433).abs() < 1e-4);
    }

    #[test]
    fn single_sample_still_fits() {
        let fitted = SeasonalModel::yearly(10, 0.9)
            .fit(&[Sample::new(day(0), 12.0)])
            .unwrap();
        let est = fitted.predict(day(0), &[]).unwrap();
        assert!((est.point - 12.0).abs() < 1e-3);
    }

    #[test]
    fn empty_training_is_insufficient() {
        assert!(matches!(
            SeasonalModel::yearly(10, 0.9).fit(&[]),
            Err(SurfcastError::InsufficientData(_))
        ));
    }

    #[test]
    fn regressor_count_must_match() {
        let samples = vec![
            Sample::new(day(0), 1.0).with_regressor(2.0),
            Sample::new(day(1), 1.0),
        ];
        assert!(SeasonalModel::yearly(1, 0.9).fit(&samples).is_err());

        let fitted = SeasonalModel::yearly(1, 0.9)
            .fit(&[Sample::new(day(0), 1.0).with_regressor(2.0)])
            .unwrap();
        assert!(fitted.predict(day(1), &[]).is_err());
    }

    #[test]
    fn mae() {
        assert_eq!(mean_absolute_error(Vec::<(f64, f64)>::new()), None);
        let mae = mean_absolute_error(vec![(1.0, 2.0), (3.0, 1.0)]).unwrap();
        assert!((mae - 1.5).abs() < 1e-12);
    }
}
