//! Residual diagnostics for the repeated-measures model
//!
//! Residuals are computed on the raw rows. The normality and variance tests
//! are informational only: they never alter or block the ANOVA.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::describe::{mean, median};
use crate::core::table::{ColumnError, DataTable};

/// Largest sample the Shapiro-Wilk p-value is accurate for; larger samples
/// are still tested, with a warning
pub const SHAPIRO_MAX_N: usize = 5000;

/// Conditions under which a diagnostic cannot be computed
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DiagnosticError {
    #[error("Need at least {min} values, got {n}")]
    TooFewValues { n: usize, min: usize },

    #[error("All values are identical")]
    ZeroRange,

    #[error("Need at least 2 groups, got {0}")]
    TooFewGroups(usize),

    #[error("Within-group spread is zero")]
    ZeroVariance,

    #[error("Non-finite value in sample")]
    NonFinite,

    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Statistic and p-value of a hypothesis test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Centre used for Levene's absolute deviations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeveneCenter {
    /// Brown-Forsythe variant
    #[default]
    Median,
    /// Levene's original definition
    Mean,
}

/// Residuals of one design cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualGroup {
    /// Level labels of the two factors
    pub key: Vec<String>,
    pub values: Vec<f64>,
}

/// Standard normal quantile function
fn norm_ppf(p: f64) -> f64 {
    Normal::new(0.0, 1.0)
        .map(|n| n.inverse_cdf(p))
        .unwrap_or(f64::NAN)
}

/// Standard normal upper tail
fn norm_sf(z: f64) -> f64 {
    Normal::new(0.0, 1.0).map(|n| n.sf(z)).unwrap_or(f64::NAN)
}

/// Per-row residual: value - cell mean - subject mean + grand mean
///
/// The result is aligned with the table rows.
pub fn residuals(
    table: &DataTable,
    value_col: &str,
    subject_col: &str,
    a_col: &str,
    b_col: &str,
) -> Result<Vec<f64>, ColumnError> {
    let values = table.numeric(value_col)?;
    let subjects = table.grouping(subject_col)?;
    let a = table.grouping(a_col)?;
    let b = table.grouping(b_col)?;

    let grand = mean(values);

    let mut subj_sum = vec![(0.0, 0usize); subjects.n_levels()];
    let mut cell_sum: BTreeMap<(usize, usize), (f64, usize)> = BTreeMap::new();
    for (row, &v) in values.iter().enumerate() {
        let s = &mut subj_sum[subjects.codes()[row]];
        s.0 += v;
        s.1 += 1;
        let c = cell_sum
            .entry((a.codes()[row], b.codes()[row]))
            .or_insert((0.0, 0));
        c.0 += v;
        c.1 += 1;
    }

    Ok(values
        .iter()
        .enumerate()
        .map(|(row, &v)| {
            let (ss, sn) = subj_sum[subjects.codes()[row]];
            let (cs, cn) = cell_sum[&(a.codes()[row], b.codes()[row])];
            v - cs / cn as f64 - ss / sn as f64 + grand
        })
        .collect())
}

/// Partition residuals by (a, b) design cell, in level order
pub fn residual_groups(
    table: &DataTable,
    residuals: &[f64],
    a_col: &str,
    b_col: &str,
) -> Result<Vec<ResidualGroup>, ColumnError> {
    let a = table.grouping(a_col)?;
    let b = table.grouping(b_col)?;
    if residuals.len() != a.len() {
        return Err(ColumnError::LengthMismatch {
            column: "residual".to_string(),
            expected: a.len(),
            actual: residuals.len(),
        });
    }

    let mut cells: BTreeMap<(usize, usize), Vec<f64>> = BTreeMap::new();
    for (row, &r) in residuals.iter().enumerate() {
        cells
            .entry((a.codes()[row], b.codes()[row]))
            .or_default()
            .push(r);
    }
    Ok(cells
        .into_iter()
        .map(|((i, j), values)| ResidualGroup {
            key: vec![a.levels()[i].clone(), b.levels()[j].clone()],
            values,
        })
        .collect())
}

fn poly(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Shapiro-Wilk coefficients for a sample of size `n` (Royston 1995)
fn shapiro_coefficients(n: usize) -> Vec<f64> {
    let mut a = vec![0.0; n];
    if n == 3 {
        a[0] = -(0.5_f64.sqrt());
        a[2] = 0.5_f64.sqrt();
        return a;
    }

    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| norm_ppf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2: f64 = m.iter().map(|x| x * x).sum();
    let ssumm2 = summ2.sqrt();
    let u = 1.0 / nf.sqrt();

    let an = poly(
        &[m[n - 1] / ssumm2, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056],
        u,
    );
    let (fac, first) = if n > 5 {
        let an1 = poly(
            &[m[n - 2] / ssumm2, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633],
            u,
        );
        let fac = ((summ2 - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * an.powi(2) - 2.0 * an1.powi(2)))
        .sqrt();
        a[n - 2] = an1;
        a[1] = -an1;
        (fac, 2)
    } else {
        let fac = ((summ2 - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * an.powi(2))).sqrt();
        (fac, 1)
    };
    a[n - 1] = an;
    a[0] = -an;
    for i in first..n - first {
        a[i] = m[i] / fac;
    }
    a
}

/// Shapiro-Wilk test of normality (Royston's AS R94 approximation)
///
/// Needs at least 3 values. Above 5000 the p-value may be inaccurate.
pub fn shapiro_wilk(data: &[f64]) -> Result<TestResult, DiagnosticError> {
    let n = data.len();
    if n < 3 {
        return Err(DiagnosticError::TooFewValues { n, min: 3 });
    }
    if n > SHAPIRO_MAX_N {
        log::warn!(
            "Shapiro-Wilk p-value may be inaccurate for n = {} (> {})",
            n,
            SHAPIRO_MAX_N
        );
    }
    if data.iter().any(|x| !x.is_finite()) {
        return Err(DiagnosticError::NonFinite);
    }

    let mut x = data.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    if x[n - 1] - x[0] <= f64::EPSILON * x[0].abs().max(1.0) {
        return Err(DiagnosticError::ZeroRange);
    }

    let a = shapiro_coefficients(n);
    let xbar = mean(&x);
    let ssq: f64 = x.iter().map(|v| (v - xbar).powi(2)).sum();
    let num: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum();
    let w = (num * num / ssq).min(1.0);

    let p = if n == 3 {
        let stqr = (0.75_f64).sqrt().asin();
        (6.0 / std::f64::consts::PI * (w.sqrt().asin() - stqr)).clamp(0.0, 1.0)
    } else {
        let nf = n as f64;
        let y = (1.0 - w).ln();
        let (z, mu, sigma) = if n <= 11 {
            let gamma = poly(&[-2.273, 0.459], nf);
            if y >= gamma {
                return Ok(TestResult {
                    statistic: w,
                    p_value: 0.0,
                });
            }
            let mu = poly(&[0.5440, -0.39978, 0.025054, -6.714e-4], nf);
            let sigma = poly(&[1.3822, -0.77857, 0.062767, -0.0020322], nf).exp();
            (-(gamma - y).ln(), mu, sigma)
        } else {
            let ln_n = nf.ln();
            let mu = poly(&[-1.5861, -0.31082, -0.083751, 0.0038915], ln_n);
            let sigma = poly(&[-0.4803, -0.082676, 0.0030302], ln_n).exp();
            (y, mu, sigma)
        };
        norm_sf((z - mu) / sigma)
    };

    Ok(TestResult {
        statistic: w,
        p_value: p,
    })
}

/// Normality test applied to model residuals
pub fn normality_test(residuals: &[f64]) -> Result<TestResult, DiagnosticError> {
    shapiro_wilk(residuals)
}

/// Levene's test for equality of variances across groups
pub fn levene(groups: &[&[f64]], center: LeveneCenter) -> Result<TestResult, DiagnosticError> {
    let k = groups.len();
    if k < 2 {
        return Err(DiagnosticError::TooFewGroups(k));
    }
    if let Some(small) = groups.iter().find(|g| g.len() < 2) {
        return Err(DiagnosticError::TooFewValues {
            n: small.len(),
            min: 2,
        });
    }

    let z: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let c = match center {
                LeveneCenter::Median => median(g),
                LeveneCenter::Mean => mean(g),
            };
            g.iter().map(|x| (x - c).abs()).collect()
        })
        .collect();

    let total: usize = z.iter().map(Vec::len).sum();
    let z_means: Vec<f64> = z.iter().map(|g| mean(g)).collect();
    let z_grand = z.iter().flatten().sum::<f64>() / total as f64;

    let between: f64 = z
        .iter()
        .zip(&z_means)
        .map(|(g, m)| g.len() as f64 * (m - z_grand).powi(2))
        .sum();
    let within: f64 = z
        .iter()
        .zip(&z_means)
        .map(|(g, m)| g.iter().map(|v| (v - m).powi(2)).sum::<f64>())
        .sum();
    if within <= 0.0 {
        return Err(DiagnosticError::ZeroVariance);
    }

    let df1 = (k - 1) as f64;
    let df2 = (total - k) as f64;
    let statistic = df2 / df1 * between / within;
    let p_value = FisherSnedecor::new(df1, df2)
        .map(|f| f.sf(statistic))
        .unwrap_or(f64::NAN);
    Ok(TestResult { statistic, p_value })
}

/// Levene's test over residual groups
pub fn homogeneity_test(
    groups: &[ResidualGroup],
    center: LeveneCenter,
) -> Result<TestResult, DiagnosticError> {
    let slices: Vec<&[f64]> = groups.iter().map(|g| g.values.as_slice()).collect();
    levene(&slices, center)
}

/// Coordinates of a normal probability plot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QqPoints {
    /// Theoretical standard-normal quantiles
    pub theoretical: Vec<f64>,
    /// Sorted sample values
    pub sample: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
    /// Correlation of the two coordinate sets
    pub r: f64,
}

/// Q-Q plot coordinates with Filliben plotting positions and a fitted line
pub fn qq_points(data: &[f64]) -> Result<QqPoints, DiagnosticError> {
    let mut sample: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    let n = sample.len();
    if n < 2 {
        return Err(DiagnosticError::TooFewValues { n, min: 2 });
    }
    sample.sort_by(|a, b| a.total_cmp(b));

    let nf = n as f64;
    let last = 0.5_f64.powf(1.0 / nf);
    let theoretical: Vec<f64> = (1..=n)
        .map(|i| {
            let pos = if i == 1 {
                1.0 - last
            } else if i == n {
                last
            } else {
                (i as f64 - 0.3175) / (nf + 0.365)
            };
            norm_ppf(pos)
        })
        .collect();

    let mx = mean(&theoretical);
    let my = mean(&sample);
    let sxy: f64 = theoretical
        .iter()
        .zip(&sample)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum();
    let sxx: f64 = theoretical.iter().map(|x| (x - mx).powi(2)).sum();
    let syy: f64 = sample.iter().map(|y| (y - my).powi(2)).sum();

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r = if syy > 0.0 {
        sxy / (sxx * syy).sqrt()
    } else {
        f64::NAN
    };

    Ok(QqPoints {
        theoretical,
        sample,
        slope,
        intercept,
        r,
    })
}

/// Combined reading of the two assumption tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    AssumptionsHold,
    CheckHomogeneity,
    CheckNormality,
    ConsiderTransformations,
    /// One of the tests could not be computed
    Inconclusive,
}

impl Verdict {
    pub fn message(self) -> &'static str {
        match self {
            Verdict::AssumptionsHold => "Model assumptions hold",
            Verdict::CheckHomogeneity => "Normality OK, but check homogeneity of variance",
            Verdict::CheckNormality => "Homogeneity OK, but check normality",
            Verdict::ConsiderTransformations => "Consider further transformations",
            Verdict::Inconclusive => "Assumption checks unavailable",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Verdict::AssumptionsHold
    }
}

/// Interpret the normality and homogeneity tests at level `alpha`
pub fn assess(
    normality: Option<&TestResult>,
    homogeneity: Option<&TestResult>,
    alpha: f64,
) -> Verdict {
    let (Some(norm), Some(homo)) = (normality, homogeneity) else {
        return Verdict::Inconclusive;
    };
    match (norm.p_value > alpha, homo.p_value > alpha) {
        (true, true) => Verdict::AssumptionsHold,
        (true, false) => Verdict::CheckHomogeneity,
        (false, true) => Verdict::CheckNormality,
        (false, false) => Verdict::ConsiderTransformations,
    }
}
