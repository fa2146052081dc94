//! Two-way repeated-measures ANOVA
//!
//! Both factors are within-subject. Each effect is tested against its own
//! subject-by-effect interaction:
//!
//! | Effect | Error term        |
//! |--------|-------------------|
//! | A      | A × subject       |
//! | B      | B × subject       |
//! | A × B  | A × B × subject   |
//!
//! Repeated observations of a subject in one cell are averaged first, so the
//! decomposition always runs on one value per (subject, A, B) cell.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use thiserror::Error;

use crate::core::table::{ColumnError, DataTable};

/// Reasons a dataset cannot be analysed as a balanced within-subjects design
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DesignError {
    #[error(transparent)]
    Column(#[from] ColumnError),

    #[error("Factor '{factor}' has {levels} level(s); at least 2 are required")]
    TooFewLevels { factor: String, levels: usize },

    #[error("Only {0} subject(s); at least 2 are required")]
    TooFewSubjects(usize),

    #[error("Subject '{subject}' has no observations for {a_factor}={a_level}, {b_factor}={b_level}")]
    MissingCell {
        subject: String,
        a_factor: String,
        a_level: String,
        b_factor: String,
        b_level: String,
    },

    #[error("Unbalanced design: cells hold between {min} and {max} observations per subject")]
    Unbalanced { min: usize, max: usize },

    #[error("Dependent variable '{column}' has a non-finite value at row {row}")]
    NonFinite { column: String, row: usize },
}

/// Which row of the ANOVA table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    FactorA,
    FactorB,
    Interaction,
    ErrorA,
    ErrorB,
    ErrorInteraction,
}

impl SourceKind {
    pub fn is_effect(self) -> bool {
        matches!(
            self,
            SourceKind::FactorA | SourceKind::FactorB | SourceKind::Interaction
        )
    }
}

/// One row of the ANOVA table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaRow {
    /// Display label, e.g. `prime`, `prime * target`, `Error(prime)`
    pub source: String,
    pub kind: SourceKind,
    pub df: usize,
    pub ss: f64,
    pub ms: f64,
    /// F statistic (effect rows only; NaN when the error mean square is zero)
    pub f: Option<f64>,
    /// Upper-tail p-value (effect rows only)
    pub p: Option<f64>,
    /// Partial eta squared (effect rows only)
    pub np2: Option<f64>,
}

/// Full result of a two-way repeated-measures ANOVA
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaTable {
    pub dv: String,
    pub subject: String,
    pub factor_a: String,
    pub factor_b: String,
    pub n_subjects: usize,
    /// Observations per (subject, cell) before averaging
    pub replicates: usize,
    /// Rows in fixed order: A, B, A × B, Error(A), Error(B), Error(A × B)
    pub rows: Vec<AnovaRow>,
    /// Between-subjects sum of squares
    pub ss_subjects: f64,
    /// Total sum of squares of the cell means around the grand mean
    pub ss_total: f64,
}

impl AnovaTable {
    pub fn row(&self, kind: SourceKind) -> Option<&AnovaRow> {
        self.rows.iter().find(|r| r.kind == kind)
    }

    /// The three effect rows (A, B, interaction)
    pub fn effects(&self) -> impl Iterator<Item = &AnovaRow> {
        self.rows.iter().filter(|r| r.kind.is_effect())
    }

    /// p-value of the interaction term
    pub fn interaction_p(&self) -> Option<f64> {
        self.row(SourceKind::Interaction).and_then(|r| r.p)
    }

    /// Within-subjects sum of squares (total minus between-subjects)
    pub fn ss_within(&self) -> f64 {
        self.ss_total - self.ss_subjects
    }
}

/// Conventional significance marker for a p-value
pub fn significance_stars(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else {
        "ns"
    }
}

/// Cell means arranged as `y[subject][a][b]`
struct CellMeans {
    y: Vec<Vec<Vec<f64>>>,
    replicates: usize,
}

fn cell_means(
    table: &DataTable,
    dv: &str,
    subject: &str,
    factor_a: &str,
    factor_b: &str,
) -> Result<CellMeans, DesignError> {
    let values = table.numeric(dv)?;
    let subjects = table.grouping(subject)?;
    let a = table.grouping(factor_a)?;
    let b = table.grouping(factor_b)?;

    if let Some(row) = values.iter().position(|v| !v.is_finite()) {
        return Err(DesignError::NonFinite {
            column: dv.to_string(),
            row,
        });
    }
    for (name, f) in [(factor_a, &a), (factor_b, &b)] {
        if f.n_levels() < 2 {
            return Err(DesignError::TooFewLevels {
                factor: name.to_string(),
                levels: f.n_levels(),
            });
        }
    }
    if subjects.n_levels() < 2 {
        return Err(DesignError::TooFewSubjects(subjects.n_levels()));
    }

    let (n, na, nb) = (subjects.n_levels(), a.n_levels(), b.n_levels());
    let mut sums = vec![vec![vec![0.0; nb]; na]; n];
    let mut counts = vec![vec![vec![0usize; nb]; na]; n];
    for (row, &v) in values.iter().enumerate() {
        let (s, i, j) = (subjects.codes()[row], a.codes()[row], b.codes()[row]);
        sums[s][i][j] += v;
        counts[s][i][j] += 1;
    }

    let mut min = usize::MAX;
    let mut max = 0;
    for s in 0..n {
        for i in 0..na {
            for j in 0..nb {
                let c = counts[s][i][j];
                if c == 0 {
                    return Err(DesignError::MissingCell {
                        subject: subjects.levels()[s].clone(),
                        a_factor: factor_a.to_string(),
                        a_level: a.levels()[i].clone(),
                        b_factor: factor_b.to_string(),
                        b_level: b.levels()[j].clone(),
                    });
                }
                min = min.min(c);
                max = max.max(c);
            }
        }
    }
    if min != max {
        return Err(DesignError::Unbalanced { min, max });
    }

    let y = sums
        .iter()
        .zip(&counts)
        .map(|(ss, cs)| {
            ss.iter()
                .zip(cs)
                .map(|(row, crow)| row.iter().zip(crow).map(|(s, &c)| s / c as f64).collect())
                .collect()
        })
        .collect();
    Ok(CellMeans { y, replicates: min })
}

fn f_test(ms_effect: f64, ms_error: f64, df_effect: usize, df_error: usize) -> (f64, f64) {
    if ms_error <= 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let f = ms_effect / ms_error;
    let p = FisherSnedecor::new(df_effect as f64, df_error as f64)
        .map(|dist| dist.sf(f))
        .unwrap_or(f64::NAN);
    (f, p)
}

/// Run a two-way repeated-measures ANOVA on a long-format table
///
/// Every subject must have the same number (at least one) of observations in
/// every `factor_a` × `factor_b` cell; anything else is a `DesignError`.
pub fn rm_anova(
    table: &DataTable,
    dv: &str,
    subject: &str,
    factor_a: &str,
    factor_b: &str,
) -> Result<AnovaTable, DesignError> {
    let CellMeans { y, replicates } = cell_means(table, dv, subject, factor_a, factor_b)?;
    let n = y.len();
    let na = y[0].len();
    let nb = y[0][0].len();
    let (nf, naf, nbf) = (n as f64, na as f64, nb as f64);

    let grand = y.iter().flatten().flatten().sum::<f64>() / (nf * naf * nbf);

    let subj: Vec<f64> = y
        .iter()
        .map(|ys| ys.iter().flatten().sum::<f64>() / (naf * nbf))
        .collect();
    let a_mean: Vec<f64> = (0..na)
        .map(|i| (0..n).flat_map(|s| y[s][i].iter()).sum::<f64>() / (nf * nbf))
        .collect();
    let b_mean: Vec<f64> = (0..nb)
        .map(|j| (0..n).flat_map(|s| y[s].iter().map(move |r| r[j])).sum::<f64>() / (nf * naf))
        .collect();
    let ab_mean: Vec<Vec<f64>> = (0..na)
        .map(|i| {
            (0..nb)
                .map(|j| (0..n).map(|s| y[s][i][j]).sum::<f64>() / nf)
                .collect()
        })
        .collect();
    let sa_mean: Vec<Vec<f64>> = (0..n)
        .map(|s| (0..na).map(|i| y[s][i].iter().sum::<f64>() / nbf).collect())
        .collect();
    let sb_mean: Vec<Vec<f64>> = (0..n)
        .map(|s| {
            (0..nb)
                .map(|j| (0..na).map(|i| y[s][i][j]).sum::<f64>() / naf)
                .collect()
        })
        .collect();

    let sq = |x: f64| x * x;

    let ss_a = nf * nbf * a_mean.iter().map(|&m| sq(m - grand)).sum::<f64>();
    let ss_b = nf * naf * b_mean.iter().map(|&m| sq(m - grand)).sum::<f64>();
    let mut ss_ab = 0.0;
    for i in 0..na {
        for j in 0..nb {
            ss_ab += sq(ab_mean[i][j] - a_mean[i] - b_mean[j] + grand);
        }
    }
    ss_ab *= nf;

    let ss_subjects = naf * nbf * subj.iter().map(|&m| sq(m - grand)).sum::<f64>();

    let mut ss_as = 0.0;
    let mut ss_bs = 0.0;
    let mut ss_abs = 0.0;
    let mut ss_total = 0.0;
    for s in 0..n {
        for i in 0..na {
            ss_as += sq(sa_mean[s][i] - subj[s] - a_mean[i] + grand);
        }
        for j in 0..nb {
            ss_bs += sq(sb_mean[s][j] - subj[s] - b_mean[j] + grand);
        }
        for i in 0..na {
            for j in 0..nb {
                let v = y[s][i][j];
                ss_total += sq(v - grand);
                ss_abs += sq(v - sa_mean[s][i] - sb_mean[s][j] - ab_mean[i][j]
                    + subj[s]
                    + a_mean[i]
                    + b_mean[j]
                    - grand);
            }
        }
    }
    ss_as *= nbf;
    ss_bs *= naf;

    let df_a = na - 1;
    let df_b = nb - 1;
    let df_ab = df_a * df_b;
    let df_as = df_a * (n - 1);
    let df_bs = df_b * (n - 1);
    let df_abs = df_ab * (n - 1);

    let label_a = factor_a.to_string();
    let label_b = factor_b.to_string();
    let label_ab = format!("{} * {}", factor_a, factor_b);

    let effect = |kind, source: &str, ss: f64, df: usize, ss_err: f64, df_err: usize| {
        let ms = ss / df as f64;
        let (f, p) = f_test(ms, ss_err / df_err as f64, df, df_err);
        let np2 = if ss + ss_err > 0.0 {
            ss / (ss + ss_err)
        } else {
            f64::NAN
        };
        AnovaRow {
            source: source.to_string(),
            kind,
            df,
            ss,
            ms,
            f: Some(f),
            p: Some(p),
            np2: Some(np2),
        }
    };
    let error = |kind, source: String, ss: f64, df: usize| AnovaRow {
        source,
        kind,
        df,
        ss,
        ms: ss / df as f64,
        f: None,
        p: None,
        np2: None,
    };

    let rows = vec![
        effect(SourceKind::FactorA, &label_a, ss_a, df_a, ss_as, df_as),
        effect(SourceKind::FactorB, &label_b, ss_b, df_b, ss_bs, df_bs),
        effect(SourceKind::Interaction, &label_ab, ss_ab, df_ab, ss_abs, df_abs),
        error(SourceKind::ErrorA, format!("Error({})", label_a), ss_as, df_as),
        error(SourceKind::ErrorB, format!("Error({})", label_b), ss_bs, df_bs),
        error(
            SourceKind::ErrorInteraction,
            format!("Error({})", label_ab),
            ss_abs,
            df_abs,
        ),
    ];

    log::debug!(
        "rm_anova {}: {} subjects, {}x{} levels, {} replicate(s)",
        dv,
        n,
        na,
        nb,
        replicates
    );

    Ok(AnovaTable {
        dv: dv.to_string(),
        subject: subject.to_string(),
        factor_a: label_a,
        factor_b: label_b,
        n_subjects: n,
        replicates,
        rows,
        ss_subjects,
        ss_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::{Column, Factor};
    use approx::assert_relative_eq;

    /// Build a long table from `(subject, prime, target, value)` tuples
    fn long_table(rows: &[(&str, &str, &str, f64)]) -> DataTable {
        let ids: Vec<&str> = rows.iter().map(|r| r.0).collect();
        let primes: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let targets: Vec<&str> = rows.iter().map(|r| r.2).collect();
        DataTable::from_columns([
            ("id", Column::Categorical(Factor::from_labels(&ids))),
            ("prime", Column::Categorical(Factor::from_labels(&primes))),
            ("target", Column::Categorical(Factor::from_labels(&targets))),
            ("rt_log", Column::Numeric(rows.iter().map(|r| r.3).collect())),
        ])
        .unwrap()
    }

    /// 2 subjects x 2 primes x 2 targets with hand-computed decomposition:
    /// SS(prime)=12.5, SS(target)=8, SS(int)=0.5, SS(subj)=2,
    /// SS(prime x subj)=0.5, SS(target x subj)=0, SS(int x subj)=0.5, total=24
    fn hand_computed() -> DataTable {
        long_table(&[
            ("1", "Black", "gun", 1.0),
            ("1", "Black", "tool", 2.0),
            ("1", "White", "gun", 3.0),
            ("1", "White", "tool", 6.0),
            ("2", "Black", "gun", 2.0),
            ("2", "Black", "tool", 4.0),
            ("2", "White", "gun", 4.0),
            ("2", "White", "tool", 6.0),
        ])
    }

    fn run(table: &DataTable) -> Result<AnovaTable, DesignError> {
        rm_anova(table, "rt_log", "id", "prime", "target")
    }

    #[test]
    fn test_hand_computed_interaction() {
        let result = run(&hand_computed()).unwrap();
        let inter = result.row(SourceKind::Interaction).unwrap();

        assert_eq!(inter.source, "prime * target");
        assert_eq!(inter.df, 1);
        assert_relative_eq!(inter.ss, 0.5, max_relative = 1e-9);
        assert_relative_eq!(inter.f.unwrap(), 1.0, max_relative = 1e-6);
        // F(1, 1) = 1 is the median of the distribution
        assert_relative_eq!(inter.p.unwrap(), 0.5, max_relative = 1e-6);
    }

    #[test]
    fn test_hand_computed_main_effects() {
        let result = run(&hand_computed()).unwrap();

        let prime = result.row(SourceKind::FactorA).unwrap();
        assert_relative_eq!(prime.ss, 12.5, max_relative = 1e-9);
        assert_relative_eq!(prime.f.unwrap(), 25.0, max_relative = 1e-6);
        assert_relative_eq!(prime.np2.unwrap(), 12.5 / 13.0, max_relative = 1e-9);

        // Every subject shows the same target effect: error MS is zero
        let target = result.row(SourceKind::FactorB).unwrap();
        assert_relative_eq!(target.ss, 8.0, max_relative = 1e-9);
        assert!(target.f.unwrap().is_nan());
        assert!(target.p.unwrap().is_nan());

        assert_relative_eq!(result.ss_subjects, 2.0, max_relative = 1e-9);
        assert_relative_eq!(result.ss_total, 24.0, max_relative = 1e-9);
    }

    #[test]
    fn test_row_order_is_fixed() {
        let table = hand_computed();
        let reversed: Vec<usize> = (0..table.n_rows()).rev().collect();
        let result = run(&table.select_rows(&reversed)).unwrap();

        let kinds: Vec<SourceKind> = result.rows.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::FactorA,
                SourceKind::FactorB,
                SourceKind::Interaction,
                SourceKind::ErrorA,
                SourceKind::ErrorB,
                SourceKind::ErrorInteraction,
            ]
        );
        assert_relative_eq!(
            result.row(SourceKind::Interaction).unwrap().f.unwrap(),
            1.0,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_decomposition_is_complete() {
        let mut rows = Vec::new();
        let subjects = ["1", "2", "3", "4", "5"];
        for (s, subject) in subjects.iter().enumerate() {
            for (i, prime) in ["Black", "White"].iter().enumerate() {
                for (j, target) in ["gun", "tool", "phone"].iter().enumerate() {
                    let v = 6.0
                        + 0.13 * s as f64
                        + 0.07 * i as f64
                        + 0.05 * ((s * 7 + i * 3 + j * 5) % 11) as f64;
                    rows.push((*subject, *prime, *target, v));
                }
            }
        }
        let result = run(&long_table(&rows)).unwrap();

        let within: f64 = result.rows.iter().map(|r| r.ss).sum();
        assert_relative_eq!(within, result.ss_within(), max_relative = 1e-9);
        assert_relative_eq!(
            within + result.ss_subjects,
            result.ss_total,
            max_relative = 1e-9
        );

        let df: Vec<usize> = result.rows.iter().map(|r| r.df).collect();
        assert_eq!(df, vec![1, 2, 2, 4, 8, 8]);
    }

    #[test]
    fn test_replicates_are_averaged() {
        let mut rows = Vec::new();
        for (subject, prime, target, v) in [
            ("1", "Black", "gun", 1.0),
            ("1", "Black", "tool", 2.0),
            ("1", "White", "gun", 3.0),
            ("1", "White", "tool", 6.0),
            ("2", "Black", "gun", 2.0),
            ("2", "Black", "tool", 4.0),
            ("2", "White", "gun", 4.0),
            ("2", "White", "tool", 6.0),
        ] {
            rows.push((subject, prime, target, v - 0.5));
            rows.push((subject, prime, target, v + 0.5));
        }
        let result = run(&long_table(&rows)).unwrap();
        assert_eq!(result.replicates, 2);
        assert_relative_eq!(
            result.row(SourceKind::FactorA).unwrap().f.unwrap(),
            25.0,
            max_relative = 1e-6
        );
    }

    #[test]
    fn test_missing_row_is_design_error() {
        let table = hand_computed();
        let short = table.select_rows(&[0, 1, 2, 3, 4, 5, 6]);
        assert!(matches!(run(&short), Err(DesignError::MissingCell { .. })));
    }

    #[test]
    fn test_unequal_replicates_is_design_error() {
        let table = hand_computed();
        let padded = table.select_rows(&[0, 0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(
            run(&padded).unwrap_err(),
            DesignError::Unbalanced { min: 1, max: 2 }
        );
    }

    #[test]
    fn test_single_level_factor_is_design_error() {
        let table = long_table(&[
            ("1", "Black", "gun", 1.0),
            ("1", "Black", "tool", 2.0),
            ("2", "Black", "gun", 2.0),
            ("2", "Black", "tool", 4.0),
        ]);
        assert!(matches!(
            run(&table),
            Err(DesignError::TooFewLevels { levels: 1, .. })
        ));
    }

    #[test]
    fn test_single_subject_is_design_error() {
        let table = hand_computed().select_rows(&[0, 1, 2, 3]);
        assert_eq!(run(&table).unwrap_err(), DesignError::TooFewSubjects(1));
    }

    #[test]
    fn test_missing_column_is_design_error() {
        let err = rm_anova(&hand_computed(), "value", "id", "prime", "target").unwrap_err();
        assert!(matches!(err, DesignError::Column(ColumnError::Missing(_))));
    }

    #[test]
    fn test_significance_stars() {
        assert_eq!(significance_stars(0.0005), "***");
        assert_eq!(significance_stars(0.005), "**");
        assert_eq!(significance_stars(0.016), "*");
        assert_eq!(significance_stars(0.133), "ns");
    }
}
