//! Descriptive statistics: group summaries, design balance, column summaries

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::table::{Column, ColumnError, DataTable};

/// Summary statistics of one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    /// Level labels, one per grouping column
    pub key: Vec<String>,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator)
    pub std: f64,
    pub median: f64,
    /// Standard error of the mean
    pub sem: f64,
}

/// Group summaries for one value column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStatsTable {
    pub group_cols: Vec<String>,
    pub value_col: String,
    pub groups: Vec<GroupStats>,
}

impl GroupStatsTable {
    /// Sum of the group counts
    pub fn total_count(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    /// Look up a group by its labels
    pub fn get(&self, key: &[&str]) -> Option<&GroupStats> {
        self.groups
            .iter()
            .find(|g| g.key.iter().map(String::as_str).eq(key.iter().copied()))
    }
}

/// Contingency table of observation counts for two factors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTab {
    pub row_factor: String,
    pub col_factor: String,
    pub row_levels: Vec<String>,
    pub col_levels: Vec<String>,
    /// `counts[i][j]` = rows with row level `i` and column level `j`
    pub counts: Vec<Vec<usize>>,
}

impl CrossTab {
    /// True when every cell holds the same number of observations
    pub fn is_balanced(&self) -> bool {
        let mut cells = self.counts.iter().flatten();
        match cells.next() {
            Some(first) => cells.all(|c| c == first),
            None => true,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// `describe()`-style summary of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Equal-width histogram of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    /// Bin edges, one more than `counts`
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Headline indicators for the behavioral dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub participants: usize,
    pub mean_rt_raw: f64,
    pub mean_rt_log: f64,
    pub std_rt_raw: f64,
}

/// Number of non-NaN values
pub fn count(xs: &[f64]) -> usize {
    xs.iter().filter(|x| !x.is_nan()).count()
}

/// Mean of the non-NaN values
pub fn mean(xs: &[f64]) -> f64 {
    let n = count(xs);
    if n == 0 {
        return f64::NAN;
    }
    xs.iter().filter(|x| !x.is_nan()).sum::<f64>() / n as f64
}

/// Sample standard deviation (n-1 denominator) of the non-NaN values;
/// NaN below two values
pub fn std_dev(xs: &[f64]) -> f64 {
    let n = count(xs);
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    let var = xs
        .iter()
        .filter(|x| !x.is_nan())
        .map(|x| (x - m).powi(2))
        .sum::<f64>()
        / (n as f64 - 1.0);
    var.sqrt()
}

/// Linear-interpolated quantile of the non-NaN values, `q` in [0, 1]
pub fn quantile(xs: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = xs.iter().copied().filter(|x| !x.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn median(xs: &[f64]) -> f64 {
    quantile(xs, 0.5)
}

/// Per-group count, mean, standard deviation, median and SEM of `value_col`
///
/// Groups are ordered by the level order of the grouping columns; empty
/// combinations are omitted.
pub fn group_stats(
    table: &DataTable,
    group_cols: &[&str],
    value_col: &str,
) -> Result<GroupStatsTable, ColumnError> {
    let values = table.numeric(value_col)?;
    let factors = group_cols
        .iter()
        .map(|c| table.grouping(c))
        .collect::<Result<Vec<_>, _>>()?;

    let mut buckets: BTreeMap<Vec<usize>, Vec<f64>> = BTreeMap::new();
    for (row, &value) in values.iter().enumerate() {
        let key: Vec<usize> = factors.iter().map(|f| f.codes()[row]).collect();
        buckets.entry(key).or_default().push(value);
    }

    let groups = buckets
        .into_iter()
        .map(|(codes, xs)| {
            let key = codes
                .iter()
                .zip(&factors)
                .map(|(&code, f)| f.levels()[code].clone())
                .collect();
            let std = std_dev(&xs);
            let n = count(&xs);
            GroupStats {
                key,
                count: n,
                mean: mean(&xs),
                std,
                median: median(&xs),
                sem: std / (n as f64).sqrt(),
            }
        })
        .collect();

    Ok(GroupStatsTable {
        group_cols: group_cols.iter().map(|c| c.to_string()).collect(),
        value_col: value_col.to_string(),
        groups,
    })
}

/// Cross-tabulate observation counts of two factors
pub fn design_balance(
    table: &DataTable,
    factor_a: &str,
    factor_b: &str,
) -> Result<CrossTab, ColumnError> {
    let a = table.grouping(factor_a)?;
    let b = table.grouping(factor_b)?;

    let mut counts = vec![vec![0usize; b.n_levels()]; a.n_levels()];
    for (&i, &j) in a.codes().iter().zip(b.codes()) {
        counts[i][j] += 1;
    }

    Ok(CrossTab {
        row_factor: factor_a.to_string(),
        col_factor: factor_b.to_string(),
        row_levels: a.levels().to_vec(),
        col_levels: b.levels().to_vec(),
        counts,
    })
}

/// Summaries of every numeric column
pub fn describe(table: &DataTable) -> Vec<ColumnSummary> {
    table
        .iter()
        .filter_map(|(name, column)| match column {
            Column::Numeric(xs) => Some(ColumnSummary {
                column: name.to_string(),
                count: count(xs),
                mean: mean(xs),
                std: std_dev(xs),
                min: quantile(xs, 0.0),
                q25: quantile(xs, 0.25),
                median: quantile(xs, 0.5),
                q75: quantile(xs, 0.75),
                max: quantile(xs, 1.0),
            }),
            _ => None,
        })
        .collect()
}

/// Histogram with `bins` equal-width bins spanning the data range
///
/// The last bin is closed on the right. A constant column gets a unit-wide
/// range centred on its value; non-finite values are ignored.
pub fn histogram(column: &str, xs: &[f64], bins: usize) -> Histogram {
    let finite: Vec<f64> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Histogram {
            column: column.to_string(),
            edges: Vec::new(),
            counts: Vec::new(),
        };
    }

    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

    let mut counts = vec![0usize; bins];
    for x in finite {
        let idx = (((x - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Histogram {
        column: column.to_string(),
        edges,
        counts,
    }
}

/// Participant count and global reaction-time indicators
pub fn kpis(table: &DataTable) -> Result<Kpis, ColumnError> {
    let participants = table.grouping("id")?.n_levels();
    let rt_raw = table.numeric("rt_raw")?;
    let rt_log = table.numeric("rt_log")?;
    Ok(Kpis {
        participants,
        mean_rt_raw: mean(rt_raw),
        mean_rt_log: mean(rt_log),
        std_rt_raw: std_dev(rt_raw),
    })
}
