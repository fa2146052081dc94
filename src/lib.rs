//! WIT: repeated-measures analysis of weapon identification task data
//!
//! Loads behavioral and neuro-derived CSV datasets, runs two-way
//! within-subjects ANOVAs with residual diagnostics, and renders the
//! results as terminal, Markdown or JSON reports.

pub mod cli;
pub mod core;
pub mod render;
