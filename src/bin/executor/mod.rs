use std::{io, path::PathBuf};

use log::{debug, info};
use thiserror::Error;
use threat_insight_report::{
    address,
    aggregate::Aggregator,
    input::{self, Prompt},
    report::{self, ReportError},
    resolver::{Resolver, RunSummary},
};

/// An executor performs the complete set of actions needed to turn an address list into a report
pub struct Executor<'a> {
    prompt: &'a dyn Prompt,
    resolver: Resolver<'a>,
    input: PathBuf,
    output: PathBuf,
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("could not read input file: {0}")]
    Input(#[from] io::Error),
    #[error("{0}")]
    Report(#[from] ReportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Input lines that were not valid addresses
    pub invalid: Vec<String>,
    pub summary: RunSummary,
    /// Data rows written to the report
    pub rows: usize,
}

impl<'a> Executor<'a> {
    pub fn new(
        prompt: &'a dyn Prompt,
        resolver: Resolver<'a>,
        input: PathBuf,
        output: PathBuf,
    ) -> Executor<'a> {
        Executor {
            prompt,
            resolver,
            input,
            output,
        }
    }

    /// Read, resolve and report. Failed batches do not make the run fail,
    /// only unreadable input or an unwritable report do.
    pub fn run(&self) -> Result<RunResult, ExecutorError> {
        let lines = input::load_with_recovery(&self.input, self.prompt)?;
        info!("Read {} entries from {}", lines.len(), self.input.display());

        let validation = address::validate(lines);
        debug!("Resolving {} addresses", validation.valid.len());

        let mut aggregator = Aggregator::new();
        let summary = self.resolver.resolve_all(&validation.valid, &mut aggregator);
        info!(
            "Resolved {}/{} batches, {} addresses collected",
            summary.succeeded,
            summary.batches,
            aggregator.results().len()
        );

        let (results, fields) = aggregator.finish();
        let table = report::write_report(results, &fields, &self.output)?;

        Ok(RunResult {
            invalid: validation.invalid,
            summary,
            rows: table.height().saturating_sub(1),
        })
    }
}
