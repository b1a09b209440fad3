//! Sum the square roots of `1..=N` on a pool of worker threads.
//!
//! A small CPU-bound workload, useful for checking that results are identical across
//! thread counts and delivery modes.

use std::convert::Infallible;
use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use seqpipe_lib::logging::{OperationTimer, log_pipeline_summary};
use seqpipe_lib::pipeline::{run_ordered, run_unordered};
use seqpipe_lib::source::infallible;

use crate::commands::command::Command;
use crate::commands::common::ThreadingOptions;

/// Sum of square roots of every integer in `1..=N`.
#[derive(Debug, Parser)]
#[command(
    name = "sqrt-sum",
    about = "\x1b[38;5;72m[DEMO]\x1b[0m           \x1b[36mSum square roots of 1..=N in parallel\x1b[0m",
    long_about = r#"
Compute the sum of sqrt(i) for every i in 1..=N.

Each square root is computed by a worker thread. In the default ordered mode the sink
adds the roots in input order, so the result is bit-identical for every thread count.
With --unordered the roots are added in completion order and the last digits may vary.

The sum is written to stdout, rounded to six decimal places.

Example usage:
  seqpipe sqrt-sum --count 100000 --threads 8
"#
)]
pub struct SqrtSum {
    /// Sum square roots of 1..=COUNT
    #[arg(short = 'n', long = "count")]
    pub count: u64,

    /// Add roots in completion order rather than input order
    #[arg(long = "unordered", default_value = "false")]
    pub unordered: bool,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl SqrtSum {
    /// Run the pipeline and return the sum.
    pub fn compute(&self) -> Result<f64> {
        if self.count == 0 {
            bail!("--count must be at least 1");
        }
        let config = self.threading.to_config("Summed");
        let inputs = infallible(1..=self.count);
        let mut sum = 0.0_f64;

        let stats = if self.unordered {
            run_unordered(
                &config,
                inputs,
                |i, _seq, _worker, emitter| {
                    emitter.emit((i as f64).sqrt());
                    Ok::<_, Infallible>(())
                },
                |root| {
                    sum += root;
                    Ok::<_, Infallible>(())
                },
            )
        } else {
            run_ordered(
                &config,
                inputs,
                |i, _seq, _worker| Ok::<_, Infallible>((i as f64).sqrt()),
                |root| {
                    sum += root;
                    Ok::<_, Infallible>(())
                },
            )
        }
        .context("Square root pipeline failed")?;

        log_pipeline_summary("sqrt-sum", &stats);
        Ok(sum)
    }
}

impl Command for SqrtSum {
    fn execute(&self, command_line: &str) -> Result<()> {
        debug!("Command line: {command_line}");
        let timer = OperationTimer::new("Summing square roots");
        info!("Count: {}", self.count);
        info!("Threads: {}", self.threading.threads);
        info!("Delivery: {}", if self.unordered { "unordered" } else { "ordered" });

        let sum = self.compute()?;
        info!("Sum of square roots: {sum:.6} (rounded {})", sum.round());

        let mut out = io::stdout().lock();
        writeln!(out, "{sum:.6}").context("Failed to write result")?;
        timer.log_completion(self.count);
        Ok(())
    }
}
