//! Collapse runs of related consecutive lines.
//!
//! Lines that parse as integers are related when they share parity; any other line is
//! related only to identical neighbours. Each run becomes one output line holding its
//! members separated by single spaces.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use seqpipe_lib::grouper::RunGrouper;
use seqpipe_lib::logging::{OperationTimer, log_pipeline_summary};
use seqpipe_lib::pipeline::{PipelineStats, run_grouped};
use seqpipe_lib::source::push_source;

use crate::commands::command::Command;
use crate::commands::common::{TextIoOptions, ThreadingOptions};

/// Key deciding whether two neighbouring lines belong to the same run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunKey {
    /// Integer line; `true` when even.
    Parity(bool),
    /// Any other line, compared verbatim.
    Text(String),
}

impl RunKey {
    /// Key for one input line.
    pub fn of(line: &str) -> Self {
        match line.trim().parse::<i64>() {
            Ok(value) => Self::Parity(value % 2 == 0),
            Err(_) => Self::Text(line.to_string()),
        }
    }
}

/// Group consecutive related lines.
#[derive(Debug, Parser)]
#[command(
    name = "runs",
    about = "\x1b[38;5;72m[DEMO]\x1b[0m           \x1b[36mCollapse runs of related lines\x1b[0m",
    long_about = r#"
Group consecutive related lines and write one line per group.

Integer lines belong to the same run while their parity is unchanged; other lines
belong to the same run only while they are identical. Lines are read on a background
thread and groups are formatted by the worker pool. With more than one thread the
groups are written in completion order.

Example usage:
  seqpipe runs -i numbers.txt -o runs.txt --threads 4
"#
)]
pub struct Runs {
    #[command(flatten)]
    pub io: TextIoOptions,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Runs {
    /// Stream `reader` through the grouped pipeline into `writer`.
    pub fn process<R, W>(&self, reader: R, mut writer: W) -> Result<PipelineStats>
    where
        R: BufRead + Send + 'static,
        W: Write + Send,
    {
        let config = self.threading.to_config("Wrote runs");
        let lines = push_source(config.push_capacity(), move |pusher| {
            for line in reader.lines() {
                if !pusher.push(line?) {
                    break;
                }
            }
            Ok::<(), io::Error>(())
        });

        let stats = run_grouped(
            &config,
            lines,
            RunGrouper::new(|line: &String| RunKey::of(line)),
            |group: Vec<String>, _seq, _worker, emitter| {
                emitter.emit(group.join(" "));
                Ok::<_, io::Error>(())
            },
            |run: String| writeln!(writer, "{run}"),
        )
        .context("Run grouping pipeline failed")?;

        writer.flush().context("Failed to flush output")?;
        Ok(stats)
    }
}

impl Command for Runs {
    fn execute(&self, command_line: &str) -> Result<()> {
        debug!("Command line: {command_line}");
        self.io.validate()?;

        let timer = OperationTimer::new("Grouping runs");
        info!("Input: {}", self.io.input.display());
        info!("Output: {}", self.io.output.display());
        info!("Threads: {}", self.threading.threads);

        let reader = self.io.open_input()?;
        let writer = self.io.open_output()?;
        let stats = self.process(reader, writer)?;

        log_pipeline_summary("runs", &stats);
        timer.log_completion(stats.results_delivered);
        Ok(())
    }
}
