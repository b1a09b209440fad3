//! Apply a text operation to every line of a file in parallel.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use seqpipe_lib::logging::{OperationTimer, log_pipeline_summary};
use seqpipe_lib::pipeline::{PipelineStats, run_ordered, run_unordered};

use crate::commands::command::Command;
use crate::commands::common::{TextIoOptions, ThreadingOptions};

/// Per-line text operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LineOp {
    /// Convert to upper case
    Upper,
    /// Convert to lower case
    Lower,
    /// Reverse the characters
    Reverse,
    /// Replace the line with its length in characters
    Length,
}

impl LineOp {
    /// Apply the operation to one line.
    pub fn apply(self, line: &str) -> String {
        match self {
            Self::Upper => line.to_uppercase(),
            Self::Lower => line.to_lowercase(),
            Self::Reverse => line.chars().rev().collect(),
            Self::Length => line.chars().count().to_string(),
        }
    }
}

/// Transform each line of a text file.
#[derive(Debug, Parser)]
#[command(
    name = "lines",
    about = "\x1b[38;5;72m[DEMO]\x1b[0m           \x1b[36mTransform every line of a text file\x1b[0m",
    long_about = r#"
Apply an operation to every line of a text file using a pool of worker threads.

Output lines appear in input order unless --unordered is given, in which case they are
written as soon as each worker finishes. A read or write failure stops the run.

Example usage:
  seqpipe lines -i names.txt -o upper.txt --op upper --threads 4
  cat names.txt | seqpipe lines --op length --unordered -t 8
"#
)]
pub struct Lines {
    #[command(flatten)]
    pub io: TextIoOptions,

    /// Operation to apply to each line
    #[arg(long = "op", value_enum, default_value = "upper")]
    pub op: LineOp,

    /// Write lines in completion order rather than input order
    #[arg(long = "unordered", default_value = "false")]
    pub unordered: bool,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Lines {
    /// Stream `reader` through the pipeline into `writer`.
    pub fn process<R, W>(&self, reader: R, mut writer: W) -> Result<PipelineStats>
    where
        R: BufRead + Send,
        W: Write + Send,
    {
        let config = self.threading.to_config("Wrote lines");
        let op = self.op;
        let mut write_line = |line: String| writeln!(writer, "{line}");

        let stats = if self.unordered {
            run_unordered(
                &config,
                reader.lines(),
                |line, _seq, _worker, emitter| {
                    emitter.emit(op.apply(&line));
                    Ok::<_, io::Error>(())
                },
                &mut write_line,
            )
        } else {
            run_ordered(
                &config,
                reader.lines(),
                |line, _seq, _worker| Ok::<_, io::Error>(op.apply(&line)),
                &mut write_line,
            )
        }
        .context("Line pipeline failed")?;

        writer.flush().context("Failed to flush output")?;
        Ok(stats)
    }
}

impl Command for Lines {
    fn execute(&self, command_line: &str) -> Result<()> {
        debug!("Command line: {command_line}");
        self.io.validate()?;

        let timer = OperationTimer::new("Transforming lines");
        info!("Input: {}", self.io.input.display());
        info!("Output: {}", self.io.output.display());
        info!("Operation: {:?}", self.op);
        info!("Threads: {}", self.threading.threads);

        let reader = self.io.open_input()?;
        let writer = self.io.open_output()?;
        let stats = self.process(reader, writer)?;

        log_pipeline_summary("lines", &stats);
        timer.log_completion(stats.results_delivered);
        Ok(())
    }
}
