//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;

use seqpipe_lib::pipeline::PipelineConfig;

/// Returns true if the path means standard input/output.
pub fn is_std_stream<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "/dev/stdin" || path_str == "/dev/stdout"
}

/// Threading options for pipeline commands.
///
/// # Examples
///
/// ```bash
/// seqpipe lines --threads 8 --unordered ...
/// ```
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of worker threads. With 1, everything runs on the main thread.
    #[arg(short = 't', long = "threads", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// Log progress every N delivered results (0 disables progress logging).
    #[arg(long = "progress-interval", default_value_t = 0)]
    pub progress_interval: u64,
}

impl ThreadingOptions {
    /// Creates threading options with N threads and no progress logging.
    #[must_use]
    pub fn new(threads: u16) -> Self {
        Self { threads, progress_interval: 0 }
    }

    /// Builds the pipeline configuration, labelling progress lines with `label`.
    #[must_use]
    pub fn to_config(&self, label: &str) -> PipelineConfig {
        let config = PipelineConfig::new(usize::from(self.threads));
        if self.progress_interval > 0 {
            config.with_progress(label, self.progress_interval)
        } else {
            config
        }
    }
}

/// Input/output options for commands that read and write line-oriented text.
#[derive(Debug, Clone, Args)]
pub struct TextIoOptions {
    /// Input file, or '-' for stdin
    #[arg(short = 'i', long = "input", default_value = "-")]
    pub input: PathBuf,

    /// Output file, or '-' for stdout
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: PathBuf,
}

impl TextIoOptions {
    /// Validates that the input file exists (skipped for stdin).
    pub fn validate(&self) -> Result<()> {
        if !is_std_stream(&self.input) && !self.input.exists() {
            bail!("Input file '{}' does not exist", self.input.display());
        }
        Ok(())
    }

    /// Opens the input for buffered reading.
    pub fn open_input(&self) -> Result<Box<dyn BufRead + Send>> {
        if is_std_stream(&self.input) {
            return Ok(Box::new(BufReader::new(io::stdin())));
        }
        let file = File::open(&self.input)
            .with_context(|| format!("Failed to open input '{}'", self.input.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }

    /// Opens the output for buffered writing.
    pub fn open_output(&self) -> Result<Box<dyn Write + Send>> {
        if is_std_stream(&self.output) {
            return Ok(Box::new(BufWriter::new(io::stdout())));
        }
        let file = File::create(&self.output)
            .with_context(|| format!("Failed to create output '{}'", self.output.display()))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
