//! Shared helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Thread counts every concurrency property is checked against.
pub const THREAD_COUNTS: [usize; 4] = [1, 2, 4, 8];

/// Run a closure with a timeout. Returns Err if the closure doesn't complete in time.
pub fn run_with_timeout<F, T>(timeout: Duration, f: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let result = f();
        let _ = tx.send(result);
    });
    rx.recv_timeout(timeout).map_err(|_| format!("Operation timed out after {timeout:?}"))
}

/// Write `lines` to `dir/name`, one per line, and return the path.
pub fn write_lines<S: AsRef<str>>(dir: &Path, name: &str, lines: &[S]) -> PathBuf {
    let path = dir.join(name);
    let mut contents = String::new();
    for line in lines {
        contents.push_str(line.as_ref());
        contents.push('\n');
    }
    fs::write(&path, contents).expect("Failed to write input file");
    path
}

/// Read a text file back as lines.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("Failed to read output file")
        .lines()
        .map(str::to_string)
        .collect()
}
