//! Console progress reporting.
//!
//! Progress is informational only; sinks receive append-only text and make
//! no durability promises.

use std::io::Write;

/// Receives human-readable progress during a run.
pub trait ProgressSink: Send + Sync {
    /// A table finished migrating (`done` of `total` so far).
    fn table_migrated(&self, _table: &str, _done: usize, _total: usize) {}

    /// Rows copied so far for a table.
    fn rows_copied(&self, _table: &str, _copied: u64, _total: u64) {}

    /// Free-form message.
    fn note(&self, _message: &str) {}
}

/// Writes carriage-return percent lines to stdout.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn table_migrated(&self, table: &str, done: usize, total: usize) {
        let pct = percentage(done as u64, total as u64);
        let mut out = std::io::stdout();
        let _ = write!(
            out,
            "\rTable {}/{} ({}): {:.2}% complete{}",
            done,
            total,
            table,
            pct,
            " ".repeat(20)
        );
        let _ = out.flush();
        if done == total {
            let _ = writeln!(out);
        }
    }

    fn rows_copied(&self, table: &str, copied: u64, total: u64) {
        let pct = percentage(copied, total);
        let mut out = std::io::stdout();
        let _ = write!(
            out,
            "\rTable {}: row {}/{} {:.2}% complete{}",
            table,
            copied,
            total,
            pct,
            " ".repeat(20)
        );
        let _ = out.flush();
    }

    fn note(&self, message: &str) {
        println!("{}", message);
    }
}

/// Discards all progress; used for JSON-output runs and tests.
pub struct NullProgress;

impl ProgressSink for NullProgress {}

fn percentage(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        (done as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(4, 4), 100.0);
        assert_eq!(percentage(0, 0), 100.0);
    }

    #[test]
    fn test_null_progress_is_silent() {
        // Default methods are no-ops; just exercise them.
        let sink = NullProgress;
        sink.table_migrated("t", 1, 2);
        sink.rows_copied("t", 10, 100);
        sink.note("hello");
    }
}
