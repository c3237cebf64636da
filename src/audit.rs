//! Batch rehash audit over a list of stored records.
//!
//! [`audit_records`] runs [`Engine::needs_rehash`] over every record and
//! returns one [`AuditEntry`] per input, in input order.  No key is derived,
//! so an audit is cheap compared to verification.
//!
//! With the `parallel` feature the records are checked concurrently on the
//! Rayon pool; the engine is read-only, so no coordination is needed.

use crate::algorithm::HashError;
use crate::record::Engine;

/// Outcome for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// 1-based position in the input.
    pub line:    usize,
    pub outcome: Result<bool, HashError>,
}

impl AuditEntry {
    pub fn is_stale(&self) -> bool {
        matches!(self.outcome, Ok(true))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub total:     usize,
    pub stale:     usize,
    pub current:   usize,
    pub malformed: usize,
}

fn check(engine: &Engine, line: usize, record: &str) -> AuditEntry {
    AuditEntry { line, outcome: engine.needs_rehash(record.trim()) }
}

/// Check every record in `records`.
pub fn audit_records(engine: &Engine, records: &[&str]) -> Vec<AuditEntry> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        records
            .par_iter()
            .enumerate()
            .map(|(i, record)| check(engine, i + 1, record))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        records
            .iter()
            .enumerate()
            .map(|(i, record)| check(engine, i + 1, record))
            .collect()
    }
}

/// Audit newline-separated records, skipping blank lines.  Line numbers in the
/// result refer to `text`.
pub fn audit_lines(engine: &Engine, text: &str) -> Vec<AuditEntry> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entries = audit_records(engine, &lines);
    entries.retain(|e| !lines[e.line - 1].trim().is_empty());
    entries
}

pub fn summarize(entries: &[AuditEntry]) -> AuditSummary {
    entries.iter().fold(AuditSummary::default(), |mut s, e| {
        s.total += 1;
        match e.outcome {
            Ok(true)  => s.stale += 1,
            Ok(false) => s.current += 1,
            Err(_)    => s.malformed += 1,
        }
        s
    })
}
