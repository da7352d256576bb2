// report.rs - Size statistics shown once a batch has finished

use std::fmt;

use crate::size::format_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavingsKind {
    Saved,
    Grew,
}

/// Percentage change between the original and final byte counts.
///
/// A zero-byte original gives a non-finite percentage, which is rendered
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Savings {
    pub original: u64,
    pub final_size: u64,
    pub percent: f64,
}

impl Savings {
    pub fn new(original: u64, final_size: u64) -> Self {
        let diff = original as f64 - final_size as f64;
        Self {
            original,
            final_size,
            percent: diff / original as f64 * 100.0,
        }
    }

    pub fn kind(&self) -> SavingsKind {
        if self.original > self.final_size {
            SavingsKind::Saved
        } else {
            SavingsKind::Grew
        }
    }

    pub fn rounded(&self) -> f64 {
        (self.percent * 10.0).round() / 10.0
    }

    pub fn tag(&self) -> String {
        match self.kind() {
            SavingsKind::Saved => format!("-{:.1}% SAVED", self.percent),
            SavingsKind::Grew => format!("+{:.1}% LARGER", self.percent.abs()),
        }
    }
}

impl fmt::Display for Savings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSummary {
    pub label: &'static str,
    pub final_size: String,
    pub savings: Savings,
}

impl ResultSummary {
    pub fn new(label: &'static str, original: u64, final_size: u64) -> Self {
        Self {
            label,
            final_size: format_bytes(final_size),
            savings: Savings::new(original, final_size),
        }
    }
}
