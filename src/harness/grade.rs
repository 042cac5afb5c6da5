use std::fmt;

use serde::{Deserialize, Serialize};

/// Letter grade for an observed latency. `F` is reserved for failed executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundaries belong to the slower tier: exactly 1000 ms is a `B`.
pub fn grade_latency(elapsed_ms: f64) -> Grade {
    if elapsed_ms < 1000.0 {
        Grade::A
    } else if elapsed_ms < 2000.0 {
        Grade::B
    } else if elapsed_ms < 5000.0 {
        Grade::C
    } else {
        Grade::D
    }
}

pub fn grade_outcome(elapsed_ms: u64, succeeded: bool) -> Grade {
    if succeeded {
        grade_latency(elapsed_ms as f64)
    } else {
        Grade::F
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_boundaries_fall_into_the_slower_grade() {
        assert_eq!(grade_outcome(999, true), Grade::A);
        assert_eq!(grade_outcome(1000, true), Grade::B);
        assert_eq!(grade_outcome(1999, true), Grade::B);
        assert_eq!(grade_outcome(2000, true), Grade::C);
        assert_eq!(grade_outcome(4999, true), Grade::C);
        assert_eq!(grade_outcome(5000, true), Grade::D);
    }

    #[test]
    fn failure_is_always_f() {
        assert_eq!(grade_outcome(0, false), Grade::F);
        assert_eq!(grade_outcome(10, false), Grade::F);
    }

    #[test]
    fn grades_order_from_best_to_worst() {
        assert!(Grade::A < Grade::D);
        assert_eq!(serde_json::to_value(Grade::C).expect("serialize"), "C");
    }
}
