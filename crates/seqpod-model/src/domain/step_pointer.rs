use std::{fmt, str::FromStr};

use thiserror::Error;

/// Shared step pointer of an execution pod.
///
/// Persisted as a stringified signed integer in the [`crate::ANNOTATION_STEP_POINTER`]
/// annotation and projected into every container as a file:
/// - `0`  no step released yet ([`StepPointer::Pending`]);
/// - `k`  step `k` (1-based) is released ([`StepPointer::Released`]); `k == N` means done;
/// - `-1` a step exited non-zero and the pod is halted ([`StepPointer::Aborted`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StepPointer {
    #[default]
    Pending,
    Released(u32),
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    #[error("step pointer is not an integer: {0:?}")]
    NotAnInteger(String),
    #[error("step pointer out of range: {0}")]
    OutOfRange(i64),
}

impl StepPointer {
    /// Value of the pointer as written to the annotation.
    pub fn value(self) -> i64 {
        match self {
            StepPointer::Pending => 0,
            StepPointer::Released(k) => i64::from(k),
            StepPointer::Aborted => -1,
        }
    }

    /// 1-based index of the released step, if any.
    pub fn released(self) -> Option<u32> {
        match self {
            StepPointer::Released(k) => Some(k),
            _ => None,
        }
    }

    /// Returns `true` once every one of `step_count` steps has been released.
    pub fn is_done(self, step_count: usize) -> bool {
        matches!(self, StepPointer::Released(k) if k as usize >= step_count)
    }

    /// Returns `true` if no further transition can happen for a pod with `step_count` steps.
    pub fn is_terminal(self, step_count: usize) -> bool {
        self == StepPointer::Aborted || self.is_done(step_count)
    }

    /// The pointer that releases the next step. `Aborted` stays aborted.
    pub fn next(self) -> StepPointer {
        match self {
            StepPointer::Pending => StepPointer::Released(1),
            StepPointer::Released(k) => StepPointer::Released(k.saturating_add(1)),
            StepPointer::Aborted => StepPointer::Aborted,
        }
    }
}

impl fmt::Display for StepPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl FromStr for StepPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v: i64 = s
            .trim()
            .parse()
            .map_err(|_| PointerError::NotAnInteger(s.to_string()))?;
        match v {
            -1 => Ok(StepPointer::Aborted),
            0 => Ok(StepPointer::Pending),
            k if k > 0 => u32::try_from(k)
                .map(StepPointer::Released)
                .map_err(|_| PointerError::OutOfRange(k)),
            other => Err(PointerError::OutOfRange(other)),
        }
    }
}
