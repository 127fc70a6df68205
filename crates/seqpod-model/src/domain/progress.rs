use serde::{Deserialize, Serialize};

use crate::{Pod, PodPhase, StepPointer};

/// Summary of where a task's execution pod stands, derived from its pointer and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum TaskProgress {
    /// Pod created, no step released yet.
    Pending,
    /// Step `step` (1-based) of `total` is released.
    Running { step: u32, total: u32 },
    /// Every step exited zero.
    Succeeded { total: u32 },
    /// The pod was halted after step `step` exited non-zero.
    Failed { step: Option<u32>, total: u32 },
}

impl TaskProgress {
    /// Derives the progress of `pod`. An unreadable pointer is reported as `Pending`.
    pub fn from_pod(pod: &Pod) -> Self {
        let total = pod.step_count() as u32;
        if pod.phase() == PodPhase::Succeeded {
            return TaskProgress::Succeeded { total };
        }
        match pod.step_pointer() {
            Ok(StepPointer::Aborted) => TaskProgress::Failed {
                step: failed_step(pod),
                total,
            },
            Ok(StepPointer::Released(k)) => {
                let last_ok = pod
                    .step_status(k)
                    .and_then(|s| s.exit_code())
                    .is_some_and(|code| code == 0);
                if k >= total && last_ok {
                    TaskProgress::Succeeded { total }
                } else {
                    TaskProgress::Running { step: k, total }
                }
            }
            Ok(StepPointer::Pending) | Err(_) => TaskProgress::Pending,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskProgress::Succeeded { .. } | TaskProgress::Failed { .. }
        )
    }
}

fn failed_step(pod: &Pod) -> Option<u32> {
    (1..=pod.step_count() as u32).find(|&k| {
        pod.step_status(k)
            .and_then(|s| s.exit_code())
            .is_some_and(|code| code != 0)
    })
}
