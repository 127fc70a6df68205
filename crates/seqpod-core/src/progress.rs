use seqpod_model::{Pod, PodPhase, StepPointer};
use tracing::trace;

use crate::ProgressError;

/// Next step pointer of `pod`, or `None` when nothing should change.
///
/// Only the step the pointer currently releases is inspected:
/// - pod `Succeeded`, pointer `-1`, or pointer at the step count: no change;
/// - released step not terminated (or not reported yet): no change;
/// - released step exited non-zero: [`StepPointer::Aborted`];
/// - released step exited zero: the pointer moves to the following step.
///
/// A `Pending` pointer is left to the kickoff in the builder. At most one step is advanced per
/// call, so callers converge by calling again after each persisted change.
pub fn forward(pod: &Pod) -> Result<Option<StepPointer>, ProgressError> {
    if pod.phase() == PodPhase::Succeeded {
        return Ok(None);
    }

    let pointer = pod.step_pointer().map_err(|source| ProgressError::Pointer {
        pod: pod.name().to_string(),
        source,
    })?;
    let order = match pointer {
        StepPointer::Aborted | StepPointer::Pending => return Ok(None),
        StepPointer::Released(order) => order,
    };
    if pointer.is_done(pod.step_count()) {
        return Ok(None);
    }

    let Some(code) = pod.step_status(order).and_then(|s| s.exit_code()) else {
        trace!(pod = %pod.name(), step = order, "step still running");
        return Ok(None);
    };

    Ok(Some(if code == 0 {
        pointer.next()
    } else {
        StepPointer::Aborted
    }))
}
