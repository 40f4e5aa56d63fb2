use crate::state::{HarvestOutcome, HarvestPhase, HarvestState, SurfaceMetrics, TruncationReason};
use crate::{Effect, Msg};

/// Sub-pixel movement does not count as the view advancing.
const MIN_ADVANCE_PX: f64 = 0.5;

/// Pure update function: applies a message to the harvest state and returns
/// the effects the driver must run next.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => match state.phase {
            HarvestPhase::Idle => {
                state.phase = HarvestPhase::Scrolling;
                vec![
                    Effect::ScrollToTop,
                    Effect::Pause(state.settings.mount_delay),
                    Effect::Extract,
                ]
            }
            _ => Vec::new(),
        },
        Msg::Extracted(records) => match state.phase {
            HarvestPhase::Scrolling => {
                state.merge_pass(records);
                vec![Effect::Measure]
            }
            HarvestPhase::Finalizing => {
                state.merge_pass(records);
                finish(&mut state, HarvestOutcome::Converged)
            }
            _ => Vec::new(),
        },
        Msg::Measured(metrics) => match state.phase {
            HarvestPhase::Scrolling => on_scrolling_measured(&mut state, metrics),
            HarvestPhase::Settling { baseline_total } => {
                on_settling_measured(&mut state, metrics, baseline_total)
            }
            _ => Vec::new(),
        },
        Msg::DeadlineReached => {
            if state.is_done() {
                Vec::new()
            } else {
                finish(&mut state, HarvestOutcome::Truncated(TruncationReason::Deadline))
            }
        }
        Msg::SurfaceFailed => {
            if state.is_done() {
                Vec::new()
            } else {
                finish(
                    &mut state,
                    HarvestOutcome::Truncated(TruncationReason::SurfaceError),
                )
            }
        }
    };

    (state, effects)
}

fn on_scrolling_measured(state: &mut HarvestState, metrics: SurfaceMetrics) -> Vec<Effect> {
    let previous = state.last_metrics.replace(metrics);

    if metrics.reached_bottom(state.settings.bottom_tolerance) {
        state.stalled_steps = 0;
        state.phase = HarvestPhase::Settling {
            baseline_total: metrics.total_extent,
        };
        return vec![Effect::Pause(state.settings.settle_delay), Effect::Measure];
    }

    let advanced = previous
        .map(|prev| metrics.scroll_offset > prev.scroll_offset + MIN_ADVANCE_PX)
        .unwrap_or(true);
    if advanced {
        state.stalled_steps = 0;
    } else {
        state.stalled_steps += 1;
        if state
            .settings
            .max_stalled_steps
            .is_some_and(|max| state.stalled_steps >= max)
        {
            return finish(state, HarvestOutcome::Truncated(TruncationReason::Stalled));
        }
    }

    advance(state)
}

fn on_settling_measured(
    state: &mut HarvestState,
    metrics: SurfaceMetrics,
    baseline_total: f64,
) -> Vec<Effect> {
    state.last_metrics = Some(metrics);
    if metrics.total_extent > baseline_total {
        state.phase = HarvestPhase::Scrolling;
        advance(state)
    } else {
        state.phase = HarvestPhase::Finalizing;
        vec![Effect::Extract]
    }
}

fn advance(state: &mut HarvestState) -> Vec<Effect> {
    if state.pass_limit_reached() {
        return finish(state, HarvestOutcome::Truncated(TruncationReason::PassLimit));
    }
    vec![
        Effect::ScrollBy {
            fraction: state.settings.step_fraction,
        },
        Effect::Pause(state.settings.scroll_delay),
        Effect::Extract,
    ]
}

fn finish(state: &mut HarvestState, outcome: HarvestOutcome) -> Vec<Effect> {
    state.phase = HarvestPhase::Done(outcome);
    vec![Effect::Finish(outcome)]
}
