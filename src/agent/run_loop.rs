//! Run Loop
//!
//! Repeats decision cycles at a fixed interval, with an optional cycle cap
//! and cooperative cancellation. Individual cycle failures never abort the
//! run: a transient inference or network failure must not kill a
//! long-running monitoring process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::types::TerminationReason;

use super::controller::CycleController;

pub struct RunLoopOptions {
    pub interval: Duration,
    /// Maximum cycles to run. 0 = unbounded.
    pub max_cycles: u64,
    /// External stop signal, checked at cycle boundaries and inside the
    /// controller between tool invocations.
    pub stop: Arc<AtomicBool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles_completed: u64,
    pub trades_executed: u64,
    pub cancelled: bool,
}

/// Drive the controller until the cycle cap is reached or a stop is
/// requested. Sleeps `interval` between cycles, waking early on stop.
pub async fn run_trading_loop(
    controller: &mut CycleController,
    options: RunLoopOptions,
) -> RunSummary {
    let mut summary = RunSummary::default();

    loop {
        if options.stop.load(Ordering::SeqCst) {
            summary.cancelled = true;
            break;
        }

        let cycle_number = controller.cycles_run() + 1;
        info!(cycle = cycle_number, "starting decision cycle");

        let outcome = controller.run_cycle().await;
        summary.cycles_completed += 1;
        if outcome.trade_executed {
            summary.trades_executed += 1;
        }

        info!(
            cycle = cycle_number,
            iterations = outcome.iterations_used,
            tool_calls = outcome.tool_results.len(),
            trade_executed = outcome.trade_executed,
            reason = ?outcome.terminated_reason,
            "cycle complete"
        );

        if outcome.terminated_reason == TerminationReason::Cancelled {
            summary.cancelled = true;
            break;
        }

        if options.max_cycles > 0 && summary.cycles_completed >= options.max_cycles {
            info!(max_cycles = options.max_cycles, "cycle cap reached; stopping");
            break;
        }

        interruptible_sleep(options.interval, &options.stop).await;
    }

    info!(
        cycles = summary.cycles_completed,
        trades = summary.trades_executed,
        cancelled = summary.cancelled,
        "run loop finished"
    );
    summary
}

/// Sleep in short slices so a stop request takes effect promptly instead of
/// waiting out a full multi-minute interval.
async fn interruptible_sleep(total: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(250);
    let mut remaining = total;
    while !remaining.is_zero() {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let step = remaining.min(slice);
        sleep(step).await;
        remaining -= step;
    }
}
