//! Periodic sweep scheduler.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::engine::EscalationEngine;

/// Spawn the periodic auto-escalation task.
///
/// Each tick runs one sweep; a failed sweep is logged and retried on
/// the next tick. The engine's own single-flight guard protects against
/// an external [`EscalationEngine::trigger_auto_escalation`] call
/// overlapping a scheduled tick. Abort the returned handle to stop the
/// scheduler.
pub fn spawn(engine: Arc<EscalationEngine>) -> JoinHandle<()> {
    let period = engine.config().check_interval();
    info!(
        "escalation scheduler started (every {}s)",
        period.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup does not
        // race database seeding.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match engine.trigger_auto_escalation().await {
                Ok(outcome) if outcome.escalated > 0 => {
                    info!(
                        "scheduled sweep escalated {} complaints",
                        outcome.escalated
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    // Fatal for this tick only; state is re-read from
                    // scratch on the next one.
                    error!("scheduled sweep failed: {}", e);
                }
            }
        }
    })
}
