use tracing::info;

pub fn run_started(run_id: &str, company: &str, running: usize) {
    info!(
        target: "telemetry.gui",
        run_id,
        company,
        running_runs = running,
        event = "run_started"
    );
}

pub fn run_completed(run_id: &str, verdict: &str, red_flags: usize, elapsed_ms: u64) {
    info!(
        target: "telemetry.gui",
        run_id,
        verdict,
        red_flags,
        elapsed_ms,
        event = "run_completed"
    );
}

pub fn run_failed(run_id: &str, error: &str, elapsed_ms: u64) {
    info!(
        target: "telemetry.gui",
        run_id,
        error,
        elapsed_ms,
        event = "run_failed"
    );
}

pub fn run_cancelled(run_id: &str, elapsed_ms: u64) {
    info!(
        target: "telemetry.gui",
        run_id,
        elapsed_ms,
        event = "run_cancelled"
    );
}

pub fn stream_opened(run_id: &str) {
    info!(target: "telemetry.gui", run_id, event = "stream_opened");
}

pub fn stream_closed(run_id: &str, frames: usize) {
    info!(
        target: "telemetry.gui",
        run_id,
        frames,
        event = "stream_closed"
    );
}
