//! Monitoring channel messages: per-run status line and error alerts.

/// Summary of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Drafts published during this run.
    pub posted: usize,
    /// Drafts still pending after the run.
    pub pending: usize,
    /// Whether the fetch step ran.
    pub fetched: bool,
}

/// `gamestop-content run HH:MM – posted N, pending M (fetched|no fetch)`
pub fn status_line(clock: &str, report: &RunReport) -> String {
    let mode = if report.fetched { "fetched" } else { "no fetch" };
    format!(
        "gamestop-content run {clock} – posted {}, pending {} ({mode})",
        report.posted, report.pending
    )
}

/// Error alert for the monitoring channel, with a remediation hint.
pub fn error_alert(clock: &str, error_text: &str) -> String {
    format!(
        "gamestop-content run {clock} – error: {error_text}\nHint: {}",
        remediation_hint(error_text)
    )
}

/// Best-effort suggestion for an operator based on the error text.
pub fn remediation_hint(error_text: &str) -> &'static str {
    let text = error_text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&["missing required environment"]) {
        "Set the listed environment variables and rerun."
    } else if has(&["401", "unauthorized"]) {
        "Check the API credentials; a token may be expired or revoked."
    } else if has(&["403", "forbidden"]) {
        "Check the app permissions (read/write access, channel permissions)."
    } else if has(&["429", "rate limit", "too many requests"]) {
        "Rate limited. Wait and retry later."
    } else if has(&["timed out", "timeout", "connection", "dns"]) {
        "Network problem. Check connectivity and rerun."
    } else if has(&["json", "decode"]) {
        "Inspect the state files or the API response shape."
    } else {
        "Check logs/latest.log for details."
    }
}

/// Local wall-clock time as `HH:MM`.
pub fn clock_now() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}
