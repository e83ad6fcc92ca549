// SPDX-License-Identifier: MIT
//! Monitor loop — periodic reconciliation of every watched (file, key) pair.
//!
//! A single task alternates between Idle (waiting for the next tick) and
//! Scanning (one full pass over the expectation table). Cycles never
//! overlap: a pass completes before the next tick is honored, and missed
//! ticks are skipped rather than bursted. Checks run in declaration order,
//! and failure on one entry never prevents the rest of the cycle.

use crate::events::{
    EventBroadcaster, EVENT_CYCLE_STABLE, EVENT_CYCLE_SUMMARY, EVENT_DRIFT_DETECTED,
    EVENT_DRIFT_FIXED, EVENT_FILE_MISSING,
};
use crate::expectations::ExpectationTable;
use crate::reconcile;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Where the loop currently is. Idle is entered before the first scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Idle,
    Scanning,
}

/// Aggregated result of one reconciliation cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    /// (file, key) pairs examined.
    pub checked: usize,
    /// Entries whose observed value diverged from the expectation.
    pub drift_found: usize,
    /// Drifted entries that were patched.
    pub drift_fixed: usize,
    /// Entries skipped due to read/backup/write or reachability failures.
    pub errors: usize,
    /// Declared files that did not exist this cycle.
    pub missing_files: usize,
}

impl CycleSummary {
    pub fn is_clean(&self) -> bool {
        self.drift_found == 0 && self.errors == 0 && self.missing_files == 0
    }
}

/// The drift monitor: expectation table + event sink.
pub struct Monitor {
    table: ExpectationTable,
    broadcaster: EventBroadcaster,
}

impl Monitor {
    pub fn new(table: ExpectationTable, broadcaster: EventBroadcaster) -> Self {
        Self { table, broadcaster }
    }

    /// Run cycles forever on a fixed period until `shutdown` flips.
    ///
    /// Cancellation is checked while idle and between entries mid-scan, so
    /// the in-flight entry always completes; a file is never left half
    /// patched by an orderly shutdown.
    pub async fn run(
        &self,
        period: Duration,
        stable_report_cycles: u32,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut state = LoopState::Idle;
        // Saturated so the first clean cycle reports immediately.
        let mut clean_cycles_since_report = stable_report_cycles;

        info!(
            files = self.table.files().len(),
            entries = self.table.entry_count(),
            period_secs = period.as_secs(),
            "monitor loop started"
        );

        loop {
            trace!(?state, "idle until next tick");
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    info!("monitor loop stopping");
                    return;
                }
            }

            state = LoopState::Scanning;
            trace!(?state, "scan starting");
            let summary = self.run_cycle(false, Some(&shutdown)).await;
            state = LoopState::Idle;

            if summary.is_clean() {
                clean_cycles_since_report += 1;
                // Debounced coarse heartbeat: at most one "all stable" per
                // reporting window, so a quiet system doesn't flood logs.
                if clean_cycles_since_report >= stable_report_cycles {
                    info!(checked = summary.checked, "all watched values stable");
                    self.broadcaster.broadcast(
                        EVENT_CYCLE_STABLE,
                        serde_json::json!({ "checked": summary.checked }),
                    );
                    clean_cycles_since_report = 0;
                }
            } else {
                clean_cycles_since_report = 0;
            }

            if *shutdown.borrow() {
                info!("monitor loop stopping");
                return;
            }
        }
    }

    /// One full pass over the expectation table.
    ///
    /// Public so `driftd check` and tests can drive a single cycle without
    /// the timer. `dry_run` reports drift without patching. `shutdown`,
    /// when given, is checked between entries and ends the pass early.
    pub async fn run_cycle(
        &self,
        dry_run: bool,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> CycleSummary {
        let mut summary = CycleSummary::default();
        debug!(dry_run, "cycle starting");

        'files: for file in self.table.files() {
            if shutdown.is_some_and(|s| *s.borrow()) {
                break 'files;
            }

            match tokio::fs::try_exists(&file.path).await {
                Ok(true) => {}
                Ok(false) => {
                    // No create-file policy: report and move on.
                    warn!(file = %file.path.display(), "watched file missing");
                    summary.missing_files += 1;
                    self.broadcaster.broadcast(
                        EVENT_FILE_MISSING,
                        serde_json::json!({ "file": file.path.to_string_lossy() }),
                    );
                    continue;
                }
                Err(e) => {
                    // Existence could not be determined (e.g. an unreadable
                    // or non-directory parent). That is an access failure,
                    // not a missing file: skip the file's entries as errors
                    // and retry next cycle.
                    summary.errors += file.expectations.len();
                    warn!(
                        file = %file.path.display(),
                        error = %e,
                        "watched file unreachable, entries skipped this cycle"
                    );
                    continue;
                }
            }

            for exp in &file.expectations {
                if shutdown.is_some_and(|s| *s.borrow()) {
                    break 'files;
                }
                summary.checked += 1;

                match reconcile::reconcile_entry(
                    &file.path,
                    &exp.key,
                    file.format,
                    &exp.expected,
                    dry_run,
                )
                .await
                {
                    Ok(None) => {}
                    Ok(Some(event)) => {
                        summary.drift_found += 1;
                        let payload =
                            serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
                        if event.fixed {
                            summary.drift_fixed += 1;
                            info!(
                                file = %event.file.display(),
                                key = %event.key,
                                expected = %event.expected,
                                observed = %event.observed,
                                backup = ?event.backup,
                                "drift fixed"
                            );
                            self.broadcaster.broadcast(EVENT_DRIFT_FIXED, payload);
                        } else {
                            info!(
                                file = %event.file.display(),
                                key = %event.key,
                                expected = %event.expected,
                                observed = %event.observed,
                                "drift detected"
                            );
                            self.broadcaster.broadcast(EVENT_DRIFT_DETECTED, payload);
                        }
                    }
                    Err(e) => {
                        // Isolation: one bad entry never aborts the cycle.
                        summary.errors += 1;
                        warn!(
                            file = %file.path.display(),
                            key = %exp.key,
                            error = %e,
                            "entry skipped this cycle"
                        );
                    }
                }
            }
        }

        if summary.is_clean() {
            debug!(checked = summary.checked, "cycle complete, no drift");
        } else {
            info!(
                checked = summary.checked,
                drift_found = summary.drift_found,
                drift_fixed = summary.drift_fixed,
                errors = summary.errors,
                missing_files = summary.missing_files,
                "cycle complete"
            );
        }
        self.broadcaster.broadcast(
            EVENT_CYCLE_SUMMARY,
            serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null),
        );

        summary
    }
}
