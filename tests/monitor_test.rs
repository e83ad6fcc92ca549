// SPDX-License-Identifier: MIT
//! Integration tests for driftd::monitor — cycle aggregation, isolation,
//! event emission, and shutdown.

use driftd::config::{ExpectSpec, FileSpec};
use driftd::events::EventBroadcaster;
use driftd::expectations::ExpectationTable;
use driftd::extract::FileFormat;
use driftd::monitor::Monitor;
use std::path::PathBuf;
use tempfile::TempDir;

fn line_spec(path: PathBuf, keys: &[(&str, &str)]) -> FileSpec {
    FileSpec {
        path,
        format: FileFormat::LineAssignment,
        expect: keys
            .iter()
            .map(|(k, v)| ExpectSpec {
                key: k.to_string(),
                value: v.to_string(),
            })
            .collect(),
    }
}

fn monitor_for(specs: &[FileSpec]) -> (Monitor, EventBroadcaster) {
    let table = ExpectationTable::from_specs(specs).unwrap();
    let broadcaster = EventBroadcaster::new();
    (Monitor::new(table, broadcaster.clone()), broadcaster)
}

/// Drain everything currently buffered on the subscription.
fn drain(rx: &mut tokio::sync::broadcast::Receiver<String>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(s) = rx.try_recv() {
        out.push(serde_json::from_str(&s).unwrap());
    }
    out
}

#[tokio::test]
async fn test_clean_cycle_counts() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.env");
    std::fs::write(&file, "HOST=10.0.0.1\nPORT=8080\n").unwrap();

    let (monitor, _b) = monitor_for(&[line_spec(
        file,
        &[("HOST", "10.0.0.1"), ("PORT", "8080")],
    )]);
    let summary = monitor.run_cycle(false, None).await;

    assert!(summary.is_clean());
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.drift_found, 0);
}

/// A missing file is reported and skipped; later files still run.
#[tokio::test]
async fn test_missing_file_does_not_stop_cycle() {
    let tmp = TempDir::new().unwrap();
    let present = tmp.path().join("b.env");
    std::fs::write(&present, "HOST=1.2.3.4\n").unwrap();

    let (monitor, broadcaster) = monitor_for(&[
        line_spec(tmp.path().join("missing.env"), &[("HOST", "x")]),
        line_spec(present.clone(), &[("HOST", "10.0.0.1")]),
    ]);
    let mut rx = broadcaster.subscribe();

    let summary = monitor.run_cycle(false, None).await;

    assert_eq!(summary.missing_files, 1);
    assert_eq!(summary.drift_found, 1);
    assert_eq!(summary.drift_fixed, 1);
    // The second file was still reconciled.
    assert_eq!(std::fs::read_to_string(&present).unwrap(), "HOST=10.0.0.1\n");

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e["event"] == "file.missing"));
    assert!(events.iter().any(|e| e["event"] == "drift.fixed"));
}

/// An entry that errors (here: the watched path is a directory) does not
/// prevent other entries in the same cycle.
#[tokio::test]
async fn test_entry_isolation_on_error() {
    let tmp = TempDir::new().unwrap();
    let bad = tmp.path().join("dir-not-file");
    std::fs::create_dir(&bad).unwrap();
    let good = tmp.path().join("good.env");
    std::fs::write(&good, "MODE=slow\n").unwrap();

    let (monitor, _b) = monitor_for(&[
        line_spec(bad, &[("HOST", "x")]),
        line_spec(good.clone(), &[("MODE", "fast")]),
    ]);
    let summary = monitor.run_cycle(false, None).await;

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.drift_fixed, 1);
    assert_eq!(std::fs::read_to_string(&good).unwrap(), "MODE=fast\n");
}

#[tokio::test]
async fn test_drift_fixed_event_payload() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.env");
    std::fs::write(&file, "HOST=1.2.3.4\n").unwrap();

    let (monitor, broadcaster) = monitor_for(&[line_spec(file.clone(), &[("HOST", "10.0.0.1")])]);
    let mut rx = broadcaster.subscribe();
    monitor.run_cycle(false, None).await;

    let events = drain(&mut rx);
    let fixed = events
        .iter()
        .find(|e| e["event"] == "drift.fixed")
        .expect("drift.fixed event");
    assert_eq!(fixed["params"]["key"], "HOST");
    assert_eq!(fixed["params"]["expected"], "10.0.0.1");
    assert_eq!(fixed["params"]["observed"], "1.2.3.4");
    assert_eq!(
        fixed["params"]["file"],
        file.to_string_lossy().to_string()
    );
    assert!(fixed["params"]["id"].is_string());
}

/// Unfixable structured drift emits drift.detected, not drift.fixed.
#[tokio::test]
async fn test_unfixed_drift_event() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("app.conf");
    std::fs::write(&file, "Server {\n}\n").unwrap();

    let (monitor, broadcaster) = monitor_for(&[FileSpec {
        path: file,
        format: FileFormat::Structured,
        expect: vec![ExpectSpec {
            key: "Server.BindAddr".to_string(),
            value: "127.0.0.1".to_string(),
        }],
    }]);
    let mut rx = broadcaster.subscribe();
    let summary = monitor.run_cycle(false, None).await;

    assert_eq!(summary.drift_found, 1);
    assert_eq!(summary.drift_fixed, 0);
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e["event"] == "drift.detected"));
    assert!(!events.iter().any(|e| e["event"] == "drift.fixed"));
}

#[tokio::test]
async fn test_dry_run_cycle_leaves_files_alone() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.env");
    std::fs::write(&file, "HOST=1.2.3.4\n").unwrap();

    let (monitor, _b) = monitor_for(&[line_spec(file.clone(), &[("HOST", "10.0.0.1")])]);
    let summary = monitor.run_cycle(true, None).await;

    assert_eq!(summary.drift_found, 1);
    assert_eq!(summary.drift_fixed, 0);
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "HOST=1.2.3.4\n");
}

/// Re-running a cycle after convergence finds nothing (idempotence at the
/// loop level), and every cycle broadcasts a summary.
#[tokio::test]
async fn test_second_cycle_is_clean() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.env");
    std::fs::write(&file, "HOST=1.2.3.4\n").unwrap();

    let (monitor, broadcaster) = monitor_for(&[line_spec(file, &[("HOST", "10.0.0.1")])]);
    let mut rx = broadcaster.subscribe();

    let first = monitor.run_cycle(false, None).await;
    let second = monitor.run_cycle(false, None).await;

    assert_eq!(first.drift_fixed, 1);
    assert!(second.is_clean());
    let summaries: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| e["event"] == "cycle.summary")
        .collect();
    assert_eq!(summaries.len(), 2);
}

/// Files and keys are visited in declaration order.
#[tokio::test]
async fn test_declaration_order() {
    let tmp = TempDir::new().unwrap();
    let a = tmp.path().join("a.env");
    let b = tmp.path().join("b.env");
    std::fs::write(&a, "X=0\nY=0\n").unwrap();
    std::fs::write(&b, "Z=0\n").unwrap();

    let (monitor, broadcaster) = monitor_for(&[
        line_spec(b, &[("Z", "3")]),
        line_spec(a, &[("Y", "2"), ("X", "1")]),
    ]);
    let mut rx = broadcaster.subscribe();
    monitor.run_cycle(false, None).await;

    let keys: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter(|e| e["event"] == "drift.fixed")
        .map(|e| e["params"]["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["Z", "Y", "X"]);
}

/// An existence check that errors (here: a path routed through a regular
/// file) is an access failure, not a missing file; later files still run.
#[tokio::test]
async fn test_unreachable_file_counts_as_error_not_missing() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("plain.txt");
    std::fs::write(&blocker, "not a directory\n").unwrap();
    let unreachable = blocker.join("sub.env");
    let good = tmp.path().join("good.env");
    std::fs::write(&good, "MODE=slow\n").unwrap();

    let (monitor, broadcaster) = monitor_for(&[
        line_spec(unreachable, &[("HOST", "x")]),
        line_spec(good.clone(), &[("MODE", "fast")]),
    ]);
    let mut rx = broadcaster.subscribe();
    let summary = monitor.run_cycle(false, None).await;

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.missing_files, 0);
    assert_eq!(summary.drift_fixed, 1);
    assert_eq!(std::fs::read_to_string(&good).unwrap(), "MODE=fast\n");
    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| e["event"] == "file.missing"));
}

/// The "all stable" heartbeat is debounced: the first clean cycle reports,
/// then exactly `stable_report_cycles` clean cycles pass between reports.
#[tokio::test]
async fn test_stable_report_debounce() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.env");
    std::fs::write(&file, "HOST=1\n").unwrap();

    let (monitor, broadcaster) = monitor_for(&[line_spec(file, &[("HOST", "1")])]);
    let mut rx = broadcaster.subscribe();
    let (tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let handle = tokio::spawn(async move {
        monitor
            .run(std::time::Duration::from_millis(10), 3, shutdown_rx)
            .await;
    });
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("monitor loop should stop after shutdown signal")
        .unwrap();

    let names: Vec<String> = drain(&mut rx)
        .into_iter()
        .map(|e| e["event"].as_str().unwrap().to_string())
        .collect();
    let summaries = names.iter().filter(|n| *n == "cycle.summary").count();
    let stables = names.iter().filter(|n| *n == "cycle.stable").count();
    assert!(summaries >= 8, "expected several cycles, got {summaries}");
    assert!(stables >= 2, "heartbeat should recur, got {stables}");
    assert!(stables < summaries, "heartbeat must be debounced");

    // First clean cycle reports immediately.
    let first_summary = names.iter().position(|n| n == "cycle.summary").unwrap();
    assert_eq!(names.get(first_summary + 1).map(String::as_str), Some("cycle.stable"));

    // Exactly three clean cycles sit between consecutive reports.
    let mut since_stable: Option<usize> = None;
    for n in &names {
        match n.as_str() {
            "cycle.summary" => {
                if let Some(c) = since_stable.as_mut() {
                    *c += 1;
                }
            }
            "cycle.stable" => {
                if let Some(c) = since_stable {
                    assert_eq!(c, 3, "wrong number of cycles between heartbeats");
                }
                since_stable = Some(0);
            }
            _ => {}
        }
    }
}

/// The serve loop exits when the shutdown channel flips.
#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.env");
    std::fs::write(&file, "HOST=1\n").unwrap();

    let (monitor, _b) = monitor_for(&[line_spec(file, &[("HOST", "1")])]);
    let (tx, rx) = tokio::sync::watch::channel(false);

    let handle = tokio::spawn(async move {
        monitor
            .run(std::time::Duration::from_millis(10), 1000, rx)
            .await;
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("monitor loop should stop after shutdown signal")
        .unwrap();
}

/// Helper sanity check: a structured and a line-assignment file can share
/// one table and one cycle.
#[tokio::test]
async fn test_mixed_formats_in_one_cycle() {
    let tmp = TempDir::new().unwrap();
    let env = tmp.path().join("svc.env");
    let conf = tmp.path().join("svc.conf");
    std::fs::write(&env, "PORT=9999\n").unwrap();
    std::fs::write(&conf, "Net { Listen = \"0.0.0.0\" }\n").unwrap();

    let (monitor, _b) = monitor_for(&[
        line_spec(env.clone(), &[("PORT", "8080")]),
        FileSpec {
            path: conf.clone(),
            format: FileFormat::Structured,
            expect: vec![ExpectSpec {
                key: "Net.Listen".to_string(),
                value: "127.0.0.1".to_string(),
            }],
        },
    ]);
    let summary = monitor.run_cycle(false, None).await;

    assert_eq!(summary.drift_fixed, 2);
    assert_eq!(std::fs::read_to_string(&env).unwrap(), "PORT=8080\n");
    assert_eq!(
        std::fs::read_to_string(&conf).unwrap(),
        "Net { Listen = \"127.0.0.1\" }\n"
    );
}
