// SPDX-License-Identifier: MIT
//! driftd — configuration-drift reconciliation daemon.
//!
//! Polls a declared set of local files on a fixed interval, compares tracked
//! keys against a static expectation table, and patches drifted values in
//! place after writing a full-file backup artifact next to the original.
//!
//! Flow per cycle: [`monitor`] walks the [`expectations`] table in
//! declaration order, [`extract`] reads each key's current value per the
//! file's declared format, and [`reconcile`] applies the backup-then-patch
//! fix when the value diverges, emitting events through [`events`].

pub mod config;
pub mod events;
pub mod expectations;
pub mod extract;
pub mod monitor;
pub mod reconcile;
