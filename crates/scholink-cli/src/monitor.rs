//! `scholink monitor report`

use std::fmt::Write;

use scholink_core::query::StatusReport;

/// Plain-text rendering of the status counts.
pub fn render(report: &StatusReport) -> String {
  let rows = [
    ("events new", report.events_new),
    ("events processing", report.events_processing),
    ("events error", report.events_error),
    ("events done", report.events_done),
    ("error log rows", report.error_log_rows),
    ("identifiers", report.identifiers),
    ("relationships", report.relationships),
    ("  deleted", report.deleted_relationships),
    ("identity groups", report.identity_groups),
    ("version groups", report.version_groups),
    ("group relationships", report.group_relationships),
  ];
  let mut out = String::new();
  for (label, count) in rows {
    let _ = writeln!(out, "{label:<22}{count:>10}");
  }
  out
}
