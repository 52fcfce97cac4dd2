//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Render
//!
//! One header per field, one block per finished record, then a summary.
//! Records finish in whatever order the workers complete them, so each
//! block carries its own `[completed/total]` counter.
//!
//! ```text
//! goods.goodsinfo.gpic (3 records, 4 workers)
//!     [1/3] image/goods/tea.jpg
//!         thumbnail: rendered
//!         large: existing
//!     [2/3] image/goods/gone.jpg: skipped, source missing
//!     [3/3] image/goods/cup.jpg: skipped by render policy
//! Rendered 1 of 3 records: 1 rendered, 0 replaced, 1 existing
//!     Missing: image/goods/gone.jpg
//! ```
//!
//! ## Check
//!
//! ```text
//! Storage
//!     local:media
//! Fields
//! 001 goods.goodsinfo.gpic (2 variations, 10 records)
//!     thumbnail: 100x75 crop
//!     large: 800x600
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::bulk::{BulkReport, JobOutcome, ProgressEvent};
use crate::render::RenderStatus;
use crate::storage::StorageDescriptor;
use crate::variations::{ImageFieldConfig, RenderPolicy, VariationSpec, VariationRegistry};
use std::collections::BTreeMap;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn status_label(status: RenderStatus) -> &'static str {
    match status {
        RenderStatus::Rendered => "rendered",
        RenderStatus::Replaced => "replaced",
        RenderStatus::Existing => "existing",
    }
}

/// `100x75`, `1200x*` for an unbounded axis, with ` crop` when cropping.
fn variation_box(spec: &VariationSpec) -> String {
    let axis = |v: Option<u32>| v.map_or_else(|| "*".to_string(), |n| n.to_string());
    let mut text = format!("{}x{}", axis(spec.width()), axis(spec.height()));
    if spec.crop() {
        text.push_str(" crop");
    }
    text
}

// ============================================================================
// Render
// ============================================================================

/// Format one progress event of a bulk render.
pub fn format_progress_event(event: &ProgressEvent) -> Vec<String> {
    match event {
        ProgressEvent::FieldStarted {
            selector,
            total,
            threads,
        } => {
            let workers = if *threads == 1 { "worker" } else { "workers" };
            vec![format!(
                "{} ({} records, {} {})",
                selector, total, threads, workers
            )]
        }
        ProgressEvent::JobFinished {
            completed,
            total,
            source,
            outcome,
        } => {
            let counter = format!("{}[{}/{}] {}", indent(1), completed, total, source);
            match outcome {
                JobOutcome::Rendered(outcomes) => {
                    let mut lines = vec![counter];
                    for o in outcomes {
                        lines.push(format!(
                            "{}{}: {}",
                            indent(2),
                            o.variation,
                            status_label(o.status)
                        ));
                    }
                    lines
                }
                JobOutcome::SkippedByPolicy => vec![format!("{counter}: skipped by render policy")],
                JobOutcome::SkippedMissing => vec![format!("{counter}: skipped, source missing")],
            }
        }
    }
}

/// Format the closing summary of a bulk render.
pub fn format_bulk_summary(report: &BulkReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Rendered {} of {} records: {} rendered, {} replaced, {} existing",
        report.records_rendered, report.total, report.rendered, report.replaced, report.existing
    )];
    if report.policy_skipped > 0 {
        lines.push(format!(
            "{}Skipped by render policy: {}",
            indent(1),
            report.policy_skipped
        ));
    }
    for path in &report.missing {
        lines.push(format!("{}Missing: {}", indent(1), path));
    }
    lines
}

pub fn print_bulk_summary(report: &BulkReport) {
    for line in format_bulk_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

fn policy_label(policy: &RenderPolicy) -> &'static str {
    match policy {
        RenderPolicy::Always => "always",
        RenderPolicy::Never => "never",
        RenderPolicy::Predicate(_) => "predicate",
    }
}

fn field_lines(index: usize, selector: &str, field: &ImageFieldConfig, records: Option<usize>) -> Vec<String> {
    let records = match records {
        Some(1) => "1 record".to_string(),
        Some(n) => format!("{n} records"),
        None => "not in catalog".to_string(),
    };
    let mut lines = vec![format!(
        "{} {} ({} variations, {})",
        format_index(index),
        selector,
        field.variations.len(),
        records
    )];
    for spec in field.variations.iter() {
        lines.push(format!("{}{}: {}", indent(1), spec.name(), variation_box(spec)));
    }
    lines.push(format!(
        "{}render on save: {}",
        indent(1),
        policy_label(&field.render_on_save)
    ));
    if let Some((w, h)) = field.min_size() {
        lines.push(format!("{}minimum upload: {}x{}", indent(1), w, h));
    }
    lines
}

/// Format the `check` report: storage target and every registered field
/// with its variations and catalog record count.
///
/// `record_counts` is keyed by `app.model.field`; fields missing from it
/// are reported as not in the catalog.
pub fn format_check_output(
    storage: &StorageDescriptor,
    registry: &VariationRegistry,
    record_counts: &BTreeMap<String, usize>,
) -> Vec<String> {
    let mut lines = vec![
        "Storage".to_string(),
        format!("{}{}", indent(1), storage.label()),
        "Fields".to_string(),
    ];
    if registry.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, (selector, field)) in registry.iter().enumerate() {
        let key = selector.to_string();
        lines.extend(field_lines(
            i + 1,
            &key,
            field,
            record_counts.get(&key).copied(),
        ));
    }
    lines
}

pub fn print_check_output(
    storage: &StorageDescriptor,
    registry: &VariationRegistry,
    record_counts: &BTreeMap<String, usize>,
) {
    for line in format_check_output(storage, registry, record_counts) {
        println!("{}", line);
    }
}
