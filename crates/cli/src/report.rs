use std::{
    io::{self, Write},
    path::Path,
};

use idemsql_core::{Anomaly, BatchMode, BatchReport, Correction, FileReport, FileStatus};

use crate::error_presentation::anomaly_category;

/// Writes one status line per file, then anomalies, corrections and the
/// summary.
pub(crate) fn write_batch_report(
    out: &mut impl Write,
    report: &BatchReport,
    mode: BatchMode,
) -> io::Result<()> {
    for file in &report.files {
        writeln!(out, "{:<10} {}", status_label(file), file.path.display())?;
    }

    let flagged: Vec<&FileReport> = report.flagged().collect();
    if !flagged.is_empty() {
        writeln!(out)?;
        writeln!(out, "anomalies:")?;
        for file in flagged {
            write_anomalies(out, &file.path, &file.anomalies)?;
        }
    }

    let corrected: Vec<&FileReport> = report
        .files
        .iter()
        .filter(|file| !file.corrections.is_empty())
        .collect();
    if !corrected.is_empty() {
        writeln!(out)?;
        writeln!(out, "corrected guards:")?;
        for file in corrected {
            write_corrections(out, &file.path, &file.corrections)?;
        }
    }

    writeln!(out)?;
    let verb = match mode {
        BatchMode::Write => "changed",
        BatchMode::DryRun => "would change",
    };
    writeln!(
        out,
        "{} of {} files {verb}",
        report.modified(),
        report.scanned()
    )
}

pub(crate) fn write_anomalies(
    out: &mut impl Write,
    path: &Path,
    anomalies: &[Anomaly],
) -> io::Result<()> {
    for anomaly in anomalies {
        writeln!(
            out,
            "  [{}] {}:{}: {} ({})",
            anomaly_category(anomaly.kind),
            path.display(),
            anomaly.line,
            anomaly.message,
            anomaly.kind
        )?;
    }
    Ok(())
}

fn write_corrections(
    out: &mut impl Write,
    path: &Path,
    corrections: &[Correction],
) -> io::Result<()> {
    for correction in corrections {
        writeln!(
            out,
            "  {}:{}: {} guard now checks {} (was {})",
            path.display(),
            correction.line,
            correction.kind,
            correction.to,
            correction.from
        )?;
    }
    Ok(())
}

const fn status_label(file: &FileReport) -> &'static str {
    match file.status {
        FileStatus::Modified => "modified",
        FileStatus::Unchanged => "unchanged",
        FileStatus::Failed(_) => "failed",
    }
}
