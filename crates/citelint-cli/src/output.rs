use std::io::Write;

use citelint_core::{CheckStats, Citation, ProgressEvent, Status, VerificationResult};
use citelint_parsing::ExtractionResult;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the extraction summary after segmentation.
pub fn print_extraction_summary(
    w: &mut dyn Write,
    file_name: &str,
    extraction: &ExtractionResult,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Extracting citations from {}...", file_name)?;
    writeln!(w, "Found {} citations to check", extraction.citations.len())?;

    let strategy = extraction
        .strategy
        .map(|s| s.as_str())
        .unwrap_or("none");
    let mut details = format!(
        "(section: {:?}, split: {}",
        extraction.section_source, strategy
    );
    if extraction.dropped > 0 {
        details.push_str(&format!(", dropped {} non-citations", extraction.dropped));
    }
    let doi_only = extraction.doi_only_count();
    if doi_only > 0 {
        details.push_str(&format!(", {} DOI-only", doi_only));
    }
    details.push(')');

    if color.enabled() {
        writeln!(w, "{}", details.dimmed())?;
    } else {
        writeln!(w, "{}", details)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print the extracted citations without verifying them.
pub fn print_dry_run(
    w: &mut dyn Write,
    file_name: &str,
    extraction: &ExtractionResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let strategy = extraction
        .strategy
        .map(|s| s.as_str())
        .unwrap_or("none");
    if color.enabled() {
        writeln!(
            w,
            "{} {} ({} citations, split: {})\n",
            "DRY RUN:".bold().cyan(),
            file_name.bold(),
            extraction.citations.len(),
            strategy
        )?;
    } else {
        writeln!(
            w,
            "DRY RUN: {} ({} citations, split: {})\n",
            file_name,
            extraction.citations.len(),
            strategy
        )?;
    }

    for citation in &extraction.citations {
        print_citation(w, citation, color)?;
    }

    writeln!(
        w,
        "Total: {} citations ({} dropped, {} DOIs in document)",
        extraction.citations.len(),
        extraction.dropped,
        extraction.document_dois.len()
    )?;
    Ok(())
}

fn print_citation(w: &mut dyn Write, citation: &Citation, color: ColorMode) -> std::io::Result<()> {
    let label = format!("[{}]", citation.raw.ordinal);
    if color.enabled() {
        writeln!(w, "{}", label.bold().yellow())?;
    } else {
        writeln!(w, "{}", label)?;
    }

    let fields = &citation.fields;
    writeln!(w, "  Title:   {}", fields.title.as_deref().unwrap_or("(none)"))?;
    if let Some(ref doi) = fields.doi {
        writeln!(w, "  DOI:     {}", doi)?;
    }
    if let Some(ref biblio) = fields.biblio {
        writeln!(w, "  Biblio:  {}", biblio.query_string())?;
    }

    let raw_display = truncate(&citation.raw.text, 200);
    if color.enabled() {
        writeln!(w, "  Raw:     {}", raw_display.dimmed())?;
    } else {
        writeln!(w, "  Raw:     {}", raw_display)?;
    }
    writeln!(w)?;
    Ok(())
}

/// One-line rendering of a finished citation.
pub fn format_result_line(
    index: usize,
    total: usize,
    result: &VerificationResult,
    color: ColorMode,
) -> String {
    let idx = index + 1;
    let method = result.method.map(|m| m.as_str()).unwrap_or("none");
    match result.status {
        Status::Verified => {
            let status = if color.enabled() {
                "VERIFIED".green().to_string()
            } else {
                "VERIFIED".to_string()
            };
            format!("[{}/{}] -> {} (via {})", idx, total, status, method)
        }
        Status::NotFound => {
            let status = if color.enabled() {
                "NOT FOUND".red().to_string()
            } else {
                "NOT FOUND".to_string()
            };
            format!("[{}/{}] -> {} (via {})", idx, total, status, method)
        }
        Status::Indeterminate => {
            let status = if color.enabled() {
                "INDETERMINATE".yellow().to_string()
            } else {
                "INDETERMINATE".to_string()
            };
            let detail = result.error_detail.as_deref().unwrap_or("unknown error");
            format!("[{}/{}] -> {} ({})", idx, total, status, truncate(detail, 60))
        }
    }
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Checking {
            index,
            total,
            label,
            ..
        } => {
            writeln!(
                w,
                "[{}/{}] Checking: \"{}\"",
                index + 1,
                total,
                truncate(label, 50)
            )?;
        }
        ProgressEvent::Result {
            index,
            total,
            result,
        } => {
            writeln!(w, "{}", format_result_line(*index, *total, result, color))?;
        }
        ProgressEvent::Cancelled { completed, total } => {
            writeln!(w)?;
            let msg = format!("Cancelled after {}/{} citations", completed, total);
            if color.enabled() {
                writeln!(w, "{}", msg.yellow())?;
            } else {
                writeln!(w, "{}", msg)?;
            }
        }
    }
    Ok(())
}

/// Progress bar for interactive terminals.
pub fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Feed a progress event to the bar, printing finished citations above it.
pub fn update_bar(bar: &ProgressBar, event: &ProgressEvent, color: ColorMode) {
    match event {
        ProgressEvent::Checking { label, .. } => {
            bar.set_message(truncate(label, 50));
        }
        ProgressEvent::Result {
            index,
            total,
            result,
        } => {
            bar.println(format_result_line(*index, *total, result, color));
            bar.inc(1);
        }
        ProgressEvent::Cancelled { completed, total } => {
            bar.abandon_with_message(format!("cancelled after {}/{}", completed, total));
        }
    }
}

/// Print a detail block for every citation that did not verify.
pub fn print_problem_report(
    w: &mut dyn Write,
    results: &[VerificationResult],
    color: ColorMode,
) -> std::io::Result<()> {
    for result in results {
        match result.status {
            Status::NotFound => print_problem_block(w, result, "CITATION NOT FOUND", color)?,
            Status::Indeterminate => {
                print_problem_block(w, result, "COULD NOT VERIFY", color)?
            }
            Status::Verified => {}
        }
    }
    Ok(())
}

fn print_problem_block(
    w: &mut dyn Write,
    result: &VerificationResult,
    heading: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        let sep = if result.status == Status::NotFound {
            sep.bold().red().to_string()
        } else {
            sep.bold().yellow().to_string()
        };
        writeln!(w, "{}", sep)?;
        writeln!(w, "{} [{}]", heading.bold(), result.ordinal)?;
        writeln!(w, "{}", sep)?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "{} [{}]", heading, result.ordinal)?;
        writeln!(w, "{}", sep)?;
    }
    writeln!(w)?;

    if color.enabled() {
        writeln!(w, "{}:", "Citation".bold())?;
        writeln!(w, "  {}", truncate(&result.raw_text, 300).cyan())?;
    } else {
        writeln!(w, "Citation:")?;
        writeln!(w, "  {}", truncate(&result.raw_text, 300))?;
    }
    if let Some(ref doi) = result.doi {
        writeln!(w, "DOI: {}", doi)?;
    }
    if let Some(method) = result.method {
        writeln!(w, "Checked by: {}", method)?;
    }
    let reason = result.error_detail.as_deref().unwrap_or("unknown");
    if color.enabled() {
        writeln!(w, "{} {}", "Reason:".red(), reason)?;
    } else {
        writeln!(w, "Reason: {}", reason)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Print the result of a standalone DOI check.
pub fn print_doi_result(
    w: &mut dyn Write,
    result: &VerificationResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let doi = result.doi.as_deref().unwrap_or(&result.raw_text);
    match (&result.status, &result.resolved_work) {
        (Status::Verified, Some(work)) => {
            if color.enabled() {
                writeln!(w, "{} {}", "VERIFIED".green().bold(), doi)?;
            } else {
                writeln!(w, "VERIFIED {}", doi)?;
            }
            writeln!(w, "  Title:   {}", work.title)?;
            let authors = work.author_names();
            if !authors.is_empty() {
                writeln!(w, "  Authors: {}", authors.join("; "))?;
            }
            writeln!(w, "  Year:    {}", work.published_year)?;
            writeln!(w, "  Venue:   {}", work.venue)?;
        }
        _ => {
            let reason = result.error_detail.as_deref().unwrap_or("unknown");
            let label = if result.status == Status::NotFound {
                "NOT FOUND"
            } else {
                "INDETERMINATE"
            };
            if color.enabled() {
                writeln!(w, "{} {} ({})", label.red().bold(), doi, reason)?;
            } else {
                writeln!(w, "{} {} ({})", label, doi, reason)?;
            }
        }
    }
    Ok(())
}

/// Print the final summary.
pub fn print_summary(
    w: &mut dyn Write,
    stats: &CheckStats,
    extracted: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    let sep = "=".repeat(60);
    if color.enabled() {
        writeln!(w, "{}", sep.bold())?;
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "{}", sep.bold())?;
    } else {
        writeln!(w, "{}", sep)?;
        writeln!(w, "SUMMARY")?;
        writeln!(w, "{}", sep)?;
    }

    writeln!(w, "  Citations extracted: {}", extracted)?;
    writeln!(w, "  Citations checked: {}", stats.total)?;
    if stats.total < extracted {
        let msg = format!("Not checked (cancelled): {}", extracted - stats.total);
        if color.enabled() {
            writeln!(w, "  {}", msg.dimmed())?;
        } else {
            writeln!(w, "  {}", msg)?;
        }
    }
    writeln!(w)?;

    if color.enabled() {
        writeln!(w, "  {} {}", "Verified:".green(), stats.verified)?;
    } else {
        writeln!(w, "  Verified: {}", stats.verified)?;
    }
    if stats.verified > 0 {
        let msg = format!(
            "by DOI: {}, by title: {}, by biblio: {}",
            stats.verified_by_doi, stats.verified_by_title, stats.verified_by_biblio
        );
        if color.enabled() {
            writeln!(w, "    {}", msg.dimmed())?;
        } else {
            writeln!(w, "    {}", msg)?;
        }
    }
    if stats.not_found > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Not found:".red(), stats.not_found)?;
        } else {
            writeln!(w, "  Not found: {}", stats.not_found)?;
        }
    }
    if stats.indeterminate > 0 {
        if color.enabled() {
            writeln!(w, "  {} {}", "Indeterminate:".yellow(), stats.indeterminate)?;
        } else {
            writeln!(w, "  Indeterminate: {}", stats.indeterminate)?;
        }
    }

    writeln!(w)?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    file: &'a str,
    cancelled: bool,
    extracted: usize,
    summary: &'a CheckStats,
    results: &'a [VerificationResult],
}

/// Write results and summary as one JSON document.
pub fn write_json_report(
    w: &mut dyn Write,
    file_name: &str,
    extracted: usize,
    results: &[VerificationResult],
    stats: &CheckStats,
) -> anyhow::Result<()> {
    let report = JsonReport {
        file: file_name,
        cancelled: results.len() < extracted,
        extracted,
        summary: stats,
        results,
    };
    serde_json::to_writer_pretty(&mut *w, &report)?;
    writeln!(w)?;
    Ok(())
}

/// Write extracted citations as JSON (dry run).
pub fn write_json_citations(w: &mut dyn Write, citations: &[Citation]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *w, citations)?;
    writeln!(w)?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
