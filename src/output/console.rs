//! Human-readable console report.
//!
//! Sections, in order: summary, category breakdown, top groups by
//! reclaimable size, the cross-framework table when requested, and the
//! consistency warnings repeated last so they are not scrolled away.

use std::fmt::Write as _;
use std::io;

use bytesize::ByteSize;
use yansi::{Paint, Style};

use crate::crossfw::{CrossFrameworkCategory, CrossFrameworkReport};
use crate::duplicates::{bytes_to_mb, Bucket};

use super::Report;

const HEADING: Style = Style::new().bold().underline();
const GOOD: Style = Style::new().green().bold();
const WARN: Style = Style::new().yellow().bold();
const DIM: Style = Style::new().dim();

/// Console formatter.
pub struct ConsoleOutput<'a> {
    report: Report<'a>,
    color: bool,
}

impl<'a> ConsoleOutput<'a> {
    #[must_use]
    pub fn new(report: Report<'a>) -> Self {
        Self {
            report,
            color: true,
        }
    }

    /// Enable or disable ANSI styling.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Render the whole report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.summary(&mut out);
        self.categories(&mut out);
        self.top_groups(&mut out);
        if let Some(cross) = self.report.cross_framework {
            self.cross_framework(&mut out, cross);
        }
        self.warnings(&mut out);
        out
    }

    /// Write the rendered report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.render().as_bytes())?;
        writer.flush()
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.paint(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn heading(&self, out: &mut String, title: &str) {
        let _ = writeln!(out, "\n{}", self.paint(title, HEADING));
    }

    fn summary(&self, out: &mut String) {
        let summary = self.report.analysis.summary();
        let _ = writeln!(
            out,
            "{} {} ({})",
            self.paint("Duplicate analysis of", HEADING),
            self.report.root.display(),
            self.report.scan_class.as_str()
        );
        let _ = writeln!(
            out,
            "  Files scanned:        {} ({})",
            summary.files_scanned,
            ByteSize::b(summary.bytes_scanned)
        );
        let _ = writeln!(out, "  Duplicate groups:     {}", summary.duplicate_groups);

        let reclaimable = format!(
            "{} files, {}",
            summary.reclaimable_files,
            ByteSize::b(summary.reclaimable_bytes)
        );
        let style = if summary.reclaimable_files == 0 { DIM } else { GOOD };
        let _ = writeln!(out, "  Reclaimable:          {}", self.paint(&reclaimable, style));
    }

    fn categories(&self, out: &mut String) {
        let stats = &self.report.analysis.summary().categories;
        self.heading(out, "Categories");
        let rows: [(&str, &Bucket); 4] = [
            ("same hash", &stats.same_hash),
            ("different version", &stats.different_version),
            ("same version, different hash", &stats.same_version_different_hash),
            ("  of which architecture differs", &stats.same_version_different_architecture),
        ];
        for (label, bucket) in rows {
            let _ = writeln!(
                out,
                "  {:<34} {:>7} files {:>12}",
                label,
                bucket.count,
                ByteSize::b(bucket.bytes).to_string()
            );
        }
    }

    fn top_groups(&self, out: &mut String) {
        let top = self.report.analysis.top_groups(self.report.top_n);
        self.heading(out, &format!("Top {} groups by reclaimable size", self.report.top_n));
        if top.is_empty() {
            let _ = writeln!(out, "  {}", self.paint("No duplicate groups found", DIM));
            return;
        }
        let _ = writeln!(
            out,
            "  {:<40} {:<10} {:<28} {:>6} {:>12}",
            "Filename", "Culture", "Framework", "Extra", "MB"
        );
        for group in &top {
            let _ = writeln!(
                out,
                "  {:<40} {:<10} {:<28} {:>6} {:>12.2}",
                group.filename,
                group.culture.as_deref().unwrap_or("-"),
                group.framework.as_deref().unwrap_or("-"),
                group.duplicate_count,
                group.reclaimable_mb
            );
        }
    }

    fn cross_framework(&self, out: &mut String, cross: &CrossFrameworkReport) {
        self.heading(out, "Cross-framework analysis");
        let _ = writeln!(
            out,
            "  {:<30} {:>7} {:>18}",
            "Category", "Groups", "Savings (MB)"
        );
        for category in CrossFrameworkCategory::ALL {
            let total = cross.total(category);
            let savings = total
                .potential_savings
                .map_or_else(|| "n/a".to_string(), |b| format!("{:.2}", bytes_to_mb(b)));
            let _ = writeln!(out, "  {:<30} {:>7} {:>18}", category.as_str(), total.groups, savings);
        }
        let _ = writeln!(
            out,
            "  Total potential savings: {}",
            self.paint(&ByteSize::b(cross.total_potential_savings).to_string(), GOOD)
        );
    }

    fn warnings(&self, out: &mut String) {
        let warnings = &self.report.analysis.summary().warnings;
        if warnings.is_empty() {
            return;
        }
        self.heading(out, &format!("Warnings ({})", warnings.len()));
        for warning in warnings {
            let _ = writeln!(out, "  {} {}", self.paint("!", WARN), warning);
        }
    }
}
