use std::fmt::Write;

use chrono::NaiveDate;

use crate::lookup::PLACEHOLDER;
use crate::models::{DisplayRow, Report, ReportRow, StudentDetail};

const REPORT_COLUMNS: [&str; 11] = [
    "Class",
    "Subject",
    "Teacher",
    "Type",
    "Exam",
    "Assignment",
    "Weight",
    "Date",
    "Final Score",
    "Average",
    "Status",
];

pub fn render_markdown(report: &Report, generated_on: NaiveDate) -> String {
    let mut output = String::new();
    let meta = report.student_meta.clone().unwrap_or_default();

    let _ = writeln!(output, "# Report Card");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Student");
    let _ = writeln!(output, "- Name: {}", or_placeholder(&meta.name));
    let _ = writeln!(output, "- Enrollment: {}", or_placeholder(&meta.enrollment));
    let _ = writeln!(output, "- Email: {}", or_placeholder(&meta.email));
    let _ = writeln!(output, "- Phone: {}", or_placeholder(&meta.phone));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Grades");

    let mut header_written = false;
    for row in &report.rows {
        match row {
            ReportRow::Placeholder { message } => {
                let _ = writeln!(output, "{message}.");
            }
            ReportRow::Record(display) => {
                if !header_written {
                    let _ = writeln!(output, "| {} |", REPORT_COLUMNS.join(" | "));
                    let _ = writeln!(output, "|{}", "---|".repeat(REPORT_COLUMNS.len()));
                    header_written = true;
                }
                let cells: Vec<String> = report_cells(display)
                    .iter()
                    .map(|cell| escape_markdown_cell(cell))
                    .collect();
                let _ = writeln!(output, "| {} |", cells.join(" | "));
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "_Generated on {}_", generated_on.format("%d/%m/%Y"));
    output
}

/// CSV export of the report rows; a placeholder row fills the first column
/// only.
pub fn write_csv<W: std::io::Write>(rows: &[ReportRow], writer: W) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(REPORT_COLUMNS)?;

    for row in rows {
        match row {
            ReportRow::Record(display) => csv_writer.write_record(report_cells(display))?,
            ReportRow::Placeholder { message } => {
                let mut cells = vec![String::new(); REPORT_COLUMNS.len()];
                cells[0] = message.clone();
                csv_writer.write_record(&cells)?;
            }
        }
    }

    csv_writer.flush()?;
    Ok(())
}

/// One line per evaluation for the terminal listing.
pub fn format_listing(rows: &[ReportRow]) -> String {
    let mut output = String::new();
    for row in rows {
        match row {
            ReportRow::Placeholder { message } => {
                let _ = writeln!(output, "{message}.");
            }
            ReportRow::Record(display) => {
                let _ = writeln!(
                    output,
                    "- [{}] {} ({}) {} with {}: {} on {}, average {:.1} ({})",
                    display.id.map_or_else(|| PLACEHOLDER.to_string(), |id| id.to_string()),
                    display.student_name,
                    display.class_name,
                    display.subject_name,
                    display.teacher_name,
                    display.kind.as_deref().unwrap_or(PLACEHOLDER),
                    display
                        .date
                        .map_or_else(|| PLACEHOLDER.to_string(), |d| d.to_string()),
                    display.average,
                    display.status
                );
            }
        }
    }
    output
}

/// Default report file name, e.g. `boletim-Ana_Lima.md`.
pub fn report_file_name(meta: Option<&StudentDetail>) -> String {
    let name = meta
        .and_then(|m| m.name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("student");
    format!("boletim-{}.md", name.split_whitespace().collect::<Vec<_>>().join("_"))
}

fn report_cells(row: &DisplayRow) -> Vec<String> {
    vec![
        row.class_name.clone(),
        row.subject_name.clone(),
        row.teacher_name.clone(),
        row.kind.clone().unwrap_or_else(|| PLACEHOLDER.to_string()),
        row.exam.to_string(),
        row.assignment.to_string(),
        optional_number(row.weight),
        row.date
            .map_or_else(|| PLACEHOLDER.to_string(), |d| d.to_string()),
        optional_number(row.final_score),
        format!("{:.1}", row.average),
        row.status.to_string(),
    ]
}

fn escape_markdown_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn optional_number(value: Option<f64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| v.to_string())
}

fn or_placeholder(value: &Option<String>) -> &str {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(PLACEHOLDER)
}
