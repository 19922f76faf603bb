//! CSV output.

use std::io::Write;

use anyhow::{Context, Result};

use crate::qbo::ParsedReport;

/// Wrap a field in quotes for the legacy export format: single quotes when
/// the value contains a double quote, double quotes otherwise.
pub fn enquote(value: &str) -> String {
    if value.contains('"') {
        format!("'{value}'")
    } else {
        format!("\"{value}\"")
    }
}

/// One export line of enquoted fields, without the trailing newline.
pub fn enquoted_line<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| enquote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Write a parsed report as RFC 4180 CSV: a title row, then one record per
/// row. Rows wider than the header are written as-is.
pub fn write_report_csv<W: Write>(report: &ParsedReport, writer: W) -> Result<()> {
    let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    csv.write_record(&report.columns)
        .context("Failed to write CSV header")?;
    for row in &report.rows {
        csv.write_record(row.values())
            .context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qbo::parse_report;
    use serde_json::json;

    #[test]
    fn test_enquote_branches() {
        assert_eq!(enquote("plain"), "\"plain\"");
        assert_eq!(enquote(r#"say "hi""#), r#"'say "hi"'"#);
        assert_eq!(enquote("it's"), "\"it's\"");
        assert_eq!(enquote(r#"it's "both""#), r#"'it's "both"'"#);
        assert_eq!(enquote(""), "\"\"");
    }

    #[test]
    fn test_enquoted_line() {
        assert_eq!(
            enquoted_line(["2024-01-03", "Lovelace, Ada", "USD 12.34"]),
            r#""2024-01-03","Lovelace, Ada","USD 12.34""#
        );
    }

    #[test]
    fn test_write_report_csv() -> Result<()> {
        let report = parse_report(
            "GeneralLedger",
            &json!({
                "Columns": {"Column": [{"ColTitle": "Date"}, {"ColTitle": "Memo"}]},
                "Rows": {"Row": [
                    {"ColData": [{"value": "2024-01-03"}, {"value": "Lunch, \"team\""}]},
                    {"ColData": [{"value": "2024-01-04"}]}
                ]}
            }),
        )?;

        let mut out = Vec::new();
        write_report_csv(&report, &mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "Date,Memo\n2024-01-03,\"Lunch, \"\"team\"\"\"\n2024-01-04,\n"
        );
        Ok(())
    }
}
