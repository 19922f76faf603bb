//! QBO report parsing.
//!
//! QBO reports arrive as a tree of sections and data rows with positional
//! cells. [`parse_report`] flattens that tree into uniform rows in reading
//! order: a section's detail rows, then its summary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// Keys tried, in order, when a cell object has no `value`.
const CELL_TEXT_KEYS: [&str; 5] = ["#text", "text", "name", "amount", "label"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Data,
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub value: String,
}

impl ParsedCell {
    fn empty() -> Self {
        Self {
            id: None,
            value: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRow {
    pub kind: RowKind,
    pub columns: Vec<ParsedCell>,
}

impl ParsedRow {
    /// Cell values, in column order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOption {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportHeader {
    pub report_name: Option<String>,
    pub start_period: String,
    pub end_period: String,
    pub currency: Option<String>,
    pub time: Option<String>,
    pub options: Vec<ReportOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReport {
    pub header: ReportHeader,
    pub columns: Vec<String>,
    /// `ColType` per declared column; empty when the report declared none.
    pub column_types: Vec<String>,
    pub rows: Vec<ParsedRow>,
}

/// A node of the raw row tree.
#[derive(Debug, Clone, PartialEq)]
pub enum RowNode {
    Data {
        cells: Vec<ParsedCell>,
    },
    Section {
        header: Option<Vec<ParsedCell>>,
        rows: Vec<RowNode>,
        summary: Option<Vec<ParsedCell>>,
    },
}

impl RowNode {
    /// Append this node's rows to `out` in pre-order.
    fn flatten_into(&self, out: &mut Vec<ParsedRow>) {
        match self {
            Self::Data { cells } => out.push(ParsedRow {
                kind: RowKind::Data,
                columns: cells.clone(),
            }),
            Self::Section { rows, summary, .. } => {
                for row in rows {
                    row.flatten_into(out);
                }
                if let Some(summary) = summary {
                    out.push(ParsedRow {
                        kind: RowKind::Summary,
                        columns: summary.clone(),
                    });
                }
            }
        }
    }
}

/// Parse a report body from text.
pub fn parse_report_str(endpoint: &str, body: &str) -> Result<ParsedReport, ClientError> {
    let value: Value = serde_json::from_str(body).map_err(|e| parse_error(endpoint, e))?;
    parse_report(endpoint, &value)
}

/// Flatten a QBO report body. `endpoint` names the report in errors.
pub fn parse_report(endpoint: &str, body: &Value) -> Result<ParsedReport, ClientError> {
    let report = match body.get("Report") {
        Some(inner) if inner.is_object() => inner,
        _ => body,
    };
    let report = report
        .as_object()
        .ok_or_else(|| parse_error(endpoint, "report body is not a JSON object"))?;

    if !report.contains_key("Columns") && !report.contains_key("Rows") {
        return Err(parse_error(endpoint, "report has neither Columns nor Rows"));
    }

    let header = report.get("Header").map(parse_header).unwrap_or_default();
    let (mut columns, column_types) = parse_columns(report.get("Columns"));

    let tree = decode_rows(report.get("Rows").and_then(|r| r.get("Row")));
    let mut rows = Vec::new();
    for node in &tree {
        node.flatten_into(&mut rows);
    }

    if columns.is_empty() {
        let width = rows.iter().map(|r| r.columns.len()).max().unwrap_or(0);
        columns = (1..=width).map(|n| format!("Col {n}")).collect();
    }

    let width = columns.len();
    for row in &mut rows {
        if row.columns.len() < width {
            tracing::trace!(
                report = endpoint,
                cells = row.columns.len(),
                width,
                "Padding short row"
            );
            row.columns.resize_with(width, ParsedCell::empty);
        } else if row.columns.len() > width {
            tracing::debug!(
                report = endpoint,
                cells = row.columns.len(),
                width,
                "Row wider than declared columns"
            );
        }
    }

    tracing::debug!(report = endpoint, columns = width, rows = rows.len(), "Parsed report");
    Ok(ParsedReport {
        header,
        columns,
        column_types,
        rows,
    })
}

fn parse_error(endpoint: &str, message: impl ToString) -> ClientError {
    ClientError::Parse {
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    }
}

/// Accept either an array or a lone object where QBO may send either.
fn one_or_many(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        Some(item @ Value::Object(_)) => std::slice::from_ref(item),
        _ => &[],
    }
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_columns(columns: Option<&Value>) -> (Vec<String>, Vec<String>) {
    let declared = one_or_many(columns.and_then(|c| c.get("Column")));
    let mut titles = Vec::with_capacity(declared.len());
    let mut types = Vec::with_capacity(declared.len());

    for (i, column) in declared.iter().enumerate() {
        let empty = Map::new();
        let column = column.as_object().unwrap_or(&empty);
        let col_type = non_empty_str(column, "ColType");
        let title = non_empty_str(column, "ColTitle")
            .or_else(|| col_type.clone())
            .unwrap_or_else(|| format!("Col {}", i + 1));
        titles.push(title);
        types.push(col_type.unwrap_or_default());
    }
    (titles, types)
}

fn parse_header(header: &Value) -> ReportHeader {
    let Some(header) = header.as_object() else {
        return ReportHeader::default();
    };
    let text = |key: &str| header.get(key).and_then(Value::as_str).map(str::to_string);

    let options = one_or_many(header.get("Option"))
        .iter()
        .map(|opt| {
            let field = |upper: &str, lower: &str| {
                opt.get(upper)
                    .or_else(|| opt.get(lower))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            ReportOption {
                name: field("Name", "name"),
                value: field("Value", "value"),
            }
        })
        .collect();

    ReportHeader {
        report_name: text("ReportName"),
        start_period: text("StartPeriod").unwrap_or_default(),
        end_period: text("EndPeriod").unwrap_or_default(),
        currency: text("Currency"),
        time: text("Time"),
        options,
    }
}

fn decode_rows(rows: Option<&Value>) -> Vec<RowNode> {
    one_or_many(rows).iter().map(decode_node).collect()
}

fn decode_node(node: &Value) -> RowNode {
    let children = node.get("Rows").and_then(|r| r.get("Row"));
    let summary = node.get("Summary").map(|s| decode_cells(s.get("ColData")));

    if !one_or_many(children).is_empty() || summary.is_some() {
        return RowNode::Section {
            header: node.get("Header").map(|h| decode_cells(h.get("ColData"))),
            rows: decode_rows(children),
            summary,
        };
    }

    RowNode::Data {
        cells: decode_cells(node.get("ColData")),
    }
}

fn decode_cells(cells: Option<&Value>) -> Vec<ParsedCell> {
    match cells {
        Some(Value::Array(items)) => items.iter().map(decode_cell).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![decode_cell(single)],
    }
}

fn decode_cell(cell: &Value) -> ParsedCell {
    let id = cell
        .get("id")
        .or_else(|| cell.get("Id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    ParsedCell {
        id,
        value: cell_value(cell),
    }
}

fn cell_value(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) => cell.to_string(),
        Value::Object(obj) => object_value(obj),
    }
}

fn object_value(obj: &Map<String, Value>) -> String {
    if let Some(value) = obj.get("value") {
        return match value {
            Value::Object(_) => cell_value(value),
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }

    for key in CELL_TEXT_KEYS {
        match obj.get(key) {
            Some(Value::String(s)) => return s.clone(),
            Some(Value::Null) | None => continue,
            Some(other) => return other.to_string(),
        }
    }

    if is_blank(&Value::Object(obj.clone())) {
        return String::new();
    }
    Value::Object(obj.clone()).to_string()
}

/// True when every leaf is null or a blank string.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(obj) => obj.values().all(is_blank),
        Value::Array(items) => items.iter().all(is_blank),
        Value::Number(_) | Value::Bool(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(report: &ParsedReport) -> Vec<Vec<&str>> {
        report.rows.iter().map(|r| r.values().collect()).collect()
    }

    fn sample() -> Value {
        json!({
            "Header": {
                "ReportName": "TransactionListWithSplits",
                "StartPeriod": "2024-01-01",
                "EndPeriod": "2024-01-31",
                "Currency": "USD",
                "Time": "2024-02-01T10:00:00-08:00",
                "Option": [{"Name": "NoReportData", "Value": "false"}]
            },
            "Columns": {"Column": [
                {"ColTitle": "Date", "ColType": "tx_date"},
                {"ColTitle": "", "ColType": "account_name"},
                {"ColTitle": "Amount", "ColType": "nat_amount"}
            ]},
            "Rows": {"Row": [
                {
                    "Header": {"ColData": [{"value": "6050 Board Meetings"}]},
                    "Rows": {"Row": [
                        {"ColData": [{"value": "2024-01-03"}, {"value": "6050 Board Meetings", "id": "88"}, {"value": "120.00"}], "type": "Data"},
                        {"ColData": [{"value": "2024-01-09"}, {"value": "6050 Board Meetings", "id": "88"}], "type": "Data"}
                    ]},
                    "Summary": {"ColData": [{"value": "Total for 6050 Board Meetings"}, {"value": ""}, {"value": "120.00"}]},
                    "type": "Section"
                }
            ]}
        })
    }

    #[test]
    fn test_section_flattens_to_leaves_then_summary() {
        let report = parse_report("TransactionListWithSplits", &sample()).unwrap();

        let kinds: Vec<RowKind> = report.rows.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RowKind::Data, RowKind::Data, RowKind::Summary]);
        assert_eq!(
            values(&report),
            vec![
                vec!["2024-01-03", "6050 Board Meetings", "120.00"],
                vec!["2024-01-09", "6050 Board Meetings", ""],
                vec!["Total for 6050 Board Meetings", "", "120.00"],
            ]
        );
        assert_eq!(report.rows[0].columns[1].id.as_deref(), Some("88"));
    }

    #[test]
    fn test_rows_are_padded_to_declared_width() {
        let report = parse_report("TransactionListWithSplits", &sample()).unwrap();
        assert!(report.rows.iter().all(|r| r.columns.len() == 3));
    }

    #[test]
    fn test_column_titles_fall_back_to_type_then_position() {
        let body = json!({
            "Columns": {"Column": [{"ColTitle": "Date"}, {"ColType": "Money"}, {}]},
            "Rows": {}
        });
        let report = parse_report("ProfitAndLoss", &body).unwrap();
        assert_eq!(report.columns, vec!["Date", "Money", "Col 3"]);
        assert_eq!(report.column_types, vec!["", "Money", ""]);
        assert!(report.rows.is_empty());
    }

    #[test]
    fn test_header_is_parsed() {
        let report = parse_report("TransactionListWithSplits", &sample()).unwrap();
        assert_eq!(report.header.report_name.as_deref(), Some("TransactionListWithSplits"));
        assert_eq!(report.header.start_period, "2024-01-01");
        assert_eq!(report.header.end_period, "2024-01-31");
        assert_eq!(report.header.currency.as_deref(), Some("USD"));
        assert_eq!(
            report.header.options,
            vec![ReportOption {
                name: "NoReportData".to_string(),
                value: "false".to_string()
            }]
        );
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let body = sample();
        let first = parse_report("TransactionListWithSplits", &body).unwrap();
        let second = parse_report("TransactionListWithSplits", &body).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_columns_infers_width() {
        let body = json!({
            "Rows": {"Row": [
                {"ColData": [{"value": "a"}]},
                {"Rows": {"Row": {"ColData": [{"value": "b"}, {"value": "c"}, {"value": "d"}]}}}
            ]}
        });
        let report = parse_report("GeneralLedger", &body).unwrap();
        assert_eq!(report.columns, vec!["Col 1", "Col 2", "Col 3"]);
        assert_eq!(values(&report), vec![vec!["a", "", ""], vec!["b", "c", "d"]]);
    }

    #[test]
    fn test_wide_rows_are_not_truncated() {
        let body = json!({
            "Columns": {"Column": [{"ColTitle": "A"}]},
            "Rows": {"Row": [{"ColData": [{"value": "1"}, {"value": "2"}]}]}
        });
        let report = parse_report("GeneralLedger", &body).unwrap();
        assert_eq!(values(&report), vec![vec!["1", "2"]]);
    }

    #[test]
    fn test_report_wrapper_is_unwrapped() {
        let body = json!({"Report": sample()});
        let report = parse_report("TransactionListWithSplits", &body).unwrap();
        assert_eq!(report.rows.len(), 3);
    }

    #[test]
    fn test_nested_sections_keep_pre_order() {
        let body = json!({
            "Columns": {"Column": [{"ColTitle": "Name"}]},
            "Rows": {"Row": [
                {
                    "Rows": {"Row": [
                        {
                            "Rows": {"Row": [{"ColData": [{"value": "inner"}]}]},
                            "Summary": {"ColData": [{"value": "inner total"}]}
                        },
                        {"ColData": [{"value": "sibling"}]}
                    ]},
                    "Summary": {"ColData": [{"value": "outer total"}]}
                },
                {"ColData": [{"value": "last"}]}
            ]}
        });
        let report = parse_report("BalanceSheet", &body).unwrap();
        assert_eq!(
            values(&report),
            vec![
                vec!["inner"],
                vec!["inner total"],
                vec!["sibling"],
                vec!["outer total"],
                vec!["last"],
            ]
        );
    }

    #[test]
    fn test_cell_value_extraction() {
        assert_eq!(cell_value(&json!("plain")), "plain");
        assert_eq!(cell_value(&json!(12.5)), "12.5");
        assert_eq!(cell_value(&json!({"value": null})), "");
        assert_eq!(cell_value(&json!({"value": 42})), "42");
        assert_eq!(cell_value(&json!({"value": {"#text": "nested"}})), "nested");
        assert_eq!(cell_value(&json!({"text": "t", "name": "n"})), "t");
        assert_eq!(cell_value(&json!({"amount": 3})), "3");
        assert_eq!(cell_value(&json!({"id": "", "href": {"x": " "}})), "");
        assert_eq!(cell_value(&json!({"href": "http://x"})), r#"{"href":"http://x"}"#);
    }

    #[test]
    fn test_rejects_bodies_without_report_shape() {
        let err = parse_report("ProfitAndLoss", &json!({"Header": {}})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error parsing ProfitAndLoss report: report has neither Columns nor Rows"
        );
        assert!(parse_report("ProfitAndLoss", &json!([1, 2])).is_err());

        let err = parse_report_str("ProfitAndLoss", "{not json").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Parse { ref endpoint, .. } if endpoint == "ProfitAndLoss"
        ));
    }

    #[test]
    fn test_section_header_is_kept_on_tree_only() {
        let node = decode_node(&json!({
            "Header": {"ColData": [{"value": "Checking"}]},
            "Rows": {"Row": [{"ColData": [{"value": "x"}]}]}
        }));
        match &node {
            RowNode::Section { header, rows, summary } => {
                assert_eq!(header.as_ref().map(|h| h[0].value.as_str()), Some("Checking"));
                assert_eq!(rows.len(), 1);
                assert!(summary.is_none());
            }
            other => panic!("expected section, got {other:?}"),
        }
        let mut out = Vec::new();
        node.flatten_into(&mut out);
        assert_eq!(out.len(), 1);
    }
}
