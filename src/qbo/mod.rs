//! QuickBooks Online: OAuth, entity queries and reports.

mod auth;
mod client;
mod range;
pub mod report;
mod session;

pub use auth::{AuthorizationCallback, QboAuth, RedirectListener, WellKnownInfo};
pub use client::{validate_entity, QboClient};
pub use range::{ReportRange, ReportRequest};
pub use report::{
    parse_report, parse_report_str, ParsedCell, ParsedReport, ParsedRow, ReportHeader,
    ReportOption, RowKind, RowNode,
};
pub use session::QboSession;
