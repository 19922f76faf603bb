//! Named ranges of four-digit GL account codes.
//!
//! Codes are fixed-width, so string comparison orders them numerically.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    Departmental,
    GeneralLedger,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Departmental => f.write_str("departmental"),
            Self::GeneralLedger => f.write_str("general-ledger"),
        }
    }
}

impl FromStr for GroupKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "departmental" | "department" => Ok(Self::Departmental),
            "general-ledger" | "generalledger" | "gl" => Ok(Self::GeneralLedger),
            _ => Err(ClientError::validation(format!("unknown account group kind: {s}"))),
        }
    }
}

/// Inclusive `[start, end]` range of account codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountRange {
    pub start: &'static str,
    pub end: &'static str,
}

impl AccountRange {
    const fn new(start: &'static str, end: &'static str) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, account: &str) -> bool {
        account >= self.start && account <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountGroup {
    pub name: &'static str,
    pub kind: GroupKind,
    pub ranges: &'static [AccountRange],
}

impl AccountGroup {
    pub fn contains(&self, account: &str) -> bool {
        self.ranges.iter().any(|r| r.contains(account))
    }
}

const fn group(
    name: &'static str,
    kind: GroupKind,
    ranges: &'static [AccountRange],
) -> AccountGroup {
    AccountGroup { name, kind, ranges }
}

use GroupKind::{Departmental, GeneralLedger};

pub const ACCOUNT_GROUPS: &[AccountGroup] = &[
    group("Board", Departmental, &[AccountRange::new("6000", "6099")]),
    group("Brand", Departmental, &[AccountRange::new("6100", "6149")]),
    group("ComDev", Departmental, &[AccountRange::new("6150", "6199")]),
    group(
        "Conferences",
        Departmental,
        &[AccountRange::new("4000", "4099"), AccountRange::new("6200", "6299")],
    ),
    group("Diversity", Departmental, &[AccountRange::new("6900", "6999")]),
    group(
        "Fundraising",
        Departmental,
        &[
            AccountRange::new("2100", "2199"),
            AccountRange::new("2200", "2299"),
            AccountRange::new("4150", "4199"),
            AccountRange::new("4200", "4299"),
            AccountRange::new("6300", "6399"),
        ],
    ),
    group("Gov Affairs", Departmental, &[AccountRange::new("7100", "7199")]),
    group("Infrastructure", Departmental, &[AccountRange::new("6400", "6499")]),
    group("Legal Affairs", Departmental, &[AccountRange::new("7200", "7299")]),
    group("Marketing", Departmental, &[AccountRange::new("6600", "6699")]),
    group("Other", Departmental, &[AccountRange::new("8000", "9999")]),
    group("Privacy", Departmental, &[AccountRange::new("7000", "7099")]),
    group(
        "Programs",
        Departmental,
        &[AccountRange::new("4100", "4149"), AccountRange::new("6500", "6599")],
    ),
    group("Reserve", Departmental, &[AccountRange::new("4900", "4999")]),
    group("Security", Departmental, &[AccountRange::new("7300", "7399")]),
    group("Staffing", Departmental, &[AccountRange::new("7500", "7599")]),
    group("TAC", Departmental, &[AccountRange::new("6800", "6899")]),
    group("Tooling", Departmental, &[AccountRange::new("7400", "7499")]),
    group("Treasury", Departmental, &[AccountRange::new("6700", "6799")]),
    group("Assets", GeneralLedger, &[AccountRange::new("1000", "1999")]),
    group("Liabilities", GeneralLedger, &[AccountRange::new("2000", "2999")]),
    group("Equity", GeneralLedger, &[AccountRange::new("3000", "3999")]),
    group("Revenue", GeneralLedger, &[AccountRange::new("4000", "4999")]),
    group("Expenses", GeneralLedger, &[AccountRange::new("5000", "9999")]),
];

pub fn find_group(name: &str) -> Option<&'static AccountGroup> {
    ACCOUNT_GROUPS.iter().find(|g| g.name == name)
}

pub fn groups_of_kind(kind: GroupKind) -> impl Iterator<Item = &'static AccountGroup> {
    ACCOUNT_GROUPS.iter().filter(move |g| g.kind == kind)
}

/// Every group whose ranges cover `account`.
pub fn groups_for_account(account: &str) -> impl Iterator<Item = &'static AccountGroup> + '_ {
    ACCOUNT_GROUPS.iter().filter(move |g| g.contains(account))
}

/// True iff `account` falls in one of the ranges of the group named `group_name`.
/// Missing accounts and unknown groups are never members.
pub fn is_account_in_group(account: Option<&str>, group_name: &str) -> bool {
    let Some(account) = account.filter(|a| !a.is_empty()) else {
        return false;
    };
    find_group(group_name).is_some_and(|g| g.contains(account))
}
