//! Ramp developer API models.
//!
//! Only the fields the exports use are typed; everything else the API sends
//! is kept in `extra`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// A Ramp collection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RampResource {
    Departments,
    Cards,
    Limits,
    Users,
    Transactions,
    AccountingAccounts,
    SpendPrograms,
}

impl RampResource {
    pub const ALL: [RampResource; 7] = [
        Self::Departments,
        Self::Cards,
        Self::Limits,
        Self::Users,
        Self::Transactions,
        Self::AccountingAccounts,
        Self::SpendPrograms,
    ];

    /// Path below `/developer/v1/`.
    pub fn path(self) -> &'static str {
        match self {
            Self::Departments => "departments",
            Self::Cards => "cards",
            Self::Limits => "limits",
            Self::Users => "users",
            Self::Transactions => "transactions",
            Self::AccountingAccounts => "accounting/accounts",
            Self::SpendPrograms => "spend-programs",
        }
    }
}

impl fmt::Display for RampResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for RampResource {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_matches('/').to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "accounts" | "gl-accounts" | "accounting-accounts" => Ok(Self::AccountingAccounts),
            "spend-programs" | "spendprograms" => Ok(Self::SpendPrograms),
            other => Self::ALL
                .into_iter()
                .find(|r| r.path() == other)
                .ok_or_else(|| ClientError::validation(format!("unknown Ramp resource: {s}"))),
        }
    }
}

/// Forward pagination link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

/// One page of a Ramp collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub page: Option<PageLinks>,
}

impl<T> Page<T> {
    pub fn next_link(&self) -> Option<&str> {
        self.page
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_four: Option<String>,
    #[serde(default)]
    pub cardholder_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limit {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// Amount in the currency's minor units.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub card_holder: Option<Value>,
    #[serde(default)]
    pub accounting_date: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendProgram {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// General-ledger account from `accounting/accounts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Four-digit GL code; some accounts have none.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths_and_names() {
        assert_eq!(RampResource::AccountingAccounts.path(), "accounting/accounts");
        assert_eq!("cards".parse::<RampResource>().unwrap(), RampResource::Cards);
        assert_eq!(
            "spend_programs".parse::<RampResource>().unwrap(),
            RampResource::SpendPrograms
        );
        assert_eq!(
            "accounting/accounts".parse::<RampResource>().unwrap(),
            RampResource::AccountingAccounts
        );
        assert_eq!(
            "accounts".parse::<RampResource>().unwrap(),
            RampResource::AccountingAccounts
        );
        assert!("bills".parse::<RampResource>().is_err());
    }

    #[test]
    fn test_page_keeps_unknown_fields() {
        let body = r#"{
            "data": [{"id": "d1", "name": "Ops", "parent_id": null}],
            "page": {"next": null}
        }"#;
        let page: Page<Department> = serde_json::from_str(body).unwrap();
        assert_eq!(page.data[0].name, "Ops");
        assert!(page.data[0].extra.contains_key("parent_id"));
        assert!(page.next_link().is_none());
    }
}
