//! Ramp developer API: client-credentials auth and paginated collections.

mod client;
pub mod models;

pub use client::{next_start, RampClient};
pub use models::{
    Card, Department, GlAccount, Limit, Page, PageLinks, RampResource, SpendProgram, Transaction,
    User,
};
