pub mod account_groups;
pub mod config;
pub mod credentials;
pub mod duration;
pub mod error;
pub mod export;
pub mod format;
pub mod http;
pub mod oauth;
pub mod qbo;
pub mod ramp;
