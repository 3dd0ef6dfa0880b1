//! Google Analytics (GA3 and GA4), Search Console and Google Ads keyword
//! data as normalized tables.
//!
//! - `core/` holds queries, tables, normalization and the report logic,
//!   written against API traits.
//! - `infra/` implements those traits over Google's REST endpoints.
//! - `client/` reads configuration and wires the two together.

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "client/client_layer.rs"]
pub mod client;
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;

pub use crate::client::{GoogalyticsClient, GoogalyticsConfig};
pub use crate::core::query::{Query, ReportKind, ReportOptions};
pub use crate::core::table::{Table, Value};
