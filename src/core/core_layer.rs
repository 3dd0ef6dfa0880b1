// Report logic and table shaping. Nothing here talks to the network.

#[path = "query/mod.rs"]
pub mod query;

#[path = "table/mod.rs"]
pub mod table;

#[path = "normalize/mod.rs"]
pub mod normalize;

#[path = "reports/mod.rs"]
pub mod reports;

#[path = "keywords/mod.rs"]
pub mod keywords;

#[path = "ads/mod.rs"]
pub mod ads;
