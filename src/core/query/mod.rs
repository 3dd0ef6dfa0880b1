pub mod query_models;

pub use query_models::{
    DateRange, Filter, FilterClause, Query, QueryError, ReportKind, ReportOptions,
};
