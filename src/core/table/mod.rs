pub mod derived_columns;
pub mod table_models;
pub mod table_service;

pub use derived_columns::Labeler;
pub use table_models::{
    Backend, ErrorTag, FetchError, PropertyQuota, QuotaStatus, Row, Table, TableError,
    TableMetadata, Value,
};
pub use table_service::{
    add_row_id, bin_by_position, bool_column_to_int, fill_missing_metrics, filter_google_organic,
    join_on_dimensions, JoinHow, DEFAULT_POSITION_BINS,
};
