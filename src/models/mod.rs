pub mod records;
pub mod requests;
pub mod response;

pub use records::{Fetched, Filters, Page, PageMeta, Payload, Record, RecordId, SqlParam, TableColumns};
pub use response::ApiResponse;
