pub mod migrations;
pub mod record_store;

mod sql;

pub use record_store::RecordStore;
