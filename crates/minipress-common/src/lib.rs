pub mod error;
pub mod ident;
pub mod record;

pub use error::{Error, Result};
pub use ident::is_valid_identifier;
pub use record::Record;
