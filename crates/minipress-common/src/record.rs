use serde_json::{Map, Value};

/// A generic row as the record adapter speaks it: field names mapped to
/// JSON values. Identifiers travel as strings regardless of storage type.
pub type Record = Map<String, Value>;
