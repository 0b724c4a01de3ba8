#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Attribute filters only match primitive values.
    UnsupportedFilter { key: String },
    Config(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnsupportedFilter { key } => {
                write!(f, "filtering by object or array values is not supported (key '{key}')")
            }
            StoreError::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
