mod types;

pub use types::{MuxError, Result};
