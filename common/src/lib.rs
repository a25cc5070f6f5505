//! Building blocks shared by every peripheral driver.
//!
//! - [`error`]: the closed status-code enumeration, the error type carried
//!   through `Result`, and the code renderer.

pub mod error;

pub use error::{Error, Result, Status, err_to_string};
