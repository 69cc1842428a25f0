pub mod csrf;
pub mod models;

pub use csrf::{CsrfError, CsrfService};
