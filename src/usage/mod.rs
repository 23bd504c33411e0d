pub mod scanner;

pub use scanner::{ProjectIndex, SessionHistory};
