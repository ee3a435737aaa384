pub mod cascade;
pub mod error;
pub mod extraction;
pub mod traits;
pub mod types;

pub use cascade::{build_forecast, round1};
pub use error::*;
pub use extraction::extract_impacts;
pub use traits::*;
pub use types::*;
