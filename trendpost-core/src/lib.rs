pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod error_recovery;
pub mod error_utils;
pub mod traits;
pub mod types;

pub use catalog::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use error_recovery::*;
pub use error_utils::*;
pub use traits::*;
pub use types::*;
