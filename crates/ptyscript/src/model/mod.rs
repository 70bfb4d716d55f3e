pub mod config;
pub mod ids;
pub mod report;
pub mod terminal;

pub use config::*;
pub use ids::RunId;
pub use report::*;
pub use terminal::*;
