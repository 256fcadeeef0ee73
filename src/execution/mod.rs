pub mod engine;
pub mod result;

pub use engine::SqlExecutor;
pub use result::QueryResult;
