mod result_set;
mod row;

pub use result_set::{ResultSet, UpdateResult};
pub use row::CustomDbRow;
