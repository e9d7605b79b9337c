mod column;
mod expression;
mod literal;
mod select;
mod sql_type;
mod table;

pub use column::*;
pub use expression::*;
pub use literal::*;
pub use select::*;
pub use sql_type::*;
pub use table::*;
