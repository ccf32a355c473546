//! Filter ops that narrow the working index set.

mod category_keys_op;
pub use category_keys_op::*;

mod variable_range_op;
pub use variable_range_op::*;

mod identifier_list_op;
pub use identifier_list_op::*;
