pub mod batch_operations;
pub mod bulk_copy;
pub mod client;
pub mod schema;
pub mod sql_type_wrapper;
