pub mod error;
pub mod long_table;
pub mod writer;
