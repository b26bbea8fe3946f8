pub mod aggregate_table;
pub mod metadata;
pub mod product;
pub mod series_frame;
pub mod station;
pub mod time_range;
