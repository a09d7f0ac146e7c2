//! Utility functions and types

pub mod data_loader;
mod parallel;

pub use data_loader::{column_names, columns_to_array2, load_csv, target_to_array1};
pub use parallel::ParallelConfig;
