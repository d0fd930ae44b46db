//! Input/Output operations for ZFS calculations
//!
//! This module handles logging setup and the result files: the pair matrix
//! as a NumPy array and the tensor summary as YAML.

mod output;

pub use output::{
    compare_reports, read_report, setup_output, write_npy, write_report, ZfsReport,
};
