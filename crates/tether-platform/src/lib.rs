pub mod crash_report;
pub mod paths;

pub use paths::{
    config_dir, crash_report_dir, data_dir, default_working_directory, ensure_dirs, log_dir,
    runtime_dir,
};
