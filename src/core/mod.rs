pub mod report_manager;
pub mod services;

pub use report_manager::ReportManager;
