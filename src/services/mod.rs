pub mod nmap;
pub mod normalizer;
pub mod report_service;
pub mod scan_service;
pub mod task_manager;

// Re-export commonly used types
pub use nmap::NmapScanner;
pub use report_service::ReportService;
pub use scan_service::ScanService;
pub use task_manager::TaskManager;
