pub mod log_repo;
pub mod result_repo;
pub mod scan_repo;
pub mod template_repo;

pub use log_repo::ScanLogRepository;
pub use result_repo::ScanResultRepository;
pub use scan_repo::ScanRepository;
pub use template_repo::ScanTemplateRepository;
