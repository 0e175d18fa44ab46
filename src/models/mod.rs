pub mod scan;
pub mod scan_log;
pub mod scan_result;
pub mod template;

// Re-export commonly used types
pub use scan::*;
pub use scan_log::*;
pub use scan_result::*;
pub use template::*;
