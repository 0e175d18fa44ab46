pub mod health_handlers;
pub mod report_handlers;
pub mod scan_handlers;
pub mod template_handlers;

pub use health_handlers::{health_check, root};
