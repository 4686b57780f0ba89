pub mod log;
pub use log::{init_file_logger, init_stdout_logger};
