pub mod comm_log;

pub use comm_log::CommLog;
