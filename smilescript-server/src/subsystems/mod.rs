pub mod comm_logs;
