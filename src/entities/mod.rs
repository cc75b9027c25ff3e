pub mod scan_log;
