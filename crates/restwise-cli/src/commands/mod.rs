pub mod breaks;
pub mod config;
pub mod daemon;
pub mod helpers;
pub mod init;
pub mod report;
