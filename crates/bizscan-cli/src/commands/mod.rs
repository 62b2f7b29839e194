pub mod config;
pub mod extract;
pub mod payload;
pub mod scan;
