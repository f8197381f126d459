pub mod http;
pub mod persistence;
pub mod rate_limit;
