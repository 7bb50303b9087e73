pub mod aggregate;
pub mod config;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod limiter;
pub mod model;
pub mod parser;
pub mod pipeline;
