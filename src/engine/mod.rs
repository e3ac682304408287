pub mod middleware;
pub mod pipeline;
pub mod request;
pub mod service;
pub mod transport;
