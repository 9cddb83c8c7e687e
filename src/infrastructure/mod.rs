pub mod adapters;
pub mod forwarder;
pub mod http_sink;
