pub mod app;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fasta;
pub mod flatfile;
pub mod mapper;
pub mod metadata;
pub mod output;
pub mod probe;
pub mod progress;
pub mod resolve;
pub mod sequential;
pub mod store;
pub mod transport;
