//! Model gateway: train, version, stage and serve machine-learning models over gRPC.
//!
//! - [`storage`]: the model registry and artifact store
//! - [`models`]: framework backends behind a uniform train/predict/save/load interface
//! - [`server`]: request processing, the instance cache and chunked streaming
//! - [`service`]: the tonic service and its wire messages

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod service;
pub mod storage;

pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use server::RequestProcessor;
pub use service::{ModelGatewayClient, ModelGatewayService};
pub use storage::{ModelRef, ModelRegistry, Stage};
