// src/services/core/backends/mod.rs

pub mod cloud_client;
pub mod http;
pub mod server_client;

pub use cloud_client::{CloudClientConfig, CloudPosClient};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use server_client::{OnPremPosClient, ServerClientConfig};
