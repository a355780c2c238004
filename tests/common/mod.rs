//! Shared helpers: a gateway server on an ephemeral port backed by a scratch models directory.

#![allow(dead_code)]

use mlgateway_core::models::FrameworkAdapter;
use mlgateway_core::server::RequestProcessor;
use mlgateway_core::service::proto::TrainRequest;
use mlgateway_core::service::{ModelGatewayClient, ModelGatewayService};
use mlgateway_core::storage::ModelRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tonic::transport::{Channel, Server};

pub const FEATURES_AND_TARGETS: &str = r#"{"features": [[1, 2], [2, 3], [3, 4], [4, 5]], "target": [0, 0, 1, 1]}"#;

pub struct TestServer {
    pub client: ModelGatewayClient<Channel>,
    pub processor: Arc<RequestProcessor>,
    pub dir: TempDir,
    pub handle: tokio::task::JoinHandle<()>,
}

pub fn test_processor(dir: &TempDir, chunk_size: usize) -> Arc<RequestProcessor> {
    let registry = ModelRegistry::open(dir.path()).expect("open registry");
    Arc::new(RequestProcessor::new(
        Arc::new(registry),
        FrameworkAdapter::default(),
        chunk_size,
    ))
}

pub async fn start_test_server() -> TestServer {
    start_test_server_with_chunk_size(1024).await
}

pub async fn start_test_server_with_chunk_size(chunk_size: usize) -> TestServer {
    let dir = TempDir::new().expect("temp dir");
    let processor = test_processor(&dir, chunk_size);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let service = ModelGatewayService::new(Arc::clone(&processor)).into_server(16 * 1024 * 1024);

    let handle = tokio::spawn(async move {
        if let Err(e) = Server::builder()
            .add_service(service)
            .serve_with_incoming(incoming)
            .await
        {
            eprintln!("Test server failed: {}", e);
        }
    });

    let client = ModelGatewayClient::connect(format!("http://{}", addr))
        .await
        .expect("connect");

    TestServer {
        client,
        processor,
        dir,
        handle,
    }
}

pub fn train_request(model_name: &str) -> TrainRequest {
    TrainRequest {
        training_data: FEATURES_AND_TARGETS.to_string(),
        model_name: model_name.to_string(),
        hyperparameters: HashMap::from([
            ("model_type".to_string(), "classification".to_string()),
            ("n_estimators".to_string(), "10".to_string()),
        ]),
        validate: true,
        framework: String::new(),
        initial_stage: String::new(),
    }
}
