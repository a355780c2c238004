//! gRPC surface of the gateway

pub mod grpc;
pub mod proto;

pub use grpc::ModelGatewayService;
pub use proto::model_gateway_client::ModelGatewayClient;
pub use proto::model_gateway_server::ModelGatewayServer;
