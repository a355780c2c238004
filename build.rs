//! Build script generating the ModelGateway gRPC server and client.
//!
//! Messages are hand-written prost structs in `src/service/proto.rs`, so the
//! manual builder is used and no `protoc` is required.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> tonic_build::manual::MethodBuilder {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::service::proto::{}", input))
        .output_type(format!("crate::service::proto::{}", output))
        .codec_path(CODEC)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let service = Service::builder()
        .name("ModelGateway")
        .package("modelgateway.v1")
        .method(method("process_data", "ProcessData", "ProcessRequest", "ProcessResponse").build())
        .method(
            method("process_data_stream", "ProcessDataStream", "ProcessRequest", "ProcessResponseChunk")
                .server_streaming()
                .build(),
        )
        .method(method("train_model", "TrainModel", "TrainRequest", "TrainResponse").build())
        .method(
            method("train_model_stream", "TrainModelStream", "TrainRequestChunk", "TrainResponse")
                .client_streaming()
                .build(),
        )
        .method(method("get_model_info", "GetModelInfo", "ModelInfoRequest", "ModelInfoResponse").build())
        .method(method("list_models", "ListModels", "ListModelsRequest", "ListModelsResponse").build())
        .method(
            method("change_model_stage", "ChangeModelStage", "ModelStageRequest", "ModelStageResponse")
                .build(),
        )
        .method(method("check_health", "CheckHealth", "HealthCheckRequest", "HealthCheckResponse").build())
        .build();

    Builder::new().compile(&[service]);
}
