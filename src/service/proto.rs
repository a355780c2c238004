//! Wire messages of `modelgateway.v1.ModelGateway`.
//!
//! The messages are declared directly as prost structs; the server and
//! client stubs are generated from them by `build.rs`.

use std::collections::HashMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessRequest {
    #[prost(string, tag = "1")]
    pub model_name: String,
    /// JSON document handed to the model
    #[prost(string, tag = "2")]
    pub input_data: String,
    #[prost(map = "string, string", tag = "3")]
    pub parameters: HashMap<String, String>,
    #[prost(string, tag = "4")]
    pub version: String,
    #[prost(string, tag = "5")]
    pub stage: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessResponse {
    /// JSON-serialized prediction
    #[prost(string, tag = "1")]
    pub result: String,
    #[prost(bool, tag = "2")]
    pub success: bool,
    #[prost(string, tag = "3")]
    pub error_message: String,
    #[prost(double, tag = "4")]
    pub confidence_score: f64,
    #[prost(map = "string, string", tag = "5")]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessResponseChunk {
    /// Raw bytes of the serialized result; chunk boundaries may split characters
    #[prost(bytes = "bytes", tag = "1")]
    pub result_chunk: ::bytes::Bytes,
    #[prost(bool, tag = "2")]
    pub is_last_chunk: bool,
    #[prost(bool, tag = "3")]
    pub success: bool,
    #[prost(string, tag = "4")]
    pub error_message: String,
    #[prost(uint32, tag = "5")]
    pub chunk_id: u32,
    #[prost(uint32, tag = "6")]
    pub total_chunks: u32,
    #[prost(double, tag = "7")]
    pub confidence_score: f64,
    #[prost(map = "string, string", tag = "8")]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TrainRequest {
    /// JSON `{"features": [[..]], "target": [..]}`
    #[prost(string, tag = "1")]
    pub training_data: String,
    #[prost(string, tag = "2")]
    pub model_name: String,
    #[prost(map = "string, string", tag = "3")]
    pub hyperparameters: HashMap<String, String>,
    #[prost(bool, tag = "4")]
    pub validate: bool,
    /// Defaults to scikit-learn when empty
    #[prost(string, tag = "5")]
    pub framework: String,
    /// Defaults to development when empty
    #[prost(string, tag = "6")]
    pub initial_stage: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TrainRequestChunk {
    #[prost(bytes = "bytes", tag = "1")]
    pub training_data_chunk: ::bytes::Bytes,
    #[prost(bool, tag = "2")]
    pub is_first_chunk: bool,
    #[prost(bool, tag = "3")]
    pub is_last_chunk: bool,
    /// Metadata fields below are read from the first chunk only
    #[prost(string, tag = "4")]
    pub model_name: String,
    #[prost(map = "string, string", tag = "5")]
    pub hyperparameters: HashMap<String, String>,
    #[prost(bool, tag = "6")]
    pub validate: bool,
    #[prost(string, tag = "7")]
    pub framework: String,
    #[prost(string, tag = "8")]
    pub initial_stage: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TrainResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub model_id: String,
    #[prost(map = "string, double", tag = "3")]
    pub metrics: HashMap<String, f64>,
    #[prost(string, tag = "4")]
    pub version: String,
    #[prost(string, tag = "5")]
    pub stage: String,
    #[prost(string, tag = "6")]
    pub error_message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInfoRequest {
    #[prost(string, tag = "1")]
    pub model_name: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(string, tag = "3")]
    pub stage: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelInfoResponse {
    #[prost(string, tag = "1")]
    pub model_name: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(string, tag = "4")]
    pub framework: String,
    #[prost(string, tag = "5")]
    pub stage: String,
    #[prost(string, tag = "6")]
    pub created_at: String,
    #[prost(string, tag = "7")]
    pub updated_at: String,
    #[prost(string, repeated, tag = "8")]
    pub supported_operations: Vec<String>,
    #[prost(map = "string, string", tag = "9")]
    pub properties: HashMap<String, String>,
    #[prost(string, repeated, tag = "10")]
    pub available_versions: Vec<String>,
    #[prost(map = "string, string", tag = "11")]
    pub stage_versions: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListModelsRequest {
    #[prost(string, tag = "1")]
    pub framework_filter: String,
    #[prost(string, tag = "2")]
    pub stage_filter: String,
    #[prost(bool, tag = "3")]
    pub include_all_versions: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelSummary {
    #[prost(string, tag = "1")]
    pub model_name: String,
    #[prost(string, tag = "2")]
    pub version: String,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(string, tag = "4")]
    pub framework: String,
    #[prost(string, tag = "5")]
    pub stage: String,
    #[prost(string, tag = "6")]
    pub created_at: String,
    #[prost(string, tag = "7")]
    pub updated_at: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListModelsResponse {
    #[prost(message, repeated, tag = "1")]
    pub models: Vec<ModelSummary>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelStageRequest {
    #[prost(string, tag = "1")]
    pub model_name: String,
    #[prost(string, tag = "2")]
    pub version: String,
    /// Optional expectation; empty means "any"
    #[prost(string, tag = "3")]
    pub current_stage: String,
    #[prost(string, tag = "4")]
    pub new_stage: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelStageResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub model_name: String,
    #[prost(string, tag = "3")]
    pub version: String,
    #[prost(string, tag = "4")]
    pub previous_stage: String,
    #[prost(string, tag = "5")]
    pub new_stage: String,
    #[prost(string, tag = "6")]
    pub error_message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {
    #[prost(string, tag = "1")]
    pub component: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
    #[prost(enumeration = "health_check_response::ServingStatus", tag = "1")]
    pub status: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

pub mod health_check_response {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ServingStatus {
        Unknown = 0,
        Serving = 1,
        NotServing = 2,
    }
}

include!(concat!(env!("OUT_DIR"), "/modelgateway.v1.ModelGateway.rs"));
