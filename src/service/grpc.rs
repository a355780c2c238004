//! tonic implementation of the ModelGateway service.
//!
//! Processing, training and stage changes report failures inside their
//! response messages; model info and listing use gRPC status codes; the
//! health check never fails.

use super::proto::{
    health_check_response::ServingStatus, model_gateway_server::ModelGateway,
    model_gateway_server::ModelGatewayServer, HealthCheckRequest, HealthCheckResponse, ListModelsRequest,
    ListModelsResponse, ModelInfoRequest, ModelInfoResponse, ModelStageRequest, ModelStageResponse,
    ModelSummary, ProcessRequest, ProcessResponse, ProcessResponseChunk, TrainRequest, TrainRequestChunk,
    TrainResponse,
};
use crate::error::Error;
use crate::server::processor::join_frameworks;
use crate::server::{ModelInfo, RequestProcessor, ResultChunk, TrainingChunk, TrainingOutcome, TrainingRequest};
use crate::storage::model_ref::non_empty;
use crate::storage::{self, ModelRef};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tonic::{Request, Response, Status, Streaming};
use tracing::{error, info, warn};

pub struct ModelGatewayService {
    processor: Arc<RequestProcessor>,
}

impl ModelGatewayService {
    pub fn new(processor: Arc<RequestProcessor>) -> Self {
        Self { processor }
    }

    /// Wrap in a tonic server with `max_message_size` bytes allowed each way.
    pub fn into_server(self, max_message_size: usize) -> ModelGatewayServer<Self> {
        ModelGatewayServer::new(self)
            .max_decoding_message_size(max_message_size)
            .max_encoding_message_size(max_message_size)
    }
}

impl From<ResultChunk> for ProcessResponseChunk {
    fn from(chunk: ResultChunk) -> Self {
        Self {
            result_chunk: chunk.data,
            is_last_chunk: chunk.is_last_chunk,
            success: chunk.success,
            error_message: chunk.error_message,
            chunk_id: chunk.chunk_id,
            total_chunks: chunk.total_chunks,
            confidence_score: chunk.confidence,
            metadata: chunk.metadata.into_iter().collect(),
        }
    }
}

impl From<TrainRequestChunk> for TrainingChunk {
    fn from(chunk: TrainRequestChunk) -> Self {
        Self {
            data: chunk.training_data_chunk,
            is_first_chunk: chunk.is_first_chunk,
            is_last_chunk: chunk.is_last_chunk,
            model_name: chunk.model_name,
            hyperparameters: chunk.hyperparameters.into_iter().collect(),
            validate: chunk.validate,
            framework: chunk.framework,
            initial_stage: chunk.initial_stage,
        }
    }
}

impl From<TrainRequest> for TrainingRequest {
    fn from(req: TrainRequest) -> Self {
        Self {
            training_data: req.training_data,
            model_name: req.model_name,
            hyperparameters: req.hyperparameters.into_iter().collect(),
            validate: req.validate,
            framework: non_empty(&req.framework),
            initial_stage: non_empty(&req.initial_stage),
        }
    }
}

impl From<ModelInfo> for ModelInfoResponse {
    fn from(info: ModelInfo) -> Self {
        Self {
            model_name: info.model_name,
            version: info.version,
            description: info.description,
            framework: info.framework.to_string(),
            stage: info.stage.to_string(),
            created_at: info.created_at.to_rfc3339(),
            updated_at: info.updated_at.to_rfc3339(),
            supported_operations: info.supported_operations,
            properties: info.properties.into_iter().collect(),
            available_versions: info.available_versions,
            stage_versions: info.stage_versions.into_iter().collect(),
        }
    }
}

impl From<storage::ModelSummary> for ModelSummary {
    fn from(summary: storage::ModelSummary) -> Self {
        Self {
            model_name: summary.model_name,
            version: summary.version,
            description: summary.description,
            framework: summary.framework.to_string(),
            stage: summary.stage.to_string(),
            created_at: summary.created_at.to_rfc3339(),
            updated_at: summary.updated_at.to_rfc3339(),
        }
    }
}

fn train_response(result: Result<TrainingOutcome, Error>, model_name: &str) -> TrainResponse {
    match result {
        Ok(outcome) => TrainResponse {
            success: true,
            model_id: outcome.model_id,
            metrics: outcome.metrics.into_iter().collect(),
            version: outcome.version,
            stage: outcome.stage.to_string(),
            error_message: String::new(),
        },
        Err(e) => {
            error!("Error training model {}: {}", model_name, e);
            TrainResponse {
                success: false,
                error_message: e.to_string(),
                ..Default::default()
            }
        }
    }
}

#[tonic::async_trait]
impl ModelGateway for ModelGatewayService {
    type ProcessDataStreamStream = Pin<Box<dyn Stream<Item = Result<ProcessResponseChunk, Status>> + Send + 'static>>;

    async fn process_data(&self, request: Request<ProcessRequest>) -> Result<Response<ProcessResponse>, Status> {
        let req = request.into_inner();
        let model = ModelRef::from_parts(&req.model_name, &req.version, &req.stage);
        info!("Processing request for model {}", model);

        let response = match self.processor.process(&req.input_data, &model, &req.parameters).await {
            Ok(processed) => ProcessResponse {
                result: processed.result,
                success: true,
                error_message: String::new(),
                confidence_score: processed.confidence,
                metadata: processed.metadata.into_iter().collect(),
            },
            Err(e) => {
                error!("Error processing request for model {}: {}", model, e);
                ProcessResponse {
                    success: false,
                    error_message: e.to_string(),
                    ..Default::default()
                }
            }
        };
        Ok(Response::new(response))
    }

    async fn process_data_stream(
        &self,
        request: Request<ProcessRequest>,
    ) -> Result<Response<Self::ProcessDataStreamStream>, Status> {
        let req = request.into_inner();
        let model = ModelRef::from_parts(&req.model_name, &req.version, &req.stage);
        info!("Processing streaming request for model {}", model);

        let chunks = self
            .processor
            .process_stream(&req.input_data, &model, &req.parameters)
            .await;
        let stream = tokio_stream::iter(chunks.map(|chunk| Ok::<_, Status>(ProcessResponseChunk::from(chunk))));
        Ok(Response::new(Box::pin(stream)))
    }

    async fn train_model(&self, request: Request<TrainRequest>) -> Result<Response<TrainResponse>, Status> {
        let req = request.into_inner();
        let model_name = req.model_name.clone();
        info!("Training model {}", model_name);
        let result = self.processor.train(req.into()).await;
        Ok(Response::new(train_response(result, &model_name)))
    }

    async fn train_model_stream(
        &self,
        request: Request<Streaming<TrainRequestChunk>>,
    ) -> Result<Response<TrainResponse>, Status> {
        info!("Receiving streamed training data");
        let chunks = request
            .into_inner()
            .map(|chunk| chunk.map(TrainingChunk::from).map_err(Error::from));
        let result = self.processor.train_stream(chunks).await;
        Ok(Response::new(train_response(result, "<streamed>")))
    }

    async fn get_model_info(
        &self,
        request: Request<ModelInfoRequest>,
    ) -> Result<Response<ModelInfoResponse>, Status> {
        let req = request.into_inner();
        let model = ModelRef::from_parts(&req.model_name, &req.version, &req.stage);
        info!("Getting info for model {}", model);

        match self.processor.model_info(&model) {
            Ok(info) => Ok(Response::new(info.into())),
            Err(e) => {
                warn!("Error getting model info for {}: {}", model, e);
                Err(e.into())
            }
        }
    }

    async fn list_models(&self, request: Request<ListModelsRequest>) -> Result<Response<ListModelsResponse>, Status> {
        let req = request.into_inner();
        let summaries = self
            .processor
            .list(
                Some(req.framework_filter.as_str()).filter(|f| !f.is_empty()),
                Some(req.stage_filter.as_str()).filter(|s| !s.is_empty()),
                req.include_all_versions,
            )
            .map_err(|e| {
                warn!("Error listing models: {}", e);
                Status::from(e)
            })?;
        info!("Listing {} models", summaries.len());
        Ok(Response::new(ListModelsResponse {
            models: summaries.into_iter().map(ModelSummary::from).collect(),
        }))
    }

    async fn change_model_stage(
        &self,
        request: Request<ModelStageRequest>,
    ) -> Result<Response<ModelStageResponse>, Status> {
        let req = request.into_inner();
        info!(
            "Changing stage of model {} version {} to {}",
            req.model_name, req.version, req.new_stage
        );

        let result = self
            .processor
            .change_stage(
                &req.model_name,
                &req.version,
                Some(req.current_stage.as_str()).filter(|s| !s.is_empty()),
                &req.new_stage,
            )
            .await;
        let response = match result {
            Ok(change) => ModelStageResponse {
                success: true,
                model_name: change.model_name,
                version: change.version,
                previous_stage: change.previous_stage.to_string(),
                new_stage: change.new_stage.to_string(),
                error_message: String::new(),
            },
            Err(e) => {
                error!(
                    "Error changing stage of model {} version {}: {}",
                    req.model_name, req.version, e
                );
                ModelStageResponse {
                    success: false,
                    model_name: req.model_name,
                    version: req.version,
                    error_message: e.to_string(),
                    ..Default::default()
                }
            }
        };
        Ok(Response::new(response))
    }

    async fn check_health(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let response = match self.processor.health() {
            Ok(report) => HealthCheckResponse {
                status: ServingStatus::Serving as i32,
                message: format!(
                    "Service is healthy. Uptime: {:.2}s. Models: {}. Frameworks: {}",
                    report.uptime.as_secs_f64(),
                    report.models,
                    join_frameworks(&report.frameworks)
                ),
            },
            Err(e) => {
                error!("Health check failed: {}", e);
                HealthCheckResponse {
                    status: ServingStatus::NotServing as i32,
                    message: format!("Service is unhealthy: {}", e),
                }
            }
        };
        Ok(Response::new(response))
    }
}
