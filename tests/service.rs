mod common;

use common::{start_test_server, train_request};
use mlgateway_core::service::proto::{
    health_check_response::ServingStatus, HealthCheckRequest, ListModelsRequest, ModelInfoRequest,
    ModelStageRequest, ProcessRequest,
};
use std::collections::HashMap;
use tonic::{Code, Request};

#[tokio::test]
async fn test_train_promote_and_list() {
    let mut server = start_test_server().await;

    let trained = server
        .client
        .train_model(Request::new(train_request("m1")))
        .await
        .unwrap()
        .into_inner();
    assert!(trained.success, "{}", trained.error_message);
    assert!(!trained.version.is_empty());
    assert_eq!(trained.stage, "development");
    assert_eq!(trained.model_id, format!("m1_{}", trained.version));
    let accuracy = trained.metrics["accuracy"];
    assert!((0.0..=1.0).contains(&accuracy));

    let changed = server
        .client
        .change_model_stage(Request::new(ModelStageRequest {
            model_name: "m1".into(),
            version: trained.version.clone(),
            current_stage: "development".into(),
            new_stage: "production".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(changed.success, "{}", changed.error_message);
    assert_eq!(changed.previous_stage, "development");
    assert_eq!(changed.new_stage, "production");

    let listed = server
        .client
        .list_models(Request::new(ListModelsRequest {
            stage_filter: "production".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(listed.models.len(), 1);
    assert_eq!(listed.models[0].model_name, "m1");
    assert_eq!(listed.models[0].version, trained.version);
    assert_eq!(listed.models[0].framework, "scikit-learn");
    assert_eq!(listed.models[0].stage, "production");
}

#[tokio::test]
async fn test_process_by_stage_and_version() {
    let mut server = start_test_server().await;
    let trained = server
        .client
        .train_model(Request::new(train_request("m1")))
        .await
        .unwrap()
        .into_inner();
    assert!(trained.success);

    let response = server
        .client
        .process_data(Request::new(ProcessRequest {
            model_name: "m1".into(),
            input_data: "[[1, 2], [4, 5]]".into(),
            parameters: HashMap::from([("include_feature_importance".into(), "true".into())]),
            version: String::new(),
            stage: "development".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success, "{}", response.error_message);
    assert_eq!(response.result, "[0,1]");
    assert!(response.confidence_score > 0.0 && response.confidence_score <= 1.0);
    assert_eq!(response.metadata["version"], trained.version);
    assert_eq!(response.metadata["stage"], "development");
    assert_eq!(response.metadata["framework"], "scikit-learn");
    assert!(response.metadata.contains_key("feature_importances"));
    assert!(response.metadata["processing_time_ms"].parse::<u64>().is_ok());

    // An explicit version wins over a stage that has no version
    let response = server
        .client
        .process_data(Request::new(ProcessRequest {
            model_name: "m1".into(),
            input_data: "[[1, 2]]".into(),
            version: trained.version.clone(),
            stage: "production".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success, "{}", response.error_message);
}

#[tokio::test]
async fn test_unknown_model_is_not_found_everywhere() {
    let mut server = start_test_server().await;

    for (version, stage) in [("", ""), ("20240101120000", ""), ("", "production"), ("", "bogus")] {
        let status = server
            .client
            .get_model_info(Request::new(ModelInfoRequest {
                model_name: "nonexistent".into(),
                version: version.into(),
                stage: stage.into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        let response = server
            .client
            .process_data(Request::new(ProcessRequest {
                model_name: "nonexistent".into(),
                input_data: "[[1, 2]]".into(),
                version: version.into(),
                stage: stage.into(),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(!response.success);
        assert!(response.error_message.contains("nonexistent"));
    }
}

#[tokio::test]
async fn test_stage_expectation_mismatch_changes_nothing() {
    let mut server = start_test_server().await;
    let trained = server
        .client
        .train_model(Request::new(train_request("m1")))
        .await
        .unwrap()
        .into_inner();
    let before = server.processor.registry().get("m1").unwrap();

    let response = server
        .client
        .change_model_stage(Request::new(ModelStageRequest {
            model_name: "m1".into(),
            version: trained.version.clone(),
            current_stage: "staging".into(),
            new_stage: "production".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(!response.success);
    assert!(response.error_message.contains("development"));
    assert_eq!(response.model_name, "m1");
    assert_eq!(response.version, trained.version);
    assert_eq!(server.processor.registry().get("m1").unwrap(), before);

    let response = server
        .client
        .change_model_stage(Request::new(ModelStageRequest {
            model_name: "m1".into(),
            version: trained.version.clone(),
            current_stage: String::new(),
            new_stage: "released".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(!response.success);
    assert!(response.error_message.contains("Invalid stage"));
    assert_eq!(server.processor.registry().get("m1").unwrap(), before);
}

#[tokio::test]
async fn test_failed_training_leaves_registry_and_cache_alone() {
    let mut server = start_test_server().await;
    let trained = server
        .client
        .train_model(Request::new(train_request("m1")))
        .await
        .unwrap()
        .into_inner();
    server
        .client
        .process_data(Request::new(ProcessRequest {
            model_name: "m1".into(),
            input_data: "[[1, 2]]".into(),
            ..Default::default()
        }))
        .await
        .unwrap();
    let registry_before = server.processor.registry().get("m1").unwrap();
    let cache_before = server.processor.cache().stats();
    assert_eq!(cache_before.cached_models, 1);

    // Targets that do not match the number of samples fail inside the backend
    let mut bad = train_request("m1");
    bad.training_data = r#"{"features": [[1, 2], [2, 3]], "target": [0]}"#.into();
    let response = server.client.train_model(Request::new(bad)).await.unwrap().into_inner();
    assert!(!response.success);
    assert!(!response.error_message.is_empty());

    let mut unknown_algorithm = train_request("m2");
    unknown_algorithm
        .hyperparameters
        .insert("algorithm".into(), "gradient_boosting".into());
    let response = server
        .client
        .train_model(Request::new(unknown_algorithm))
        .await
        .unwrap()
        .into_inner();
    assert!(!response.success);

    assert_eq!(server.processor.registry().get("m1").unwrap(), registry_before);
    assert!(server.processor.registry().get("m2").is_none());
    assert_eq!(server.processor.cache().stats(), cache_before);
    assert_eq!(registry_before.latest_version, trained.version);
}

#[tokio::test]
async fn test_latest_follows_creation_order_across_stage_changes() {
    let mut server = start_test_server().await;
    let mut versions = Vec::new();
    for _ in 0..3 {
        let trained = server
            .client
            .train_model(Request::new(train_request("m1")))
            .await
            .unwrap()
            .into_inner();
        assert!(trained.success, "{}", trained.error_message);
        versions.push(trained.version);
    }
    let mut sorted = versions.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, versions);

    // Promote the oldest; the latest must not move
    let changed = server
        .client
        .change_model_stage(Request::new(ModelStageRequest {
            model_name: "m1".into(),
            version: versions[0].clone(),
            current_stage: String::new(),
            new_stage: "production".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(changed.success);

    let info = server
        .client
        .get_model_info(Request::new(ModelInfoRequest {
            model_name: "m1".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.version, versions[2]);
    assert_eq!(info.available_versions, versions);
    assert_eq!(info.stage_versions["production"], versions[0]);
    assert_eq!(info.stage_versions["development"], versions[2]);
    assert!(info.properties.contains_key("metric_accuracy"));
    assert_eq!(info.supported_operations, vec!["predict".to_string()]);

    let entry = server.processor.registry().get("m1").unwrap();
    assert!(entry.is_consistent());
}

#[tokio::test]
async fn test_list_models_filters_and_errors() {
    let mut server = start_test_server().await;
    for name in ["a", "b"] {
        let trained = server
            .client
            .train_model(Request::new(train_request(name)))
            .await
            .unwrap()
            .into_inner();
        assert!(trained.success);
    }

    let all = server
        .client
        .list_models(Request::new(ListModelsRequest::default()))
        .await
        .unwrap()
        .into_inner();
    let names: Vec<_> = all.models.iter().map(|m| m.model_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    let production = server
        .client
        .list_models(Request::new(ListModelsRequest {
            stage_filter: "production".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(production.models.is_empty());

    let pytorch = server
        .client
        .list_models(Request::new(ListModelsRequest {
            framework_filter: "pytorch".into(),
            include_all_versions: true,
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(pytorch.models.is_empty());

    let status = server
        .client
        .list_models(Request::new(ListModelsRequest {
            stage_filter: "live".into(),
            ..Default::default()
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_pytorch_model_round_trip() {
    let mut server = start_test_server().await;
    let mut request = train_request("net");
    request.framework = "pytorch".into();
    request.hyperparameters = HashMap::from([
        ("model_type".into(), "classification".into()),
        ("hidden_units".into(), "8".into()),
        ("epochs".into(), "50".into()),
    ]);
    let trained = server.client.train_model(Request::new(request)).await.unwrap().into_inner();
    assert!(trained.success, "{}", trained.error_message);
    assert!(trained.metrics.contains_key("final_loss"));

    let info = server
        .client
        .get_model_info(Request::new(ModelInfoRequest {
            model_name: "net".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(info.framework, "pytorch");
    assert!(info.properties.contains_key("architecture"));

    let response = server
        .client
        .process_data(Request::new(ProcessRequest {
            model_name: "net".into(),
            input_data: "[[1, 2], [4, 5]]".into(),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.success, "{}", response.error_message);
    let labels: Vec<i64> = serde_json::from_str(&response.result).unwrap();
    assert_eq!(labels.len(), 2);

    // A model's framework is fixed by its first version
    let retrain = train_request("net");
    let response = server.client.train_model(Request::new(retrain)).await.unwrap().into_inner();
    assert!(!response.success);
    assert!(response.error_message.contains("pytorch"));
}

#[tokio::test]
async fn test_tensorflow_is_unavailable() {
    let mut server = start_test_server().await;
    let mut request = train_request("tf");
    request.framework = "tensorflow".into();
    let response = server.client.train_model(Request::new(request)).await.unwrap().into_inner();
    assert!(!response.success);
    assert!(response.error_message.contains("tensorflow"));
    assert_eq!(server.processor.registry().model_count(), 0);
}

#[tokio::test]
async fn test_health_check() {
    let mut server = start_test_server().await;
    let response = server
        .client
        .check_health(Request::new(HealthCheckRequest::default()))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status(), ServingStatus::Serving);
    assert!(response.message.starts_with("Service is healthy. Uptime: "));
    assert!(response.message.contains("Models: 0."));
    assert!(response.message.ends_with("Frameworks: scikit-learn, pytorch"));

    std::fs::remove_dir_all(server.dir.path()).unwrap();
    let response = server
        .client
        .check_health(Request::new(HealthCheckRequest::default()))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status(), ServingStatus::NotServing);
    assert!(response.message.starts_with("Service is unhealthy: "));
}
