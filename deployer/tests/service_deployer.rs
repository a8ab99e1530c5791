mod common;

use cloud_api::run::{Container, Service};
use common::{MockCloud, PROJECT, REGION};
use rundeploy::deploy::fsm::ServiceState;
use rundeploy::deploy::service::{
    RevisionRequest, ServiceDeployer, ServiceOptions, MANAGED_BY_LABEL, PATH_LABEL, REVISION_LABEL,
};
use rundeploy::errors::{ApiError, DeployError, RpcCode};
use rundeploy::models::DeploymentPath;
use rundeploy::progress::{Progress, ProgressLevel, RecordingProgress};
use rundeploy::retry::RetryOptions;

fn request(skip_invoker_check: bool) -> RevisionRequest {
    RevisionRequest {
        service_id: "web".to_string(),
        container: Container {
            image: "us-docker.pkg.dev/cloudrun/container/hello".to_string(),
            ..Default::default()
        },
        skip_invoker_check,
        path: DeploymentPath::Image,
        revision_label: "rev-20260101-000000-000".to_string(),
    }
}

async fn deploy(
    cloud: &std::sync::Arc<MockCloud>,
    request: RevisionRequest,
    sink: &RecordingProgress,
) -> Result<Service, DeployError> {
    let clients = cloud.clients();
    let progress = Progress::new(sink);
    let options = ServiceOptions::default();
    let retry = RetryOptions::immediate();
    ServiceDeployer::new(clients.run.as_ref(), PROJECT, REGION, &options, &retry, &progress)
        .deploy_revision(request)
        .await
}

fn rejects_public_access(service: &Service) -> Option<ApiError> {
    service.invoker_iam_disabled.map(|_| {
        ApiError::new(
            RpcCode::FailedPrecondition,
            "dry run",
            "One or more users named in the policy do not belong to a permitted customer: constraints/iam.allowedPolicyMemberDomains",
        )
    })
}

fn rejects_everything(_: &Service) -> Option<ApiError> {
    Some(ApiError::new(
        RpcCode::ResourceExhausted,
        "dry run",
        "Quota exceeded for total allowable CPU per project per region",
    ))
}

#[tokio::test(start_paused = true)]
async fn new_service_is_validated_then_created() {
    let cloud = MockCloud::ready();
    let sink = RecordingProgress::new();

    let service = deploy(&cloud, request(false), &sink).await.unwrap();

    assert_eq!(service.uri.as_deref(), Some("https://web-abc123-ew.a.run.app"));
    assert_eq!(cloud.count("run.get_service"), 2);
    assert_eq!(cloud.count("run.dry_run_create"), 1);
    assert_eq!(cloud.count("run.create"), 1);
    assert_eq!(cloud.count("run.update"), 0);

    let committed = cloud.with_state(|s| s.committed.clone());
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].labels[MANAGED_BY_LABEL], "rundeploy");
    assert_eq!(committed[0].labels[PATH_LABEL], "image");
    assert_eq!(
        committed[0].template.labels[REVISION_LABEL],
        "rev-20260101-000000-000"
    );
    assert_eq!(committed[0].invoker_iam_disabled, None);
}

#[tokio::test(start_paused = true)]
async fn existing_service_is_updated() {
    let cloud = MockCloud::ready();
    cloud.add_service("web");
    let sink = RecordingProgress::new();

    deploy(&cloud, request(true), &sink).await.unwrap();

    assert_eq!(cloud.count("run.dry_run_update"), 1);
    assert_eq!(cloud.count("run.update"), 1);
    assert_eq!(cloud.count("run.create"), 0);
    assert_eq!(cloud.count("run.dry_run_create"), 0);

    let committed = cloud.with_state(|s| s.committed.clone());
    assert_eq!(
        committed[0].name,
        format!("projects/{}/locations/{}/services/web", PROJECT, REGION)
    );
    assert_eq!(committed[0].invoker_iam_disabled, Some(true));
}

#[tokio::test(start_paused = true)]
async fn iam_rejection_drops_the_invoker_flag() {
    let cloud = MockCloud::ready();
    cloud.with_state(|s| s.dry_run_rule = Some(rejects_public_access));
    let sink = RecordingProgress::new();

    deploy(&cloud, request(true), &sink).await.unwrap();

    // Exactly one real mutation, without the flag
    assert_eq!(cloud.count("run.dry_run_create"), 1);
    assert_eq!(cloud.count("run.create"), 1);
    let committed = cloud.with_state(|s| s.committed.clone());
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].invoker_iam_disabled, None);

    assert!(sink
        .events()
        .iter()
        .any(|e| e.level == ProgressLevel::Warn && e.message.contains("Public access")));
}

#[tokio::test(start_paused = true)]
async fn unexplained_dry_run_failure_mutates_nothing() {
    let cloud = MockCloud::ready();
    cloud.with_state(|s| s.dry_run_rule = Some(rejects_everything));
    let sink = RecordingProgress::new();

    let err = deploy(&cloud, request(true), &sink).await.unwrap_err();

    match err {
        DeployError::DryRunFailed(api) => assert_eq!(api.code, RpcCode::ResourceExhausted),
        other => panic!("expected a dry run failure, got {:?}", other),
    }
    assert_eq!(cloud.count("run.create"), 0);
    assert!(cloud.with_state(|s| s.committed.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn invalid_argument_only_falls_back_with_the_flag() {
    fn invalid(_: &Service) -> Option<ApiError> {
        Some(ApiError::new(RpcCode::InvalidArgument, "dry run", "bad field"))
    }

    let cloud = MockCloud::ready();
    cloud.with_state(|s| s.dry_run_rule = Some(invalid));
    let sink = RecordingProgress::new();

    let err = deploy(&cloud, request(false), &sink).await.unwrap_err();
    assert!(matches!(err, DeployError::DryRunFailed(_)));
    assert_eq!(cloud.count("run.create"), 0);
}

#[tokio::test(start_paused = true)]
async fn invalid_argument_with_the_flag_creates_without_it() {
    fn invalid(_: &Service) -> Option<ApiError> {
        Some(ApiError::new(RpcCode::InvalidArgument, "dry run", "invokerIamDisabled may not be set"))
    }

    let cloud = MockCloud::ready();
    cloud.with_state(|s| s.dry_run_rule = Some(invalid));
    let sink = RecordingProgress::new();

    deploy(&cloud, request(true), &sink).await.unwrap();

    assert_eq!(cloud.count("run.dry_run_create"), 1);
    assert_eq!(cloud.count("run.create"), 1);
    assert_eq!(cloud.count("run.update"), 0);
    let committed = cloud.with_state(|s| s.committed.clone());
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].invoker_iam_disabled, None);
}

#[test]
fn fsm_starts_from_the_existence_check() {
    use rundeploy::deploy::fsm::ServiceFsm;
    assert_eq!(ServiceFsm::new(true).state(), ServiceState::Exists);
    assert_eq!(ServiceFsm::new(false).state(), ServiceState::NotExists);
}
