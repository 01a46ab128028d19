use async_trait::async_trait;
use parivar_core::{
    DeviceCapability, KeyValueStore, MemoryKeyValueStore, PermissionBootstrap, PermissionHost,
    PermissionStatus, PermissionSummary, PERMISSION_STORAGE_KEY,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Host double returning a scripted result per capability and recording the
/// prompt order.
struct ScriptedHost {
    responses: HashMap<DeviceCapability, Result<PermissionStatus, String>>,
    calls: Mutex<Vec<DeviceCapability>>,
}

impl ScriptedHost {
    fn new(responses: &[(DeviceCapability, Result<PermissionStatus, String>)]) -> Self {
        Self {
            responses: responses.iter().cloned().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn granting_all() -> Self {
        Self::new(&[
            (DeviceCapability::Camera, Ok(PermissionStatus::Granted)),
            (DeviceCapability::Microphone, Ok(PermissionStatus::Granted)),
            (DeviceCapability::Location, Ok(PermissionStatus::Granted)),
        ])
    }

    fn calls(&self) -> Vec<DeviceCapability> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PermissionHost for ScriptedHost {
    async fn request(&self, capability: DeviceCapability) -> Result<PermissionStatus, String> {
        self.calls.lock().unwrap().push(capability);
        self.responses
            .get(&capability)
            .cloned()
            .unwrap_or(Ok(PermissionStatus::Undetermined))
    }
}

#[tokio::test]
async fn first_run_prompts_in_order_and_persists_summary() {
    let host = Arc::new(ScriptedHost::new(&[
        (DeviceCapability::Camera, Ok(PermissionStatus::Granted)),
        (DeviceCapability::Microphone, Ok(PermissionStatus::Denied)),
        (DeviceCapability::Location, Ok(PermissionStatus::Undetermined)),
    ]));
    let local = Arc::new(MemoryKeyValueStore::new());
    let mut bootstrap = PermissionBootstrap::new(Arc::clone(&host), Arc::clone(&local));

    let outcome = bootstrap.run().await;

    assert!(outcome.prompted);
    assert_eq!(
        host.calls(),
        vec![
            DeviceCapability::Camera,
            DeviceCapability::Microphone,
            DeviceCapability::Location,
        ]
    );
    assert_eq!(outcome.summary.camera, PermissionStatus::Granted);
    assert_eq!(outcome.summary.microphone, PermissionStatus::Denied);
    assert_eq!(outcome.summary.location, PermissionStatus::Undetermined);
    assert_eq!(outcome.summary.internet, PermissionStatus::Granted);
    assert_eq!(
        outcome.pending,
        vec![DeviceCapability::Microphone, DeviceCapability::Location]
    );

    let persisted = local.get(PERMISSION_STORAGE_KEY).await.unwrap().unwrap();
    let persisted: PermissionSummary = serde_json::from_str(&persisted).unwrap();
    assert_eq!(persisted, outcome.summary);
}

#[tokio::test]
async fn runs_at_most_once_per_session() {
    let host = Arc::new(ScriptedHost::new(&[
        (DeviceCapability::Camera, Ok(PermissionStatus::Denied)),
        (DeviceCapability::Microphone, Ok(PermissionStatus::Denied)),
        (DeviceCapability::Location, Ok(PermissionStatus::Denied)),
    ]));
    let local = Arc::new(MemoryKeyValueStore::new());
    let mut bootstrap = PermissionBootstrap::new(Arc::clone(&host), local);

    let first = bootstrap.run().await;
    assert!(first.prompted);
    assert_eq!(host.calls().len(), 3);

    let second = bootstrap.run().await;
    assert!(!second.prompted);
    assert_eq!(second.pending.len(), 3);
    // No further platform prompts this session.
    assert_eq!(host.calls().len(), 3);
}

#[tokio::test]
async fn skips_entirely_once_persisted_summary_is_all_granted() {
    let local = Arc::new(MemoryKeyValueStore::new());

    let granting = Arc::new(ScriptedHost::granting_all());
    let mut first_session = PermissionBootstrap::new(Arc::clone(&granting), Arc::clone(&local));
    let outcome = first_session.run().await;
    assert!(outcome.summary.all_granted());

    // New session, new bootstrap: the persisted summary short-circuits it.
    let host = Arc::new(ScriptedHost::granting_all());
    let mut second_session = PermissionBootstrap::new(Arc::clone(&host), local);
    let outcome = second_session.run().await;

    assert!(!outcome.prompted);
    assert!(outcome.pending.is_empty());
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn request_failure_keeps_previous_value_and_continues() {
    let host = Arc::new(ScriptedHost::new(&[
        (
            DeviceCapability::Camera,
            Err("platform dialog crashed".to_string()),
        ),
        (DeviceCapability::Microphone, Ok(PermissionStatus::Granted)),
        (DeviceCapability::Location, Ok(PermissionStatus::Granted)),
    ]));
    let local = Arc::new(MemoryKeyValueStore::new());
    let mut bootstrap = PermissionBootstrap::new(Arc::clone(&host), local);

    let outcome = bootstrap.run().await;

    assert_eq!(host.calls().len(), 3);
    assert_eq!(outcome.summary.camera, PermissionStatus::Undetermined);
    assert_eq!(outcome.summary.microphone, PermissionStatus::Granted);
    assert_eq!(outcome.summary.location, PermissionStatus::Granted);
    assert_eq!(outcome.pending, vec![DeviceCapability::Camera]);
}

#[tokio::test]
async fn previously_granted_capabilities_are_not_prompted_again() {
    let local = Arc::new(MemoryKeyValueStore::new());
    let mut persisted = PermissionSummary::default();
    persisted.set_status(DeviceCapability::Camera, PermissionStatus::Granted);
    local
        .set(
            PERMISSION_STORAGE_KEY,
            &serde_json::to_string(&persisted).unwrap(),
        )
        .await
        .unwrap();

    let host = Arc::new(ScriptedHost::granting_all());
    let mut bootstrap = PermissionBootstrap::new(Arc::clone(&host), local);
    let outcome = bootstrap.run().await;

    assert_eq!(
        host.calls(),
        vec![DeviceCapability::Microphone, DeviceCapability::Location]
    );
    assert!(outcome.summary.all_granted());
    assert!(outcome.pending.is_empty());
}
