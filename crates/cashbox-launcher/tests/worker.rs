//! Worker runtime end to end: real listeners, a real control-plane socket.

#![cfg(unix)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cashbox_control::{
    ControlPlane, ControlPlaneAddress, ControlPlaneClient, ControlPlaneError, ControlPlaneServer,
};
use cashbox_hosting::JsonCodec;
use cashbox_launcher::plugins::{builtin, Plugin, PluginError, PluginRegistry};
use cashbox_launcher::{Plebeian, WorkerError, WorkerExit};
use cashbox_types::interfaces::Helper;
use cashbox_types::{
    ComponentConfiguration, ComponentKind, LauncherConfiguration, LogRecord,
    PlebeianConfiguration, ServiceError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::codegen::http::uri::PathAndQuery;
use uuid::Uuid;

#[derive(Default)]
struct Recorder {
    started: Mutex<Vec<Uuid>>,
    pings: Mutex<usize>,
}

#[async_trait]
impl ControlPlane for Recorder {
    async fn report_started(&self, component_id: Uuid) -> Result<(), ControlPlaneError> {
        self.started.lock().push(component_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), ControlPlaneError> {
        *self.pings.lock() += 1;
        Ok(())
    }

    async fn relay_log(
        &self,
        _record: LogRecord,
        _tags: BTreeMap<String, String>,
    ) -> Result<(), ControlPlaneError> {
        Ok(())
    }
}

struct Supervisor {
    _dir: tempfile::TempDir,
    server: ControlPlaneServer,
    recorder: Arc<Recorder>,
}

impl Supervisor {
    fn start(port: u16) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let address = ControlPlaneAddress::for_launcher(dir.path(), port);
        let server = ControlPlaneServer::start(address, recorder.clone()).unwrap();
        Self {
            _dir: dir,
            server,
            recorder,
        }
    }

    fn client(&self) -> Arc<dyn ControlPlane> {
        Arc::new(ControlPlaneClient::new(self.server.address().clone()))
    }

    async fn wait_for_report(&self, id: Uuid) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !self.recorder.started.lock().contains(&id) {
            assert!(Instant::now() < deadline, "worker never reported started");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn worker(package: &str, kind: ComponentKind, urls: Vec<String>) -> PlebeianConfiguration {
    let mut component = ComponentConfiguration::new(Uuid::new_v4(), package, "1.0.0");
    component.urls = urls;
    PlebeianConfiguration { component, kind }
}

fn launcher() -> LauncherConfiguration {
    LauncherConfiguration {
        shutdown_timeout_seconds: 5,
        ..LauncherConfiguration::default()
    }
}

fn spawn(
    config: PlebeianConfiguration,
    launcher: LauncherConfiguration,
    plugins: PluginRegistry,
    control: Arc<dyn ControlPlane>,
    token: &CancellationToken,
) -> JoinHandle<Result<WorkerExit, WorkerError>> {
    let plebeian = Plebeian::new(config, launcher, plugins, token.clone()).with_control_plane(control);
    tokio::spawn(plebeian.run())
}

async fn finish(task: JoinHandle<Result<WorkerExit, WorkerError>>) -> WorkerExit {
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_queue_echo_over_grpc_and_rest() {
    let supervisor = Supervisor::start(6101);
    let (grpc_port, rest_port) = (free_port(), free_port());
    let config = worker(
        builtin::QUEUE_PACKAGE,
        ComponentKind::Queue,
        vec![
            format!("grpc://127.0.0.1:{grpc_port}"),
            format!("rest://127.0.0.1:{rest_port}/pos"),
        ],
    );
    let id = config.component.id;
    let token = CancellationToken::new();
    let task = spawn(
        config,
        launcher(),
        PluginRegistry::with_builtins(),
        supervisor.client(),
        &token,
    );
    supervisor.wait_for_report(id).await;

    let channel = tonic::transport::Endpoint::from_shared(format!("http://127.0.0.1:{grpc_port}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await.unwrap();
    let reply: Value = grpc
        .unary(
            tonic::Request::new(json!({ "Message": "test" })),
            PathAndQuery::from_static("/cashbox.pos.v2.Pos/Echo"),
            JsonCodec,
        )
        .await
        .unwrap()
        .into_inner();
    assert_eq!(reply, json!({ "Message": "test" }));

    let reply: Value = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{rest_port}/pos/v2/echo"))
        .json(&json!({ "Message": "test" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply, json!({ "Message": "test" }));

    token.cancel();
    assert_eq!(finish(task).await, WorkerExit::Shutdown);
    supervisor.server.shutdown().await;
}

#[tokio::test]
async fn test_partial_bind_failure_still_reports_started() {
    let supervisor = Supervisor::start(6102);
    let config = worker(
        builtin::SCU_DE_PACKAGE,
        ComponentKind::SignatureDevice,
        vec![
            "ftp://127.0.0.1:2121".to_string(),
            format!("grpc://127.0.0.1:{}", free_port()),
        ],
    );
    let id = config.component.id;
    let token = CancellationToken::new();
    let task = spawn(
        config,
        launcher(),
        PluginRegistry::with_builtins(),
        supervisor.client(),
        &token,
    );

    supervisor.wait_for_report(id).await;
    assert_eq!(*supervisor.recorder.started.lock(), vec![id]);

    token.cancel();
    assert_eq!(finish(task).await, WorkerExit::Shutdown);
    supervisor.server.shutdown().await;
}

#[tokio::test]
async fn test_worker_orphaned_when_supervisor_disappears() {
    let supervisor = Supervisor::start(6103);
    let config = worker(
        builtin::QUEUE_PACKAGE,
        ComponentKind::Queue,
        vec![format!("grpc://127.0.0.1:{}", free_port())],
    );
    let id = config.component.id;
    let token = CancellationToken::new();
    let task = spawn(
        config,
        LauncherConfiguration {
            ping_interval_seconds: 1,
            ..launcher()
        },
        PluginRegistry::with_builtins(),
        supervisor.client(),
        &token,
    );
    supervisor.wait_for_report(id).await;

    supervisor.server.shutdown().await;

    assert_eq!(finish(task).await, WorkerExit::Orphaned);
    assert!(token.is_cancelled());
}

#[derive(Default)]
struct RecordingHelper {
    calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Helper for RecordingHelper {
    async fn begin_startup(&self) -> Result<(), ServiceError> {
        self.calls.lock().push("begin");
        Ok(())
    }

    async fn end_startup(&self) -> Result<(), ServiceError> {
        self.calls.lock().push("end");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.calls.lock().push("stop");
        Ok(())
    }
}

struct HelperPlugin(Arc<RecordingHelper>);

impl Plugin for HelperPlugin {
    fn create_helper(
        &self,
        _config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn Helper>>, PluginError> {
        Ok(Some(self.0.clone()))
    }
}

#[tokio::test]
async fn test_helper_hooks_run_in_order() {
    let supervisor = Supervisor::start(6104);
    let helper = Arc::new(RecordingHelper::default());
    let mut plugins = PluginRegistry::new();
    plugins.register("Vendor.Helper", Arc::new(HelperPlugin(helper.clone())));

    let config = worker("Vendor.Helper", ComponentKind::Helper, Vec::new());
    let id = config.component.id;
    let token = CancellationToken::new();
    let task = spawn(config, launcher(), plugins, supervisor.client(), &token);

    supervisor.wait_for_report(id).await;
    assert_eq!(*helper.calls.lock(), vec!["begin", "end"]);

    token.cancel();
    assert_eq!(finish(task).await, WorkerExit::Shutdown);
    assert_eq!(*helper.calls.lock(), vec!["begin", "end", "stop"]);
    supervisor.server.shutdown().await;
}

#[tokio::test]
async fn test_failing_startup_hook_is_fatal() {
    struct Broken;

    #[async_trait]
    impl Helper for Broken {
        async fn begin_startup(&self) -> Result<(), ServiceError> {
            Err(ServiceError::Failed("no database".into()))
        }

        async fn end_startup(&self) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    struct BrokenPlugin;

    impl Plugin for BrokenPlugin {
        fn create_helper(
            &self,
            _config: &ComponentConfiguration,
        ) -> Result<Option<Arc<dyn Helper>>, PluginError> {
            Ok(Some(Arc::new(Broken)))
        }
    }

    let supervisor = Supervisor::start(6105);
    let mut plugins = PluginRegistry::new();
    plugins.register("Vendor.Broken", Arc::new(BrokenPlugin));
    let config = worker("Vendor.Broken", ComponentKind::Helper, Vec::new());
    let token = CancellationToken::new();

    let task = spawn(config, launcher(), plugins, supervisor.client(), &token);
    let err = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, WorkerError::HelperHook { hook: "begin_startup", .. }));
    assert!(supervisor.recorder.started.lock().is_empty());
    supervisor.server.shutdown().await;
}
