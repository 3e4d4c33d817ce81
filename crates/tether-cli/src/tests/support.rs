//! In-process daemon used by the client and runner suites.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use tether_config::SocketEndpoint;
use tetherd::registry::{CapabilityError, ServiceBuilder};
use tetherd::setup::RegistryFactory;
use tetherd::transport::SocketListener;
use tetherd::{
    ChannelSetup, EmbeddedMarker, ExecutionContext, LaunchError, MemoryContext, ServiceScope,
    StructuredHealthReporter, build_registry, serve,
};

/// Daemon serving on a loopback port until dropped.
pub(super) struct TestDaemon {
    endpoint: SocketEndpoint,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), LaunchError>>>,
}

impl TestDaemon {
    /// Starts a daemon with the default capabilities.
    pub(super) async fn start() -> Self {
        Self::start_with(Arc::new(build_registry)).await
    }

    /// Starts a daemon whose sessions use `factory`.
    pub(super) async fn start_with(factory: RegistryFactory) -> Self {
        let listener = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0))
            .await
            .expect("bind loopback listener");
        let address = listener.local_addr().expect("tcp listener has an address");
        let context: Arc<dyn ExecutionContext> = Arc::new(MemoryContext::new());
        let setup = ChannelSetup::new(
            context,
            Arc::new(EmbeddedMarker::default()),
            Arc::new(StructuredHealthReporter::new()),
        )
        .with_registry_factory(factory);
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, setup, async move {
            let _ = stopped.await;
        }));
        Self {
            endpoint: SocketEndpoint::tcp(address.ip().to_string(), address.port()),
            stop: Some(stop),
            task: Some(task),
        }
    }

    pub(super) fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Stops the daemon and waits for the listener to close.
    pub(super) async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .expect("daemon task")
                .expect("daemon shuts down cleanly");
        }
    }
}

/// Registry with methods that exercise ordering and control signals.
pub(super) fn scripted_registry() -> RegistryFactory {
    Arc::new(|scope: ServiceScope| {
        let scope = Arc::new(scope);
        let ui = ServiceBuilder::new().bind(&scope, "show", |scope: Arc<ServiceScope>, (): ()| async move {
            scope.client().notify_show();
            scope.client().notify_hide();
            Ok::<_, CapabilityError>(())
        });
        let slow = ServiceBuilder::new().method("echo", |(delay, value): (u64, String)| async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            Ok::<_, CapabilityError>(json!({ "echo": value }))
        });
        ServiceBuilder::new()
            .service("ui", ui)
            .service("slow", slow)
            .build()
    })
}

/// Daemon on its own thread and runtime, for driving the blocking runner.
pub(super) struct ThreadedDaemon {
    endpoint: SocketEndpoint,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ThreadedDaemon {
    pub(super) fn start() -> Self {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop, stopped) = oneshot::channel::<()>();
        let thread = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("daemon runtime");
            runtime.block_on(async move {
                let daemon = TestDaemon::start().await;
                ready_tx
                    .send(daemon.endpoint().clone())
                    .expect("test thread waiting");
                let _ = stopped.await;
                daemon.stop().await;
            });
        });
        let endpoint = ready_rx.recv().expect("daemon started");
        Self {
            endpoint,
            stop: Some(stop),
            thread: Some(thread),
        }
    }

    pub(super) fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }
}

impl Drop for ThreadedDaemon {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
