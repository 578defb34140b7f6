//! Forwards captured log records to the supervisor.

use std::collections::BTreeMap;
use std::sync::Arc;

use cashbox_control::ControlPlane;
use cashbox_telemetry::{RelayReceiver, RELAY_TARGET};
use cashbox_types::ComponentConfiguration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tags attached to every record relayed by one worker.
pub fn relay_tags(component: &ComponentConfiguration) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("component_id".to_string(), component.id.to_string()),
        ("package".to_string(), component.package.clone()),
    ])
}

/// Drain `records` into `control` until the channel closes.
///
/// Delivery failures and records the layer dropped on a full channel are
/// only reported under the relay target, which the relay layer never
/// captures.
pub fn spawn_forwarder(
    control: Arc<dyn ControlPlane>,
    mut records: RelayReceiver,
    tags: BTreeMap<String, String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            let dropped = records.take_dropped();
            if dropped > 0 {
                warn!(target: RELAY_TARGET, dropped, "Relay channel full, log records dropped");
            }
            if let Err(e) = control.relay_log(record, tags.clone()).await {
                debug!(target: RELAY_TARGET, error = %e, "Dropped relayed log record");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cashbox_control::ControlPlaneError;
    use cashbox_telemetry::RelayLayer;
    use cashbox_types::LogRecord;
    use parking_lot::Mutex;
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder {
        records: Mutex<Vec<(LogRecord, BTreeMap<String, String>)>>,
    }

    #[async_trait]
    impl ControlPlane for Recorder {
        async fn report_started(&self, _id: Uuid) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn ping(&self) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn relay_log(
            &self,
            record: LogRecord,
            tags: BTreeMap<String, String>,
        ) -> Result<(), ControlPlaneError> {
            self.records.lock().push((record, tags));
            Ok(())
        }
    }

    /// Emit `messages` through a relay layer of `capacity`.
    fn capture(capacity: usize, messages: &[&str]) -> (RelayLayer, RelayReceiver) {
        let (layer, receiver) = RelayLayer::channel(capacity);
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        tracing::subscriber::with_default(subscriber, || {
            for message in messages {
                tracing::info!("{message}");
            }
        });
        (layer, receiver)
    }

    #[tokio::test]
    async fn test_forwarder_tags_every_record() {
        let component = ComponentConfiguration::new(Uuid::new_v4(), "InMemory.Queue", "1.0.0");
        let recorder = Arc::new(Recorder::default());
        let (layer, receiver) = capture(8, &["one", "two"]);
        drop(layer);

        spawn_forwarder(recorder.clone(), receiver, relay_tags(&component))
            .await
            .unwrap();

        let records = recorder.records.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].0.rendered_message, "two");
        assert_eq!(records[0].1["component_id"], component.id.to_string());
        assert_eq!(records[0].1["package"], "InMemory.Queue");
    }

    /// Collects the `dropped` field of events under the relay target.
    #[derive(Clone, Default)]
    struct DropReports(Arc<Mutex<Vec<String>>>);

    impl<S: Subscriber> Layer<S> for DropReports {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            struct Dropped<'a>(&'a mut Vec<String>);

            impl tracing::field::Visit for Dropped<'_> {
                fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                    if field.name() == "dropped" {
                        self.0.push(format!("{value:?}"));
                    }
                }
            }

            if event.metadata().target() == RELAY_TARGET {
                let mut reports = self.0.lock();
                event.record(&mut Dropped(&mut reports));
            }
        }
    }

    #[tokio::test]
    async fn test_forwarder_reports_dropped_records() {
        let component = ComponentConfiguration::new(Uuid::new_v4(), "InMemory.Queue", "1.0.0");
        let recorder = Arc::new(Recorder::default());
        let (layer, receiver) = capture(1, &["kept", "lost", "lost too"]);
        assert_eq!(layer.dropped(), 2);
        drop(layer);

        let reports = DropReports::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(reports.clone()));
        spawn_forwarder(recorder.clone(), receiver, relay_tags(&component))
            .await
            .unwrap();

        assert_eq!(*reports.0.lock(), vec!["2".to_string()]);
        assert_eq!(recorder.records.lock().len(), 1);
    }
}
