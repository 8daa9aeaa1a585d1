use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use component_api::{Bus, ComponentApi, ComponentError, DeliveryPolicy, LocalBus};
use serde_json::json;
use shared::{
    domain::{Column, DataSet, InitParams, Primitive},
    protocol::{Envelope, RawEnvelope},
};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    time::{sleep, timeout},
};

const SETTLE: Duration = Duration::from_millis(75);

fn numeric_dataset(rows: &[[i64; 2]]) -> DataSet {
    DataSet::new(
        vec![Column::new("c1"), Column::new("c2")],
        rows.iter()
            .map(|row| row.iter().copied().map(Primitive::from).collect())
            .collect(),
    )
    .expect("dataset")
}

fn host_observer(host: &LocalBus) -> UnboundedReceiver<Envelope> {
    let (tx, rx) = unbounded_channel();
    host.subscribe(Arc::new(move |raw: RawEnvelope| {
        if let Ok(envelope) = raw.decode() {
            let _ = tx.send(envelope);
        }
    }))
    .expect("host subscribe");
    rx
}

async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("channel closed")
}

#[tokio::test]
async fn datasets_after_init_arrive_in_send_order_and_intact() {
    let (api, host) = ComponentApi::local(DeliveryPolicy::DropUnhandled).expect("api");
    let (tx, mut rx) = unbounded_channel();
    let init_seen = Arc::new(AtomicUsize::new(0));
    let init_counter = init_seen.clone();
    let controller = api.controller();
    controller.set_on_init(move |_| {
        init_counter.fetch_add(1, Ordering::SeqCst);
    });
    controller.set_on_dataset(move |dataset| {
        let _ = tx.send(dataset);
    });

    let sent: Vec<DataSet> = (0..6)
        .map(|i| numeric_dataset(&[[i, i + 1], [i * 10, i * 10 + 1]]))
        .collect();
    host.send_envelope(&Envelope::Init(InitParams::new()))
        .expect("init");
    for dataset in &sent {
        host.send_envelope(&Envelope::Dataset(dataset.clone()))
            .expect("dataset");
    }

    for expected in &sent {
        assert_eq!(&next(&mut rx).await, expected);
    }
    sleep(SETTLE).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(init_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dataset_round_trips_through_the_bus_unchanged() {
    let (api, host) = ComponentApi::local(DeliveryPolicy::DropUnhandled).expect("api");
    let (tx, mut rx) = unbounded_channel();
    api.controller().set_on_dataset(move |dataset| {
        let _ = tx.send(dataset);
    });

    host.send(RawEnvelope::from_value(json!({
        "kind": "Dataset",
        "payload": {"columns": [{"name": "c1"}, {"name": "c2"}], "data": [[1, 2], [3, 4]]}
    })))
    .expect("send");

    let received = next(&mut rx).await;
    assert_eq!(received.column_names().collect::<Vec<_>>(), vec!["c1", "c2"]);
    assert_eq!(received, numeric_dataset(&[[1, 2], [3, 4]]));
}

#[tokio::test]
async fn host_observes_every_configuration_report_in_order() {
    let (api, host) = ComponentApi::local(DeliveryPolicy::DropUnhandled).expect("api");
    let mut observed = host_observer(&host);
    let controller = api.controller();

    controller.report_configuration_ok().expect("ok");
    controller
        .report_configuration_invalid("bad")
        .expect("invalid");
    controller.report_configuration_ok().expect("ok again");

    assert_eq!(next(&mut observed).await, Envelope::ConfigOk);
    assert_eq!(
        next(&mut observed).await,
        Envelope::ConfigInvalid {
            reason: "bad".into()
        }
    );
    assert_eq!(next(&mut observed).await, Envelope::ConfigOk);
    sleep(SETTLE).await;
    assert!(observed.try_recv().is_err());
}

#[tokio::test]
async fn stopped_component_ignores_new_datasets() {
    let (api, host) = ComponentApi::local(DeliveryPolicy::DropUnhandled).expect("api");
    let (tx, mut rx) = unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    api.controller().set_on_dataset(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(());
    });

    host.send_envelope(&Envelope::Dataset(numeric_dataset(&[[1, 2]])))
        .expect("first");
    next(&mut rx).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    api.destroy();
    host.send_envelope(&Envelope::Dataset(numeric_dataset(&[[3, 4]])))
        .expect("after stop");
    sleep(SETTLE).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn callbacks_survive_destroy_and_restart() {
    let (api, host) = ComponentApi::local(DeliveryPolicy::DropUnhandled).expect("api");
    let (tx, mut rx) = unbounded_channel();
    api.get_controller(
        None,
        Some(Arc::new(move |dataset: DataSet| {
            let _ = tx.send(dataset.row_count());
        })),
    );

    api.destroy();
    api.restart().expect("restart");
    host.send_envelope(&Envelope::Dataset(numeric_dataset(&[[1, 2], [3, 4]])))
        .expect("send");
    assert_eq!(next(&mut rx).await, 2);
}

#[tokio::test]
async fn unknown_kind_is_ignored_without_error() {
    let (api, host) = ComponentApi::local(DeliveryPolicy::DropUnhandled).expect("api");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    api.controller().set_on_init(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = calls.clone();
    api.controller().set_on_dataset(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    host.send(RawEnvelope::from_value(json!({"kind": "Foo", "payload": {"x": 1}})))
        .expect("send is accepted");
    sleep(SETTLE).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_reason_fails_and_sends_nothing() {
    let (api, host) = ComponentApi::local(DeliveryPolicy::DropUnhandled).expect("api");
    let mut observed = host_observer(&host);

    let result = api.controller().report_configuration_invalid("");
    assert!(matches!(result, Err(ComponentError::InvalidReason)));

    sleep(SETTLE).await;
    assert!(observed.try_recv().is_err());
}
