//! End-to-end behavior of the facade against a recording transport:
//! ordering across the readiness boundary, middleware composition and
//! veto, and the fire-and-forget error contract.

use std::sync::{Arc, Mutex};

use beacon_testing::{RecordingTransport, TransportCall};
use serde_json::Value;

use beacon_core::{from_fn, Client, Configuration, Error, Event, Forward, Properties};

fn pair() -> (Client, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    (Client::new(transport.clone()), transport)
}

async fn ready_pair() -> (Client, Arc<RecordingTransport>) {
    let (client, transport) = pair();
    client
        .setup("write-key", Configuration::default())
        .await
        .unwrap();
    (client, transport)
}

fn collect_errors(client: &Client) -> Arc<Mutex<Vec<String>>> {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let errors = sink.clone();
    client.on_error(move |error| errors.lock().unwrap().push(error.to_string()));
    sink
}

#[tokio::test]
async fn calls_made_before_setup_replay_in_order() {
    let (client, transport) = pair();

    let a = client.track("A", Properties::new());
    let b = client.track("B", Properties::new());
    let setup = client.setup("write-key", Configuration::default());
    let (a, b, setup) = futures::join!(a, b, setup);

    a.unwrap();
    b.unwrap();
    setup.unwrap();
    assert!(client.is_ready());
    assert_eq!(transport.event_names(), vec!["A", "B"]);
    assert!(matches!(transport.calls()[0], TransportCall::Setup { .. }));
}

#[tokio::test]
async fn nothing_reaches_the_transport_before_readiness() {
    let (client, transport) = pair();

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.track("early", Properties::new()).await }
    });
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    assert!(!client.is_ready());
    assert_eq!(transport.call_count(), 0);

    client
        .setup("write-key", Configuration::default())
        .await
        .unwrap();
    pending.await.unwrap().unwrap();
    assert_eq!(transport.event_names(), vec!["early"]);
}

#[tokio::test]
async fn middleware_transforms_compose_in_registration_order() {
    let (client, transport) = ready_pair().await;

    client
        .middleware(from_fn(|event: Event| async move {
            Ok(Forward::Next(event.with_property("region", "US")))
        }))
        .middleware(from_fn(|event: Event| async move {
            let region = event.property("region").cloned().unwrap_or_default();
            Ok(Forward::Next(event.with_property("seen_region", region)))
        }));

    client
        .track("Purchase", Properties::new().insert("price", 10))
        .await
        .unwrap();

    let payload = &transport.payloads()[0];
    assert_eq!(payload["event"], "Purchase");
    assert_eq!(payload["properties"]["price"], 10);
    assert_eq!(payload["properties"]["region"], "US");
    assert_eq!(payload["properties"]["seen_region"], "US");
}

#[tokio::test]
async fn veto_resolves_the_caller_with_no_delivery_and_no_error() {
    let (client, transport) = ready_pair().await;
    let errors = collect_errors(&client);

    let downstream_ran = Arc::new(Mutex::new(false));
    client.middleware(from_fn(|event: Event| async move {
        if event.name() == Some("Blocked") {
            Ok(Forward::Veto)
        } else {
            Ok(Forward::Next(event))
        }
    }));
    let ran = downstream_ran.clone();
    client.middleware(from_fn(move |event: Event| {
        let ran = ran.clone();
        async move {
            *ran.lock().unwrap() = true;
            Ok(Forward::Next(event))
        }
    }));

    client.track("Blocked", Properties::new()).await.unwrap();

    assert_eq!(transport.event_names(), Vec::<String>::new());
    assert!(errors.lock().unwrap().is_empty());
    assert!(!*downstream_ran.lock().unwrap());

    client.track("Allowed", Properties::new()).await.unwrap();
    assert_eq!(transport.event_names(), vec!["Allowed"]);
    assert!(*downstream_ran.lock().unwrap());
}

#[tokio::test]
async fn transport_failure_notifies_handlers_while_the_call_resolves() {
    let (client, transport) = ready_pair().await;
    let errors = collect_errors(&client);
    transport.fail_operation("track", "NetworkError");

    client.track("Purchase", Properties::new()).await.unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("NetworkError"));
    assert!(errors[0].contains("track"));
    assert_eq!(transport.event_names(), Vec::<String>::new());
}

#[tokio::test]
async fn a_panicking_handler_does_not_starve_the_rest() {
    let (client, transport) = ready_pair().await;

    client.on_error(|_| panic!("misbehaving handler"));
    let errors = collect_errors(&client);

    transport.fail_operation("track", "NetworkError");
    client.track("Purchase", Properties::new()).await.unwrap();

    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn middleware_failure_routes_to_handlers_like_a_transport_failure() {
    let (client, transport) = ready_pair().await;
    let errors = collect_errors(&client);

    client.middleware(from_fn(|_event: Event| async move {
        Err(anyhow::anyhow!("enrichment service unreachable"))
    }));

    client.track("Purchase", Properties::new()).await.unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("enrichment service unreachable"));
    assert_eq!(transport.event_names(), Vec::<String>::new());
}

#[tokio::test]
async fn second_configuration_attempt_is_rejected() {
    let (client, transport) = ready_pair().await;

    let again = client.setup("write-key", Configuration::default()).await;
    assert!(matches!(again, Err(Error::AlreadyConfigured)));

    let native = client.use_native_configuration().await;
    assert!(matches!(native, Err(Error::AlreadyConfigured)));

    let setups = transport
        .calls()
        .iter()
        .filter(|call| matches!(call, TransportCall::Setup { .. }))
        .count();
    assert_eq!(setups, 1);
}

#[tokio::test]
async fn native_configuration_opens_the_gate_without_a_setup_call() {
    let (client, transport) = pair();

    let queued = client.track("queued", Properties::new());
    let configure = client.use_native_configuration();
    let (queued, configure) = futures::join!(queued, configure);

    queued.unwrap();
    configure.unwrap();
    assert!(client.is_ready());
    assert_eq!(transport.event_names(), vec!["queued"]);
    assert!(!transport
        .calls()
        .iter()
        .any(|call| matches!(call, TransportCall::Setup { .. })));

    let after = client.setup("write-key", Configuration::default()).await;
    assert!(matches!(after, Err(Error::AlreadyConfigured)));
}

#[tokio::test]
async fn setup_failure_aborts_queued_calls_then_allows_a_retry() {
    let (client, transport) = pair();
    let errors = collect_errors(&client);
    transport.fail_operation("setup", "no network");

    let queued_track = client.track("lost", Properties::new());
    let queued_id = client.get_anonymous_id();
    let setup = client.setup("write-key", Configuration::default());
    let (queued_track, queued_id, setup) = futures::join!(queued_track, queued_id, setup);

    // Fire-and-forget resolves and reports through the hub; the
    // value-returning call rejects directly.
    queued_track.unwrap();
    assert!(matches!(queued_id, Err(Error::SetupAborted)));
    assert!(matches!(setup, Err(Error::SetupFailed(_))));
    assert!(!client.is_ready());
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert_eq!(transport.call_count(), 0);

    transport.clear_failure("setup");
    client
        .setup("write-key", Configuration::default())
        .await
        .unwrap();
    client.track("after-retry", Properties::new()).await.unwrap();
    assert_eq!(transport.event_names(), vec!["after-retry"]);
}

#[tokio::test]
async fn middleware_registered_while_calls_are_queued_applies_to_them() {
    let (client, transport) = pair();

    let queued = client.track("queued", Properties::new());
    let rest = async {
        client.middleware(from_fn(|event: Event| async move {
            Ok(Forward::Next(event.with_property("late", true)))
        }));
        client.setup("write-key", Configuration::default()).await
    };
    let (queued, setup) = futures::join!(queued, rest);

    queued.unwrap();
    setup.unwrap();
    assert_eq!(transport.payloads()[0]["properties"]["late"], true);
}

#[tokio::test]
async fn middleware_registered_mid_flight_skips_the_in_flight_event() {
    let (client, transport) = ready_pair().await;

    let (release, released) = tokio::sync::oneshot::channel::<()>();
    let released = Arc::new(Mutex::new(Some(released)));
    client.middleware(from_fn(move |event: Event| {
        let released = released.clone();
        async move {
            let waiter = released.lock().unwrap().take();
            if let Some(waiter) = waiter {
                let _ = waiter.await;
            }
            Ok(Forward::Next(event))
        }
    }));

    let slow = tokio::spawn({
        let client = client.clone();
        async move { client.track("slow", Properties::new()).await }
    });
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    // The first event's chain is parked; this step must not apply to it.
    client.middleware(from_fn(|event: Event| async move {
        Ok(Forward::Next(event.with_property("late", true)))
    }));
    release.send(()).unwrap();
    slow.await.unwrap().unwrap();

    client.track("after", Properties::new()).await.unwrap();

    let payloads = transport.payloads();
    assert!(payloads[0]["properties"].get("late").is_none());
    assert_eq!(payloads[1]["properties"]["late"], true);
}

#[tokio::test]
async fn value_returning_call_rejects_directly_and_bypasses_handlers() {
    let (client, transport) = ready_pair().await;
    let errors = collect_errors(&client);
    transport.fail_operation("getAnonymousId", "bridge unavailable");

    let outcome = client.get_anonymous_id().await;
    assert!(matches!(outcome, Err(Error::Transport { operation: "getAnonymousId", .. })));
    assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_id_waits_for_readiness() {
    let (client, transport) = pair();
    transport.set_anonymous_id("anon-99");

    let id = client.get_anonymous_id();
    let setup = client.setup("write-key", Configuration::default());
    let (id, setup) = futures::join!(id, setup);

    setup.unwrap();
    assert_eq!(id.unwrap(), "anon-99");
}

#[tokio::test]
async fn validation_fails_fast_without_queuing() {
    let (client, transport) = pair();

    assert!(matches!(
        client.track("", Properties::new()).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        client.screen("  ", Properties::new()).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        client.identify("", Properties::new()).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        client.group("", Properties::new()).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(client.alias("").await, Err(Error::Validation(_))));
    assert!(matches!(client.set_idfa(" ").await, Err(Error::Validation(_))));
    assert!(matches!(
        client.setup("", Configuration::default()).await,
        Err(Error::Validation(_))
    ));

    // Nothing queued: opening the gate delivers nothing.
    client
        .setup("write-key", Configuration::default())
        .await
        .unwrap();
    assert_eq!(transport.call_count(), 1);
    assert!(matches!(transport.calls()[0], TransportCall::Setup { .. }));
}

#[tokio::test]
async fn reset_runs_through_the_chain_and_can_be_vetoed() {
    let (client, transport) = ready_pair().await;

    let observed = Arc::new(Mutex::new(Vec::new()));
    let kinds = observed.clone();
    client.middleware(from_fn(move |event: Event| {
        let kinds = kinds.clone();
        async move {
            kinds.lock().unwrap().push(event.kind());
            if event.kind() == beacon_core::EventKind::Reset {
                Ok(Forward::Veto)
            } else {
                Ok(Forward::Next(event))
            }
        }
    }));

    client.track("before", Properties::new()).await.unwrap();
    client.reset().await.unwrap();

    assert_eq!(
        *observed.lock().unwrap(),
        vec![beacon_core::EventKind::Track, beacon_core::EventKind::Reset]
    );
    assert!(!transport
        .calls()
        .iter()
        .any(|call| matches!(call, TransportCall::Reset)));
}

#[tokio::test]
async fn control_calls_respect_the_gate_and_route_errors_to_handlers() {
    let (client, transport) = pair();
    let errors = collect_errors(&client);

    let flush = client.flush();
    let setup = client.setup("write-key", Configuration::default());
    let (flush, setup) = futures::join!(flush, setup);
    flush.unwrap();
    setup.unwrap();

    let calls = transport.calls();
    assert!(matches!(calls[0], TransportCall::Setup { .. }));
    assert!(matches!(calls[1], TransportCall::Flush));

    transport.fail_operation("disable", "bridge gone");
    client.disable().await.unwrap();
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(errors.lock().unwrap()[0].contains("disable"));

    client.enable().await.unwrap();
    client.set_idfa("ABCD-1234").await.unwrap();
    assert!(transport
        .calls()
        .iter()
        .any(|call| matches!(call, TransportCall::SetIdfa(id) if id == "ABCD-1234")));
}

#[tokio::test]
async fn an_unregistered_handler_stops_observing_failures() {
    let (client, transport) = ready_pair().await;

    let seen = Arc::new(Mutex::new(0u32));
    let counter = seen.clone();
    let token = client.register_error_handler(move |_| *counter.lock().unwrap() += 1);

    transport.fail_operation("track", "NetworkError");
    client.track("one", Properties::new()).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), 1);

    assert!(client.unregister_error_handler(token));
    client.track("two", Properties::new()).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), 1);
}

#[tokio::test]
async fn per_call_options_travel_with_the_event() {
    let (client, transport) = ready_pair().await;

    client
        .track_with_options(
            "Purchase",
            Properties::new().insert("price", 10),
            beacon_core::Options::new().integration("Amplitude", false),
        )
        .await
        .unwrap();

    let payload = &transport.payloads()[0];
    assert_eq!(payload["options"]["integrations"]["Amplitude"], false);
}

#[tokio::test]
async fn every_data_operation_flows_through_the_same_pipeline() {
    let (client, transport) = ready_pair().await;

    client.middleware(from_fn(|event: Event| async move {
        Ok(Forward::Next(event.with_property("stamped", true)))
    }));

    client
        .track("Ordered", Properties::new())
        .await
        .unwrap();
    client
        .screen("Cart", Properties::new().insert("depth", 2))
        .await
        .unwrap();
    client
        .identify("user-1", Properties::new().insert("plan", "pro"))
        .await
        .unwrap();
    client.group("acme", Properties::new()).await.unwrap();
    client.alias("user-2").await.unwrap();

    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 5);
    assert!(payloads
        .iter()
        .all(|payload| payload["properties"]["stamped"] == Value::Bool(true)));
    assert_eq!(payloads[1]["name"], "Cart");
    assert_eq!(payloads[2]["userId"], "user-1");
    assert_eq!(payloads[2]["traits"]["plan"], "pro");
    assert_eq!(payloads[3]["groupId"], "acme");
    assert_eq!(payloads[4]["newId"], "user-2");
}
