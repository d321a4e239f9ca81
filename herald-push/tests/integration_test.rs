//! Integration tests for herald-push

use std::sync::Arc;
use std::time::Duration;

use herald_push::*;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GCM_JSON_RESPONSE: &str =
    r#"{"cast_id":108,"success":1,"failure":0,"canonical_ids":0,"results":[{"message_id":"1:08"}]}"#;

const GCM_JSON_MULTIPLE_RESPONSE: &str = r#"{"multicast_id":108,"success":2,"failure":0,"canonical_ids":0,"results":[{"message_id":"1:08"}, {"message_id": "1:09"}]}"#;

const GCM_JSON_MULTIPLE_CANONICAL_ID_SAME_DEVICE_RESPONSE: &str = r#"{"failure":0,"canonical_ids":1,"success":2,"multicast_id":7173139966327257000,"results":[{"registration_id":"bar","message_id":"0:1440068396670935%6868637df9fd7ecd"},{"message_id":"0:1440068396670937%6868637df9fd7ecd"}]}"#;

fn dispatcher(server: &MockServer, registry: Arc<MemoryRegistry>, credentials: StaticCredentials) -> Dispatcher {
    let http = HttpTransportConfig::default()
        .gcm_url(format!("{}/gcm/send", server.uri()))
        .fcm_url(format!("{}/fcm/send", server.uri()))
        .timeout(Duration::from_secs(5));

    Dispatcher::builder()
        .registry(registry)
        .credentials(Arc::new(credentials))
        .http_config(http)
        .build()
        .unwrap()
}

fn json_credentials() -> StaticCredentials {
    StaticCredentials::new()
        .with_default(Channel::Gcm, Credential::api_key("abc"))
        .with_default(Channel::Fcm, Credential::api_key("abc"))
}

#[tokio::test]
async fn test_gcm_push_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gcm/send"))
        .and(header("Authorization", "key=abc"))
        .and(header("Content-Type", "application/json"))
        .and(body_string(r#"{"data":{"message":"Hello world"},"registration_ids":["abc"]}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string(GCM_JSON_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server, Arc::new(MemoryRegistry::new()), json_credentials());
    let report = dispatcher
        .dispatch(Channel::Gcm, &["abc".into()], &Message::new("Hello world"))
        .await
        .unwrap();

    assert_eq!(
        report.outcome("abc"),
        Some(&Outcome::Delivered {
            message_id: Some("1:08".to_string())
        })
    );
}

#[tokio::test]
async fn test_gcm_push_payload_params() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gcm/send"))
        .and(body_string(
            r#"{"data":{"message":"Hello world"},"delay_while_idle":true,"registration_ids":["abc"],"time_to_live":3600}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(GCM_JSON_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let message = Message::new("Hello world")
        .delay_while_idle(true)
        .time_to_live(3600)
        .option("foo", "bar");

    let dispatcher = dispatcher(&server, Arc::new(MemoryRegistry::new()), json_credentials());
    dispatcher
        .dispatch(Channel::Gcm, &["abc".into()], &message)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fcm_push_payload_many() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(body_string(
            r#"{"notification":{"body":"Hello world"},"registration_ids":["abc","123"]}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(GCM_JSON_MULTIPLE_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server, Arc::new(MemoryRegistry::new()), json_credentials());
    let report = dispatcher
        .dispatch(Channel::Fcm, &["abc".into(), "123".into()], &Message::new("Hello world"))
        .await
        .unwrap();

    assert_eq!(report.delivered(), 2);
    assert!(report.decisions.is_empty());
}

#[tokio::test]
async fn test_fcm_notification_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fcm/send"))
        .and(body_string(
            r#"{"data":{"other":"misc"},"notification":{"body":"Hello world","title":"Push notification"},"registration_ids":["abc"]}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(GCM_JSON_RESPONSE))
        .expect(1)
        .mount(&server)
        .await;

    let message = Message::new("Hello world")
        .extra("title", "Push notification")
        .extra("other", "misc")
        .delay_while_idle(true)
        .time_to_live(3600);

    let dispatcher = dispatcher(&server, Arc::new(MemoryRegistry::new()), json_credentials());
    dispatcher
        .dispatch(Channel::Fcm, &["abc".into()], &message)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_application_ids_use_distinct_keys() {
    let server = MockServer::start().await;
    for key in ["key=qwerty-key", "key=default-key"] {
        Mock::given(method("POST"))
            .and(path("/gcm/send"))
            .and(header("Authorization", key))
            .respond_with(ResponseTemplate::new(200).set_body_string(GCM_JSON_RESPONSE))
            .expect(1)
            .mount(&server)
            .await;
    }

    let credentials = StaticCredentials::new()
        .with_default(Channel::Gcm, Credential::api_key("default-key"))
        .with_application(Channel::Gcm, "qwerty", Credential::api_key("qwerty-key"));
    let dispatcher = dispatcher(&server, Arc::new(MemoryRegistry::new()), credentials);

    let targets = vec![Target::new("abc").application_id("qwerty"), Target::new("def")];
    let report = dispatcher
        .dispatch(Channel::Gcm, &targets, &Message::new("Hello world"))
        .await
        .unwrap();
    assert_eq!(report.delivered(), 2);
}

#[tokio::test]
async fn test_canonical_id_same_device_is_noop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(GCM_JSON_MULTIPLE_CANONICAL_ID_SAME_DEVICE_RESPONSE),
        )
        .mount(&server)
        .await;

    let registry = Arc::new(
        MemoryRegistry::with_devices([Device::gcm("foo"), Device::gcm("bar")]).unwrap(),
    );
    let dispatcher = dispatcher(&server, registry.clone(), json_credentials());

    // "bar" reports itself as canonical, which is not a rotation.
    let report = dispatcher
        .dispatch(Channel::Gcm, &["bar".into(), "foo".into()], &Message::new("Hello world"))
        .await
        .unwrap();

    assert!(report.decisions.is_empty());
    assert!(registry.is_active(Channel::Gcm, "foo"));
    assert!(registry.is_active(Channel::Gcm, "bar"));
}

#[tokio::test]
async fn test_service_unavailable_leaves_registry_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let registry = Arc::new(MemoryRegistry::with_devices([Device::gcm("abc")]).unwrap());
    let dispatcher = dispatcher(&server, registry.clone(), json_credentials());

    let err = dispatcher
        .dispatch_active(Channel::Gcm, &Message::new("Hello world"))
        .await
        .unwrap_err();

    match err {
        PushError::Dispatch(err) => {
            assert!(err.is_retryable());
            assert_eq!(
                err.transport_errors().collect::<Vec<_>>(),
                vec![&TransportError::ServiceUnavailable { status: 503 }]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.is_active(Channel::Gcm, "abc"));
}
