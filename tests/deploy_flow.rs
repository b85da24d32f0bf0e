mod common;

use certdeploy::transport::{MockTransport, SharedTransportFactory, VendorRequest};
use certdeploy::{DeploymentTarget, Error, ErrorKind, Logger, OperationContext, ProviderRegistry};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{capturing_logger, self_signed};

fn registry(transport: Arc<MockTransport>) -> ProviderRegistry {
    ProviderRegistry::new().with_transport_factory(Arc::new(SharedTransportFactory::new(transport)))
}

fn load_balancer_vendor(listeners: usize, failing: &'static [usize]) -> Arc<MockTransport> {
    Arc::new(MockTransport::new(move |req: &VendorRequest| {
        match req.action.as_str() {
            "ListListeners" => {
                let items: Vec<_> = (1..=listeners)
                    .map(|i| json!({ "id": format!("l-{}", i), "protocol": "HTTPS" }))
                    .collect();
                Ok(json!({ "listeners": items }))
            }
            "ListCertificates" => Ok(json!({ "certificates": [], "total": 0 })),
            "UploadCertificate" => Ok(json!({ "id": "c-1" })),
            "UpdateListener" => {
                let id = req.params["listenerId"].as_str().unwrap_or_default();
                let index: usize = id.trim_start_matches("l-").parse().unwrap_or(0);
                if failing.contains(&index) {
                    Err(Error::Transport(format!("listener {} timed out", id)))
                } else {
                    Ok(json!({}))
                }
            }
            other => Err(Error::api("UnknownAction", other)),
        }
    }))
}

#[tokio::test]
async fn test_fan_out_attempts_every_listener_after_failure() {
    let transport = load_balancer_vendor(6, &[2, 5]);
    let target = registry(transport.clone())
        .resolve(
            "cloud-loadbalancer",
            &json!({
                "endpoint": "https://lb.example.com",
                "resource_type": "loadbalancer",
                "load_balancer_id": "lb-1"
            }),
        )
        .unwrap()
        .into_target()
        .unwrap();
    let fixture = self_signed(&["example.com"], 1);

    let err = target
        .deploy(&OperationContext::new(), &fixture.cert_pem, &fixture.key_pem)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    assert_eq!(transport.count("UpdateListener"), 6);
    assert_eq!(transport.count("UploadCertificate"), 1);
    match err {
        Error::PartialFailure(partial) => {
            assert_eq!(partial.failed_indices(), vec![2, 5]);
            assert_eq!(partial.succeeded, vec!["l-1", "l-3", "l-4", "l-6"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_fan_out_success_lists_bound_listeners() {
    let transport = load_balancer_vendor(3, &[]);
    let target = registry(transport)
        .resolve(
            "cloud-loadbalancer",
            &json!({
                "endpoint": "https://lb.example.com",
                "resource_type": "load-balancer",
                "load_balancer_id": "lb-1"
            }),
        )
        .unwrap()
        .into_target()
        .unwrap();
    let fixture = self_signed(&["example.com"], 1);

    let result = target
        .deploy(&OperationContext::new(), &fixture.cert_pem, &fixture.key_pem)
        .await
        .unwrap();
    assert_eq!(result.bound, vec!["l-1", "l-2", "l-3"]);
    assert_eq!(result.upload.unwrap().cert_id, "c-1");
}

#[tokio::test]
async fn test_waf_deploy_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ListCertificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "certificates": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/UploadCertificate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "w-7" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ListHosts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{ "id": "h-1", "hostname": "shop.example.com" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/UpdateHost"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let target = ProviderRegistry::new()
        .resolve(
            "cloud-waf",
            &json!({
                "endpoint": server.uri(),
                "token": "t",
                "resource_type": "cloud-server",
                "domain": "shop.example.com"
            }),
        )
        .unwrap()
        .into_target()
        .unwrap();
    let fixture = self_signed(&["shop.example.com"], 3);

    let result = target
        .deploy(&OperationContext::new(), &fixture.cert_pem, &fixture.key_pem)
        .await
        .unwrap();
    assert_eq!(result.bound, vec!["h-1"]);
}

#[tokio::test]
async fn test_vendor_error_keeps_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": "QuotaExceeded", "message": "too many certificates" }
        })))
        .mount(&server)
        .await;

    let store = ProviderRegistry::new()
        .resolve("cloud-certstore", &json!({ "endpoint": server.uri() }))
        .unwrap()
        .into_store()
        .unwrap();
    let fixture = self_signed(&["example.com"], 3);

    let err = store
        .upload(&OperationContext::new(), &fixture.cert_pem, &fixture.key_pem)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ApiSemantic);
    assert!(err.to_string().contains("QuotaExceeded"));
}

#[tokio::test]
async fn test_injected_logger_records_calls_without_key_material() {
    let transport = load_balancer_vendor(2, &[]);
    let (logger, sink) = capturing_logger();
    let target = registry(transport)
        .with_logger(logger)
        .resolve(
            "cloud-loadbalancer",
            &json!({
                "endpoint": "https://lb.example.com",
                "resource_type": "load-balancer",
                "load_balancer_id": "lb-1"
            }),
        )
        .unwrap()
        .into_target()
        .unwrap();
    let fixture = self_signed(&["example.com"], 1);

    target
        .deploy(&OperationContext::new(), &fixture.cert_pem, &fixture.key_pem)
        .await
        .unwrap();

    let logs = sink.text();
    assert!(logs.contains("cloud-loadbalancer"));
    assert!(logs.contains("UpdateListener"));
    assert!(!logs.contains("PRIVATE KEY"));
}

#[tokio::test]
async fn test_set_logger_none_silences_provider() {
    let transport = load_balancer_vendor(1, &[]);
    let (logger, sink) = capturing_logger();
    let mut target = registry(transport)
        .with_logger(logger)
        .resolve(
            "cloud-loadbalancer",
            &json!({
                "endpoint": "https://lb.example.com",
                "resource_type": "load-balancer",
                "load_balancer_id": "lb-1"
            }),
        )
        .unwrap()
        .into_target()
        .unwrap();
    target.set_logger(None);
    let fixture = self_signed(&["example.com"], 1);
    let before = sink.text();

    target
        .deploy(&OperationContext::new(), &fixture.cert_pem, &fixture.key_pem)
        .await
        .unwrap();
    assert_eq!(sink.text(), before);

    target.set_logger(Some(Logger::discard()));
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() {
    let transport = load_balancer_vendor(2, &[]);
    let target = registry(transport.clone())
        .resolve(
            "cloud-loadbalancer",
            &json!({
                "endpoint": "https://lb.example.com",
                "resource_type": "load-balancer",
                "load_balancer_id": "lb-1"
            }),
        )
        .unwrap()
        .into_target()
        .unwrap();
    let fixture = self_signed(&["example.com"], 1);
    let ctx = OperationContext::new();
    ctx.cancel();

    let err = target
        .deploy(&ctx, &fixture.cert_pem, &fixture.key_pem)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancellation);
    assert!(transport.requests().is_empty());
}

#[test]
fn test_unknown_provider_is_rejected() {
    let err = ProviderRegistry::new()
        .resolve("carrier-pigeon", &json!({}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);
}
