//! Integration tests for the Cloudflare binding using wiremock
//!
//! Each test stands up a mock API server and checks request shape, envelope
//! decoding and error classification.

use edgeshop_provider::{
    CloudflareProvider, EdgeProvider, NewDnsRecord, ProviderError, SslState, ZoneState,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> CloudflareProvider {
    CloudflareProvider::new_with_base_url(
        "test-token".to_string(),
        "acct-1".to_string(),
        server.uri(),
    )
    .expect("valid provider")
}

fn zone_body(id: &str, status: &str) -> serde_json::Value {
    json!({
        "success": true,
        "errors": [],
        "result": {
            "id": id,
            "name": "shop.example.com",
            "status": status,
            "name_servers": ["ada.ns.cloudflare.com", "bob.ns.cloudflare.com"]
        }
    })
}

// ============================================================================
// Zones
// ============================================================================

#[tokio::test]
async fn test_create_zone_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({
            "name": "shop.example.com",
            "account": { "id": "acct-1" },
            "type": "full"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_body("zone-1", "pending")))
        .expect(1)
        .mount(&server)
        .await;

    let zone = provider(&server)
        .create_zone("shop.example.com")
        .await
        .expect("should create zone");

    assert_eq!(zone.id, "zone-1");
    assert_eq!(zone.state, ZoneState::Pending);
    assert_eq!(
        zone.name_servers,
        vec!["ada.ns.cloudflare.com", "bob.ns.cloudflare.com"]
    );
}

#[tokio::test]
async fn test_create_zone_already_exists() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": [{"code": 1061, "message": "shop.example.com already exists"}],
            "result": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server)
        .create_zone("shop.example.com")
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ZoneAlreadyExists(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_find_zone_exact_match() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .and(query_param("name", "shop.example.com"))
        .and(query_param("account.id", "acct-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [
                {
                    "id": "zone-other",
                    "name": "myshop.example.com",
                    "status": "active",
                    "name_servers": []
                },
                {
                    "id": "zone-1",
                    "name": "shop.example.com",
                    "status": "active",
                    "name_servers": ["ada.ns.cloudflare.com"]
                }
            ]
        })))
        .mount(&server)
        .await;

    let zone = provider(&server)
        .find_zone("shop.example.com")
        .await
        .expect("lookup succeeds")
        .expect("zone found");

    assert_eq!(zone.id, "zone-1");
    assert_eq!(zone.state, ZoneState::Active);
}

#[tokio::test]
async fn test_find_zone_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": []
        })))
        .mount(&server)
        .await;

    let zone = provider(&server)
        .find_zone("missing.example.com")
        .await
        .expect("lookup succeeds");
    assert!(zone.is_none());
}

#[tokio::test]
async fn test_delete_zone_not_found_is_ok() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/zones/zone-gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "errors": [{"code": 1001, "message": "Invalid zone identifier"}],
            "result": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server)
        .delete_zone("zone-gone")
        .await
        .expect("missing zone counts as deleted");
}

// ============================================================================
// DNS records
// ============================================================================

#[tokio::test]
async fn test_create_proxied_cname() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones/zone-1/dns_records"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "type": "CNAME",
            "name": "checkout.shop.example.com",
            "content": "edge.edgeshop.dev",
            "ttl": 1,
            "proxied": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": {
                "id": "rec-1",
                "type": "CNAME",
                "name": "checkout.shop.example.com",
                "content": "edge.edgeshop.dev",
                "ttl": 1,
                "proxied": true
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = provider(&server)
        .create_dns_record(
            "zone-1",
            &NewDnsRecord::proxied_cname("checkout.shop.example.com", "edge.edgeshop.dev", 1),
        )
        .await
        .expect("should create record");

    assert_eq!(record.id, "rec-1");
    assert!(record.proxied);
}

#[tokio::test]
async fn test_list_dns_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1/dns_records"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [
                {
                    "id": "rec-1",
                    "type": "CNAME",
                    "name": "checkout.shop.example.com",
                    "content": "edge.edgeshop.dev",
                    "ttl": 1,
                    "proxied": true
                },
                {
                    "id": "rec-2",
                    "type": "MX",
                    "name": "shop.example.com",
                    "content": "mail.example.com",
                    "ttl": 3600
                }
            ]
        })))
        .mount(&server)
        .await;

    let records = provider(&server)
        .list_dns_records("zone-1")
        .await
        .expect("should list records");

    assert_eq!(records.len(), 2);
    assert!(!records[1].proxied);
}

// ============================================================================
// SSL
// ============================================================================

#[tokio::test]
async fn test_activate_ssl_reports_active_certificate() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/zones/zone-1/ssl/universal/settings"))
        .and(body_json(json!({ "enabled": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": { "enabled": true }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1/ssl/certificate_packs"))
        .and(query_param("status", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [{
                "id": "pack-1",
                "status": "active",
                "certificates": [{
                    "uploaded_on": "2026-10-01T00:00:00Z",
                    "expires_on": "2026-12-30T00:00:00Z"
                }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let activation = provider(&server)
        .activate_ssl("zone-1")
        .await
        .expect("should activate");

    assert_eq!(activation.state, SslState::Active);
    let issued = activation.issued_at.expect("issued");
    let expires = activation.expires_at.expect("expires");
    assert!(expires > issued);
}

#[tokio::test]
async fn test_activate_ssl_pending_issuance() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/zones/zone-1/ssl/universal/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": { "enabled": true }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1/ssl/certificate_packs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": [{ "id": "pack-1", "status": "pending_validation", "certificates": [] }]
        })))
        .mount(&server)
        .await;

    let activation = provider(&server)
        .activate_ssl("zone-1")
        .await
        .expect("pending is not an error");

    assert_eq!(activation.state, SslState::Pending);
    assert!(activation.expires_at.is_none());
}

#[tokio::test]
async fn test_activate_ssl_zone_not_active() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/zones/zone-1/ssl/universal/settings"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": [{"code": 1010, "message": "This zone is not active"}],
            "result": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server).activate_ssl("zone-1").await.unwrap_err();

    assert!(matches!(err, ProviderError::ZoneNotActive(_)));
    assert!(err.is_retryable());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_activate_ssl_already_enabled() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/zones/zone-1/ssl/universal/settings"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": [{"code": 1450, "message": "Universal SSL is already enabled"}],
            "result": null
        })))
        .mount(&server)
        .await;

    let err = provider(&server).activate_ssl("zone-1").await.unwrap_err();
    assert!(matches!(err, ProviderError::AlreadyEnabled));
}

// ============================================================================
// Errors and retries
// ============================================================================

#[tokio::test]
async fn test_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "success": false,
            "errors": [{"code": 10000, "message": "Authentication error"}],
            "result": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server).get_zone("zone-1").await.unwrap_err();

    assert!(matches!(err, ProviderError::Unauthorized(_)));
    assert!(err.to_string().contains("Authentication error"));
    assert_eq!(err.code(), "PROVIDER_UNAUTHORIZED");
}

#[tokio::test]
async fn test_retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_body("zone-1", "active")))
        .expect(1)
        .mount(&server)
        .await;

    let zone = provider(&server)
        .get_zone("zone-1")
        .await
        .expect("third attempt succeeds");
    assert_eq!(zone.state, ZoneState::Active);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let err = provider(&server).get_zone("zone-1").await.unwrap_err();

    assert!(matches!(
        err,
        ProviderError::RateLimited {
            retry_after_secs: Some(0)
        }
    ));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/zones/zone-1/dns_records"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": [{"code": 1004, "message": "DNS Validation Error"}],
            "result": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server)
        .create_dns_record(
            "zone-1",
            &NewDnsRecord::proxied_cname("checkout.shop.example.com", "edge.edgeshop.dev", 1),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Api { status: 400, .. }));
}

#[tokio::test]
async fn test_success_without_result_fails_closed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/zones/zone-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": []
        })))
        .mount(&server)
        .await;

    let err = provider(&server).get_zone("zone-1").await.unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}
