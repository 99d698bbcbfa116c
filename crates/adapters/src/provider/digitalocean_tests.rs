// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn droplet(status: &str, networks: serde_json::Value) -> Droplet {
    serde_json::from_value(serde_json::json!({
        "id": 3164444,
        "name": "spotjobs-worker-1",
        "status": status,
        "created_at": "2024-03-01T12:00:00Z",
        "networks": networks,
        "tags": ["spotjobs-worker"],
    }))
    .unwrap()
}

#[test]
fn active_droplet_maps_public_address() {
    let node = node_from_droplet(droplet(
        "active",
        serde_json::json!({"v4": [
            {"ip_address": "10.128.0.2", "type": "private"},
            {"ip_address": "203.0.113.7", "type": "public"}
        ]}),
    ))
    .unwrap();

    assert_eq!(node.id, "3164444");
    assert_eq!(node.status, NodeStatus::Active);
    assert_eq!(node.address.as_deref(), Some("203.0.113.7"));
    assert_eq!(node.created_at_ms, 1_709_294_400_000);
    assert_eq!(node.tags, vec!["spotjobs-worker".to_string()]);
    assert!(node.is_reachable());
}

#[test]
fn new_droplet_has_no_address() {
    let node = node_from_droplet(droplet("new", serde_json::json!({"v4": []}))).unwrap();
    assert_eq!(node.status, NodeStatus::New);
    assert_eq!(node.address, None);
    assert!(!node.is_reachable());
}

#[yare::parameterized(
    new     = { "new", NodeStatus::New },
    active  = { "active", NodeStatus::Active },
    off     = { "off", NodeStatus::Off },
    archive = { "archive", NodeStatus::Archived },
)]
fn maps_status(raw: &str, expected: NodeStatus) {
    assert_eq!(node_from_droplet(droplet(raw, serde_json::json!({}))).unwrap().status, expected);
}

#[test]
fn unknown_status_is_a_decode_error() {
    let err = node_from_droplet(droplet("melting", serde_json::json!({}))).unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}

#[test]
fn create_body_tags_node_and_carries_boot_script() {
    let keys = vec!["ab:cd".to_string()];
    let body = CreateDroplet {
        name: "n",
        region: "tor1",
        size: "gpu-h100x1-80gb",
        image: "gpu-h100x1-base",
        ssh_keys: &keys,
        tags: ["spotjobs-worker"],
        user_data: "#!/bin/bash",
    };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["tags"], serde_json::json!(["spotjobs-worker"]));
    assert_eq!(json["user_data"], "#!/bin/bash");
    assert_eq!(json["ssh_keys"], serde_json::json!(["ab:cd"]));
}

#[test]
fn base_url_trailing_slash_is_trimmed() {
    let provider = DigitalOceanProvider::new("https://api.example.com/", "t").unwrap();
    assert_eq!(provider.url("droplets"), "https://api.example.com/v2/droplets");
}

#[test]
fn debug_output_hides_token() {
    let provider = DigitalOceanProvider::new(DEFAULT_API_URL, "dop_v1_secret").unwrap();
    assert!(!format!("{provider:?}").contains("dop_v1_secret"));
}

#[yare::parameterized(
    transport    = { ProviderError::Http("reset".into()), true },
    timeout      = { ProviderError::Timeout, true },
    rate_limited = { ProviderError::Api { status: 429, body: String::new() }, true },
    server_error = { ProviderError::Api { status: 503, body: String::new() }, true },
    bad_request  = { ProviderError::Api { status: 422, body: String::new() }, false },
    not_found    = { ProviderError::NotFound(NodeId::from_string("1")), false },
)]
fn transient_classification(err: ProviderError, expected: bool) {
    use sj_core::Transient;
    assert_eq!(err.is_transient(), expected);
}
