mod common;

use axum::http::StatusCode;
use common::{router, send, Caller};
use serde_json::json;

async fn create_network(app: &axum::Router, tenant: &str, name: &str) -> String {
    let (status, body) = send(app, Caller::Tenant(tenant), "POST", "/v2.0/networks", Some(json!({ "network": { "name": name } }))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["network"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_and_version() {
    let app = router();
    let (status, body) = send(&app, Caller::Anonymous, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
    let (status, body) = send(&app, Caller::Anonymous, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("netapi"));
}

#[tokio::test]
async fn network_create_fills_defaults_and_lists() {
    let app = router();
    let (status, body) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/networks", Some(json!({ "network": { "name": "net1" } }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let net = &body["network"];
    assert_eq!(net["name"], json!("net1"));
    assert_eq!(net["admin_state_up"], json!(true));
    assert_eq!(net["shared"], json!(false));
    assert_eq!(net["tenant_id"], json!("t1"));
    assert_eq!(net["status"], json!("ACTIVE"));
    assert_eq!(net["subnets"], json!([]));
    let id = net["id"].as_str().unwrap();

    let (status, body) = send(&app, Caller::Tenant("t1"), "GET", "/v2.0/networks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["networks"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, Caller::Tenant("t1"), "GET", &format!("/v2.0/networks/{}?fields=name", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "network": { "id": id, "name": "net1" } }));
}

#[tokio::test]
async fn list_filters_by_attribute() {
    let app = router();
    create_network(&app, "t1", "a").await;
    create_network(&app, "t1", "b").await;
    let (_, body) = send(&app, Caller::Tenant("t1"), "GET", "/v2.0/networks?name=b", None).await;
    let names: Vec<_> = body["networks"].as_array().unwrap().iter().map(|n| n["name"].clone()).collect();
    assert_eq!(names, vec![json!("b")]);
    let (_, body) = send(&app, Caller::Tenant("t1"), "GET", "/v2.0/networks?shared=True", None).await;
    assert_eq!(body["networks"], json!([]));
}

#[tokio::test]
async fn request_errors_are_bad_requests() {
    let app = router();
    let (status, body) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/networks", Some(json!({ "network": { "bogus": 1 } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], json!("Unrecognized attribute(s) 'bogus'"));

    let (status, body) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/networks", Some(json!({ "network": { "status": "DOWN" } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], json!("Attribute 'status' not allowed in POST"));

    let (status, body) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/subnets", Some(json!({ "subnet": { "ip_version": 4 } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        json!("Failed to parse request. Required attribute 'network_id' not specified")
    );

    let (status, body) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/networks", Some(json!({ "port": {} }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));
}

#[tokio::test]
async fn shared_networks_need_admin() {
    let app = router();
    let body = json!({ "network": { "name": "pub", "shared": true } });
    let (status, _) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/networks", Some(body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, created) = send(&app, Caller::Admin, "POST", "/v2.0/networks", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["network"]["id"].as_str().unwrap();

    let (status, _) = send(&app, Caller::Tenant("t2"), "GET", &format!("/v2.0/networks/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        Caller::Tenant("t2"),
        "PUT",
        &format!("/v2.0/networks/{}", id),
        Some(json!({ "network": { "name": "mine" } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn private_networks_are_hidden_from_other_tenants() {
    let app = router();
    let id = create_network(&app, "t1", "private").await;
    let (status, body) = send(&app, Caller::Tenant("t2"), "GET", &format!("/v2.0/networks/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], json!(format!("network {} could not be found", id)));
    let (_, body) = send(&app, Caller::Tenant("t2"), "GET", "/v2.0/networks", None).await;
    assert_eq!(body["networks"], json!([]));
}

#[tokio::test]
async fn update_changes_only_allowed_attributes() {
    let app = router();
    let id = create_network(&app, "t1", "old").await;
    let uri = format!("/v2.0/networks/{}", id);
    let (status, body) = send(&app, Caller::Tenant("t1"), "PUT", &uri, Some(json!({ "network": { "name": "new", "admin_state_up": "false" } }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["network"]["name"], json!("new"));
    assert_eq!(body["network"]["admin_state_up"], json!(false));

    let (status, body) = send(&app, Caller::Tenant("t1"), "PUT", &uri, Some(json!({ "network": { "tenant_id": "t1" } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], json!("Cannot update read-only attribute tenant_id"));
}

#[tokio::test]
async fn ports_need_an_existing_network() {
    let app = router();
    let missing = "6f0d7f5e-3b0e-4a5c-9f7f-1d2c3b4a5e6f";
    let (status, _) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/ports", Some(json!({ "port": { "network_id": missing } }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let net = create_network(&app, "t1", "n").await;
    let (status, body) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/ports", Some(json!({ "port": { "network_id": net } }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let port = &body["port"];
    assert!(port["mac_address"].as_str().unwrap().starts_with("fa:16:3e:"));
    assert_eq!(port["fixed_ips"], json!([]));
    assert_eq!(port["status"], json!("DOWN"));
}

#[tokio::test]
async fn referenced_network_cannot_be_deleted() {
    let app = router();
    let net = create_network(&app, "t1", "n").await;
    let (_, body) = send(&app, Caller::Tenant("t1"), "POST", "/v2.0/ports", Some(json!({ "port": { "network_id": net } }))).await;
    let port = body["port"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Caller::Tenant("t1"), "DELETE", &format!("/v2.0/networks/{}", net), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("conflict"));

    let (status, _) = send(&app, Caller::Tenant("t1"), "DELETE", &format!("/v2.0/ports/{}", port), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Caller::Tenant("t1"), "DELETE", &format!("/v2.0/networks/{}", net), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Caller::Tenant("t1"), "GET", &format!("/v2.0/networks/{}", net), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subnet_gets_generated_addressing() {
    let app = router();
    let net = create_network(&app, "t1", "n").await;
    let (status, body) = send(
        &app,
        Caller::Tenant("t1"),
        "POST",
        "/v2.0/subnets",
        Some(json!({ "subnet": { "network_id": net, "ip_version": 4, "cidr": "192.168.1.0/24" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let subnet = &body["subnet"];
    assert_eq!(subnet["gateway_ip"], json!("192.168.1.1"));
    assert_eq!(subnet["allocation_pools"], json!([{ "start": "192.168.1.2", "end": "192.168.1.254" }]));
    assert_eq!(subnet["enable_dhcp"], json!(true));

    let (_, body) = send(&app, Caller::Tenant("t1"), "GET", &format!("/v2.0/networks/{}", net), None).await;
    assert_eq!(body["network"]["subnets"], json!([subnet["id"]]));

    let (status, body) = send(
        &app,
        Caller::Tenant("t1"),
        "POST",
        "/v2.0/subnets",
        Some(json!({ "subnet": { "network_id": net, "ip_version": 4, "cidr": "192.168.1.7/24" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().starts_with("Invalid input for cidr."));
}

#[tokio::test]
async fn bulk_create_returns_every_resource() {
    let app = router();
    let (status, body) = send(
        &app,
        Caller::Tenant("t1"),
        "POST",
        "/v2.0/networks",
        Some(json!({ "networks": [{ "name": "a" }, { "name": "b" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["networks"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        Caller::Tenant("t1"),
        "POST",
        "/v2.0/networks",
        Some(json!({ "networks": [{ "name": "c" }, { "bogus": true }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = send(&app, Caller::Tenant("t1"), "GET", "/v2.0/networks", None).await;
    assert_eq!(body["networks"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_bulk_subnet_create_leaves_nothing_behind() {
    let app = router();
    let net = create_network(&app, "t1", "n").await;
    let (status, body) = send(
        &app,
        Caller::Tenant("t1"),
        "POST",
        "/v2.0/subnets",
        Some(json!({ "subnets": [
            { "network_id": net, "ip_version": 4, "cidr": "10.0.0.0/24" },
            { "network_id": net, "ip_version": 4, "cidr": "10.0.1.0/24", "gateway_ip": "10.0.2.1" }
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(body["error"]["message"].as_str().unwrap().contains("conflicts with subnet"));

    let (_, body) = send(&app, Caller::Admin, "GET", "/v2.0/subnets", None).await;
    assert_eq!(body["subnets"], json!([]));
    let (_, body) = send(&app, Caller::Tenant("t1"), "GET", &format!("/v2.0/networks/{}", net), None).await;
    assert_eq!(body["network"]["subnets"], json!([]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_port_create_and_network_delete_leave_no_orphans() {
    let app = router();
    for i in 0..25 {
        let net = create_network(&app, "t1", &format!("n{}", i)).await;
        let port_app = app.clone();
        let port_net = net.clone();
        let create = tokio::spawn(async move {
            send(&port_app, Caller::Tenant("t1"), "POST", "/v2.0/ports", Some(json!({ "port": { "network_id": port_net } }))).await
        });
        let delete_app = app.clone();
        let delete_uri = format!("/v2.0/networks/{}", net);
        let delete = tokio::spawn(async move { send(&delete_app, Caller::Tenant("t1"), "DELETE", &delete_uri, None).await });
        let (created, _) = create.await.unwrap();
        let (deleted, _) = delete.await.unwrap();
        match deleted {
            StatusCode::NO_CONTENT => assert_eq!(created, StatusCode::NOT_FOUND),
            StatusCode::CONFLICT => assert_eq!(created, StatusCode::CREATED),
            other => panic!("unexpected delete status {}", other),
        }
    }

    let (_, body) = send(&app, Caller::Admin, "GET", "/v2.0/ports", None).await;
    for port in body["ports"].as_array().unwrap() {
        let uri = format!("/v2.0/networks/{}", port["network_id"].as_str().unwrap());
        let (status, _) = send(&app, Caller::Admin, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK, "port {} outlived its network", port["id"]);
    }
}

#[tokio::test]
async fn unknown_collections_are_not_found() {
    let app = router();
    let (status, _) = send(&app, Caller::Tenant("t1"), "GET", "/v2.0/routers", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Caller::Tenant("t1"), "GET", "/v2.0/portprofiles", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
