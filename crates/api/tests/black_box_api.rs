use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use groupvault_core::UserId;
use groupvault_vault::GovernancePolicy;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = groupvault_api::app::build_app(GovernancePolicy::default())
            .expect("default policy is valid");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn post(
    client: &reqwest::Client,
    url: String,
    caller: UserId,
    body: Value,
) -> (StatusCode, Value) {
    let res = client
        .post(url)
        .header("x-caller-id", caller.to_string())
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get(client: &reqwest::Client, url: String, caller: UserId) -> (StatusCode, Value) {
    let res = client
        .get(url)
        .header("x-caller-id", caller.to_string())
        .send()
        .await
        .unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn create_vault(server: &TestServer, client: &reqwest::Client, owner: UserId) -> String {
    let (status, body) = post(
        client,
        server.url("/vaults"),
        owner,
        json!({ "name": "Flat 3B", "description": "rent and bills", "vault_type": "savings" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn balance_of(details: &Value) -> Decimal {
    details["vault"]["total_balance"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn health_is_public_but_everything_else_needs_a_caller() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.url("/vaults")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/whoami"))
        .header("x-caller-id", "nobody")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let me = UserId::new();
    let (status, body) = get(&client, server.url("/whoami"), me).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], me.to_string());
}

#[tokio::test]
async fn create_deposit_and_read_back() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = UserId::new();
    let vault = create_vault(&server, &client, owner).await;

    let (status, tx) = post(
        &client,
        server.url(&format!("/vaults/{vault}/deposits")),
        owner,
        json!({ "amount": "250.00", "description": "first month" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tx["tx_type"], "deposit");

    let (status, details) = get(&client, server.url(&format!("/vaults/{vault}")), owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance_of(&details), Decimal::from(250));
    assert_eq!(details["members"].as_array().unwrap().len(), 1);
    assert_eq!(details["transactions"].as_array().unwrap().len(), 1);

    let (status, list) = get(&client, server.url("/vaults"), owner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    // A stranger neither sees the private vault nor has it listed.
    let stranger = UserId::new();
    let (status, body) = get(&client, server.url(&format!("/vaults/{vault}")), stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_a_member");
    let (_, list) = get(&client, server.url("/vaults"), stranger).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn withdrawal_proposal_executes_once_quorum_is_reached() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = UserId::new();
    let vault = create_vault(&server, &client, owner).await;

    let members: Vec<UserId> = (0..3).map(|_| UserId::new()).collect();
    for m in &members {
        let (status, body) = post(
            &client,
            server.url(&format!("/vaults/{vault}/members")),
            owner,
            json!({ "user_id": m.to_string() }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["outcome"], "added");
    }
    post(
        &client,
        server.url(&format!("/vaults/{vault}/deposits")),
        owner,
        json!({ "amount": 500 }),
    )
    .await;

    let (status, proposal) = post(
        &client,
        server.url(&format!("/vaults/{vault}/proposals")),
        members[0],
        json!({ "action_type": "withdraw", "amount": "120", "description": "boiler" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(proposal["status"], "pending");
    let proposal_id = proposal["id"].as_str().unwrap().to_string();
    let votes = server.url(&format!("/proposals/{proposal_id}/votes"));

    let (status, p) = post(&client, votes.clone(), members[1], json!({ "approve": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(p["status"], "pending");

    let (status, body) = post(&client, votes.clone(), members[1], json!({ "approve": true })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_voted");

    let (status, p) = post(&client, votes.clone(), members[2], json!({ "approve": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(p["status"], "executed");

    let (_, details) = get(&client, server.url(&format!("/vaults/{vault}")), owner).await;
    assert_eq!(balance_of(&details), Decimal::from(380));

    let (status, body) = post(&client, votes, owner, json!({ "approve": false })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "proposal_closed");

    let (status, proposals) = get(
        &client,
        server.url(&format!("/vaults/{vault}/proposals")),
        owner,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(proposals.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn domain_errors_surface_as_status_codes() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = UserId::new();
    let vault = create_vault(&server, &client, owner).await;

    // Overdraw.
    let (status, body) = post(
        &client,
        server.url(&format!("/vaults/{vault}/withdrawals")),
        owner,
        json!({ "amount": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_funds");

    // Non-positive amount.
    let (status, _) = post(
        &client,
        server.url(&format!("/vaults/{vault}/deposits")),
        owner,
        json!({ "amount": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Voting the owner out is refused up front.
    let (status, body) = post(
        &client,
        server.url(&format!("/vaults/{vault}/proposals")),
        owner,
        json!({ "action_type": "remove_member", "target": owner.to_string() }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "last_owner_protected");

    // Unknown proposal and vault.
    let (status, _) = post(
        &client,
        server.url(&format!("/proposals/{}/votes", UserId::new())),
        owner,
        json!({ "approve": true }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&client, server.url(&format!("/vaults/{}", UserId::new())), owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Malformed ids and enum values.
    let (status, body) = get(&client, server.url("/vaults/not-an-id"), owner).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
    let (status, body) = post(
        &client,
        server.url(&format!("/vaults/{vault}/proposals")),
        owner,
        json!({ "action_type": "dissolve" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_action_type");
}

#[tokio::test]
async fn permission_explanations_and_deactivation() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = UserId::new();
    let member = UserId::new();
    let vault = create_vault(&server, &client, owner).await;
    post(
        &client,
        server.url(&format!("/vaults/{vault}/members")),
        owner,
        json!({ "user_id": member.to_string(), "role": "member" }),
    )
    .await;

    let (status, explanation) = get(
        &client,
        server.url(&format!("/vaults/{vault}/members/{member}/permissions/can_withdraw")),
        owner,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(explanation["granted"], false);
    assert_eq!(explanation["role"], "member");

    let res = client
        .post(server.url(&format!("/vaults/{vault}/deactivate")))
        .header("x-caller-id", member.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(server.url(&format!("/vaults/{vault}/deactivate")))
        .header("x-caller-id", owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, body) = post(
        &client,
        server.url(&format!("/vaults/{vault}/deposits")),
        owner,
        json!({ "amount": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "vault_inactive");
}
