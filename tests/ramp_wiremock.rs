use anyhow::Result;
use ledgerlink::config::RampConfig;
use ledgerlink::error::ClientError;
use ledgerlink::http::QueryParams;
use ledgerlink::ramp::{Department, RampClient, RampResource, User};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{
    basic_auth, bearer_token, body_string_contains, method, path, query_param,
    query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> RampConfig {
    RampConfig {
        client_id: Some("ramp-id".to_string()),
        client_secret: Some("ramp-secret".to_string()),
        scope: Some("departments:read users:read".to_string()),
        ..RampConfig::default()
    }
}

fn token() -> SecretString {
    SecretString::from("tok-123".to_string())
}

#[tokio::test]
async fn ramp_token_uses_basic_auth_and_form() -> Result<()> {
    let server = MockServer::start().await;
    let client = RampClient::new(config()).with_base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/developer/v1/token"))
        .and(basic_auth("ramp-id", "ramp-secret"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("scope=departments%3Aread+users%3Aread"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "Bearer",
            "expires_in": 864000,
            "scope": "departments:read users:read"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client.fetch_access_token().await?.into_model();
    assert_eq!(token.access_token, "tok-123");
    assert_eq!(token.expires_in, Some(864000));

    Ok(())
}

#[tokio::test]
async fn ramp_missing_credentials_skip_http() -> Result<()> {
    let server = MockServer::start().await;
    let client = RampClient::new(RampConfig {
        client_secret: None,
        ..config()
    })
    .with_base_url(server.uri());

    let err = client.fetch_access_token().await.unwrap_err();
    assert_eq!(err.error_code(), "RAMP_PROD_API_CLIENT_SECRET_NOT_SET");
    assert_eq!(err.status(), Some(500));

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty(), "expected no HTTP requests");

    Ok(())
}

#[tokio::test]
async fn ramp_unauthorized_maps_vendor_error() -> Result<()> {
    let server = MockServer::start().await;
    let client = RampClient::new(config()).with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/developer/v1/departments"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error_code": "X", "message": "bad token"})),
        )
        .mount(&server)
        .await;

    let result = client
        .fetch_collection::<Department>(RampResource::Departments, &token(), &QueryParams::new())
        .await;

    match result {
        Err(ClientError::Api(err)) => {
            assert_eq!(err.error_code, "X");
            assert_eq!(err.message, "bad token");
            assert_eq!(err.status, 401);
        }
        other => panic!("expected API error, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn ramp_collection_sends_only_truthy_params() -> Result<()> {
    let server = MockServer::start().await;
    let client = RampClient::new(config()).with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/developer/v1/users"))
        .and(bearer_token("tok-123"))
        .and(query_param("page_size", "25"))
        .and(query_param("is_active", "false"))
        .and(query_param_is_missing("department_id"))
        .and(query_param_is_missing("start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "u1",
                "email": "ada@example.org",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "manager_id": null
            }],
            "page": {"next": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = QueryParams::new()
        .with("page_size", 25u32)
        .with("is_active", false)
        .with("department_id", "")
        .with_opt::<String>("start", None);
    let page = client
        .fetch_collection::<User>(RampResource::Users, &token(), &params)
        .await?
        .into_model();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].last_name.as_deref(), Some("Lovelace"));
    assert!(page.data[0].extra.contains_key("manager_id"));
    assert!(page.next_link().is_none());

    Ok(())
}

#[tokio::test]
async fn ramp_fetch_all_follows_start_cursor() -> Result<()> {
    let server = MockServer::start().await;
    let client = RampClient::new(RampConfig {
        page_size: 2,
        ..config()
    })
    .with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/developer/v1/departments"))
        .and(query_param("page_size", "2"))
        .and(query_param_is_missing("start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "d1", "name": "Board"}, {"id": "d2", "name": "Brand"}],
            "page": {
                "next": format!("{}/developer/v1/departments?page_size=2&start=d2", server.uri())
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/developer/v1/departments"))
        .and(query_param("start", "d2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "d3", "name": "Treasury"}],
            "page": {"next": null}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let departments: Vec<Department> = client
        .fetch_all(RampResource::Departments, &token(), &QueryParams::new())
        .await?;
    let names: Vec<&str> = departments.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Board", "Brand", "Treasury"]);

    Ok(())
}

#[tokio::test]
async fn ramp_next_link_without_start_is_an_error() -> Result<()> {
    let server = MockServer::start().await;
    let client = RampClient::new(config()).with_base_url(server.uri());

    Mock::given(method("GET"))
        .and(path("/developer/v1/departments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "d1", "name": "Board"}],
            "page": {"next": format!("{}/developer/v1/departments?page_size=100", server.uri())}
        })))
        .mount(&server)
        .await;

    let err = client
        .fetch_all::<Department>(RampResource::Departments, &token(), &QueryParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Pagination { .. }));

    Ok(())
}
