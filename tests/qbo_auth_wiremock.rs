use anyhow::Result;
use ledgerlink::config::QboConfig;
use ledgerlink::credentials::{FileTokenStore, TokenStore};
use ledgerlink::error::ClientError;
use ledgerlink::qbo::{QboAuth, WellKnownInfo};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{basic_auth, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> QboConfig {
    QboConfig {
        base_url: Some("https://sandbox-quickbooks.api.intuit.com".to_string()),
        client_id: Some("qbo-id".to_string()),
        client_secret: Some("qbo-secret".to_string()),
        environment: "sandbox".to_string(),
        realm_id: Some("4620816365".to_string()),
        redirect_url: Some("http://localhost:8765/callback".to_string()),
        well_known_url: Some(format!("{}/.well-known/openid_sandbox_configuration", server.uri())),
        ..QboConfig::default()
    }
}

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid_sandbox_configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": "https://oauth.platform.intuit.com/op/v1",
            "authorization_endpoint": "https://appcenter.intuit.com/connect/oauth2",
            "token_endpoint": format!("{}/oauth2/v1/tokens/bearer", server.uri()),
            "revocation_endpoint": format!("{}/oauth2/v1/tokens/revoke", server.uri()),
            "userinfo_endpoint": "https://sandbox-accounts.platform.intuit.com/v1/openid_connect/userinfo",
            "jwks_uri": "https://oauth.platform.intuit.com/op/v1/jwks"
        })))
        .mount(server)
        .await;
}

async fn discover(auth: &QboAuth) -> Result<WellKnownInfo> {
    Ok(auth.discover().await?.into_model())
}

#[tokio::test]
async fn qbo_discovery_reads_endpoints() -> Result<()> {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let auth = QboAuth::new(config(&server));

    let info = discover(&auth).await?;
    assert_eq!(info.token_endpoint, format!("{}/oauth2/v1/tokens/bearer", server.uri()));
    assert!(info.revocation_endpoint.is_some());

    Ok(())
}

#[tokio::test]
async fn qbo_discovery_requires_well_known_url() -> Result<()> {
    let server = MockServer::start().await;
    let auth = QboAuth::new(QboConfig {
        well_known_url: None,
        ..config(&server)
    });

    let err = auth.discover().await.unwrap_err();
    assert_eq!(err.error_code(), "QBO_WELL_KNOWN_URL_NOT_SET");
    assert!(server.received_requests().await.unwrap_or_default().is_empty());

    Ok(())
}

#[tokio::test]
async fn qbo_exchange_code_posts_authorization_grant() -> Result<()> {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v1/tokens/bearer"))
        .and(basic_auth("qbo-id", "qbo-secret"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=AB11-code"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8765%2Fcallback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "refresh_token": "rt-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "x_refresh_token_expires_in": 8726400
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = QboAuth::new(config(&server));
    let info = discover(&auth).await?;
    let tokens = auth.exchange_code(&info, "AB11-code").await?.into_model();

    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(tokens.x_refresh_token_expires_in, Some(8726400));

    Ok(())
}

#[tokio::test]
async fn qbo_refresh_rotates_cached_token() -> Result<()> {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v1/tokens/bearer"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "refresh_token": "rt-new",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new()?;
    let store = FileTokenStore::with_path(dir.path())?;
    let auth = QboAuth::new(config(&server));
    let key = auth.config().refresh_token_key();
    store.save(&key, SecretString::from("rt-old".to_string())).await?;

    let info = discover(&auth).await?;
    let cached = store.load(&key).await?.expect("cached refresh token");
    let tokens = auth.refresh(&info, cached).await?.into_model();
    if let Some(rotated) = &tokens.refresh_token {
        store.save(&key, SecretString::from(rotated.clone())).await?;
    }

    let creds = auth.credentials_from_tokens(&tokens, chrono::Utc::now())?;
    assert_eq!(creds.realm_id, "4620816365");
    assert_eq!(
        store.load(&key).await?.unwrap().expose_secret(),
        "rt-new"
    );
    assert!(dir.path().join("qbo_refresh_token.sandbox.token").exists());

    Ok(())
}

#[tokio::test]
async fn qbo_refresh_rejection_is_api_error() -> Result<()> {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v1/tokens/bearer"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Incorrect or invalid refresh token"
        })))
        .mount(&server)
        .await;

    let auth = QboAuth::new(config(&server));
    let info = discover(&auth).await?;
    let err = auth
        .refresh(&info, SecretString::from("stale".to_string()))
        .await
        .unwrap_err();

    match err {
        ClientError::Api(api) => {
            assert_eq!(api.status, 400);
            assert_eq!(api.error_code, "invalid_grant");
        }
        other => panic!("expected API error, got {other:?}"),
    }

    Ok(())
}
