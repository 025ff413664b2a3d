use std::io::Cursor;

use chrono::{Duration, Utc};
use fleetsync_core::oauth::{
    authorize_interactively, AuthError, Authorizer, ClientSecrets, StoredToken, TokenStore,
};
use mockito::{Matcher, Server};
use reqwest::blocking::Client;

fn secrets(server: &Server) -> ClientSecrets {
    ClientSecrets {
        client_id: "abc.apps.googleusercontent.com".to_string(),
        client_secret: "shh".to_string(),
        auth_uri: format!("{}/o/oauth2/auth", server.url()),
        token_uri: format!("{}/token", server.url()),
        redirect_uris: vec!["http://localhost".to_string()],
    }
}

fn authorizer(server: &Server, store: &TokenStore) -> Authorizer {
    Authorizer::new(secrets(server), store.clone(), Client::new())
}

#[test]
fn expired_token_is_refreshed_and_cached() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = TokenStore::new(dir.path().join("token.yaml"));
    store
        .save(&StoredToken {
            access_token: "ya29.stale".to_string(),
            refresh_token: "1//old".to_string(),
            expires_at: Some(Utc::now() - Duration::minutes(5)),
            scope: None,
        })
        .expect("seed token");

    let mut server = Server::new();
    let refresh = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "1//old".into()),
            Matcher::UrlEncoded("client_id".into(), "abc.apps.googleusercontent.com".into()),
            Matcher::UrlEncoded("client_secret".into(), "shh".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.new","expires_in":3599,"token_type":"Bearer"}"#)
        .create();

    let before = Utc::now();
    let token = authorizer(&server, &store).access_token().expect("refresh");

    assert_eq!(token, "ya29.new");
    let cached = store.load().expect("load").expect("cached token");
    assert_eq!(cached.access_token, "ya29.new");
    assert_eq!(cached.refresh_token, "1//old");
    assert!(cached.expires_at.expect("expiry") > before + Duration::minutes(59));
    refresh.assert();
}

#[test]
fn fresh_token_is_used_without_calling_the_endpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = TokenStore::new(dir.path().join("token.yaml"));
    let cached = StoredToken {
        access_token: "ya29.cached".to_string(),
        refresh_token: "1//old".to_string(),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        scope: None,
    };
    store.save(&cached).expect("seed token");

    let mut server = Server::new();
    let refresh = server.mock("POST", "/token").expect(0).create();

    let token = authorizer(&server, &store).access_token().expect("cached");

    assert_eq!(token, "ya29.cached");
    assert_eq!(store.load().expect("load"), Some(cached));
    refresh.assert();
}

#[test]
fn rejected_refresh_keeps_the_cached_token() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = TokenStore::new(dir.path().join("token.yaml"));
    let stale = StoredToken {
        access_token: "ya29.stale".to_string(),
        refresh_token: "1//revoked".to_string(),
        expires_at: Some(Utc::now() - Duration::minutes(5)),
        scope: None,
    };
    store.save(&stale).expect("seed token");

    let mut server = Server::new();
    let refresh = server
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .create();

    let err = authorizer(&server, &store)
        .access_token()
        .expect_err("revoked");

    assert!(matches!(err, AuthError::TokenEndpoint { status: 400, ref body } if body.contains("invalid_grant")));
    assert_eq!(store.load().expect("load"), Some(stale));
    refresh.assert();
}

#[test]
fn interactive_code_is_exchanged_and_cached() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = TokenStore::new(dir.path().join("token.yaml"));

    let mut server = Server::new();
    let exchange = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "4/abc".into()),
            Matcher::UrlEncoded("redirect_uri".into(), "http://localhost".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"access_token":"ya29.first","refresh_token":"1//granted","expires_in":3599,"scope":"https://www.googleapis.com/auth/spreadsheets"}"#,
        )
        .create();

    let mut prompt = Vec::new();
    let token = authorize_interactively(
        &authorizer(&server, &store),
        Cursor::new("4/abc\n"),
        &mut prompt,
    )
    .expect("authorize");

    let prompt = String::from_utf8(prompt).expect("utf8 prompt");
    assert!(prompt.contains(&format!("{}/o/oauth2/auth?", server.url())));
    assert_eq!(token.refresh_token, "1//granted");
    assert_eq!(store.load().expect("load"), Some(token));
    exchange.assert();
}
