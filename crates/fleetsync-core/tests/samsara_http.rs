use fleetsync_core::config::Config;
use fleetsync_core::equipment::{EquipmentSource, FetchError, SamsaraClient};
use fleetsync_core::EquipmentRecord;
use mockito::{Matcher, Server};

const STATS_PATH: &str = "/fleet/equipment/stats";

fn config_for(server: &Server, token: &str) -> Config {
    Config::from_yaml_str(&format!(
        "samsara_auth_token: {token}\n\
         sheet_id: sheet\n\
         special_sheet_name: Fleet\n\
         xml_file_name: fleet.xml\n\
         samsara_api_url: '{}{STATS_PATH}?types=gpsOdometerMeters,gatewayEngineSeconds'\n",
        server.url()
    ))
    .expect("config")
}

fn stats_query() -> Matcher {
    Matcher::UrlEncoded(
        "types".into(),
        "gpsOdometerMeters,gatewayEngineSeconds".into(),
    )
}

#[test]
fn fetch_sends_bearer_and_accept_headers() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", STATS_PATH)
        .match_query(stats_query())
        .match_header("accept", "application/json")
        .match_header("authorization", "Bearer tok")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data": [
                {"name": "Truck 12", "gpsOdometerMeters": {"value": 12345}, "gatewayEngineSeconds": {"value": 7200}},
                {"name": "Excavator", "gpsOdometerMeters": {"value": "250000"}, "gatewayEngineSeconds": {"value": "45000"}}
            ]}"#,
        )
        .create();

    let client = SamsaraClient::new(&config_for(&server, "tok")).expect("client");
    let records = client.fetch_equipment().expect("fetch");

    assert_eq!(
        records,
        vec![
            EquipmentRecord::from_raw("Truck 12", 12345.0, 7200.0),
            EquipmentRecord::from_raw("Excavator", 250000.0, 45000.0),
        ]
    );
    mock.assert();
}

#[test]
fn non_success_status_is_a_fetch_error() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", STATS_PATH)
        .match_query(stats_query())
        .with_status(401)
        .with_body(r#"{"message":"Unauthorized"}"#)
        .create();

    let client = SamsaraClient::new(&config_for(&server, "expired")).expect("client");
    let err = client.fetch_equipment().expect_err("unauthorized");

    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Unauthorized"));
        }
        other => panic!("unexpected error: {other}"),
    }
    mock.assert();
}

#[test]
fn success_without_data_array_is_rejected() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", STATS_PATH)
        .match_query(stats_query())
        .with_status(200)
        .with_body(r#"{"pagination": {"hasNextPage": false}}"#)
        .create();

    let client = SamsaraClient::new(&config_for(&server, "tok")).expect("client");
    let err = client.fetch_equipment().expect_err("no data");

    assert!(matches!(err, FetchError::MissingData));
    mock.assert();
}
