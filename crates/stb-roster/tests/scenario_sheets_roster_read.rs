//! `read_roster` over a mocked Sheets values API.
//!
//! GREEN when:
//! - All five ranges are fetched with the API key and combined into one
//!   normalized roster.
//! - A failing range read aborts the whole read.

use httpmock::prelude::*;
use serde_json::json;
use stb_config::{RosterLayout, RosterRanges};
use stb_roster::{read_roster, RosterSource, SheetsCredential, SheetsRosterSource};
use stb_schemas::{Group, Race, ServiceError, Tier};

fn layout(base: String) -> (RosterLayout, SheetsRosterSource) {
    let layout = RosterLayout {
        spreadsheet_id: "sheet1".to_string(),
        api_base: base.clone(),
        ranges: RosterRanges {
            screen_names: "Players!A2:A".to_string(),
            handles: "Players!B2:B".to_string(),
            races: "Players!E2:E".to_string(),
            groups: "Players!C2:C".to_string(),
            teams: "Teams!A1:Z".to_string(),
        },
    };
    let src = SheetsRosterSource::new_with_base_url(
        SheetsCredential::ApiKey("test-key".to_string()),
        base,
    );
    (layout, src)
}

fn mock_range<'a>(server: &'a MockServer, range: &str, values: serde_json::Value) -> httpmock::Mock<'a> {
    let path = format!("/spreadsheets/sheet1/values/{range}");
    server.mock(|when, then| {
        when.method(GET).path(path).query_param("key", "test-key");
        then.status(200)
            .json_body(json!({"range": range, "majorDimension": "ROWS", "values": values}));
    })
}

#[tokio::test]
async fn five_ranges_combine_into_roster() {
    let server = MockServer::start();
    let names = mock_range(&server, "Players!A2:A", json!([["Alice"], ["Bob"]]));
    let handles = mock_range(&server, "Players!B2:B", json!([["alice#0001"], ["bob"]]));
    let races = mock_range(&server, "Players!E2:E", json!([["Terran"]]));
    let groups = mock_range(&server, "Players!C2:C", json!([["Player"], ["Coach"]]));
    let teams = mock_range(
        &server,
        "Teams!A1:Z",
        json!([["Phoenix"], ["Tier 1"], ["Alice"], ["Coaches"], ["Bob"]]),
    );

    let (layout, src) = layout(server.base_url());
    let read = read_roster(&src, &layout).await.unwrap();

    for m in [&names, &handles, &races, &groups, &teams] {
        m.assert();
    }

    let alice = &read.roster["Alice"];
    assert_eq!(alice.external_handle, "alice#0001");
    assert_eq!(alice.race, Some(Race::Terran));
    assert_eq!(alice.group, Some(Group::Player));
    assert_eq!(alice.tier, Some(Tier::T1));
    assert_eq!(alice.team, "Phoenix");

    let bob = &read.roster["Bob"];
    assert_eq!(bob.race, None, "missing trailing race cell reads as unset");
    assert_eq!(bob.group, Some(Group::Coach));
    assert_eq!(bob.team, "Phoenix");
    assert_eq!(read.teams.team_names, vec!["Phoenix".to_string()]);
}

#[tokio::test]
async fn failed_range_aborts_read() {
    let server = MockServer::start();
    mock_range(&server, "Players!A2:A", json!([["Alice"]]));
    server.mock(|when, then| {
        when.method(GET).path("/spreadsheets/sheet1/values/Players!B2:B");
        then.status(403)
            .json_body(json!({"error": {"code": 403, "message": "The caller does not have permission"}}));
    });

    let (layout, src) = layout(server.base_url());
    let err = read_roster(&src, &layout).await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("Players!B2:B"), "got: {msg}");
    assert!(msg.contains("status=403"), "got: {msg}");
}

#[tokio::test]
async fn bearer_credential_uses_authorization_header() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET)
            .path("/spreadsheets/sheet1/values/Teams!A1:Z")
            .header("authorization", "Bearer tok-123");
        then.status(200).json_body(json!({"range": "Teams!A1:Z"}));
    });

    let src = SheetsRosterSource::new_with_base_url(
        SheetsCredential::Bearer("tok-123".to_string()),
        server.base_url(),
    );
    let rows = src.get_range("sheet1", "Teams!A1:Z").await.unwrap();
    m.assert();
    assert!(rows.is_empty(), "absent values means an empty range");
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/spreadsheets/sheet1/values/Teams!A1:Z");
        then.status(200).body("<html>not json</html>");
    });
    let src = SheetsRosterSource::new_with_base_url(SheetsCredential::None, server.base_url());
    let err = src.get_range("sheet1", "Teams!A1:Z").await.unwrap_err();
    assert!(matches!(err, ServiceError::Decode(_)));
}
