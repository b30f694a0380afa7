//! End-to-end tests of the `/api/v1/contacts/import` routes.

mod common;

use axum::http::StatusCode;
use rapport_core::contact::ContactDraft;
use rapport_core::contact_store::ContactStore;
use serde_json::json;

use common::{build_test_app, build_test_app_with, delete, get, post_json, test_config, upload};

const BASE: &str = "/api/v1/contacts/import";

async fn seed(app: &common::TestApp, first: &str, last: &str, email: &str) -> i64 {
    let draft = ContactDraft {
        firstname: Some(first.into()),
        lastname: Some(last.into()),
        email: Some(email.into()),
        phone: Some("555-0100".into()),
        ..Default::default()
    };
    app.store.create(&draft).await.unwrap().id
}

// ---------------------------------------------------------------------------
// Full delimited flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delimited_upload_preview_confirm() {
    let app = build_test_app();
    let existing = seed(&app, "Carl", "Old", "carl@example.com").await;

    let csv = "First Name,Last Name,Email\n\
               Ann,Lee,ann@example.com\n\
               ,Nobody,nobody@example.com\n\
               Carl,New,carl@example.com\n";
    let (status, json) = upload(&app.router, "people.csv", csv.as_bytes(), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let data = &json["data"];
    assert_eq!(data["source_kind"], "delimited");
    assert_eq!(data["total_rows"], 3);
    assert_eq!(data["headers"], json!(["First Name", "Last Name", "Email"]));
    let session_id = data["session_id"].as_str().unwrap().to_string();
    let mapping = data["suggested_mapping"].clone();
    assert_eq!(mapping[2]["canonical_field"], "email");

    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/preview"),
        json!({ "session_id": session_id, "field_mapping": mapping }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let preview = &json["data"];
    assert_eq!(preview["total_rows"], 3);
    assert_eq!(preview["valid_rows"], 2);
    assert_eq!(preview["error_count"], 1);
    assert_eq!(preview["duplicate_count"], 1);
    assert_eq!(preview["rows"][0]["suggested_action"], "add");
    assert_eq!(preview["rows"][1]["suggested_action"], "skip");
    assert_eq!(preview["rows"][2]["suggested_action"], "update");
    assert_eq!(
        preview["rows"][2]["duplicate_match"],
        json!({ "existing_contact_id": existing, "match_reason": "email" })
    );

    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/confirm"),
        json!({
            "session_id": session_id,
            "row_actions": [
                { "row_index": 0, "action": "add" },
                { "row_index": 1, "action": "add" },
                { "row_index": 2, "action": "update" },
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let result = &json["data"];
    assert_eq!(result["created"], 1);
    assert_eq!(result["updated"], 1);
    assert_eq!(result["skipped"], 1);
    assert_eq!(result["failed"], 0);
    assert_eq!(result["total_processed"], 3);
    assert_eq!(result["errors"].as_array().unwrap().len(), 1);

    let carl = app.store.get(existing).await.unwrap();
    assert_eq!(carl.lastname, "New");
    assert_eq!(carl.phone, "555-0100");

    // A second confirm is refused and changes nothing.
    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/confirm"),
        json!({ "session_id": session_id, "row_actions": [{ "row_index": 0, "action": "add" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "SESSION_ALREADY_CONSUMED");
    assert_eq!(app.store.all().await.len(), 2);
}

#[tokio::test]
async fn name_column_is_left_unmapped() {
    let app = build_test_app();
    let (_, json) = upload(
        &app.router,
        "people.csv",
        b"Name,Email\nJane Doe,jane@example.com\n",
        None,
    )
    .await;
    let data = &json["data"];
    assert_eq!(
        data["suggested_mapping"],
        json!([
            { "source_field": "Name", "canonical_field": null },
            { "source_field": "Email", "canonical_field": "email" },
        ])
    );

    let (_, json) = post_json(
        &app.router,
        &format!("{BASE}/preview"),
        json!({
            "session_id": data["session_id"],
            "field_mapping": data["suggested_mapping"],
        }),
    )
    .await;
    let row = &json["data"]["rows"][0];
    assert_eq!(row["suggested_action"], "skip");
    assert_eq!(row["validation_errors"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// vCard flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vcard_upload_returns_preview() {
    let app = build_test_app();
    let vcf = b"BEGIN:VCARD\r\nVERSION:3.0\r\nN:Lee;Ann;;;\r\nTEL:555-0101\r\nEND:VCARD\r\n";
    let (status, json) = upload(&app.router, "contacts.vcf", vcf, None).await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &json["data"];
    assert_eq!(data["source_kind"], "vcard");
    assert!(data.get("headers").is_none());
    assert_eq!(data["preview"]["total_rows"], 1);
    assert_eq!(data["preview"]["rows"][0]["resolved_fields"]["firstname"], "Ann");

    let session_id = data["session_id"].as_str().unwrap();
    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/confirm"),
        json!({ "session_id": session_id, "row_actions": [{ "row_index": 0, "action": "add" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["created"], 1);
    assert_eq!(app.store.all().await[0].phone, "555-0101");
}

#[tokio::test]
async fn vcard_preview_rejects_mapping() {
    let app = build_test_app();
    let (_, json) = upload(&app.router, "c.vcf", b"BEGIN:VCARD\nFN:Ann\nEND:VCARD\n", None).await;
    let session_id = json["data"]["session_id"].clone();

    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/preview"),
        json!({
            "session_id": session_id,
            "field_mapping": [{ "source_field": "FN", "canonical_field": "firstname" }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_MAPPING");
}

// ---------------------------------------------------------------------------
// Upload failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsupported_file_type_is_415() {
    let app = build_test_app();
    let (status, json) = upload(&app.router, "photo.png", b"\x89PNG", None).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["code"], "UNSUPPORTED_FILE_TYPE");
}

#[tokio::test]
async fn explicit_kind_part_overrides_file_name() {
    let app = build_test_app();
    let vcf = b"BEGIN:VCARD\nFN:Ann Lee\nEND:VCARD\n";
    let (status, json) = upload(&app.router, "export.dat", vcf, Some("vcard")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["source_kind"], "vcard");
}

#[tokio::test]
async fn oversized_file_is_413() {
    let mut config = test_config();
    config.import.max_file_bytes = 16;
    let app = build_test_app_with(config);

    let csv = b"First Name,Email\nAnn,ann@example.com\n";
    let (status, json) = upload(&app.router, "people.csv", csv, None).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn empty_file_is_422() {
    let app = build_test_app();
    let (status, json) = upload(&app.router, "people.csv", b"", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNREADABLE_FILE");
}

// ---------------------------------------------------------------------------
// Preview / confirm failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preview_with_nothing_mapped_is_422() {
    let app = build_test_app();
    let (_, json) = upload(&app.router, "p.csv", b"Name\nJane\n", None).await;
    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/preview"),
        json!({
            "session_id": json["data"]["session_id"],
            "field_mapping": [{ "source_field": "Name", "canonical_field": "" }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "NO_FIELDS_MAPPED");
}

#[tokio::test]
async fn preview_mapping_unknown_column_is_400() {
    let app = build_test_app();
    let (_, json) = upload(&app.router, "p.csv", b"Name\nJane\n", None).await;
    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/preview"),
        json!({
            "session_id": json["data"]["session_id"],
            "field_mapping": [{ "source_field": "Given Name", "canonical_field": "firstname" }],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_MAPPING");
}

#[tokio::test]
async fn confirm_before_preview_is_409() {
    let app = build_test_app();
    let (_, json) = upload(&app.router, "p.csv", b"First Name\nAnn\n", None).await;
    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/confirm"),
        json!({ "session_id": json["data"]["session_id"], "row_actions": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "NO_PREVIEW_COMPUTED");
}

#[tokio::test]
async fn unknown_session_is_404() {
    let app = build_test_app();
    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/preview"),
        json!({ "session_id": uuid::Uuid::new_v4(), "field_mapping": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn expired_session_is_410() {
    let app = build_test_app();
    let (_, json) = upload(&app.router, "p.csv", b"First Name\nAnn\n", None).await;
    let session_id = json["data"]["session_id"].clone();
    let mapping = json["data"]["suggested_mapping"].clone();

    app.clock.advance(chrono::Duration::minutes(31));

    let (status, json) = post_json(
        &app.router,
        &format!("{BASE}/preview"),
        json!({ "session_id": session_id, "field_mapping": mapping }),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json["code"], "SESSION_EXPIRED");
}

// ---------------------------------------------------------------------------
// Session inspection, cancellation, field listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_can_be_inspected_and_cancelled() {
    let app = build_test_app();
    let (_, json) = upload(&app.router, "p.csv", b"First Name\nAnn\nBo\n", None).await;
    let session_id = json["data"]["session_id"].as_str().unwrap().to_string();

    let (status, json) = get(&app.router, &format!("{BASE}/{session_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["state"], "uploaded");
    assert_eq!(json["data"]["total_rows"], 2);
    assert_eq!(json["data"]["has_preview"], false);

    let (status, _) = delete(&app.router, &format!("{BASE}/{session_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = get(&app.router, &format!("{BASE}/{session_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "SESSION_NOT_FOUND");
    assert!(app.importer.sessions().is_empty().await);
}

#[tokio::test]
async fn fields_lists_canonical_schema() {
    let app = build_test_app();
    let (status, json) = get(&app.router, &format!("{BASE}/fields")).await;
    assert_eq!(status, StatusCode::OK);

    let fields = json["data"].as_array().unwrap();
    assert_eq!(fields.len(), 13);
    assert_eq!(
        fields[0],
        json!({ "name": "firstname", "multi_valued": false, "required": true })
    );
    assert_eq!(fields[12]["name"], "circles");
    assert_eq!(fields[12]["multi_valued"], true);
}
