//! User, program and health endpoints

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_first_request_creates_user() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get(&Caller::teacher("newcomer"), "/api/users").await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["id"], "newcomer");
    assert_eq!(body["username"], "newcomer");
    assert_eq!(body["isAdmin"], false);
    assert_eq!(body["iamGroups"], json!([EMPLOYEE_GROUP]));
    assert_eq!(body["managedProgramIds"], json!([]));
    assert_eq!(body["thesesTableFilters"], json!({}));
}

#[tokio::test]
async fn test_manager_sees_managed_programs() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get(&Caller::manager(), "/api/users").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["managedProgramIds"], json!([PROGRAM]));
}

#[tokio::test]
async fn test_admin_group_grants_admin() {
    let app = TestApp::spawn().await;

    let (_, body) = app.get(&Caller::admin(), "/api/users").await;

    assert_eq!(body["isAdmin"], true);
}

#[tokio::test]
async fn test_missing_uid_is_rejected() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get(&Caller::new("", &[EMPLOYEE_GROUP]), "/api/users").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_department_and_preferences() {
    let app = TestApp::spawn().await;
    let caller = Caller::teacher("teacher1");

    let (status, body) = app
        .put_json(&caller, "/api/users", json!({ "departmentId": "dep-cs" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["departmentId"], "dep-cs");

    let (status, body) = app
        .put_json(
            &caller,
            "/api/users/favoritePrograms",
            json!({ "favoriteProgramIds": [PROGRAM, OTHER_PROGRAM] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["favoriteProgramIds"], json!([PROGRAM, OTHER_PROGRAM]));

    let filters = json!({ "items": [{ "field": "status", "operator": "is", "value": "PLANNING" }] });
    let (status, body) = app
        .put_json(
            &caller,
            "/api/users/thesesTableFilters",
            json!({ "thesesTableFilters": filters.clone() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["thesesTableFilters"], filters);

    let (status, body) = app
        .put_json(
            &caller,
            "/api/users/thesesTableFilters",
            json!({ "thesesTableFilters": ["PLANNING"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["thesesTableFilters"].is_array(), "{}", body);
}

#[tokio::test]
async fn test_my_theses_lists_supervised_only() {
    let app = TestApp::spawn().await;
    app.seed_thesis(&thesis_json("PLANNING", vec![supervisor("teacher1", 100)]))
        .await;

    let (status, body) = app.get(&Caller::teacher("teacher1"), "/api/users/theses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app.get(&Caller::admin(), "/api/users/theses").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = app.get(&Caller::student("student9"), "/api/users/theses").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_program_listing() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get(&Caller::manager(), "/api/programs").await;
    assert_eq!(status, StatusCode::OK);
    let programs = body.as_array().unwrap();
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0]["id"], PROGRAM);
    assert_eq!(programs[0]["studyTracks"][0]["id"], TRACK);

    let (_, body) = app
        .get(&Caller::manager(), "/api/programs?includeNotManaged=true")
        .await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get(&Caller::admin(), "/api/programs").await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get(&Caller::teacher("teacher1"), "/api/programs").await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = app.get(&Caller::student("student9"), "/api/programs").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get(&Caller::student("anyone"), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get(&Caller::student("anyone"), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "up");
}
