//! API integration tests
//!
//! Run against a live development server seeded with scripts/dev_seed.sql
//! (school 1, one batch of three students, two staff members).

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";
const SCHOOL: i64 = 1;

/// Create a fresh book and return its id
async fn create_book(client: &Client, title: &str, copies: i32) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .json(&json!({
            "school_id": SCHOOL,
            "title": title,
            "author": "Test Author",
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to create book");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse book response");
    body["id"].as_i64().expect("No book ID")
}

/// Provision a membership for a seeded student and return its id
async fn create_member(client: &Client, student_id: i64, limit: Option<i32>) -> i64 {
    let mut payload = json!({
        "school_id": SCHOOL,
        "member_type": "student",
        "student_id": student_id
    });
    if let Some(limit) = limit {
        payload["borrowing_limit"] = json!(limit);
    }

    let response = client
        .post(format!("{}/members", BASE_URL))
        .json(&payload)
        .send()
        .await
        .expect("Failed to create member");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse member response");
    body["id"].as_i64().expect("No member ID")
}

async fn available_copies(client: &Client, book_id: i64) -> i64 {
    let response = client
        .get(format!("{}/books/{}?school_id={}", BASE_URL, book_id, SCHOOL))
        .send()
        .await
        .expect("Failed to get book");
    let body: Value = response.json().await.expect("Failed to parse book");
    body["available_copies"].as_i64().expect("No availability")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_issue_and_return_round_trip() {
    let client = Client::new();
    let book_id = create_book(&client, "Round Trip", 1).await;
    let member_id = create_member(&client, 1, None).await;

    assert_eq!(available_copies(&client, book_id).await, 1);

    // Issue
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({
            "school_id": SCHOOL,
            "book_id": book_id,
            "member_id": member_id
        }))
        .send()
        .await
        .expect("Failed to issue loan");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan ID");
    assert_eq!(loan["status"], "issued");
    assert_eq!(loan["renewal_count"], 0);

    assert_eq!(available_copies(&client, book_id).await, 0);

    // The last copy is out: the next issue must fail without touching state
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({
            "school_id": SCHOOL,
            "book_id": book_id,
            "member_id": member_id
        }))
        .send()
        .await
        .expect("Failed to send second issue");
    assert_eq!(response.status(), 409);
    assert_eq!(available_copies(&client, book_id).await, 0);

    // Return restores availability
    let response = client
        .post(format!("{}/loans/{}/return?school_id={}", BASE_URL, loan_id, SCHOOL))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to return loan");
    assert!(response.status().is_success());
    let returned: Value = response.json().await.expect("Failed to parse return");
    assert_eq!(returned["status"], "returned");

    assert_eq!(available_copies(&client, book_id).await, 1);

    // Returning twice is an error, not a double release
    let response = client
        .post(format!("{}/loans/{}/return?school_id={}", BASE_URL, loan_id, SCHOOL))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send second return");
    assert_eq!(response.status(), 409);
    assert_eq!(available_copies(&client, book_id).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_late_return_accrues_fine() {
    let client = Client::new();
    let book_id = create_book(&client, "Late Return", 1).await;
    let member_id = create_member(&client, 2, None).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({
            "school_id": SCHOOL,
            "book_id": book_id,
            "member_id": member_id
        }))
        .send()
        .await
        .expect("Failed to issue loan");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan ID");
    let due_date: chrono::DateTime<chrono::Utc> =
        loan["due_date"].as_str().unwrap().parse().expect("Bad due date");

    // Return three days past due; default policy rate is 1.00/day
    let return_date = due_date + chrono::Duration::days(3);
    let response = client
        .post(format!("{}/loans/{}/return?school_id={}", BASE_URL, loan_id, SCHOOL))
        .json(&json!({ "return_date": return_date }))
        .send()
        .await
        .expect("Failed to return loan");
    assert!(response.status().is_success());
    let returned: Value = response.json().await.expect("Failed to parse return");
    assert_eq!(returned["status"], "returned");
    assert_eq!(returned["fine_amount"], "3.00");
    assert_eq!(returned["fine_paid"], false);
    assert_eq!(available_copies(&client, book_id).await, 1);

    // Settle the fine
    let response = client
        .post(format!("{}/loans/{}/fine/pay?school_id={}", BASE_URL, loan_id, SCHOOL))
        .send()
        .await
        .expect("Failed to pay fine");
    assert!(response.status().is_success());
    let paid: Value = response.json().await.expect("Failed to parse payment");
    assert_eq!(paid["fine_paid"], true);
}

#[tokio::test]
#[ignore]
async fn test_renewal_cap() {
    let client = Client::new();
    let book_id = create_book(&client, "Renewal Cap", 1).await;
    let member_id = create_member(&client, 3, None).await;

    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({
            "school_id": SCHOOL,
            "book_id": book_id,
            "member_id": member_id,
            "max_renewals": 1
        }))
        .send()
        .await
        .expect("Failed to issue loan");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan ID");
    let due_before: String = loan["due_date"].as_str().unwrap().to_string();

    // First renewal extends the due date
    let response = client
        .post(format!("{}/loans/{}/renew?school_id={}", BASE_URL, loan_id, SCHOOL))
        .send()
        .await
        .expect("Failed to renew");
    assert!(response.status().is_success());
    let renewed: Value = response.json().await.expect("Failed to parse renewal");
    assert_eq!(renewed["renewal_count"], 1);
    assert_ne!(renewed["due_date"].as_str().unwrap(), due_before);
    let due_after = renewed["due_date"].as_str().unwrap().to_string();

    // Second renewal hits the cap and changes nothing
    let response = client
        .post(format!("{}/loans/{}/renew?school_id={}", BASE_URL, loan_id, SCHOOL))
        .send()
        .await
        .expect("Failed to send renewal");
    assert_eq!(response.status(), 422);

    let response = client
        .get(format!("{}/loans/{}?school_id={}", BASE_URL, loan_id, SCHOOL))
        .send()
        .await
        .expect("Failed to get loan");
    let loan: Value = response.json().await.expect("Failed to parse loan");
    assert_eq!(loan["renewal_count"], 1);
    assert_eq!(loan["due_date"].as_str().unwrap(), due_after);
}

#[tokio::test]
#[ignore]
async fn test_borrowing_limit() {
    let client = Client::new();
    let book_a = create_book(&client, "Limit A", 1).await;
    let book_b = create_book(&client, "Limit B", 1).await;
    let book_c = create_book(&client, "Limit C", 1).await;
    // Seeded staff member provisioned with a cap of two loans
    let response = client
        .post(format!("{}/members", BASE_URL))
        .json(&json!({
            "school_id": SCHOOL,
            "member_type": "staff",
            "staff_id": 1,
            "borrowing_limit": 2
        }))
        .send()
        .await
        .expect("Failed to create member");
    assert_eq!(response.status(), 201);
    let member: Value = response.json().await.expect("Failed to parse member");
    let member_id = member["id"].as_i64().unwrap();

    for book_id in [book_a, book_b] {
        let response = client
            .post(format!("{}/loans", BASE_URL))
            .json(&json!({
                "school_id": SCHOOL,
                "book_id": book_id,
                "member_id": member_id
            }))
            .send()
            .await
            .expect("Failed to issue loan");
        assert_eq!(response.status(), 201);
    }

    // Third issue exceeds the cap; the catalog must be untouched
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .json(&json!({
            "school_id": SCHOOL,
            "book_id": book_c,
            "member_id": member_id
        }))
        .send()
        .await
        .expect("Failed to send third issue");
    assert_eq!(response.status(), 422);
    assert_eq!(available_copies(&client, book_c).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_import_template_download() {
    let client = Client::new();

    let response = client
        .get(format!("{}/members/import/template?member_type=teacher", BASE_URL))
        .send()
        .await
        .expect("Failed to download template");

    assert!(response.status().is_success());
    let body = response.text().await.expect("Failed to read template");
    let mut lines = body.lines();
    assert_eq!(
        lines.next(),
        Some("first_name,last_name,email,employee_id,borrowing_limit")
    );
    assert!(lines.next().is_some());
}

#[tokio::test]
#[ignore]
async fn test_group_import_skips_existing_members() {
    let client = Client::new();

    // First run provisions whoever in batch 1 is not yet a member
    let response = client
        .post(format!("{}/members/import/groups", BASE_URL))
        .json(&json!({ "school_id": SCHOOL, "batch_ids": [1] }))
        .send()
        .await
        .expect("Failed to import groups");
    assert!(response.status().is_success());

    // Second run finds everyone already provisioned: nothing to process,
    // nothing failed
    let response = client
        .post(format!("{}/members/import/groups", BASE_URL))
        .json(&json!({ "school_id": SCHOOL, "batch_ids": [1] }))
        .send()
        .await
        .expect("Failed to re-import groups");
    assert!(response.status().is_success());
    let report: Value = response.json().await.expect("Failed to parse report");
    assert_eq!(report["success"], 0);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["total"], 0);
}

#[tokio::test]
#[ignore]
async fn test_get_stats() {
    let client = Client::new();

    let response = client
        .get(format!("{}/stats?school_id={}", BASE_URL, SCHOOL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["active_loans"].is_number());
    assert!(body["overdue_loans"].is_number());
    assert!(body["active_members"].is_number());
}

#[tokio::test]
#[ignore]
async fn test_get_settings() {
    let client = Client::new();

    let response = client
        .get(format!("{}/settings?school_id={}", BASE_URL, SCHOOL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    let policies = body["policies"].as_array().expect("No policies");
    assert_eq!(policies.len(), 3);
}
