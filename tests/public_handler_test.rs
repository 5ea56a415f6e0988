mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::test_app;
use fechou_backend::model::notification::NotificationKind;
use fechou_backend::model::quote::QuoteStatus;

#[tokio::test]
async fn test_first_view_notifies_provider_once() {
    let app = test_app();
    let (user_id, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let (quote_id, public_token) = app.sent_quote(&token, client_id).await;

    let first = app.request("GET", &format!("/public/quotes/{}", public_token), None, None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["number_label"], "#0001");
    assert_eq!(first.body["status"], "pending");
    assert_eq!(first.body["provider"]["name"], "Souza Reformas");
    assert_eq!(first.body["client"]["name"], "João Pereira");
    assert_eq!(first.body["can_respond"], true);
    assert_eq!(first.body["expired"], false);
    assert_eq!(first.body["items"].as_array().unwrap().len(), 2);
    assert!(first.body["viewed_at"].is_string());

    let second = app.request("GET", &format!("/public/quotes/{}", public_token), None, None).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body["viewed_at"], second.body["viewed_at"]);

    let viewed: Vec<_> = app
        .store
        .notifications_for(user_id)
        .into_iter()
        .filter(|n| n.kind == NotificationKind::QuoteViewed)
        .collect();
    assert_eq!(viewed.len(), 1);
    assert_eq!(viewed[0].quote_id, Some(quote_id));
}

#[tokio::test]
async fn test_draft_and_unknown_tokens_are_hidden() {
    let app = test_app();
    let (_, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let quote_id = app.create_quote_id(&token, client_id).await;
    let draft_token = app.store.quote(quote_id).public_token;

    let draft = app.request("GET", &format!("/public/quotes/{}", draft_token), None, None).await;
    assert_eq!(draft.status, StatusCode::NOT_FOUND);

    let approve_draft = app
        .request("POST", &format!("/public/quotes/{}/approve", draft_token), None, None)
        .await;
    assert_eq!(approve_draft.status, StatusCode::NOT_FOUND);

    let unknown = app.request("GET", &format!("/public/quotes/{}", Uuid::new_v4()), None, None).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let malformed = app.request("GET", "/public/quotes/abc", None, None).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_client_approves_once() {
    let app = test_app();
    let (user_id, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let (quote_id, public_token) = app.sent_quote(&token, client_id).await;

    let approved = app
        .request("POST", &format!("/public/quotes/{}/approve", public_token), None, None)
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.body["status"], "approved");
    assert!(approved.body["approved_at"].is_string());

    let again = app
        .request("POST", &format!("/public/quotes/{}/approve", public_token), None, None)
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let reject_after = app
        .request("POST", &format!("/public/quotes/{}/reject", public_token), None, None)
        .await;
    assert_eq!(reject_after.status, StatusCode::CONFLICT);

    assert_eq!(app.store.quote(quote_id).status, QuoteStatus::Approved);
    let approvals = app
        .store
        .notifications_for(user_id)
        .into_iter()
        .filter(|n| n.kind == NotificationKind::QuoteApproved)
        .count();
    assert_eq!(approvals, 1);

    let view = app.request("GET", &format!("/public/quotes/{}", public_token), None, None).await;
    assert_eq!(view.body["can_respond"], false);
}

#[tokio::test]
async fn test_client_rejects_with_and_without_reason() {
    let app = test_app();
    let (user_id, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;

    let (_, with_reason) = app.sent_quote(&token, client_id).await;
    let rejected = app
        .request(
            "POST",
            &format!("/public/quotes/{}/reject", with_reason),
            None,
            Some(json!({ "reason": "Achei caro" })),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.body["status"], "rejected");
    assert_eq!(rejected.body["rejection_reason"], "Achei caro");

    let (_, without_body) = app.sent_quote(&token, client_id).await;
    let rejected = app
        .request("POST", &format!("/public/quotes/{}/reject", without_body), None, None)
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert!(rejected.body["rejection_reason"].is_null());

    let rejections = app
        .store
        .notifications_for(user_id)
        .into_iter()
        .filter(|n| n.kind == NotificationKind::QuoteRejected)
        .count();
    assert_eq!(rejections, 2);
}

#[tokio::test]
async fn test_expired_quote_cannot_be_answered() {
    let app = test_app();
    let (_, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let (quote_id, public_token) = app.sent_quote(&token, client_id).await;

    let mut quote = app.store.quote(quote_id);
    quote.valid_until = Some((Utc::now() - Duration::days(2)).date_naive());
    app.store.put_quote(quote);

    let view = app.request("GET", &format!("/public/quotes/{}", public_token), None, None).await;
    assert_eq!(view.status, StatusCode::OK);
    assert_eq!(view.body["expired"], true);
    assert_eq!(view.body["can_respond"], false);

    let approve = app
        .request("POST", &format!("/public/quotes/{}/approve", public_token), None, None)
        .await;
    assert_eq!(approve.status, StatusCode::CONFLICT);
    assert_eq!(app.store.quote(quote_id).status, QuoteStatus::Pending);
}

#[tokio::test]
async fn test_quote_valid_today_can_be_answered() {
    let app = test_app();
    let (_, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let (quote_id, public_token) = app.sent_quote(&token, client_id).await;

    let mut quote = app.store.quote(quote_id);
    quote.valid_until = Some(Utc::now().date_naive());
    app.store.put_quote(quote);

    let approve = app
        .request("POST", &format!("/public/quotes/{}/approve", public_token), None, None)
        .await;
    assert_eq!(approve.status, StatusCode::OK);
}

#[tokio::test]
async fn test_public_document_and_receipt() {
    let app = test_app();
    let (_, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let (quote_id, public_token) = app.sent_quote(&token, client_id).await;

    let doc = app.request("GET", &format!("/public/quotes/{}/document", public_token), None, None).await;
    assert_eq!(doc.status, StatusCode::OK);
    assert_eq!(doc.body["kind"], "quote");
    assert_eq!(doc.body["lines"].as_array().unwrap().len(), 2);
    assert!(doc.body["watermark"].is_string());

    let no_receipt = app.request("GET", &format!("/public/quotes/{}/receipt", public_token), None, None).await;
    assert_eq!(no_receipt.status, StatusCode::NOT_FOUND);

    app.request("POST", &format!("/public/quotes/{}/approve", public_token), None, None).await;
    let paid = app
        .request(
            "POST",
            &format!("/quotes/{}/payment", quote_id),
            Some(&token),
            Some(json!({ "method": "credit_card" })),
        )
        .await;
    assert_eq!(paid.status, StatusCode::OK);

    let receipt = app.request("GET", &format!("/public/quotes/{}/receipt", public_token), None, None).await;
    assert_eq!(receipt.status, StatusCode::OK);
    assert_eq!(receipt.body["kind"], "receipt");
    assert_eq!(receipt.body["status"], "paid");
    assert_eq!(receipt.body["payment"]["method_label"], "Cartão de crédito");
    assert_eq!(receipt.body["payment"]["amount_cents"], 115000);
}

#[tokio::test]
async fn test_review_rules() {
    let app = test_app();
    let (user_id, token) = app.seed_user("maria@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let (_, public_token) = app.sent_quote(&token, client_id).await;
    let review_uri = format!("/public/quotes/{}/review", public_token);

    let too_early = app.request("POST", &review_uri, None, Some(json!({ "rating": 5 }))).await;
    assert_eq!(too_early.status, StatusCode::CONFLICT);

    app.request("POST", &format!("/public/quotes/{}/approve", public_token), None, None).await;

    let out_of_range = app.request("POST", &review_uri, None, Some(json!({ "rating": 6 }))).await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);

    let created = app
        .request("POST", &review_uri, None, Some(json!({ "rating": 4, "comment": "Ótimo serviço" })))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["rating"], 4);
    assert_eq!(created.body["user_id"], user_id.to_string());
    assert_eq!(created.body["client_id"], client_id.to_string());

    let duplicate = app.request("POST", &review_uri, None, Some(json!({ "rating": 1 }))).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    assert!(app
        .store
        .notifications_for(user_id)
        .iter()
        .any(|n| n.kind == NotificationKind::ReviewReceived));

    let view = app.request("GET", &format!("/public/quotes/{}", public_token), None, None).await;
    assert_eq!(view.body["review"]["rating"], 4);
}

#[tokio::test]
async fn test_provider_lists_and_answers_reviews() {
    let app = test_app();
    let (_, token) = app.seed_user("maria@example.com");
    let (_, other) = app.seed_user("carlos@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;

    for rating in [5, 2] {
        let (_, public_token) = app.sent_quote(&token, client_id).await;
        app.request("POST", &format!("/public/quotes/{}/approve", public_token), None, None).await;
        let resp = app
            .request(
                "POST",
                &format!("/public/quotes/{}/review", public_token),
                None,
                Some(json!({ "rating": rating })),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED);
    }

    let list = app.request("GET", "/reviews", Some(&token), None).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["total"], 2);
    assert_eq!(list.body["summary"]["count"], 2);
    assert_eq!(list.body["summary"]["average"], 3.5);

    let review_id = list.body["items"][0]["id"].as_str().unwrap().to_string();
    let foreign = app
        .request(
            "PUT",
            &format!("/reviews/{}/response", review_id),
            Some(&other),
            Some(json!({ "response": "Obrigada!" })),
        )
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let answered = app
        .request(
            "PUT",
            &format!("/reviews/{}/response", review_id),
            Some(&token),
            Some(json!({ "response": "Obrigada!" })),
        )
        .await;
    assert_eq!(answered.status, StatusCode::OK);
    assert_eq!(answered.body["response"], "Obrigada!");
    assert!(answered.body["responded_at"].is_string());
}

#[tokio::test]
async fn test_notifications_inbox() {
    let app = test_app();
    let (_, token) = app.seed_user("maria@example.com");
    let (_, other) = app.seed_user("carlos@example.com");
    let client_id = app.create_client(&token, "João Pereira").await;
    let (_, public_token) = app.sent_quote(&token, client_id).await;

    app.request("GET", &format!("/public/quotes/{}", public_token), None, None).await;
    app.request("POST", &format!("/public/quotes/{}/approve", public_token), None, None).await;

    let inbox = app.request("GET", "/notifications", Some(&token), None).await;
    assert_eq!(inbox.status, StatusCode::OK);
    assert_eq!(inbox.body["unread_count"], 2);
    let items = inbox.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);

    let first_id = items[0]["id"].as_str().unwrap().to_string();
    let foreign = app
        .request("PUT", &format!("/notifications/{}/read", first_id), Some(&other), None)
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let read = app
        .request("PUT", &format!("/notifications/{}/read", first_id), Some(&token), None)
        .await;
    assert_eq!(read.status, StatusCode::NO_CONTENT);

    let unread = app.request("GET", "/notifications?unread_only=true", Some(&token), None).await;
    assert_eq!(unread.body["items"].as_array().unwrap().len(), 1);
    assert_eq!(unread.body["unread_count"], 1);

    let all_read = app.request("PUT", "/notifications/read-all", Some(&token), None).await;
    assert_eq!(all_read.status, StatusCode::OK);
    assert_eq!(all_read.body["updated"], 1);

    let after = app.request("GET", "/notifications", Some(&token), None).await;
    assert_eq!(after.body["unread_count"], 0);
}
