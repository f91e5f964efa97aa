//! User Profile Tests
//!
//! Public profiles, their counters, and the account page.

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;

use tubeshare::app::subscriptions::SubscriptionService;
use tubeshare::app::users::UserService;

#[tokio::test]
async fn profile_counts_subscribers_and_videos() {
    let app = app().await;
    let creator = app.create_user("usr_counts_creator").await;
    let fan = app.create_user("usr_counts_fan").await;
    app.create_video(creator.id, "Première").await;
    app.create_video(creator.id, "Deuxième").await;
    SubscriptionService::new(app.state.db.clone())
        .toggle(fan.id, creator.id)
        .await
        .unwrap();

    let profile = UserService::new(app.state.db.clone())
        .profile(creator.id)
        .await
        .unwrap()
        .expect("profile");
    assert_eq!(profile.name, creator.name);
    assert_eq!(profile.subscribers_count, 1);
    assert_eq!(profile.subscriptions_count, 0);
    assert_eq!(profile.videos_count, 2);
}

#[tokio::test]
async fn public_profile_page_renders_for_anonymous_visitors() {
    let app = app().await;
    let creator = app.create_user("usr_page_creator").await;
    app.create_video(creator.id, "Vidéo du profil").await;

    let resp = app.get(&format!("/user/{}", creator.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let html = resp.text();
    assert!(html.contains(&creator.name));
    assert!(html.contains("Vidéo du profil"));
    assert!(!html.contains("/subscribe"));
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let app = app().await;
    let resp = app.get(&format!("/user/{}", Uuid::new_v4()), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn account_page_lists_subscribers() {
    let app = app().await;
    let creator = app.create_user("usr_account_creator").await;
    let fan = app.create_user("usr_account_fan").await;
    SubscriptionService::new(app.state.db.clone())
        .toggle(fan.id, creator.id)
        .await
        .unwrap();

    let resp = app.get("/user", Some(&creator)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let html = resp.text();
    assert!(html.contains("Mes abonnés"));
    assert!(html.contains(&fan.name));
}
