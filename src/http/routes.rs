use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn browse() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::home))
        .route("/recherche", get(handlers::search))
        .route("/abonnements", get(handlers::subscriptions_feed))
        .route("/categorie/:id", get(handlers::category_videos))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", post(handlers::logout))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/user", get(handlers::account))
        .route("/user/:id", get(handlers::user_profile))
        .route("/user/:id/subscribe", post(handlers::toggle_subscription))
}

pub fn videos() -> Router<AppState> {
    Router::new()
        .route("/video", get(handlers::list_videos))
        .route(
            "/video/new",
            get(handlers::new_video_form).post(handlers::create_video),
        )
        .route(
            "/video/:id",
            get(handlers::show_video).post(handlers::post_comment),
        )
        .route(
            "/video/:id/edit",
            get(handlers::edit_video_form).post(handlers::update_video),
        )
        .route("/video/:id/delete", post(handlers::delete_video))
        .route("/video/:id/like", post(handlers::like_video))
        .route("/video/:id/dislike", post(handlers::dislike_video))
        // Legacy paths kept for old links.
        .route("/video-like/:id/like", post(handlers::like_video))
        .route("/video-like/:id/dislike", post(handlers::dislike_video))
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route("/comment/:id/like", post(handlers::like_comment))
        .route("/comment/:id/dislike", post(handlers::dislike_comment))
        .route("/comment/:id/delete", post(handlers::delete_comment))
        .route("/comment-like/:id/like", post(handlers::like_comment))
        .route("/comment-like/:id/dislike", post(handlers::dislike_comment))
}
