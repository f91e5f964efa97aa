//! Reaction Tests
//!
//! Like/dislike toggling on videos and comments, through the service and the
//! HTTP routes (including the legacy alias paths).

mod common;

use axum::http::StatusCode;
use common::app;
use uuid::Uuid;

use tubeshare::app::reactions::ReactionService;
use tubeshare::domain::reaction::{Polarity, ReactionState, ReactionSubject, SubjectKind};

// ===========================================================================
// Service
// ===========================================================================

#[tokio::test]
async fn like_then_like_then_dislike() {
    let app = app().await;
    let owner = app.create_user("react_svc_owner").await;
    let voter = app.create_user("react_svc_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo réaction").await;
    let service = ReactionService::new(app.state.db.clone());
    let subject = ReactionSubject::Video(video_id);

    let state = service.apply(subject, voter.id, Polarity::Like).await.unwrap();
    assert_eq!(state, Some(ReactionState::Like));
    assert_eq!(
        app.reaction_rows(SubjectKind::Video, video_id, voter.id).await,
        vec![true]
    );

    let state = service.apply(subject, voter.id, Polarity::Like).await.unwrap();
    assert_eq!(state, Some(ReactionState::Absent));
    assert!(app
        .reaction_rows(SubjectKind::Video, video_id, voter.id)
        .await
        .is_empty());

    let state = service
        .apply(subject, voter.id, Polarity::Dislike)
        .await
        .unwrap();
    assert_eq!(state, Some(ReactionState::Dislike));
    assert_eq!(
        app.reaction_rows(SubjectKind::Video, video_id, voter.id).await,
        vec![false]
    );

    let counts = service.counts(subject).await.unwrap();
    assert_eq!(counts.likes, 0);
    assert_eq!(counts.dislikes, 1);
}

#[tokio::test]
async fn opposite_vote_flips_in_place() {
    let app = app().await;
    let owner = app.create_user("react_flip_owner").await;
    let voter = app.create_user("react_flip_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo flip").await;
    let service = ReactionService::new(app.state.db.clone());
    let subject = ReactionSubject::Video(video_id);

    service.apply(subject, voter.id, Polarity::Like).await.unwrap();
    let before = service.find(subject, voter.id).await.unwrap().unwrap();

    service
        .apply(subject, voter.id, Polarity::Dislike)
        .await
        .unwrap();
    let after = service.find(subject, voter.id).await.unwrap().unwrap();

    assert_eq!(before.id, after.id);
    assert!(!after.is_like);
}

#[tokio::test]
async fn alternating_votes_never_leave_more_than_one_row() {
    let app = app().await;
    let owner = app.create_user("react_alt_owner").await;
    let voter = app.create_user("react_alt_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo alternée").await;
    let comment_id = app
        .create_comment(video_id, owner.id, "premier !", None)
        .await;
    let service = ReactionService::new(app.state.db.clone());
    let subject = ReactionSubject::Comment(comment_id);

    for round in 0..9 {
        let polarity = if round % 3 == 0 {
            Polarity::Dislike
        } else {
            Polarity::Like
        };
        service.apply(subject, voter.id, polarity).await.unwrap();
        let rows = app
            .reaction_rows(SubjectKind::Comment, comment_id, voter.id)
            .await;
        assert!(rows.len() <= 1, "round {} left {} rows", round, rows.len());

        let counts = service.counts(subject).await.unwrap();
        let likes = rows.iter().filter(|is_like| **is_like).count() as i64;
        assert_eq!(counts.likes, likes);
        assert_eq!(counts.dislikes, rows.len() as i64 - likes);
    }
}

#[tokio::test]
async fn concurrent_first_votes_keep_a_single_row() {
    let app = app().await;
    let owner = app.create_user("react_race_owner").await;
    let voter = app.create_user("react_race_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo concurrente").await;
    let subject = ReactionSubject::Video(video_id);

    let first = ReactionService::new(app.state.db.clone());
    let second = ReactionService::new(app.state.db.clone());
    let (a, b) = tokio::join!(
        first.apply(subject, voter.id, Polarity::Like),
        second.apply(subject, voter.id, Polarity::Like),
    );
    a.unwrap();
    b.unwrap();

    let rows = app
        .reaction_rows(SubjectKind::Video, video_id, voter.id)
        .await;
    assert!(rows.len() <= 1);
}

#[tokio::test]
async fn unknown_subject_is_reported() {
    let app = app().await;
    let voter = app.create_user("react_missing_voter").await;
    let service = ReactionService::new(app.state.db.clone());

    let state = service
        .apply(ReactionSubject::Video(Uuid::new_v4()), voter.id, Polarity::Like)
        .await
        .unwrap();
    assert_eq!(state, None);
}

// ===========================================================================
// HTTP
// ===========================================================================

#[tokio::test]
async fn like_route_toggles_and_redirects_to_video() {
    let app = app().await;
    let owner = app.create_user("react_http_owner").await;
    let voter = app.create_user("react_http_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo HTTP").await;
    let token = app.csrf(&voter, &format!("like{}", video_id));

    let resp = app
        .post_form(
            &format!("/video/{}/like", video_id),
            &[("csrf_token", token.as_str())],
            Some(&voter),
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let expected = format!("/video/{}", video_id);
    assert_eq!(resp.location(), Some(expected.as_str()));
    assert_eq!(
        app.reaction_rows(SubjectKind::Video, video_id, voter.id).await,
        vec![true]
    );

    // Legacy alias hits the same handler: second like removes the vote.
    let resp = app
        .post_form(
            &format!("/video-like/{}/like", video_id),
            &[("csrf_token", token.as_str())],
            Some(&voter),
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert!(app
        .reaction_rows(SubjectKind::Video, video_id, voter.id)
        .await
        .is_empty());
}

#[tokio::test]
async fn reaction_redirects_to_same_origin_referer() {
    let app = app().await;
    let owner = app.create_user("react_ref_owner").await;
    let voter = app.create_user("react_ref_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo referer").await;
    let token = app.csrf(&voter, &format!("dislike{}", video_id));

    let resp = app
        .post_form_with_headers(
            &format!("/video/{}/dislike", video_id),
            &[("csrf_token", token.as_str())],
            Some(&voter),
            &[("referer", "http://localhost/recherche?q=test")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/recherche?q=test"));

    let resp = app
        .post_form_with_headers(
            &format!("/video/{}/dislike", video_id),
            &[("csrf_token", token.as_str())],
            Some(&voter),
            &[("referer", "https://elsewhere.example.com/")],
        )
        .await;
    let expected = format!("/video/{}", video_id);
    assert_eq!(resp.location(), Some(expected.as_str()));
}

#[tokio::test]
async fn bad_csrf_token_skips_the_vote() {
    let app = app().await;
    let owner = app.create_user("react_csrf_owner").await;
    let voter = app.create_user("react_csrf_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo CSRF").await;
    // Token minted for the opposite action.
    let token = app.csrf(&voter, &format!("dislike{}", video_id));

    let resp = app
        .post_form(
            &format!("/video/{}/like", video_id),
            &[("csrf_token", token.as_str())],
            Some(&voter),
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert!(app
        .reaction_rows(SubjectKind::Video, video_id, voter.id)
        .await
        .is_empty());
}

#[tokio::test]
async fn anonymous_vote_redirects_to_login() {
    let app = app().await;
    let owner = app.create_user("react_anon_owner").await;
    let video_id = app.create_video(owner.id, "Vidéo anonyme").await;

    let resp = app
        .post_form(&format!("/video/{}/like", video_id), &[], None)
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/login"));
}

#[tokio::test]
async fn comment_votes_redirect_to_their_video() {
    let app = app().await;
    let owner = app.create_user("react_cmt_owner").await;
    let voter = app.create_user("react_cmt_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo commentée").await;
    let comment_id = app.create_comment(video_id, owner.id, "salut", None).await;

    let like = app.csrf(&voter, &format!("like{}", comment_id));
    let dislike = app.csrf(&voter, &format!("dislike{}", comment_id));

    app.post_form(
        &format!("/comment/{}/like", comment_id),
        &[("csrf_token", like.as_str())],
        Some(&voter),
    )
    .await;
    app.post_form(
        &format!("/comment-like/{}/like", comment_id),
        &[("csrf_token", like.as_str())],
        Some(&voter),
    )
    .await;
    let resp = app
        .post_form(
            &format!("/comment/{}/dislike", comment_id),
            &[("csrf_token", dislike.as_str())],
            Some(&voter),
        )
        .await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let expected = format!("/video/{}", video_id);
    assert_eq!(resp.location(), Some(expected.as_str()));
    assert_eq!(
        app.reaction_rows(SubjectKind::Comment, comment_id, voter.id)
            .await,
        vec![false]
    );
}

#[tokio::test]
async fn rejected_comment_vote_returns_to_its_video() {
    let app = app().await;
    let owner = app.create_user("react_cmt_csrf_owner").await;
    let voter = app.create_user("react_cmt_csrf_voter").await;
    let video_id = app.create_video(owner.id, "Vidéo refusée").await;
    let comment_id = app.create_comment(video_id, owner.id, "bonjour", None).await;

    let resp = app
        .post_form(
            &format!("/comment/{}/like", comment_id),
            &[("csrf_token", "00")],
            Some(&voter),
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let expected = format!("/video/{}", video_id);
    assert_eq!(resp.location(), Some(expected.as_str()));
    assert!(app
        .reaction_rows(SubjectKind::Comment, comment_id, voter.id)
        .await
        .is_empty());
}

#[tokio::test]
async fn vote_on_missing_video_is_not_found() {
    let app = app().await;
    let voter = app.create_user("react_404_voter").await;
    let video_id = Uuid::new_v4();
    let token = app.csrf(&voter, &format!("like{}", video_id));

    let resp = app
        .post_form(
            &format!("/video/{}/like", video_id),
            &[("csrf_token", token.as_str())],
            Some(&voter),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
