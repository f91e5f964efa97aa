use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::app::auth::{AuthError, RegistrationInput};
use crate::app::categories::CategoryService;
use crate::app::comments::{CommentError, CommentService};
use crate::app::csrf::intent;
use crate::app::reactions::{ReactionError, ReactionService};
use crate::app::subscriptions::SubscriptionService;
use crate::app::users::UserService;
use crate::app::validation::FieldErrors;
use crate::app::videos::{VideoInput, VideoService};
use crate::domain::category::Category;
use crate::domain::reaction::{Polarity, ReactionState, ReactionSubject};
use crate::domain::video::{Video, VideoDraft};
use crate::http::auth::{expired_session_cookie, session_cookie};
use crate::http::views::{self, Viewer, VideoForm, VideoPage};
use crate::http::{AppError, AuthUser};
use crate::AppState;

const HOME_VIDEO_LIMIT: i64 = 24;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CommentForm {
    pub content: String,
    pub parent_id: String,
    pub csrf_token: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct VideoFormData {
    pub title: String,
    pub description: String,
    pub url: String,
    pub thumbnail_url: String,
    pub category_id: String,
    pub csrf_token: String,
}

impl VideoFormData {
    fn input(&self) -> VideoInput {
        VideoInput {
            title: self.title.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            category_id: self.category_id.clone(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub agree_terms: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Same-origin path from the `Referer` header, if any.
fn referer_path(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(header::REFERER)?.to_str().ok()?;

    if referer.starts_with('/') && !referer.starts_with("//") {
        return Some(referer.to_string());
    }

    let url = Url::parse(referer).ok()?;
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let origin = match url.port() {
        Some(port) => format!("{}:{}", url.host_str()?, port),
        None => url.host_str()?.to_string(),
    };
    if !origin.eq_ignore_ascii_case(host) {
        return None;
    }

    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}

fn redirect_back(headers: &HeaderMap, fallback: &str) -> Redirect {
    let target = referer_path(headers).unwrap_or_else(|| fallback.to_string());
    Redirect::to(&target)
}

async fn load_viewer<'a>(
    state: &'a AppState,
    auth: Option<&AuthUser>,
) -> Result<Option<Viewer<'a>>, AppError> {
    let Some(auth) = auth else {
        return Ok(None);
    };

    let user = state
        .auth_service()
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load current user");
            AppError::internal("failed to load current user")
        })?;

    Ok(user.map(|user| Viewer::new(user, &state.csrf)))
}

/// Signed-in user whose account still exists.
async fn require_viewer<'a>(state: &'a AppState, auth: &AuthUser) -> Result<Viewer<'a>, AppError> {
    load_viewer(state, Some(auth))
        .await?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))
}

/// Reject sessions whose account has since been deleted.
async fn require_account(state: &AppState, auth: &AuthUser) -> Result<(), AppError> {
    require_viewer(state, auth).await.map(|_| ())
}

fn unprocessable(html: String) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response()
}

pub async fn home(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = load_viewer(&state, auth.as_ref()).await?;

    let categories = CategoryService::new(state.db.clone())
        .list()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list categories");
            AppError::internal("failed to list categories")
        })?;
    let videos = VideoService::new(state.db.clone())
        .list_recent(HOME_VIDEO_LIMIT)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list recent videos");
            AppError::internal("failed to list videos")
        })?;

    Ok(Html(views::home(viewer.as_ref(), &categories, &videos)))
}

pub async fn list_videos(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = load_viewer(&state, auth.as_ref()).await?;
    let videos = VideoService::new(state.db.clone())
        .list_all()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list videos");
            AppError::internal("failed to list videos")
        })?;

    Ok(Html(views::video_index(viewer.as_ref(), &videos)))
}

pub async fn search(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>, AppError> {
    let viewer = load_viewer(&state, auth.as_ref()).await?;
    let q = query.q.unwrap_or_default();

    let videos = VideoService::new(state.db.clone())
        .search(&q)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, query = %q, "failed to search videos");
            AppError::internal("failed to search videos")
        })?;

    Ok(Html(views::search(viewer.as_ref(), &q, &videos)))
}

pub async fn subscriptions_feed(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = require_viewer(&state, &auth).await?;

    let creators = SubscriptionService::new(state.db.clone())
        .list_subscriptions(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list subscriptions");
            AppError::internal("failed to list subscriptions")
        })?;
    let videos = VideoService::new(state.db.clone())
        .list_from_subscriptions(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list subscription videos");
            AppError::internal("failed to list videos")
        })?;

    Ok(Html(views::subscriptions(&viewer, &creators, &videos)))
}

pub async fn category_videos(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = load_viewer(&state, auth.as_ref()).await?;

    let category = CategoryService::new(state.db.clone())
        .get(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, category_id = %id, "failed to load category");
            AppError::internal("failed to load category")
        })?
        .ok_or_else(|| AppError::not_found("Catégorie introuvable"))?;

    let videos = VideoService::new(state.db.clone())
        .list_by_category(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, category_id = %id, "failed to list category videos");
            AppError::internal("failed to list videos")
        })?;

    Ok(Html(views::category(viewer.as_ref(), &category, &videos)))
}

pub async fn account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = require_viewer(&state, &auth).await?;
    let user_id = auth.user_id;

    let profile = UserService::new(state.db.clone())
        .profile(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to load profile");
            AppError::internal("failed to load profile")
        })?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

    let videos = VideoService::new(state.db.clone())
        .list_by_owner(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to list own videos");
            AppError::internal("failed to list videos")
        })?;

    let subscriptions = SubscriptionService::new(state.db.clone());
    let followees = subscriptions
        .list_subscriptions(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to list subscriptions");
            AppError::internal("failed to list subscriptions")
        })?;
    let followers = subscriptions
        .list_subscribers(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to list subscribers");
            AppError::internal("failed to list subscribers")
        })?;

    Ok(Html(views::account(
        &viewer, &profile, &videos, &followees, &followers,
    )))
}

pub async fn user_profile(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = load_viewer(&state, auth.as_ref()).await?;

    let profile = UserService::new(state.db.clone())
        .profile(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to load profile");
            AppError::internal("failed to load profile")
        })?
        .ok_or_else(|| AppError::not_found("Utilisateur introuvable"))?;

    let videos = VideoService::new(state.db.clone())
        .list_by_owner(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list user videos");
            AppError::internal("failed to list videos")
        })?;

    let subscribed = match &viewer {
        Some(viewer) if viewer.id() != id => SubscriptionService::new(state.db.clone())
            .is_subscribed(viewer.id(), id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %viewer.id(), followee_id = %id, "failed to check subscription");
                AppError::internal("failed to check subscription")
            })?,
        _ => false,
    };

    Ok(Html(views::profile(
        viewer.as_ref(),
        &profile,
        &videos,
        subscribed,
    )))
}

pub async fn toggle_subscription(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    require_account(&state, &auth).await?;
    let fallback = format!("/user/{}", id);

    if !state
        .csrf
        .verify(auth.user_id, &intent("subscribe", id), &form.csrf_token)
    {
        tracing::warn!(user_id = %auth.user_id, followee_id = %id, "invalid CSRF token on subscribe");
        return Ok(redirect_back(&headers, &fallback));
    }

    let subscribed = SubscriptionService::new(state.db.clone())
        .toggle(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, followee_id = %id, "failed to toggle subscription");
            AppError::internal("failed to toggle subscription")
        })?
        .ok_or_else(|| AppError::not_found("Utilisateur introuvable"))?;

    tracing::info!(user_id = %auth.user_id, followee_id = %id, subscribed, "subscription toggled");

    Ok(redirect_back(&headers, &fallback))
}

/// Render the detail page, optionally with a rejected comment draft.
async fn render_video_page(
    state: &AppState,
    viewer: Option<&Viewer<'_>>,
    video: &Video,
    comment_draft: &str,
    comment_error: Option<&str>,
) -> Result<String, AppError> {
    let subject = ReactionSubject::Video(video.id);
    let reactions = ReactionService::new(state.db.clone());

    let counts = reactions.counts(subject).await.map_err(|err| {
        tracing::error!(error = ?err, video_id = %video.id, "failed to count reactions");
        AppError::internal("failed to load video")
    })?;
    let viewer_state = match viewer {
        Some(viewer) => reactions
            .state_for(subject, viewer.id())
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, video_id = %video.id, user_id = %viewer.id(), "failed to load reaction state");
                AppError::internal("failed to load video")
            })?,
        None => ReactionState::Absent,
    };

    let threads = CommentService::new(state.db.clone())
        .list_threads(video.id, viewer.map(|viewer| viewer.id()))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, video_id = %video.id, "failed to list comments");
            AppError::internal("failed to load comments")
        })?;

    let page = VideoPage {
        video,
        counts,
        viewer_state,
        threads: &threads,
        comment_draft,
        comment_error,
    };
    Ok(views::video_page(viewer, &page))
}

async fn find_video(state: &AppState, id: Uuid) -> Result<Video, AppError> {
    VideoService::new(state.db.clone())
        .get(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, video_id = %id, "failed to load video");
            AppError::internal("failed to load video")
        })?
        .ok_or_else(|| AppError::not_found("Vidéo introuvable"))
}

pub async fn show_video(
    Path(id): Path<Uuid>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = load_viewer(&state, auth.as_ref()).await?;

    let counted = VideoService::new(state.db.clone())
        .record_view(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, video_id = %id, "failed to record view");
            AppError::internal("failed to load video")
        })?;
    if !counted {
        return Err(AppError::not_found("Vidéo introuvable"));
    }

    let video = find_video(&state, id).await?;
    let html = render_video_page(&state, viewer.as_ref(), &video, "", None).await?;
    Ok(Html(html))
}

pub async fn post_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let viewer = require_viewer(&state, &auth).await?;
    let video = find_video(&state, id).await?;

    if !state
        .csrf
        .verify(auth.user_id, &intent("comment", id), &form.csrf_token)
    {
        tracing::warn!(user_id = %auth.user_id, video_id = %id, "invalid CSRF token on comment");
        let html = render_video_page(
            &state,
            Some(&viewer),
            &video,
            &form.content,
            Some("Le formulaire a expiré, veuillez réessayer."),
        )
        .await?;
        return Ok(unprocessable(html));
    }

    let parent_id = match form.parent_id.trim() {
        "" => None,
        raw => match Uuid::parse_str(raw) {
            Ok(parent_id) => Some(parent_id),
            Err(_) => {
                let message = CommentError::ParentNotFound.to_string();
                let html =
                    render_video_page(&state, Some(&viewer), &video, &form.content, Some(&message))
                        .await?;
                return Ok(unprocessable(html));
            }
        },
    };

    let created = CommentService::new(state.db.clone())
        .create(id, auth.user_id, &form.content, parent_id)
        .await;

    match created {
        Ok(comment) => {
            tracing::info!(user_id = %auth.user_id, video_id = %id, comment_id = %comment.id, "comment created");
            Ok(Redirect::to(&format!("/video/{}#comment-{}", id, comment.id)).into_response())
        }
        Err(err) => match err.downcast_ref::<CommentError>() {
            Some(rejection) => {
                let message = rejection.to_string();
                let html =
                    render_video_page(&state, Some(&viewer), &video, &form.content, Some(&message))
                        .await?;
                Ok(unprocessable(html))
            }
            None => {
                tracing::error!(error = ?err, user_id = %auth.user_id, video_id = %id, "failed to create comment");
                Err(AppError::internal("failed to create comment"))
            }
        },
    }
}

async fn list_categories(state: &AppState) -> Result<Vec<Category>, AppError> {
    CategoryService::new(state.db.clone())
        .list()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list categories");
            AppError::internal("failed to list categories")
        })
}

/// Validate a submitted video form, including the category reference.
async fn validate_video_form(
    state: &AppState,
    user_id: Uuid,
    csrf_intent: &str,
    form: &VideoFormData,
) -> Result<Result<VideoDraft, FieldErrors>, AppError> {
    if !state.csrf.verify(user_id, csrf_intent, &form.csrf_token) {
        tracing::warn!(user_id = %user_id, intent = csrf_intent, "invalid CSRF token on video form");
        let mut errors = FieldErrors::default();
        errors.push("form", "Le formulaire a expiré, veuillez réessayer.");
        return Ok(Err(errors));
    }

    let draft = match form.input().validate() {
        Ok(draft) => draft,
        Err(errors) => return Ok(Err(errors)),
    };

    if let Some(category_id) = draft.category_id {
        let category = CategoryService::new(state.db.clone())
            .get(category_id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, category_id = %category_id, "failed to load category");
                AppError::internal("failed to load category")
            })?;
        if category.is_none() {
            let mut errors = FieldErrors::default();
            errors.push("category_id", "Catégorie invalide");
            return Ok(Err(errors));
        }
    }

    Ok(Ok(draft))
}

pub async fn new_video_form(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = require_viewer(&state, &auth).await?;
    let categories = list_categories(&state).await?;

    let form = VideoForm {
        heading: "Publier une vidéo",
        action: "/video/new".to_string(),
        csrf_intent: "new-video".to_string(),
        input: &VideoInput::default(),
        errors: &FieldErrors::default(),
        categories: &categories,
    };
    Ok(Html(views::video_form(&viewer, &form)))
}

pub async fn create_video(
    auth: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<VideoFormData>,
) -> Result<Response, AppError> {
    let viewer = require_viewer(&state, &auth).await?;

    let draft = match validate_video_form(&state, auth.user_id, "new-video", &form).await? {
        Ok(draft) => draft,
        Err(errors) => {
            let categories = list_categories(&state).await?;
            let page = VideoForm {
                heading: "Publier une vidéo",
                action: "/video/new".to_string(),
                csrf_intent: "new-video".to_string(),
                input: &form.input(),
                errors: &errors,
                categories: &categories,
            };
            return Ok(unprocessable(views::video_form(&viewer, &page)));
        }
    };

    let video = VideoService::new(state.db.clone())
        .create(auth.user_id, draft)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create video");
            AppError::internal("failed to create video")
        })?;

    tracing::info!(user_id = %auth.user_id, video_id = %video.id, "video created");

    Ok(Redirect::to(&format!("/video/{}", video.id)).into_response())
}

async fn owned_video(state: &AppState, id: Uuid, user_id: Uuid) -> Result<Video, AppError> {
    let video = find_video(state, id).await?;
    if video.owner_id != user_id {
        return Err(AppError::forbidden(
            "Vous ne pouvez modifier que vos propres vidéos",
        ));
    }
    Ok(video)
}

pub async fn edit_video_form(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let viewer = require_viewer(&state, &auth).await?;
    let video = owned_video(&state, id, auth.user_id).await?;
    let categories = list_categories(&state).await?;

    let form = VideoForm {
        heading: "Modifier la vidéo",
        action: format!("/video/{}/edit", id),
        csrf_intent: intent("edit", id),
        input: &VideoInput::from(&video),
        errors: &FieldErrors::default(),
        categories: &categories,
    };
    Ok(Html(views::video_form(&viewer, &form)))
}

pub async fn update_video(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<VideoFormData>,
) -> Result<Response, AppError> {
    let viewer = require_viewer(&state, &auth).await?;
    owned_video(&state, id, auth.user_id).await?;

    let csrf_intent = intent("edit", id);
    let draft = match validate_video_form(&state, auth.user_id, &csrf_intent, &form).await? {
        Ok(draft) => draft,
        Err(errors) => {
            let categories = list_categories(&state).await?;
            let page = VideoForm {
                heading: "Modifier la vidéo",
                action: format!("/video/{}/edit", id),
                csrf_intent,
                input: &form.input(),
                errors: &errors,
                categories: &categories,
            };
            return Ok(unprocessable(views::video_form(&viewer, &page)));
        }
    };

    VideoService::new(state.db.clone())
        .update(id, auth.user_id, draft)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, video_id = %id, "failed to update video");
            AppError::internal("failed to update video")
        })?
        .ok_or_else(|| AppError::not_found("Vidéo introuvable"))?;

    tracing::info!(user_id = %auth.user_id, video_id = %id, "video updated");

    Ok(Redirect::to(&format!("/video/{}", id)).into_response())
}

pub async fn delete_video(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    require_account(&state, &auth).await?;
    let video = owned_video(&state, id, auth.user_id).await?;

    if !state
        .csrf
        .verify(auth.user_id, &intent("delete", id), &form.csrf_token)
    {
        tracing::warn!(user_id = %auth.user_id, video_id = %id, "invalid CSRF token on video delete");
        return Ok(redirect_back(&headers, &format!("/video/{}", id)));
    }

    VideoService::new(state.db.clone())
        .delete(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, video_id = %id, "failed to delete video");
            AppError::internal("failed to delete video")
        })?;

    tracing::info!(user_id = %auth.user_id, video_id = %id, "video deleted");

    Ok(Redirect::to(&format!("/user/{}", video.owner_id)))
}

/// Shared body of the four like/dislike endpoints.
async fn react(
    state: &AppState,
    auth: &AuthUser,
    headers: &HeaderMap,
    subject: ReactionSubject,
    polarity: Polarity,
    csrf_token: &str,
) -> Result<Redirect, AppError> {
    let id = subject.id();
    let kind = subject.kind().as_str();

    require_account(state, auth).await?;

    if !state
        .csrf
        .verify(auth.user_id, &intent(polarity.action(), id), csrf_token)
    {
        tracing::warn!(user_id = %auth.user_id, subject_kind = kind, subject_id = %id, "invalid CSRF token on reaction");
        let fallback = reaction_fallback(state, subject).await?;
        return Ok(redirect_back(headers, &fallback));
    }

    ReactionService::new(state.db.clone())
        .apply(subject, auth.user_id, polarity)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, subject_kind = kind, subject_id = %id, "failed to apply reaction");
            reaction_failure(err)
        })?
        .ok_or_else(|| AppError::not_found("Contenu introuvable"))?;

    let fallback = reaction_fallback(state, subject).await?;
    Ok(redirect_back(headers, &fallback))
}

/// Page showing the subject: the video itself, or the video a comment is on.
async fn reaction_fallback(state: &AppState, subject: ReactionSubject) -> Result<String, AppError> {
    match subject {
        ReactionSubject::Video(video_id) => Ok(format!("/video/{}", video_id)),
        ReactionSubject::Comment(comment_id) => {
            let comment = CommentService::new(state.db.clone())
                .get(comment_id)
                .await
                .map_err(|err| {
                    tracing::error!(error = ?err, comment_id = %comment_id, "failed to load comment");
                    AppError::internal("failed to load comment")
                })?;
            Ok(comment
                .map(|comment| format!("/video/{}", comment.video_id))
                .unwrap_or_else(|| "/".to_string()))
        }
    }
}

/// Exhausted vote retries are a retryable conflict, anything else is internal.
fn reaction_failure(err: anyhow::Error) -> AppError {
    if err.downcast_ref::<ReactionError>().is_some() {
        return AppError::conflict("Votre vote n'a pas pu être enregistré, veuillez réessayer.");
    }
    AppError::internal("failed to apply reaction")
}

pub async fn like_video(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    react(
        &state,
        &auth,
        &headers,
        ReactionSubject::Video(id),
        Polarity::Like,
        &form.csrf_token,
    )
    .await
}

pub async fn dislike_video(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    react(
        &state,
        &auth,
        &headers,
        ReactionSubject::Video(id),
        Polarity::Dislike,
        &form.csrf_token,
    )
    .await
}

pub async fn like_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    react(
        &state,
        &auth,
        &headers,
        ReactionSubject::Comment(id),
        Polarity::Like,
        &form.csrf_token,
    )
    .await
}

pub async fn dislike_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    react(
        &state,
        &auth,
        &headers,
        ReactionSubject::Comment(id),
        Polarity::Dislike,
        &form.csrf_token,
    )
    .await
}

pub async fn delete_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    require_account(&state, &auth).await?;
    let service = CommentService::new(state.db.clone());
    let comment = service
        .get(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %id, "failed to load comment");
            AppError::internal("failed to load comment")
        })?
        .ok_or_else(|| AppError::not_found("Commentaire introuvable"))?;

    if comment.author_id != auth.user_id {
        return Err(AppError::forbidden(
            "Vous ne pouvez supprimer que vos propres commentaires",
        ));
    }

    let fallback = format!("/video/{}", comment.video_id);
    if !state
        .csrf
        .verify(auth.user_id, &intent("delete-comment", id), &form.csrf_token)
    {
        tracing::warn!(user_id = %auth.user_id, comment_id = %id, "invalid CSRF token on comment delete");
        return Ok(redirect_back(&headers, &fallback));
    }

    service.delete(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, comment_id = %id, "failed to delete comment");
        AppError::internal("failed to delete comment")
    })?;

    tracing::info!(user_id = %auth.user_id, comment_id = %id, "comment deleted");

    Ok(redirect_back(&headers, &fallback))
}

pub async fn register_form(auth: Option<AuthUser>) -> Response {
    if auth.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(views::register_form(
        &RegistrationInput::default(),
        &FieldErrors::default(),
    ))
    .into_response()
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let input = RegistrationInput {
        name: form.name,
        email: form.email,
        password: form.password,
        password_confirmation: form.password_confirmation,
        agree_terms: form.agree_terms.is_some(),
    };

    if let Err(errors) = input.validate() {
        return Ok(unprocessable(views::register_form(&input, &errors)));
    }

    let service = state.auth_service();
    let user = match service
        .register(&input.name, &input.email, &input.password)
        .await
    {
        Ok(user) => user,
        Err(err) => match err.downcast_ref::<AuthError>() {
            Some(rejection) => {
                let mut errors = FieldErrors::default();
                errors.push("email", rejection.to_string());
                return Ok(unprocessable(views::register_form(&input, &errors)));
            }
            None => {
                tracing::error!(error = ?err, "failed to register user");
                return Err(AppError::internal("failed to register user"));
            }
        },
    };

    tracing::info!(user_id = %user.id, "user registered");

    let session = service.issue_session_token(user.id).map_err(|err| {
        tracing::error!(error = ?err, user_id = %user.id, "failed to issue session");
        AppError::internal("failed to sign in")
    })?;

    let jar = jar.add(session_cookie(&state, session));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn login_form(auth: Option<AuthUser>) -> Response {
    if auth.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(views::login_form("", None)).into_response()
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let session = state
        .auth_service()
        .login(&form.email, &form.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    let Some(session) = session else {
        return Ok(unprocessable(views::login_form(
            &form.email,
            Some("Identifiants invalides."),
        )));
    };

    let jar = jar.add(session_cookie(&state, session));
    Ok((jar, Redirect::to("/")).into_response())
}

pub async fn logout(
    auth: AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CsrfForm>,
) -> Response {
    if !state.csrf.verify(auth.user_id, "logout", &form.csrf_token) {
        tracing::warn!(user_id = %auth.user_id, "invalid CSRF token on logout");
        return Redirect::to("/").into_response();
    }

    let jar = jar.remove(expired_session_cookie());
    (jar, Redirect::to("/")).into_response()
}
