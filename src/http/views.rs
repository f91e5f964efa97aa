//! Server-rendered HTML pages.
//!
//! Every dynamic value goes through [`escape`] before it reaches the markup.

use axum::http::StatusCode;
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::RegistrationInput;
use crate::app::csrf::{intent, CsrfTokens};
use crate::app::subscriptions::SubscribedUser;
use crate::app::validation::FieldErrors;
use crate::app::videos::VideoInput;
use crate::domain::category::Category;
use crate::domain::comment::{CommentThread, CommentView};
use crate::domain::reaction::{Polarity, ReactionCounts, ReactionState};
use crate::domain::user::{PublicUser, User};
use crate::domain::video::Video;

/// The signed-in user, able to sign the forms it is shown.
pub struct Viewer<'a> {
    pub user: User,
    csrf: &'a CsrfTokens,
}

impl<'a> Viewer<'a> {
    pub fn new(user: User, csrf: &'a CsrfTokens) -> Self {
        Self { user, csrf }
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn token(&self, intent: &str) -> String {
        self.csrf.issue(self.user.id, intent)
    }
}

pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn format_date(value: OffsetDateTime) -> String {
    value
        .format(format_description!("[day]/[month]/[year]"))
        .unwrap_or_default()
}

fn hidden_token(token: &str) -> String {
    format!(
        r#"<input type="hidden" name="csrf_token" value="{}">"#,
        escape(token)
    )
}

/// A one-button form posting to `action` with a CSRF token.
fn post_button(action: &str, token: &str, label: &str, class: &str) -> String {
    format!(
        r#"<form method="post" action="{}" class="inline">{}<button type="submit" class="{}">{}</button></form>"#,
        escape(action),
        hidden_token(token),
        class,
        label
    )
}

fn layout(title: &str, viewer: Option<&Viewer<'_>>, body: &str) -> String {
    let account = match viewer {
        Some(viewer) => format!(
            r#"<a href="/abonnements">Abonnements</a>
<a href="/video/new">Publier une vidéo</a>
<a href="/user">{}</a>
{}"#,
            escape(&viewer.user.name),
            post_button("/logout", &viewer.token("logout"), "Déconnexion", "link")
        ),
        None => r#"<a href="/login">Connexion</a>
<a href="/register">Inscription</a>"#
            .to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<title>{} | Tubeshare</title>
</head>
<body>
<header>
<nav>
<a href="/">Accueil</a>
<a href="/video">Vidéos</a>
<form method="get" action="/recherche" class="inline"><input type="search" name="q" placeholder="Rechercher"></form>
{}
</nav>
</header>
<main>
{}
</main>
</body>
</html>
"#,
        escape(title),
        account,
        body
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let heading = status.canonical_reason().unwrap_or("Erreur");
    let body = format!(
        "<h1>{} {}</h1>\n<p>{}</p>\n<p><a href=\"/\">Retour à l'accueil</a></p>",
        status.as_u16(),
        escape(heading),
        escape(message)
    );
    layout(heading, None, &body)
}

fn video_cards(videos: &[Video]) -> String {
    if videos.is_empty() {
        return "<p class=\"empty\">Aucune vidéo pour le moment.</p>".to_string();
    }

    let mut html = String::from("<ul class=\"videos\">\n");
    for video in videos {
        html.push_str(&format!(
            r#"<li class="video-card">
<a href="/video/{id}"><img src="{thumb}" alt="{title}"></a>
<a href="/video/{id}" class="title">{title}</a>
<a href="/user/{owner_id}" class="owner">{owner}</a>
<span class="views">{views} vues</span> <span class="date">{date}</span>
</li>
"#,
            id = video.id,
            thumb = escape(&video.thumbnail_url),
            title = escape(&video.title),
            owner_id = video.owner_id,
            owner = escape(&video.owner_name),
            views = video.views,
            date = format_date(video.created_at),
        ));
    }
    html.push_str("</ul>");
    html
}

fn category_links(categories: &[Category]) -> String {
    let mut html = String::from("<ul class=\"categories\">\n");
    for category in categories {
        html.push_str(&format!(
            "<li><a href=\"/categorie/{}\">{} {}</a></li>\n",
            category.id,
            logo_markup(&category.logo),
            escape(&category.name)
        ));
    }
    html.push_str("</ul>");
    html
}

fn logo_markup(logo: &str) -> String {
    if logo.starts_with("http://") || logo.starts_with("https://") {
        format!("<img src=\"{}\" alt=\"\" class=\"logo\">", escape(logo))
    } else {
        format!("<span class=\"logo\">{}</span>", escape(logo))
    }
}

pub fn home(viewer: Option<&Viewer<'_>>, categories: &[Category], videos: &[Video]) -> String {
    let body = format!(
        "<h1>Dernières vidéos</h1>\n<section>{}</section>\n<aside><h2>Catégories</h2>{}</aside>",
        video_cards(videos),
        category_links(categories)
    );
    layout("Accueil", viewer, &body)
}

pub fn video_index(viewer: Option<&Viewer<'_>>, videos: &[Video]) -> String {
    let body = format!("<h1>Toutes les vidéos</h1>\n{}", video_cards(videos));
    layout("Vidéos", viewer, &body)
}

pub fn search(viewer: Option<&Viewer<'_>>, query: &str, videos: &[Video]) -> String {
    let heading = if query.trim().is_empty() {
        "Recherche".to_string()
    } else {
        format!("Résultats pour « {} »", escape(query.trim()))
    };
    let body = format!(
        "<h1>{}</h1>\n<p>{} résultat(s)</p>\n{}",
        heading,
        videos.len(),
        video_cards(videos)
    );
    layout("Recherche", viewer, &body)
}

pub fn category(viewer: Option<&Viewer<'_>>, category: &Category, videos: &[Video]) -> String {
    let body = format!(
        "<h1>{} {}</h1>\n{}",
        logo_markup(&category.logo),
        escape(&category.name),
        video_cards(videos)
    );
    layout(&category.name, viewer, &body)
}

fn user_links(users: &[SubscribedUser], empty: &str) -> String {
    if users.is_empty() {
        return format!("<p class=\"empty\">{}</p>", empty);
    }
    let mut html = String::from("<ul class=\"users\">\n");
    for entry in users {
        html.push_str(&format!(
            "<li><a href=\"/user/{}\">{}</a> <span class=\"date\">depuis le {}</span></li>\n",
            entry.user.id,
            escape(&entry.user.name),
            format_date(entry.subscribed_at)
        ));
    }
    html.push_str("</ul>");
    html
}

pub fn subscriptions(viewer: &Viewer<'_>, creators: &[SubscribedUser], videos: &[Video]) -> String {
    let body = format!(
        "<h1>Mes abonnements</h1>\n<aside>{}</aside>\n<section>{}</section>",
        user_links(creators, "Vous n'êtes abonné à aucune chaîne."),
        video_cards(videos)
    );
    layout("Abonnements", Some(viewer), &body)
}

fn profile_header(profile: &PublicUser) -> String {
    format!(
        r#"<h1>{}</h1>
<p class="stats"><span class="subscribers">{} abonné(s)</span> <span class="subscriptions">{} abonnement(s)</span> <span class="video-count">{} vidéo(s)</span></p>
<p>Membre depuis le {}</p>"#,
        escape(&profile.name),
        profile.subscribers_count,
        profile.subscriptions_count,
        profile.videos_count,
        format_date(profile.created_at)
    )
}

pub fn profile(
    viewer: Option<&Viewer<'_>>,
    profile: &PublicUser,
    videos: &[Video],
    subscribed: bool,
) -> String {
    let mut body = profile_header(profile);

    if let Some(viewer) = viewer.filter(|viewer| viewer.id() != profile.id) {
        let label = if subscribed { "Se désabonner" } else { "S'abonner" };
        body.push_str(&post_button(
            &format!("/user/{}/subscribe", profile.id),
            &viewer.token(&intent("subscribe", profile.id)),
            label,
            "subscribe",
        ));
    }

    body.push_str(&format!("\n<h2>Vidéos</h2>\n{}", video_cards(videos)));
    layout(&profile.name, viewer, &body)
}

pub fn account(
    viewer: &Viewer<'_>,
    profile: &PublicUser,
    videos: &[Video],
    subscriptions: &[SubscribedUser],
    subscribers: &[SubscribedUser],
) -> String {
    let body = format!(
        "{}\n<p>{}</p>\n<h2>Mes vidéos</h2>\n{}\n<h2>Mes abonnements</h2>\n{}\n<h2>Mes abonnés</h2>\n{}",
        profile_header(profile),
        escape(&viewer.user.email),
        video_cards(videos),
        user_links(subscriptions, "Aucun abonnement."),
        user_links(subscribers, "Aucun abonné.")
    );
    layout("Mon compte", Some(viewer), &body)
}

fn reaction_buttons(
    viewer: Option<&Viewer<'_>>,
    base: &str,
    id: Uuid,
    counts: ReactionCounts,
    state: ReactionState,
) -> String {
    let Some(viewer) = viewer else {
        return format!(
            "<span class=\"likes\">👍 {}</span> <span class=\"dislikes\">👎 {}</span>",
            counts.likes, counts.dislikes
        );
    };

    [Polarity::Like, Polarity::Dislike]
        .iter()
        .map(|polarity| {
            let (icon, count) = match polarity {
                Polarity::Like => ("👍", counts.likes),
                Polarity::Dislike => ("👎", counts.dislikes),
            };
            let active = state == ReactionState::from(*polarity);
            let class = if active {
                format!("{} active", polarity.action())
            } else {
                polarity.action().to_string()
            };
            post_button(
                &format!("/{}/{}/{}", base, id, polarity.action()),
                &viewer.token(&intent(polarity.action(), id)),
                &format!("{} {}", icon, count),
                &class,
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn comment_item(viewer: Option<&Viewer<'_>>, view: &CommentView, reply_form: bool) -> String {
    let comment = &view.comment;
    let mut html = format!(
        "<article class=\"comment\" id=\"comment-{}\">\n<header><a href=\"/user/{}\">{}</a> <span class=\"date\">{}</span></header>\n<p>{}</p>\n{}",
        comment.id,
        comment.author_id,
        escape(&comment.author_name),
        format_date(comment.created_at),
        escape(&comment.content),
        reaction_buttons(viewer, "comment", comment.id, view.counts, view.viewer_state)
    );

    if let Some(viewer) = viewer {
        if viewer.id() == comment.author_id {
            html.push_str(&post_button(
                &format!("/comment/{}/delete", comment.id),
                &viewer.token(&intent("delete-comment", comment.id)),
                "Supprimer",
                "delete",
            ));
        }
        if reply_form {
            html.push_str(&format!(
                r#"<form method="post" action="/video/{}" class="reply">{}<input type="hidden" name="parent_id" value="{}"><textarea name="content" placeholder="Répondre"></textarea><button type="submit">Répondre</button></form>"#,
                comment.video_id,
                hidden_token(&viewer.token(&intent("comment", comment.video_id))),
                comment.id
            ));
        }
    }

    html.push_str("\n</article>");
    html
}

pub struct VideoPage<'a> {
    pub video: &'a Video,
    pub counts: ReactionCounts,
    pub viewer_state: ReactionState,
    pub threads: &'a [CommentThread],
    pub comment_draft: &'a str,
    pub comment_error: Option<&'a str>,
}

pub fn video_page(viewer: Option<&Viewer<'_>>, page: &VideoPage<'_>) -> String {
    let video = page.video;
    let category = match (video.category_id, &video.category_name) {
        (Some(id), Some(name)) => format!(
            " <a href=\"/categorie/{}\" class=\"category\">{}</a>",
            id,
            escape(name)
        ),
        _ => String::new(),
    };

    let mut body = format!(
        r#"<h1>{title}</h1>
<p><a href="{url}" class="watch">Regarder la vidéo</a></p>
<img src="{thumb}" alt="{title}">
<p class="meta"><a href="/user/{owner_id}">{owner}</a>{category} <span class="views">{views} vues</span> <span class="date">{date}</span></p>
<div class="reactions">{reactions}</div>
<p class="description">{description}</p>
"#,
        title = escape(&video.title),
        url = escape(&video.url),
        thumb = escape(&video.thumbnail_url),
        owner_id = video.owner_id,
        owner = escape(&video.owner_name),
        category = category,
        views = video.views,
        date = format_date(video.created_at),
        reactions = reaction_buttons(viewer, "video", video.id, page.counts, page.viewer_state),
        description = escape(video.description.as_deref().unwrap_or_default()),
    );

    if let Some(viewer) = viewer.filter(|viewer| viewer.id() == video.owner_id) {
        body.push_str(&format!(
            "<p class=\"owner-actions\"><a href=\"/video/{}/edit\">Modifier</a> {}</p>\n",
            video.id,
            post_button(
                &format!("/video/{}/delete", video.id),
                &viewer.token(&intent("delete", video.id)),
                "Supprimer",
                "delete",
            )
        ));
    }

    let comment_count: usize = page
        .threads
        .iter()
        .map(|thread| 1 + thread.replies.len())
        .sum();
    body.push_str(&format!(
        "<section class=\"comments\">\n<h2>{} commentaire(s)</h2>\n",
        comment_count
    ));

    match viewer {
        Some(viewer) => {
            let error = page
                .comment_error
                .map(|message| format!("<p class=\"error\">{}</p>", escape(message)))
                .unwrap_or_default();
            body.push_str(&format!(
                r#"<form method="post" action="/video/{}" class="comment-form">{}{}<textarea name="content" placeholder="Ajouter un commentaire">{}</textarea><button type="submit">Commenter</button></form>
"#,
                video.id,
                hidden_token(&viewer.token(&intent("comment", video.id))),
                error,
                escape(page.comment_draft)
            ));
        }
        None => body.push_str(
            "<p><a href=\"/login\">Connectez-vous</a> pour commenter.</p>\n",
        ),
    }

    for thread in page.threads {
        body.push_str(&comment_item(viewer, &thread.root, true));
        if !thread.replies.is_empty() {
            body.push_str("\n<div class=\"replies\">\n");
            for reply in &thread.replies {
                body.push_str(&comment_item(viewer, reply, false));
            }
            body.push_str("\n</div>");
        }
        body.push('\n');
    }
    body.push_str("</section>");

    layout(&video.title, viewer, &body)
}

fn field_error(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .map(|message| format!("<p class=\"error\">{}</p>", escape(message)))
        .unwrap_or_default()
}

fn text_field(label: &str, name: &str, kind: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        "<label>{}<input type=\"{}\" name=\"{}\" value=\"{}\"></label>{}\n",
        label,
        kind,
        name,
        escape(value),
        field_error(errors, name)
    )
}

pub struct VideoForm<'a> {
    pub heading: &'a str,
    pub action: String,
    pub csrf_intent: String,
    pub input: &'a VideoInput,
    pub errors: &'a FieldErrors,
    pub categories: &'a [Category],
}

pub fn video_form(viewer: &Viewer<'_>, form: &VideoForm<'_>) -> String {
    let mut options = String::from("<option value=\"\">Aucune catégorie</option>");
    for category in form.categories {
        let id = category.id.to_string();
        let selected = if id == form.input.category_id.trim() {
            " selected"
        } else {
            ""
        };
        options.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            id,
            selected,
            escape(&category.name)
        ));
    }

    let body = format!(
        r#"<h1>{heading}</h1>
{form_error}<form method="post" action="{action}">
{token}
{title}{url}{thumbnail}<label>Description<textarea name="description">{description}</textarea></label>
<label>Catégorie<select name="category_id">{options}</select></label>{category_error}
<button type="submit">Enregistrer</button>
</form>"#,
        heading = escape(form.heading),
        form_error = field_error(form.errors, "form"),
        action = escape(&form.action),
        token = hidden_token(&viewer.token(&form.csrf_intent)),
        title = text_field("Titre", "title", "text", &form.input.title, form.errors),
        url = text_field("URL de la vidéo", "url", "url", &form.input.url, form.errors),
        thumbnail = text_field(
            "URL de la miniature",
            "thumbnail_url",
            "url",
            &form.input.thumbnail_url,
            form.errors
        ),
        description = escape(&form.input.description),
        options = options,
        category_error = field_error(form.errors, "category_id"),
    );
    layout(form.heading, Some(viewer), &body)
}

pub fn register_form(input: &RegistrationInput, errors: &FieldErrors) -> String {
    let checked = if input.agree_terms { " checked" } else { "" };
    let body = format!(
        r#"<h1>Inscription</h1>
<form method="post" action="/register">
{name}{email}<label>Mot de passe<input type="password" name="password"></label>{password_error}
<label>Confirmation<input type="password" name="password_confirmation"></label>
<label><input type="checkbox" name="agree_terms" value="1"{checked}> J'accepte les conditions d'utilisation</label>{terms_error}
<button type="submit">Créer mon compte</button>
</form>
<p>Déjà inscrit ? <a href="/login">Connexion</a></p>"#,
        name = text_field("Nom", "name", "text", &input.name, errors),
        email = text_field("Email", "email", "email", &input.email, errors),
        password_error = field_error(errors, "password"),
        checked = checked,
        terms_error = field_error(errors, "agree_terms"),
    );
    layout("Inscription", None, &body)
}

pub fn login_form(email: &str, error: Option<&str>) -> String {
    let error = error
        .map(|message| format!("<p class=\"error\">{}</p>\n", escape(message)))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>Connexion</h1>
{}<form method="post" action="/login">
<label>Email<input type="email" name="email" value="{}"></label>
<label>Mot de passe<input type="password" name="password"></label>
<button type="submit">Se connecter</button>
</form>
<p>Pas encore de compte ? <a href="/register">Inscription</a></p>"#,
        error,
        escape(email)
    );
    layout("Connexion", None, &body)
}
