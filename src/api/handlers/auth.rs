use crate::AppState;
use crate::api::error::AppError;
use crate::api::middleware::auth::SESSION_COOKIE;
use crate::services::identity::AuthError;
use crate::utils::auth::{Claims, create_jwt};
use axum::{
    Extension, Form,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Login</title></head>
<body>
<h1>Login</h1>
{error}
<form method="post" action="/login">
  <label>Username <input type="text" name="username" autocomplete="username"></label>
  <label>Password <input type="password" name="password" autocomplete="current-password"></label>
  <button type="submit">Log in</button>
</form>
</body>
</html>
"#;

fn render_login(error: Option<&str>) -> Html<String> {
    let error_html = error
        .map(|msg| format!(r#"<p class="error">{}</p>"#, msg))
        .unwrap_or_default();
    Html(LOGIN_PAGE.replace("{error}", &error_html))
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn with_cookie(mut response: Response, cookie: &str) -> Result<Response, AppError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::Internal(format!("Invalid cookie header: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login form", content_type = "text/html")
    ),
    tag = "auth"
)]
pub async fn login_page() -> Html<String> {
    render_login(None)
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Logged in, session cookie set, redirected to /dashboard"),
        (status = 401, description = "Invalid credentials, login form re-rendered")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if form.validate().is_err() {
        return Ok(invalid_credentials());
    }

    let principal = match state.identity.verify(&form.username, &form.password).await {
        Ok(principal) => principal,
        Err(AuthError::InvalidCredentials) => return Ok(invalid_credentials()),
        Err(e) => return Err(e.into()),
    };

    let session = state.staging.open_session(&principal).await;
    let token = create_jwt(
        &principal.username,
        &session.id,
        &state.config.jwt_secret,
        session.expires_at,
    )?;

    tracing::info!("User {} logged in", principal.username);

    let cookie = session_cookie(
        &token,
        state.config.session_ttl_secs(),
        state.config.secure_cookies,
    );
    with_cookie(Redirect::to("/dashboard").into_response(), &cookie)
}

fn invalid_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        render_login(Some("Invalid credentials")),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 303, description = "Session closed, staged files discarded, redirected to /login")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    state.staging.close_session(&claims.sid).await;
    tracing::info!("User {} logged out", claims.sub);

    let cookie = session_cookie("", 0, state.config.secure_cookies);
    with_cookie(Redirect::to("/login").into_response(), &cookie)
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Welcome text", content_type = "text/plain"),
        (status = 303, description = "Not logged in, redirected to /login")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn dashboard(Extension(claims): Extension<Claims>) -> String {
    format!("Welcome, {}!", claims.sub)
}
