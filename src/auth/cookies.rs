//! Cookie construction shared by the auth routes and extractors.

use axum_extra::extract::cookie::{Cookie, SameSite};

/// Http-only, site-wide cookie carrying a signed token.
pub fn token_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Cookie that tells the browser to drop `name`.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name).path("/").build();
    cookie.make_removal();
    cookie
}
