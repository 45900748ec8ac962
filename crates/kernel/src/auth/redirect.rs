//! Return-path handling for login and denial redirects.
//!
//! The `next` query parameter carries the page a visitor asked for. It is
//! attached when a guard bounces the request, honoured after a successful
//! login, and stripped from the forwarded query so it does not pile up.

use url::form_urlencoded;

/// Query parameter carrying the return path.
pub const NEXT_PARAM: &str = "next";

/// Query parameter carrying the path that was refused.
pub const DENIER_PARAM: &str = "denier";

/// Encode pairs as a query string. Slashes are kept readable.
pub fn encode_query<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
        .replace("%2F", "/")
}

/// Append `pairs` to `base`, which may already have a query string.
pub fn with_query<'a>(base: &str, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let query = encode_query(pairs);
    if query.is_empty() {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// `login_url?next=<return_path>`.
pub fn login_redirect_url(login_url: &str, return_path: &str) -> String {
    with_query(login_url, [(NEXT_PARAM, return_path)])
}

/// `denied_url?denier=<path>`.
pub fn denied_redirect_url(denied_url: &str, path: &str) -> String {
    with_query(denied_url, [(DENIER_PARAM, path)])
}

/// First value of `key` in a raw query string.
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    let query = query?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Whether `target` is safe to redirect to after login.
///
/// Accepts local absolute paths and absolute URLs under `site_url`.
/// Rejects protocol-relative (`//host`) and backslash tricks.
pub fn is_safe_next(target: &str, site_url: &str) -> bool {
    if target.is_empty() || target.contains('\\') {
        return false;
    }
    if target.starts_with('/') && !target.starts_with("//") {
        return true;
    }
    let site_url = site_url.trim_end_matches('/');
    !site_url.is_empty()
        && target
            .strip_prefix(site_url)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// The `next` of the incoming request if it is safe, otherwise `fallback`.
pub fn next_or(query: Option<&str>, site_url: &str, fallback: &str) -> String {
    query_param(query, NEXT_PARAM)
        .filter(|next| is_safe_next(next, site_url))
        .unwrap_or_else(|| fallback.to_string())
}

/// Build the post-login redirect.
///
/// Other parameters on the incoming request are forwarded to `next_url`,
/// except `next` itself and the names in `drop`.
pub fn success_redirect(next_url: &str, incoming_query: Option<&str>, drop: &[&str]) -> String {
    let forwarded: Vec<(String, String)> = incoming_query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .filter(|(k, _)| {
                    let key: &str = k;
                    key != NEXT_PARAM && !drop.contains(&key)
                })
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    with_query(
        next_url,
        forwarded.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )
}

/// `base` carrying the incoming query on to the next step of a login flow.
///
/// `next` is replaced by the already validated `next_url`; names in `drop`
/// are not forwarded.
pub fn forward_with_next(
    base: &str,
    incoming_query: Option<&str>,
    next_url: &str,
    drop: &[&str],
) -> String {
    let forwarded = success_redirect(base, incoming_query, drop);
    with_query(&forwarded, [(NEXT_PARAM, next_url)])
}
