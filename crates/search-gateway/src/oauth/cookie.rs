//! Minimal cookie handling for the OAuth flows.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for a cookie scoped to the whole site.
pub fn set(name: &str, value: &str, max_age_secs: u64, http_only: bool, secure: bool) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; SameSite=Lax");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes `name`.
pub fn clear(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_named_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1; linkedin_oauth_state=abc"));
        headers.append(COOKIE, HeaderValue::from_static("b=2"));
        assert_eq!(read(&headers, "linkedin_oauth_state").as_deref(), Some("abc"));
        assert_eq!(read(&headers, "b").as_deref(), Some("2"));
        assert!(read(&headers, "missing").is_none());
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("reddit_access_token="));
        assert!(read(&headers, "reddit_access_token").is_none());
    }

    #[test]
    fn set_and_clear_attributes() {
        assert_eq!(
            set("t", "v", 60, true, true),
            "t=v; Path=/; Max-Age=60; SameSite=Lax; HttpOnly; Secure"
        );
        assert_eq!(set("u", "1", 60, false, false), "u=1; Path=/; Max-Age=60; SameSite=Lax");
        assert_eq!(clear("t"), "t=; Path=/; Max-Age=0; SameSite=Lax");
    }
}
