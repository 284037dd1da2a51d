//! Session cookie contract
//!
//! The cookie carries the session id verbatim. It is not signed.

use chrono::{DateTime, Duration, Utc};
use going_shared::config::SessionSettings;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    name: String,
    lifetime: Duration,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            name: name.into(),
            lifetime,
            secure: false,
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Set-Cookie` value handing `session_id` to the client.
    pub fn issue(&self, session_id: &str, now: DateTime<Utc>) -> String {
        let expires = now
            .checked_add_signed(self.lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut cookie = format!(
            "{}={}; Path=/; Expires={}; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name,
            session_id,
            expires.format(HTTP_DATE),
            self.lifetime.num_seconds().max(0),
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that makes the client drop the cookie.
    pub fn clear(&self) -> String {
        let mut cookie = format!(
            "{}=; Path=/; Expires={}; Max-Age=0; HttpOnly; SameSite=Lax",
            self.name, EPOCH_HTTP_DATE,
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Value of this cookie in a `Cookie` request header, if present and non-empty.
    pub fn extract<'a>(&self, cookie_header: &'a str) -> Option<&'a str> {
        cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == self.name)
            .map(|(_, value)| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty())
    }
}

impl From<&SessionSettings> for SessionCookie {
    fn from(settings: &SessionSettings) -> Self {
        Self::new(
            settings.cookie_name.clone(),
            Duration::try_minutes(settings.lifetime_minutes).unwrap_or(Duration::MAX),
        )
        .with_secure(settings.secure_cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cookie() -> SessionCookie {
        SessionCookie::new("going_session", Duration::minutes(120))
    }

    #[test]
    fn test_issue_attributes() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let header = cookie().issue("abc", now);

        assert_eq!(
            header,
            "going_session=abc; Path=/; Expires=Fri, 01 Mar 2024 12:00:00 GMT; Max-Age=7200; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_secure_flag() {
        let secure = cookie().with_secure(true);
        assert!(secure.issue("abc", Utc::now()).ends_with("; Secure"));
        assert!(secure.clear().ends_with("; Secure"));
        assert!(!cookie().issue("abc", Utc::now()).contains("Secure"));
    }

    #[test]
    fn test_oversized_lifetime_saturates() {
        let cookie = SessionCookie::new("going_session", Duration::MAX);
        let header = cookie.issue("abc", Utc::now());
        assert!(header.starts_with("going_session=abc; Path=/; Expires="));
        assert!(header.contains(&format!("Max-Age={}", Duration::MAX.num_seconds())));
    }

    #[test]
    fn test_clear() {
        let header = cookie().clear();
        assert!(header.starts_with("going_session=; "));
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("HttpOnly"));
    }

    #[test]
    fn test_extract() {
        let cookie = cookie();
        assert_eq!(
            cookie.extract("theme=dark; going_session=abc-123_x; lang=en"),
            Some("abc-123_x")
        );
        assert_eq!(cookie.extract("going_session=abc"), Some("abc"));
        assert_eq!(cookie.extract("going_session_old=abc"), None);
        assert_eq!(cookie.extract("going_session="), None);
        assert_eq!(cookie.extract(""), None);
    }
}
