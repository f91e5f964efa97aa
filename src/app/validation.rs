use url::Url;

/// Field-level validation messages, keyed by form field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<(&'static str, String)>);

impl FieldErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| message.as_str())
    }
}

/// An absolute http(s) URL with a host.
pub fn is_web_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_urls() {
        assert!(is_web_url("https://www.youtube.com/watch?v=x"));
        assert!(is_web_url("http://localhost:8080/a.mp4"));
        assert!(!is_web_url("mailto:someone@example.com"));
        assert!(!is_web_url("/relative/path"));
    }

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::default();
        errors.push("email", "first");
        errors.push("email", "second");
        assert_eq!(errors.get("email"), Some("first"));
        assert_eq!(errors.get("name"), None);
    }
}
