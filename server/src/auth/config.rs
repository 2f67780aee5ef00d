/// Session authentication settings, derived from the server config.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_expiry_hours: i64,
    pub public_url: String,
}

impl AuthConfig {
    /// Whether the server is being served from a local development origin.
    pub fn is_local(&self) -> bool {
        self.public_url.contains("localhost") || self.public_url.contains("127.0.0.1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public_url: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: "secret".into(),
            session_expiry_hours: 1,
            public_url: public_url.into(),
        }
    }

    #[test]
    fn test_local_origins() {
        assert!(config("http://localhost:8080").is_local());
        assert!(config("http://127.0.0.1:3000").is_local());
        assert!(!config("https://rooms.example.com").is_local());
    }
}
