use rifa_i18n::{DEFAULT_LOCALE, Locale};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL, without a trailing slash.
    pub api_url: String,
    pub locale: Locale,
    /// Currency sent with card payments. Transfer rails pick their own.
    pub card_currency: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".into(),
            locale: DEFAULT_LOCALE,
            card_currency: "USD".into(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let locale = match var("RIFA_LOCALE") {
            Some(code) => Locale::from_code(code.trim()).unwrap_or_else(|| {
                warn!("Unknown RIFA_LOCALE '{}', using {}", code, DEFAULT_LOCALE.code());
                DEFAULT_LOCALE
            }),
            None => defaults.locale,
        };

        Self {
            api_url: var("RIFA_API_URL")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            locale,
            card_currency: var("RIFA_CARD_CURRENCY")
                .map(|c| c.trim().to_ascii_uppercase())
                .unwrap_or(defaults.card_currency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        let cfg = ClientConfig::from_lookup(|_| None);
        assert_eq!(cfg.api_url, "http://localhost:3000");
        assert_eq!(cfg.locale, Locale::Pt);
        assert_eq!(cfg.card_currency, "USD");

        let cfg = ClientConfig::from_lookup(|name| match name {
            "RIFA_API_URL" => Some("https://rifa.example/".into()),
            "RIFA_LOCALE" => Some("ht".into()),
            "RIFA_CARD_CURRENCY" => Some("eur".into()),
            _ => None,
        });
        assert_eq!(cfg.api_url, "https://rifa.example");
        assert_eq!(cfg.locale, Locale::Ht);
        assert_eq!(cfg.card_currency, "EUR");
    }

    #[test]
    fn test_unknown_locale_falls_back() {
        let cfg = ClientConfig::from_lookup(|name| (name == "RIFA_LOCALE").then(|| "xx".into()));
        assert_eq!(cfg.locale, DEFAULT_LOCALE);
    }
}
