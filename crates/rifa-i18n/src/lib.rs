//! Locale handling and string lookup for the storefront.
//!
//! String tables live in `locales/*.json`, one nested object per locale, and
//! are compiled into the binary.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    Pt,
    En,
    Fr,
    Ht,
}

pub const LOCALES: [Locale; 4] = [Locale::Pt, Locale::En, Locale::Fr, Locale::Ht];

pub const DEFAULT_LOCALE: Locale = Locale::Pt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Currency {
    pub code: &'static str,
    pub symbol: &'static str,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pt => "pt",
            Self::En => "en",
            Self::Fr => "fr",
            Self::Ht => "ht",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        LOCALES.into_iter().find(|l| l.code() == code)
    }

    /// Native name shown in the language picker.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pt => "Português",
            Self::En => "English",
            Self::Fr => "Français",
            Self::Ht => "Kreyòl Ayisyen",
        }
    }

    pub fn currency(&self) -> Currency {
        match self {
            Self::Pt => Currency { code: "BRL", symbol: "R$" },
            Self::En => Currency { code: "USD", symbol: "$" },
            Self::Fr => Currency { code: "EUR", symbol: "€" },
            Self::Ht => Currency { code: "HTG", symbol: "G" },
        }
    }
}

/// First path segment as a locale (`/en/raffles` -> `En`), else the default.
pub fn locale_from_path(path: &str) -> Locale {
    path.split('/')
        .nth(1)
        .and_then(Locale::from_code)
        .unwrap_or(DEFAULT_LOCALE)
}

/// Format an amount with the symbol of its currency code, two decimals.
/// Unknown codes fall back to `$`.
pub fn format_amount(amount: f64, currency_code: &str) -> String {
    let symbol = LOCALES
        .iter()
        .map(Locale::currency)
        .find(|c| c.code.eq_ignore_ascii_case(currency_code))
        .map(|c| c.symbol)
        .unwrap_or("$");
    format!("{}{:.2}", symbol, amount)
}

static TABLES: LazyLock<HashMap<&'static str, Value>> = LazyLock::new(|| {
    let sources = [
        ("pt", include_str!("../locales/pt.json")),
        ("en", include_str!("../locales/en.json")),
        ("fr", include_str!("../locales/fr.json")),
        ("ht", include_str!("../locales/ht.json")),
    ];
    sources
        .into_iter()
        .filter_map(|(code, raw)| match serde_json::from_str(raw) {
            Ok(table) => Some((code, table)),
            Err(e) => {
                warn!("Skipping malformed string table for '{}': {}", code, e);
                None
            }
        })
        .collect()
});

/// Look up a dot-path key (`checkout.name`) in the table for `locale`.
///
/// Returns the key itself when the locale is unknown, the path is missing,
/// or the path ends on something other than a non-empty string.
pub fn t<'a>(locale: &str, key: &'a str) -> &'a str {
    let Some(mut node) = TABLES.get(locale) else {
        return key;
    };
    for part in key.split('.') {
        match node.get(part) {
            Some(next) => node = next,
            None => return key,
        }
    }
    match node.as_str() {
        Some(s) if !s.is_empty() => s,
        _ => key,
    }
}
