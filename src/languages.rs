//! Selectable languages for the translation pair.
//!
//! The pair is cosmetic as far as the controller is concerned: it is stored,
//! logged and reported in snapshots, nothing else.

/// Placeholder shown for a slot nobody has picked yet.
pub const UNSET: &str = "unset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub code: &'static str,
}

pub const CATALOG: &[Language] = &[
    Language {
        name: "Français",
        code: "fr",
    },
    Language {
        name: "English",
        code: "en",
    },
    Language {
        name: "Español",
        code: "es",
    },
    Language {
        name: "Deutsch",
        code: "de",
    },
    Language {
        name: "Italiano",
        code: "it",
    },
    Language {
        name: "Português",
        code: "pt",
    },
    Language {
        name: "Polski",
        code: "pl",
    },
    Language {
        name: "Русский",
        code: "ru",
    },
    Language {
        name: "Türkçe",
        code: "tr",
    },
];

/// Find a language by display name or ISO code, ignoring case and
/// surrounding whitespace.
pub fn lookup(query: &str) -> Option<&'static Language> {
    let query = query.trim();
    let lowered = query.to_lowercase();
    CATALOG
        .iter()
        .find(|l| l.code.eq_ignore_ascii_case(query) || l.name.to_lowercase() == lowered)
}
