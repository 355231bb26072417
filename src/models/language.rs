use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "es", name: "Spanish" },
    Language { code: "zh", name: "Chinese" },
    Language { code: "ar", name: "Arabic" },
    Language { code: "hi", name: "Hindi" },
    Language { code: "fr", name: "French" },
];

/// Human-readable name for a language code. Unknown codes pass through.
pub fn language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|l| l.code == code)
        .map(|l| l.name)
        .unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(language_name("es"), "Spanish");
        assert_eq!(language_name("zh"), "Chinese");
    }

    #[test]
    fn test_unknown_code_passes_through() {
        assert_eq!(language_name("pt-BR"), "pt-BR");
    }
}
