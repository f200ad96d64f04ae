//! SSML compilation for narration text.
//!
//! Acronyms are spelled out, emphasis words get a short pause and raised
//! prosody, everything else passes through. The result is wrapped in a
//! single `<speak>` element.

use quick_xml::escape::escape;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::emphasis::EmphasisSet;

/// Two or more consecutive uppercase letters.
static ACRONYM_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Lu}{2,}").unwrap());

/// Alternating word and non-word runs.
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+|\W+").unwrap());

/// Prosody settings for emphasized words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmphasisStyle {
    pub pause: String,
    pub pitch: String,
    pub rate: String,
    pub volume: String,
    pub level: String,
}

impl Default for EmphasisStyle {
    fn default() -> Self {
        Self {
            pause: "300ms".to_string(),
            pitch: "+15%".to_string(),
            rate: "-5%".to_string(),
            volume: "+3dB".to_string(),
            level: "moderate".to_string(),
        }
    }
}

/// Compiles narration into speech markup.
#[derive(Debug, Clone, Default)]
pub struct MarkupCompiler {
    style: EmphasisStyle,
}

impl MarkupCompiler {
    /// Create a compiler with the default emphasis style.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(mut self, style: EmphasisStyle) -> Self {
        self.style = style;
        self
    }

    /// Compile `text` into a `<speak>` document.
    pub fn compile(&self, text: &str, emphasis: &EmphasisSet) -> String {
        let acronyms = detect_acronyms(text);

        let body: String = TOKEN_REGEX
            .find_iter(text)
            .map(|m| self.render_token(m.as_str(), &acronyms, emphasis))
            .collect();

        format!("<speak>{}</speak>", body.trim())
    }

    fn render_token(&self, token: &str, acronyms: &HashSet<&str>, emphasis: &EmphasisSet) -> String {
        let escaped = escape(token);
        if acronyms.contains(token) {
            spell_out(&escaped)
        } else if let Some((acronym, rest)) =
            split_acronym_prefix(token).filter(|(acronym, _)| acronyms.contains(acronym))
        {
            format!("{}{}", spell_out(&escape(acronym)), escape(rest))
        } else if emphasis.contains(token) {
            format!(
                r#"<break time="{}"/><prosody pitch="{}" rate="{}" volume="{}"><emphasis level="{}">{}</emphasis></prosody>"#,
                self.style.pause,
                self.style.pitch,
                self.style.rate,
                self.style.volume,
                self.style.level,
                escaped
            )
        } else {
            escaped.into_owned()
        }
    }
}

fn spell_out(escaped: &str) -> String {
    format!(r#"<say-as interpret-as="characters">{}</say-as>"#, escaped)
}

/// Split an acronym off the front of a token when non-Latin letters follow
/// it directly, as Korean particles do: `AI를` gives `("AI", "를")`.
fn split_acronym_prefix(token: &str) -> Option<(&str, &str)> {
    let end = token
        .char_indices()
        .find(|(_, c)| !c.is_uppercase())
        .map(|(i, _)| i)?;
    let (prefix, rest) = token.split_at(end);
    let next = rest.chars().next()?;
    (prefix.chars().count() >= 2 && next.is_alphabetic() && !next.is_ascii()).then_some((prefix, rest))
}

/// Maximal uppercase runs of length two or more.
pub fn detect_acronyms(text: &str) -> HashSet<&str> {
    ACRONYM_REGEX.find_iter(text).map(|m| m.as_str()).collect()
}
