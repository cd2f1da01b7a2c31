//! Localized string tables.
//!
//! Each language gets one `<lang>.lproj/pass.strings` member made of
//! `"key" = "value";` lines. A language whose table ends up empty contributes
//! no member at all.

use std::collections::BTreeMap;
use tracing::{debug, warn};

/// File name of the string table inside a `.lproj` folder.
pub const STRINGS_FILE: &str = "pass.strings";

/// Translations keyed by language tag, then by source string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Localizations {
    languages: BTreeMap<String, BTreeMap<String, String>>,
}

impl Localizations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register translations for `lang`.
    ///
    /// Adding the same language twice merges the tables; later values win.
    /// A tag that is empty or holds a path separator or `..` is skipped.
    pub fn add<I, K, V>(&mut self, lang: impl Into<String>, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let lang = lang.into();
        if !is_valid_language_tag(&lang) {
            warn!(lang = %lang, "Skipping localization with invalid language tag");
            return;
        }
        let table = self.languages.entry(lang).or_default();
        table.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Declared languages, including those with empty tables.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }

    pub fn get(&self, lang: &str) -> Option<&BTreeMap<String, String>> {
        self.languages.get(lang)
    }

    /// Render the string table members.
    ///
    /// `existing` looks up a `pass.strings` the model already ships for a
    /// language; its content is kept first and the new lines follow. Languages
    /// with an empty table and no existing content are skipped.
    pub fn render<F>(&self, mut existing: F) -> Vec<(String, Vec<u8>)>
    where
        F: FnMut(&str) -> Option<Vec<u8>>,
    {
        let mut members = Vec::new();

        for (lang, table) in &self.languages {
            if table.is_empty() {
                debug!(lang = %lang, "Skipping empty translation table");
                continue;
            }

            let mut content = existing(lang).unwrap_or_default();
            if !content.is_empty() && !content.ends_with(b"\n") {
                content.push(b'\n');
            }
            content.extend_from_slice(render_strings(table).as_bytes());

            members.push((strings_member_name(lang), content));
        }

        members
    }
}

fn is_valid_language_tag(lang: &str) -> bool {
    !lang.is_empty() && !lang.contains(['/', '\\']) && !lang.contains("..")
}

/// Bundle member name of a language's string table.
pub fn strings_member_name(lang: &str) -> String {
    format!("{lang}.lproj/{STRINGS_FILE}")
}

/// Language of a `<lang>.lproj/pass.strings` member name.
pub fn strings_member_language(name: &str) -> Option<&str> {
    name.strip_suffix(STRINGS_FILE)?
        .strip_suffix(".lproj/")
        .filter(|lang| !lang.is_empty() && !lang.contains('/'))
}

/// Render a table as `"key" = "value";` lines separated by newlines.
pub fn render_strings(table: &BTreeMap<String, String>) -> String {
    table
        .iter()
        .map(|(key, value)| format!("\"{}\" = \"{}\";", escape(key), escape(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
