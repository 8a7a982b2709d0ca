//! Localization resolution
//!
//! Picks the best content for an element (or label) given a requested
//! locale, falling back to the project's main locale when the requested
//! translation is missing or empty. Content served through the fallback is
//! flagged `not_translated` so hosts can surface untranslated passages.

use storyflow_model::LocalizedContent;
use tracing::warn;

/// Content resolved for a locale request
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedText {
    /// The authored text body
    pub text: String,
    /// Locale the text actually came from
    pub locale_code: String,
    /// Whether the main-locale fallback had to serve this request
    pub not_translated: bool,
}

fn non_empty<'a>(
    contents: &'a [LocalizedContent],
    locale: &str,
) -> Option<&'a LocalizedContent> {
    contents
        .iter()
        .find(|c| c.locale_code == locale && !c.text.trim().is_empty())
}

/// Resolve the best content for a locale request
///
/// A non-translatable owner redirects every non-main request straight to
/// the main locale (that is authored intent, not a missing translation).
/// Otherwise a missing or empty translation falls back to the main locale
/// and the result is flagged `not_translated`.
pub fn resolve(
    contents: &[LocalizedContent],
    translatable: bool,
    locale: &str,
    main_locale: &str,
) -> Option<ResolvedText> {
    let effective = if !translatable && locale != main_locale {
        main_locale
    } else {
        locale
    };

    if let Some(content) = non_empty(contents, effective) {
        return Some(ResolvedText {
            text: content.text.clone(),
            locale_code: content.locale_code.clone(),
            not_translated: false,
        });
    }

    if effective != main_locale {
        if let Some(content) = non_empty(contents, main_locale) {
            warn!(
                requested = effective,
                fallback = main_locale,
                "missing translation, serving main locale"
            );
            return Some(ResolvedText {
                text: content.text.clone(),
                locale_code: content.locale_code.clone(),
                not_translated: true,
            });
        }
    }

    None
}
