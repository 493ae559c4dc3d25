//! Filename helpers: turning item titles and URLs into safe local names.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum length of a sanitized stem, in characters.
pub const MAX_STEM_CHARS: usize = 100;

/// Extensions kept as-is; anything else is saved as `.jpg`.
pub const ALLOWED_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"];

const FALLBACK_EXTENSION: &str = ".jpg";

static ILLEGAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static HYPHENS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

/// Converts an item title into a lower-case, hyphenated filename stem.
///
/// Characters that are illegal on common filesystems are dropped, runs of
/// whitespace and hyphens collapse to a single hyphen, and the result is cut
/// to [`MAX_STEM_CHARS`] characters. Returns an empty string when nothing
/// usable remains.
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    let stripped = ILLEGAL_RE.replace_all(title, "");
    let hyphenated = WHITESPACE_RE.replace_all(stripped.trim(), "-");
    let collapsed = HYPHENS_RE.replace_all(&hyphenated, "-");
    collapsed
        .trim_matches('-')
        .to_lowercase()
        .chars()
        .take(MAX_STEM_CHARS)
        .collect()
}

/// Returns the last path segment of `url`, without query or fragment.
fn file_name_of(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Splits a file name into `(stem, extension)`, with the dot kept on the
/// extension. Leading dots do not start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    let body_start = name.len() - name.trim_start_matches('.').len();
    match name[body_start..].rfind('.') {
        Some(idx) => name.split_at(body_start + idx),
        None => (name, ""),
    }
}

/// Resolves the extension to save `url` under.
///
/// Only the URL path is inspected; the result is lower-cased and must be one
/// of [`ALLOWED_EXTENSIONS`], otherwise `.jpg` is returned.
#[must_use]
pub fn extension_of(url: &str) -> String {
    let path = reqwest::Url::parse(url).map_or_else(|_| url.to_string(), |u| u.path().to_string());
    let (_, ext) = split_extension(file_name_of(&path));
    let ext = ext.to_lowercase();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        ext
    } else {
        FALLBACK_EXTENSION.to_string()
    }
}

/// Picks the stem for an item, never returning an empty string.
///
/// Falls back from the sanitized title to the sanitized file stem of the
/// URL, then to `item-{position}`.
#[must_use]
pub fn item_stem(title: &str, url: &str, position: usize) -> String {
    let stem = sanitize_filename(title);
    if !stem.is_empty() {
        return stem;
    }
    let (url_stem, _) = split_extension(file_name_of(url));
    let stem = sanitize_filename(url_stem);
    if stem.is_empty() {
        format!("item-{position}")
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_basic_title() {
        assert_eq!(sanitize_filename("Mega Man"), "mega-man");
        assert_eq!(sanitize_filename("10-Yard Fight"), "10-yard-fight");
    }

    #[test]
    fn sanitize_strips_illegal_characters() {
        assert_eq!(sanitize_filename(r#"Zelda: <Link's> "Adventure"?"#), "zelda-link's-adventure");
        assert_eq!(sanitize_filename("a/b\\c|d*e"), "abcde");
    }

    #[test]
    fn sanitize_collapses_whitespace_and_hyphens() {
        assert_eq!(sanitize_filename("mega   man"), "mega-man");
        assert_eq!(sanitize_filename("  Mega \t Man  "), "mega-man");
        assert_eq!(sanitize_filename("Mega - Man"), "mega-man");
        assert_eq!(sanitize_filename("--mega--man--"), "mega-man");
    }

    #[test]
    fn sanitize_distinct_titles_can_share_a_stem() {
        assert_eq!(sanitize_filename("Mega Man"), sanitize_filename("mega   man??"));
    }

    #[test]
    fn sanitize_empty_and_all_illegal() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("<>:\"/\\|?*"), "");
        assert_eq!(sanitize_filename("   "), "");
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let title = "é".repeat(150);
        let stem = sanitize_filename(&title);
        assert_eq!(stem.chars().count(), MAX_STEM_CHARS);
        assert!(stem.chars().all(|c| c == 'é'));
    }

    #[test]
    fn extension_allow_list() {
        assert_eq!(extension_of("https://x.com/a/Game.PNG"), ".png");
        assert_eq!(extension_of("https://x.com/a/game.jpeg?w=200"), ".jpeg");
        assert_eq!(extension_of("https://x.com/a/game.webp#frag"), ".webp");
        assert_eq!(extension_of("https://x.com/a/game.gif"), ".gif");
        assert_eq!(extension_of("https://x.com/a/game.bmp"), ".bmp");
    }

    #[test]
    fn extension_falls_back_to_jpg() {
        assert_eq!(extension_of("https://x.com/a/game.svg"), ".jpg");
        assert_eq!(extension_of("https://x.com/a/game"), ".jpg");
        assert_eq!(extension_of("https://x.com/a.png/game"), ".jpg");
        assert_eq!(extension_of("https://x.com/a/.png"), ".jpg");
    }

    #[test]
    fn extension_ignores_query_string() {
        assert_eq!(extension_of("https://x.com/img?file=game.png"), ".jpg");
    }

    #[test]
    fn extension_of_relative_path() {
        assert_eq!(extension_of("/covers/game.png?v=2"), ".png");
    }

    #[test]
    fn item_stem_prefers_title() {
        assert_eq!(item_stem("Contra", "https://x.com/c/whatever.png", 1), "contra");
    }

    #[test]
    fn item_stem_falls_back_to_url_then_position() {
        assert_eq!(item_stem("???", "https://x.com/c/Contra-USA.png", 4), "contra-usa");
        assert_eq!(item_stem("", "https://x.com/c/", 7), "item-7");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitize_output_is_filesystem_safe(title in ".*") {
                let stem = sanitize_filename(&title);
                prop_assert!(stem.chars().count() <= MAX_STEM_CHARS);
                prop_assert!(!stem.chars().any(|c| "<>:\"/\\|?*".contains(c)));
                prop_assert!(!stem.chars().any(char::is_whitespace));
                prop_assert!(!stem.starts_with('-'));
                prop_assert!(!stem.contains("--"));
            }

            #[test]
            fn sanitize_is_idempotent_below_the_limit(title in "[a-zA-Z0-9 ]{0,40}") {
                let once = sanitize_filename(&title);
                prop_assert_eq!(sanitize_filename(&once), once.clone());
            }

            #[test]
            fn extension_is_always_allowed(url in ".*") {
                let ext = extension_of(&url);
                prop_assert!(ALLOWED_EXTENSIONS.contains(&ext.as_str()));
            }

            #[test]
            fn item_stem_is_never_empty(title in ".*", url in ".*", pos in 1usize..10_000) {
                prop_assert!(!item_stem(&title, &url, pos).is_empty());
            }
        }
    }
}
