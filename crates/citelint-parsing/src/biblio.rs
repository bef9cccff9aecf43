use citelint_core::BiblioQuery;
use once_cell::sync::Lazy;
use regex::Regex;

/// Leading capitalized words that are not surnames.
const NON_SURNAMES: &[&str] = &["The", "A", "An", "In", "On"];

/// Collect the bibliographic signals of a citation. The bundle may be
/// unusable; check [`BiblioQuery::is_usable`].
pub fn extract_biblio(text: &str) -> BiblioQuery {
    let (volume, page) = extract_volume_page(text).unzip();
    BiblioQuery {
        author: extract_surname(text),
        year: extract_year(text),
        venue: extract_venue(text),
        volume,
        page,
    }
}

/// First author's surname: the leading capitalized word, or the word after a
/// leading run of initials ("J. A. Smith").
pub fn extract_surname(text: &str) -> Option<String> {
    static LEADING_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^\s*(?:\p{Lu}\.\s*)*(\p{Lu}[\p{L}'\-]+)").unwrap());

    let surname = LEADING_RE.captures(text)?.get(1)?.as_str();
    (!NON_SURNAMES.contains(&surname)).then(|| surname.to_string())
}

/// A parenthesized four-digit year, e.g. `(2020)` or `(2020b)`.
pub fn extract_year(text: &str) -> Option<String> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(((?:19|20)\d{2})[a-z]?\)").unwrap());
    RE.captures(text).map(|caps| caps[1].to_string())
}

/// A well-known journal, or a generic `Abbrev. Abbrev. <number>` venue.
pub fn extract_venue(text: &str) -> Option<String> {
    static KNOWN_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(concat!(
            r"\b(Nature(?:\s+(?:Communications|Physics|Chemistry|Medicine|Genetics|Methods|Biotechnology|Materials|Neuroscience))?",
            r"|Science(?:\s+Advances)?|Cell|Lancet|JAMA|BMJ|PLoS\s+ONE|Phys\.\s*Rev\.(?:\s*Lett\.|\s*[A-E]\b)?",
            r"|Proc\.\s*Natl\.\s*Acad\.\s*Sci\.|J\.\s*Am\.\s*Chem\.\s*Soc\.|N\.\s*Engl\.\s*J\.\s*Med\.",
            r"|Nat\.\s*\p{Lu}[a-z]+\.|Angew\.\s*Chem\.|Appl\.\s*Phys\.\s*Lett\.)",
            r"(?:\s|,|$)"
        ))
        .unwrap()
    });
    static GENERIC_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b((?:\p{Lu}[a-z]{1,7}\.\s*){2,})\d{1,4}\b").unwrap());

    KNOWN_RE
        .captures(text)
        .or_else(|| GENERIC_RE.captures(text))
        .map(|caps| caps[1].trim().to_string())
}

/// A `<volume>, <page>` pair. Four-digit numbers that look like years are
/// not volumes.
pub fn extract_volume_page(text: &str) -> Option<(String, String)> {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,4}),\s*(\d+)").unwrap());
    static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").unwrap());

    RE.captures_iter(text)
        .find(|caps| !YEAR_RE.is_match(&caps[1]))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nature_style() {
        let q = extract_biblio("Smith, J. A study of widgets in the wild. Nature 12, 34 (2020).");
        assert_eq!(q.author.as_deref(), Some("Smith"));
        assert_eq!(q.year.as_deref(), Some("2020"));
        assert_eq!(q.venue.as_deref(), Some("Nature"));
        assert_eq!(q.volume.as_deref(), Some("12"));
        assert_eq!(q.page.as_deref(), Some("34"));
        assert!(q.is_usable());
        assert_eq!(q.query_string(), "Smith Nature 2020 12");
    }

    #[test]
    fn test_initials_before_surname() {
        let q = extract_biblio("J. Smith, Phys. Rev. Lett. 99, 123 (2007).");
        assert_eq!(q.author.as_deref(), Some("Smith"));
        assert_eq!(q.venue.as_deref(), Some("Phys. Rev. Lett."));
        assert_eq!(q.volume.as_deref(), Some("99"));
        assert_eq!(q.year.as_deref(), Some("2007"));
    }

    #[test]
    fn test_generic_venue_shape() {
        assert_eq!(
            extract_venue("Doe, A. Sprocket theory. Mech. Eng. 41, 7 (2001).").as_deref(),
            Some("Mech. Eng.")
        );
    }

    #[test]
    fn test_article_is_not_a_surname() {
        assert_eq!(extract_surname("The Widget Consortium. Standards. 2019."), None);
        assert_eq!(extract_surname("An overview of widgets"), None);
    }

    #[test]
    fn test_year_is_not_a_volume() {
        assert_eq!(extract_volume_page("Widgets Journal 2020, 15"), None);
        assert_eq!(
            extract_volume_page("Widgets Journal 2020, 15; 7, 88"),
            Some(("7".to_string(), "88".to_string()))
        );
    }

    #[test]
    fn test_unusable_bundle() {
        let q = extract_biblio("the widget consortium report on standards");
        assert_eq!(q.signal_count(), 0);
        assert!(!q.is_usable());
    }

    #[test]
    fn test_year_suffix() {
        assert_eq!(extract_year("Brown, C. (2020b). Gadgets.").as_deref(), Some("2020"));
        assert_eq!(extract_year("Brown, C. 2020. Gadgets."), None);
    }
}
