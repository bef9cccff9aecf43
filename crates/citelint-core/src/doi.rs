use once_cell::sync::Lazy;
use regex::Regex;

/// Resolver and bare prefixes users paste in front of a DOI.
const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
    "doi:",
];

/// Normalize a user-supplied DOI: strip resolver prefixes and whitespace,
/// decode `%2F`, and drop trailing punctuation picked up from prose.
pub fn normalize_doi(doi: &str) -> String {
    let mut doi = doi.trim();
    for prefix in DOI_PREFIXES {
        if let Some(head) = doi.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            doi = doi[prefix.len()..].trim_start();
            break;
        }
    }
    doi.trim_end_matches(['.', ',', ';', ':', ')', ']', '}'])
        .replace("%2F", "/")
        .replace("%2f", "/")
}

/// Whether `doi` has the `10.<registrant>/<suffix>` shape.
pub fn is_valid_doi(doi: &str) -> bool {
    static DOI_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.\d{4,}(?:\.\d+)*/\S+$").unwrap());
    DOI_SHAPE.is_match(doi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_resolver_prefixes() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1038/nature12373"),
            "10.1038/nature12373"
        );
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1145/3292500.3330701"),
            "10.1145/3292500.3330701"
        );
        assert_eq!(normalize_doi("DOI: 10.1000/xyz123"), "10.1000/xyz123");
        assert_eq!(normalize_doi("doi:10.1000/xyz123"), "10.1000/xyz123");
    }

    #[test]
    fn strips_trailing_punctuation_and_decodes() {
        assert_eq!(normalize_doi(" 10.1234/abcd. "), "10.1234/abcd");
        assert_eq!(normalize_doi("10.1234%2Fabcd"), "10.1234/abcd");
    }

    #[test]
    fn validates_shape() {
        assert!(is_valid_doi("10.1038/nature12373"));
        assert!(is_valid_doi("10.1000.10/123456"));
        assert!(!is_valid_doi("10.12/abc"));
        assert!(!is_valid_doi("11.1234/abc"));
        assert!(!is_valid_doi("10.1234/"));
        assert!(!is_valid_doi("10.1234/has space"));
    }
}
