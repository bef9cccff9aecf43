use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Config;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub lookup: Option<LookupSection>,
    pub concurrency: Option<ConcurrencySection>,
    pub parsing: Option<ParsingSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupSection {
    pub crossref_mailto: Option<String>,
    pub timeout_secs: Option<u64>,
    pub search_rows: Option<usize>,
    pub min_title_similarity: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencySection {
    pub batch_size: Option<usize>,
    pub request_delay_ms: Option<u64>,
    pub batch_delay_ms: Option<u64>,
}

/// Segmentation overrides. Read here, interpreted by the parsing crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsingSection {
    pub section_header_regex: Option<String>,
    pub section_end_regex: Option<String>,
    pub excluded_prefixes: Option<Vec<String>>,
    pub fallback_fraction: Option<f64>,
}

/// Platform config directory path: `<config_dir>/citelint/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citelint").join("config.toml"))
}

/// Load config by cascading CWD `.citelint.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".citelint.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Pick the overlay's value for a field, falling back to the base's.
fn pick<S, T: Clone>(base: &Option<S>, overlay: &Option<S>, field: impl Fn(&S) -> Option<T>) -> Option<T> {
    overlay
        .as_ref()
        .and_then(&field)
        .or_else(|| base.as_ref().and_then(&field))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        lookup: Some(LookupSection {
            crossref_mailto: pick(&base.lookup, &overlay.lookup, |l| l.crossref_mailto.clone()),
            timeout_secs: pick(&base.lookup, &overlay.lookup, |l| l.timeout_secs),
            search_rows: pick(&base.lookup, &overlay.lookup, |l| l.search_rows),
            min_title_similarity: pick(&base.lookup, &overlay.lookup, |l| l.min_title_similarity),
        }),
        concurrency: Some(ConcurrencySection {
            batch_size: pick(&base.concurrency, &overlay.concurrency, |c| c.batch_size),
            request_delay_ms: pick(&base.concurrency, &overlay.concurrency, |c| {
                c.request_delay_ms
            }),
            batch_delay_ms: pick(&base.concurrency, &overlay.concurrency, |c| c.batch_delay_ms),
        }),
        parsing: Some(ParsingSection {
            section_header_regex: pick(&base.parsing, &overlay.parsing, |p| {
                p.section_header_regex.clone()
            }),
            section_end_regex: pick(&base.parsing, &overlay.parsing, |p| {
                p.section_end_regex.clone()
            }),
            excluded_prefixes: pick(&base.parsing, &overlay.parsing, |p| {
                p.excluded_prefixes.clone()
            }),
            fallback_fraction: pick(&base.parsing, &overlay.parsing, |p| p.fallback_fraction),
        }),
    }
}

/// Layer file values over a [`Config`]. Absent fields keep the config's value.
pub fn apply(mut config: Config, file: &ConfigFile) -> Config {
    if let Some(lookup) = &file.lookup {
        if let Some(mailto) = &lookup.crossref_mailto
            && !mailto.trim().is_empty()
        {
            config.crossref_mailto = Some(mailto.trim().to_string());
        }
        if let Some(secs) = lookup.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(rows) = lookup.search_rows {
            config.search_rows = rows;
        }
        if lookup.min_title_similarity.is_some() {
            config.min_title_similarity = lookup.min_title_similarity;
        }
    }
    if let Some(conc) = &file.concurrency {
        if let Some(n) = conc.batch_size {
            config.batch_size = n;
        }
        if let Some(ms) = conc.request_delay_ms {
            config.request_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = conc.batch_delay_ms {
            config.batch_delay = Duration::from_millis(ms);
        }
    }
    config
}
