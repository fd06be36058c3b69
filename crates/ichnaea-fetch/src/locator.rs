use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{FetchError, FetchResult};

/// Where a dataset's bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    /// `http://` or `https://` URL.
    Http(reqwest::Url),
    /// `file://` path on the local filesystem.
    File(PathBuf),
}

impl Locator {
    /// Parse a URL-like locator string.
    ///
    /// ```
    /// use ichnaea_fetch::Locator;
    ///
    /// assert!(matches!(Locator::parse("https://example.org/t.csv"), Ok(Locator::Http(_))));
    /// assert!(matches!(Locator::parse("file:///tmp/t.csv"), Ok(Locator::File(_))));
    /// assert!(Locator::parse("ftp://example.org/t.csv").is_err());
    /// ```
    pub fn parse(raw: &str) -> FetchResult<Self> {
        let Some((scheme, rest)) = raw.split_once("://") else {
            return Err(FetchError::InvalidLocator {
                locator: raw.to_string(),
                reason: "missing scheme".into(),
            });
        };

        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => reqwest::Url::parse(raw)
                .map(Locator::Http)
                .map_err(|e| FetchError::InvalidLocator {
                    locator: raw.to_string(),
                    reason: e.to_string(),
                }),
            "file" => {
                if rest.is_empty() {
                    return Err(FetchError::InvalidLocator {
                        locator: raw.to_string(),
                        reason: "empty file path".into(),
                    });
                }
                Ok(Locator::File(PathBuf::from(rest)))
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Build a `file://` locator from a local path.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Locator::File(path.as_ref().to_path_buf())
    }

    /// Last path segment, if any (e.g. `data.csv`).
    pub fn file_name(&self) -> Option<String> {
        match self {
            Locator::Http(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Locator::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Http(url) => write!(f, "{url}"),
            Locator::File(path) => write!(f, "file://{}", path.display()),
        }
    }
}

impl FromStr for Locator {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_http_and_https() {
        let loc = Locator::parse("http://127.0.0.1:8080/data/t.csv").unwrap();
        assert!(matches!(loc, Locator::Http(_)));
        assert_eq!(loc.file_name().as_deref(), Some("t.csv"));

        let loc: Locator = "HTTPS://example.org/x.json".parse().unwrap();
        assert!(matches!(loc, Locator::Http(_)));
    }

    #[test]
    fn parse_file() {
        let loc = Locator::parse("file:///var/data/sensor.xml").unwrap();
        assert_eq!(loc, Locator::File(PathBuf::from("/var/data/sensor.xml")));
        assert_eq!(loc.file_name().as_deref(), Some("sensor.xml"));
        assert_eq!(loc.to_string(), "file:///var/data/sensor.xml");
    }

    #[test]
    fn reject_missing_scheme() {
        assert!(matches!(
            Locator::parse("/var/data/t.csv"),
            Err(FetchError::InvalidLocator { .. })
        ));
    }

    #[test]
    fn reject_unknown_scheme() {
        assert!(matches!(
            Locator::parse("s3://bucket/t.csv"),
            Err(FetchError::UnsupportedScheme(s)) if s == "s3"
        ));
    }

    #[test]
    fn reject_empty_file_path() {
        assert!(Locator::parse("file://").is_err());
    }

    #[test]
    fn http_without_path_has_no_file_name() {
        let loc = Locator::parse("https://example.org/").unwrap();
        assert_eq!(loc.file_name(), None);
    }
}
