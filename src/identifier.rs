//! Translation between archival identifiers and the source service numbering.
//!
//! An archival identifier looks like `NL-HaNA_{archief}_{inventaris}`. The
//! source service groups scans into image sets addressed by
//! `{series}/{set}`, where the series is the archief prefixed with `NL-HaNA_`
//! and the set is the inventaris without leading zeros. Each scan is named
//! `NL-HaNA_{archief}_{inventaris}_{scan}.jpg`, and the target store knows it
//! by the external ID `NL-HaNA_{archief}_{inventaris}_{scan}`.
//!
//! Everything here is pure. Malformed input is always an error, never a
//! partial result.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::ImageSet;

/// Prefix shared by all National Archive identifiers and series.
pub const SERIES_PREFIX: &str = "NL-HaNA_";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^NL-HaNA_([^_]+)_([^_]+)$").expect("valid identifier regex"));

static EXTERNAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^NL-HaNA_([^_]+)_([^_]+)_([^_]+)$").expect("valid external id regex")
});

static SCAN_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^NL-HaNA_[^_]+_[^_]+_([^_]+)\.jpg$").expect("valid scan filename regex")
});

/// Errors raised while parsing or validating identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("invalid identifier '{0}': expected NL-HaNA_{{archief}}_{{inventaris}}")]
    InvalidIdentifier(String),

    #[error("invalid remote uri '{0}': filename does not end in _{{scan}}.jpg")]
    InvalidRemoteUri(String),

    #[error("invalid external id '{0}': expected NL-HaNA_{{archief}}_{{inventaris}}_{{scan}}")]
    InvalidExternalId(String),

    #[error("no image set found for {series}/{set}")]
    ImageSetNotFound { series: String, set: String },

    #[error("{matches} image sets match {series}/{set}")]
    AmbiguousImageSet {
        series: String,
        set: String,
        matches: usize,
    },
}

/// Archief and inventaris parsed from an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiefInventaris {
    pub archief: String,
    pub inventaris: String,
}

/// Components of a parsed external ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdParts {
    pub archief: String,
    pub inventaris: String,
    pub scan: String,
}

/// Split `NL-HaNA_{archief}_{inventaris}` into its parts.
pub fn extract_archief_and_inventaris(
    identifier: &str,
) -> Result<ArchiefInventaris, IdentifierError> {
    let caps = IDENTIFIER_RE
        .captures(identifier)
        .ok_or_else(|| IdentifierError::InvalidIdentifier(identifier.to_string()))?;

    Ok(ArchiefInventaris {
        archief: caps[1].to_string(),
        inventaris: caps[2].to_string(),
    })
}

/// Image set number for an inventaris: leading zeros stripped.
///
/// An all-zero inventaris maps to `"0"`.
pub fn inventaris_to_set(inventaris: &str) -> String {
    let stripped = inventaris.trim_start_matches('0');
    if stripped.is_empty() && !inventaris.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Series name for an archief.
pub fn archief_to_series(archief: &str) -> String {
    format!("{SERIES_PREFIX}{archief}")
}

/// Extract the scan number from the final path component of a remote uri.
pub fn scan_from_remote_uri(remote_uri: &str) -> Result<String, IdentifierError> {
    let filename = remote_uri.rsplit('/').next().unwrap_or(remote_uri);

    SCAN_FILENAME_RE
        .captures(filename)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| IdentifierError::InvalidRemoteUri(remote_uri.to_string()))
}

/// Build the external ID for a scan of an identifier.
pub fn create_external_id(identifier: &str, scan: &str) -> Result<String, IdentifierError> {
    let external_id = format!("{identifier}_{scan}");
    if !EXTERNAL_ID_RE.is_match(&external_id) {
        return Err(IdentifierError::InvalidExternalId(external_id));
    }
    Ok(external_id)
}

/// Inverse of [`create_external_id`].
pub fn parse_external_id(external_id: &str) -> Result<ExternalIdParts, IdentifierError> {
    let caps = EXTERNAL_ID_RE
        .captures(external_id)
        .ok_or_else(|| IdentifierError::InvalidExternalId(external_id.to_string()))?;

    Ok(ExternalIdParts {
        archief: caps[1].to_string(),
        inventaris: caps[2].to_string(),
        scan: caps[3].to_string(),
    })
}

/// Find the single image set whose uri ends in `{series}/{set}`.
///
/// Zero or several matches are both errors; this never picks one.
pub fn find_image_set<'a>(
    sets: &'a [ImageSet],
    archief: &str,
    inventaris: &str,
) -> Result<&'a ImageSet, IdentifierError> {
    let series = archief_to_series(archief);
    let set = inventaris_to_set(inventaris);

    let pattern = format!(
        r"(?:^|/){}/{}/?$",
        regex::escape(&series),
        regex::escape(&set)
    );
    let re = Regex::new(&pattern).map_err(|_| IdentifierError::ImageSetNotFound {
        series: series.clone(),
        set: set.clone(),
    })?;

    let matches: Vec<&ImageSet> = sets.iter().filter(|s| re.is_match(&s.uri)).collect();

    match matches.as_slice() {
        [only] => Ok(only),
        [] => Err(IdentifierError::ImageSetNotFound { series, set }),
        many => Err(IdentifierError::AmbiguousImageSet {
            series,
            set,
            matches: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn image_set(uri: &str) -> ImageSet {
        ImageSet {
            uuid: Uuid::new_v4(),
            uri: uri.to_string(),
        }
    }

    #[test]
    fn test_extract_archief_and_inventaris() {
        let parts = extract_archief_and_inventaris("NL-HaNA_1.10.94_0455").unwrap();
        assert_eq!(parts.archief, "1.10.94");
        assert_eq!(parts.inventaris, "0455");
    }

    #[test]
    fn test_extract_rejects_malformed_identifiers() {
        for bad in [
            "",
            "NL-HaNA_1.10.94",
            "NL-HaNA_1.10.94_0455_0012",
            "XX-HaNA_1.10.94_0455",
            "NL-HaNA__0455",
        ] {
            assert_eq!(
                extract_archief_and_inventaris(bad),
                Err(IdentifierError::InvalidIdentifier(bad.to_string())),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_inventaris_to_set() {
        assert_eq!(inventaris_to_set("0455"), "455");
        assert_eq!(inventaris_to_set("455"), "455");
        assert_eq!(inventaris_to_set("0100"), "100");
        assert_eq!(inventaris_to_set("000"), "0");
    }

    #[test]
    fn test_archief_to_series() {
        assert_eq!(archief_to_series("1.10.94"), "NL-HaNA_1.10.94");
    }

    #[test]
    fn test_scan_from_remote_uri() {
        assert_eq!(
            scan_from_remote_uri("https://images.example.org/iip/NL-HaNA_1.10.94_0455_0012.jpg")
                .unwrap(),
            "0012"
        );
        assert_eq!(
            scan_from_remote_uri("NL-HaNA_1.10.94_0455_0012.jpg").unwrap(),
            "0012"
        );
    }

    #[test]
    fn test_scan_from_remote_uri_rejects_other_names() {
        for bad in [
            "https://images.example.org/iip/scan_0012.png",
            "https://images.example.org/NL-HaNA_1.10.94_0455_0012.jpg/info.json",
            "https://images.example.org/NL-HaNA_1.10.94_0012.jpg",
        ] {
            assert!(matches!(
                scan_from_remote_uri(bad),
                Err(IdentifierError::InvalidRemoteUri(_))
            ));
        }
    }

    #[test]
    fn test_create_external_id() {
        assert_eq!(
            create_external_id("NL-HaNA_1.10.94_0455", "0012").unwrap(),
            "NL-HaNA_1.10.94_0455_0012"
        );
    }

    #[test]
    fn test_create_external_id_validates_result() {
        assert!(matches!(
            create_external_id("NL-HaNA_1.10.94", "0012"),
            Err(IdentifierError::InvalidExternalId(_))
        ));
        assert!(matches!(
            create_external_id("NL-HaNA_1.10.94_0455", "00_12"),
            Err(IdentifierError::InvalidExternalId(_))
        ));
        assert!(matches!(
            create_external_id("NL-HaNA_1.10.94_0455", ""),
            Err(IdentifierError::InvalidExternalId(_))
        ));
    }

    #[test]
    fn test_external_id_round_trip() {
        let cases = [
            ("NL-HaNA_1.10.94_0455", "0012"),
            ("NL-HaNA_1.04.02_1547", "0001"),
            ("NL-HaNA_2.21.281.08_12A", "9999"),
        ];

        for (identifier, scan) in cases {
            let expected = extract_archief_and_inventaris(identifier).unwrap();
            let external_id = create_external_id(identifier, scan).unwrap();
            let parts = parse_external_id(&external_id).unwrap();
            assert_eq!(parts.archief, expected.archief);
            assert_eq!(parts.inventaris, expected.inventaris);
            assert_eq!(parts.scan, scan);
        }
    }

    #[test]
    fn test_parse_external_id_rejects_identifier() {
        assert_eq!(
            parse_external_id("NL-HaNA_1.10.94_0455"),
            Err(IdentifierError::InvalidExternalId(
                "NL-HaNA_1.10.94_0455".to_string()
            ))
        );
    }

    #[test]
    fn test_find_image_set_unique_match() {
        let sets = vec![
            image_set("https://scans.example.org/sets/NL-HaNA_1.10.94/455"),
            image_set("https://scans.example.org/sets/NL-HaNA_1.10.94/4550"),
            image_set("https://scans.example.org/sets/NL-HaNA_1.10.94/45"),
            image_set("https://scans.example.org/sets/NL-HaNA_1.10.9/455"),
        ];

        let found = find_image_set(&sets, "1.10.94", "0455").unwrap();
        assert_eq!(found.uuid, sets[0].uuid);
    }

    #[test]
    fn test_find_image_set_escapes_series_dots() {
        let sets = vec![image_set("NL-HaNA_1x10x94/455")];
        assert!(matches!(
            find_image_set(&sets, "1.10.94", "0455"),
            Err(IdentifierError::ImageSetNotFound { .. })
        ));
    }

    #[test]
    fn test_find_image_set_missing() {
        let sets = vec![image_set("NL-HaNA_1.10.94/456")];
        assert_eq!(
            find_image_set(&sets, "1.10.94", "0455"),
            Err(IdentifierError::ImageSetNotFound {
                series: "NL-HaNA_1.10.94".to_string(),
                set: "455".to_string(),
            })
        );
    }

    #[test]
    fn test_find_image_set_ambiguous() {
        let sets = vec![
            image_set("https://a.example.org/NL-HaNA_1.10.94/455"),
            image_set("https://b.example.org/NL-HaNA_1.10.94/455/"),
        ];
        assert_eq!(
            find_image_set(&sets, "1.10.94", "0455"),
            Err(IdentifierError::AmbiguousImageSet {
                series: "NL-HaNA_1.10.94".to_string(),
                set: "455".to_string(),
                matches: 2,
            })
        );
    }
}
