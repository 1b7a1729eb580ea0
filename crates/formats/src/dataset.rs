//! The five sources fused into the bay collection, and the errors raised
//! while loading them.

use std::fmt;

/// One of the five source slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetKind {
    BayGeometry,
    Occupancy,
    Disability,
    ZoneSegments,
    ZoneCosts,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 5] = [
        DatasetKind::BayGeometry,
        DatasetKind::Occupancy,
        DatasetKind::Disability,
        DatasetKind::ZoneSegments,
        DatasetKind::ZoneCosts,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::BayGeometry => "bay geometry",
            DatasetKind::Occupancy => "occupancy",
            DatasetKind::Disability => "disability restrictions",
            DatasetKind::ZoneSegments => "pay-stay zone segments",
            DatasetKind::ZoneCosts => "pay-stay costs",
        }
    }

    /// Dataset identifier on the municipal open-data portal.
    pub fn remote_name(self) -> &'static str {
        match self {
            DatasetKind::BayGeometry => "on-street-parking-bays",
            DatasetKind::Occupancy => "on-street-parking-bay-sensors",
            DatasetKind::Disability => "on-street-car-park-bay-restrictions",
            DatasetKind::ZoneSegments => "pay-stay-zones-linked-to-street-segments",
            DatasetKind::ZoneCosts => "on-street-car-parking-pay-stay-restrictions",
        }
    }

    /// Export format requested from the portal for this slot.
    pub fn remote_format(self) -> SourceFormat {
        match self {
            DatasetKind::BayGeometry => SourceFormat::GeoJson,
            _ => SourceFormat::Csv,
        }
    }

    /// Resolves a remote dataset name to its slot.
    pub fn from_remote_name(name: &str) -> Result<DatasetKind, UnrecognisedDatasetError> {
        let trimmed = name.trim();
        DatasetKind::ALL
            .into_iter()
            .find(|k| k.remote_name() == trimmed)
            .ok_or_else(|| UnrecognisedDatasetError::unknown(trimmed))
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payload encoding of a source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    GeoJson,
    Csv,
    /// A JSON array of flat objects (or `{"results": [...]}`).
    JsonRows,
}

impl SourceFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::GeoJson => "geojson",
            SourceFormat::Csv => "csv",
            SourceFormat::JsonRows => "json",
        }
    }

    /// Guesses a tabular format from the first non-blank byte.
    pub fn sniff_tabular(bytes: &[u8]) -> SourceFormat {
        // Skips whitespace and a UTF-8 byte-order mark.
        let first = bytes
            .iter()
            .copied()
            .find(|b| !(b.is_ascii_whitespace() || matches!(*b, 0xEF | 0xBB | 0xBF)));
        match first {
            Some(b'[') | Some(b'{') => SourceFormat::JsonRows,
            _ => SourceFormat::Csv,
        }
    }
}

/// A remote dataset name that is not in the registry, or one bound to the
/// wrong slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognisedDatasetError {
    pub name: String,
    pub expected: Option<DatasetKind>,
}

impl UnrecognisedDatasetError {
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: None,
        }
    }

    pub fn wrong_slot(name: impl Into<String>, expected: DatasetKind) -> Self {
        Self {
            name: name.into(),
            expected: Some(expected),
        }
    }
}

impl fmt::Display for UnrecognisedDatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            None => write!(f, "unrecognised dataset name: {:?}", self.name),
            Some(kind) => write!(
                f,
                "dataset {:?} cannot be used as the {kind} source (expected {:?})",
                self.name,
                kind.remote_name()
            ),
        }
    }
}

impl std::error::Error for UnrecognisedDatasetError {}

/// A source failed to fetch or parse. Fatal to startup.
#[derive(Debug)]
pub struct SourceLoadError {
    pub dataset: DatasetKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceLoadError {
    pub fn new(dataset: DatasetKind, message: impl Into<String>) -> Self {
        Self {
            dataset,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        dataset: DatasetKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            dataset,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for SourceLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load {} source: {}", self.dataset, self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SourceLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

#[cfg(test)]
mod tests {
    use super::{DatasetKind, SourceFormat, SourceLoadError};

    #[test]
    fn registry_round_trips_every_slot() {
        for kind in DatasetKind::ALL {
            assert_eq!(DatasetKind::from_remote_name(kind.remote_name()), Ok(kind));
        }
    }

    #[test]
    fn unknown_remote_name_fails_fast() {
        let err = DatasetKind::from_remote_name("parking-meters").unwrap_err();
        assert_eq!(err.name, "parking-meters");
        assert!(err.to_string().contains("unrecognised"));
    }

    #[test]
    fn load_error_names_the_source() {
        let err = SourceLoadError::new(DatasetKind::ZoneCosts, "HTTP 503");
        assert_eq!(
            err.to_string(),
            "failed to load pay-stay costs source: HTTP 503"
        );
    }

    #[test]
    fn sniffs_json_rows_versus_csv() {
        assert_eq!(SourceFormat::sniff_tabular(b"  [{\"a\":1}]"), SourceFormat::JsonRows);
        assert_eq!(SourceFormat::sniff_tabular(b"{\"results\":[]}"), SourceFormat::JsonRows);
        assert_eq!(SourceFormat::sniff_tabular(b"bay_id,occupied_id\n"), SourceFormat::Csv);
        assert_eq!(SourceFormat::sniff_tabular(b""), SourceFormat::Csv);
    }
}
