use std::fmt;
use std::str::FromStr;

use gridfeed_core::{FeedError, FeedResult};
use gridfeed_ts::Frequency;
use polars::prelude::DataFrame;

use super::transforms;

/// Known EIA v2 datasets and the transform bound to each.
///
/// Anything else is `Unregistered` and passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// `electricity/rto/interchange-data`
    RtoInterchange,
    /// `electricity/rto/region-data`
    RtoRegionData,
    /// `electricity/rto/fuel-type-data`
    RtoFuelTypeData,
    Unregistered(String),
}

impl Dataset {
    pub const REGISTERED: [Dataset; 3] = [
        Dataset::RtoInterchange,
        Dataset::RtoRegionData,
        Dataset::RtoFuelTypeData,
    ];

    pub fn from_path(path: &str) -> Self {
        match path.trim_matches('/') {
            "electricity/rto/interchange-data" => Dataset::RtoInterchange,
            "electricity/rto/region-data" => Dataset::RtoRegionData,
            "electricity/rto/fuel-type-data" => Dataset::RtoFuelTypeData,
            other => Dataset::Unregistered(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Dataset::RtoInterchange => "electricity/rto/interchange-data",
            Dataset::RtoRegionData => "electricity/rto/region-data",
            Dataset::RtoFuelTypeData => "electricity/rto/fuel-type-data",
            Dataset::Unregistered(path) => path,
        }
    }

    pub fn frequency(&self) -> Frequency {
        Frequency::Hourly
    }

    pub fn is_registered(&self) -> bool {
        !matches!(self, Dataset::Unregistered(_))
    }

    /// Reshape a raw frame into this dataset's canonical table.
    pub fn transform(&self, raw: DataFrame) -> FeedResult<DataFrame> {
        let duration = self.frequency().duration();
        match self {
            Dataset::RtoInterchange => transforms::rto_interchange(raw, duration),
            Dataset::RtoRegionData => transforms::rto_region_data(raw, duration),
            Dataset::RtoFuelTypeData => transforms::rto_fuel_type_data(raw, duration),
            Dataset::Unregistered(_) => Ok(raw),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Dataset {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim_matches('/').is_empty() {
            return Err(FeedError::Config("dataset path cannot be empty".to_string()));
        }
        Ok(Dataset::from_path(s))
    }
}
