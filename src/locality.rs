//! Regions, zones and the composite identifiers built from them.
//!
//! Regional resources are identified as `"{region}/{uuid}"`, zoned ones as
//! `"{zone}/{uuid}"`. A zone name is its region followed by `-N`
//! (`fr-par-1` lives in `fr-par`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A Scaleway region such as `fr-par`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

/// A Scaleway availability zone such as `fr-par-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(String);

impl Region {
    /// The region as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first zone of this region, used when converting regional IDs to zoned ones.
    pub fn default_zone(&self) -> Zone {
        Zone(format!("{}-1", self.0))
    }
}

impl Zone {
    /// The zone as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region containing this zone.
    pub fn region(&self) -> Region {
        match self.0.rsplit_once('-') {
            Some((region, n)) if n.chars().all(|c| c.is_ascii_digit()) => {
                Region(region.to_string())
            },
            _ => Region(self.0.clone()),
        }
    }
}

fn is_locality_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn looks_like_region(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == 2 && parts.iter().all(|p| is_locality_part(p))
}

fn looks_like_zone(s: &str) -> bool {
    match s.rsplit_once('-') {
        Some((region, n)) => {
            looks_like_region(region) && !n.is_empty() && n.chars().all(|c| c.is_ascii_digit())
        },
        None => false,
    }
}

impl FromStr for Region {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if looks_like_region(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ProviderError::Validation(format!("invalid region {:?}", s)))
        }
    }
}

impl FromStr for Zone {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if looks_like_zone(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ProviderError::Validation(format!("invalid zone {:?}", s)))
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a regional ID.
pub fn regional_id(region: &Region, id: &str) -> String {
    format!("{}/{}", region, id)
}

/// Build a zoned ID.
pub fn zoned_id(zone: &Zone, id: &str) -> String {
    format!("{}/{}", zone, id)
}

/// Split a `"{region}/{id}"` identifier.
pub fn parse_regional_id(id: &str) -> Result<(Region, String), ProviderError> {
    match id.split_once('/') {
        Some((region, inner)) if !inner.is_empty() => Ok((region.parse()?, inner.to_string())),
        _ => Err(ProviderError::Validation(format!(
            "cannot parse regional ID {:?}: expected \"region/id\"",
            id
        ))),
    }
}

/// Split a `"{zone}/{id}"` identifier.
pub fn parse_zoned_id(id: &str) -> Result<(Zone, String), ProviderError> {
    match id.split_once('/') {
        Some((zone, inner)) if !inner.is_empty() => Ok((zone.parse()?, inner.to_string())),
        _ => Err(ProviderError::Validation(format!(
            "cannot parse zoned ID {:?}: expected \"zone/id\"",
            id
        ))),
    }
}

/// Strip any locality prefix, returning the vendor ID.
pub fn expand_id(id: &str) -> &str {
    match id.rsplit_once('/') {
        Some((_, inner)) => inner,
        None => id,
    }
}

/// Whether the value is a UUID, bare or prefixed with a region or zone.
pub fn is_uuid_or_localized(value: &str) -> bool {
    let (prefix, inner) = match value.split_once('/') {
        Some((prefix, inner)) => (Some(prefix), inner),
        None => (None, value),
    };
    let prefix_ok = prefix.map_or(true, |p| looks_like_region(p) || looks_like_zone(p));
    prefix_ok && uuid::Uuid::parse_str(inner).is_ok()
}

/// Rewrite a regional ID as a zoned one in the region's first zone.
///
/// IDs already carrying a zone are returned unchanged.
pub fn regional_to_zoned_id(id: &str) -> Result<String, ProviderError> {
    let Some((prefix, inner)) = id.split_once('/') else {
        return Err(ProviderError::Validation(format!(
            "cannot parse ID {:?}: missing locality",
            id
        )));
    };
    if looks_like_zone(prefix) {
        return Ok(id.to_string());
    }
    let region: Region = prefix.parse()?;
    Ok(zoned_id(&region.default_zone(), inner))
}
