use super::fragment_space::LibraryLoadError;
use crate::core::models::ring::ClosableChain;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawArchiveFile {
    #[serde(default)]
    chains: Vec<ClosableChain>,
}

/// Archive of chains of building blocks known to close rings.
///
/// Chains are indexed by the building block they turn on, which is what growth from a
/// scaffold looks up.
#[derive(Debug, Clone, Default)]
pub struct RingClosuresArchive {
    by_turning_point: HashMap<usize, Vec<ClosableChain>>,
}

impl RingClosuresArchive {
    pub fn load(path: &Path) -> Result<Self, LibraryLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LibraryLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn parse(content: &str, origin: &str) -> Result<Self, LibraryLoadError> {
        let raw: RawArchiveFile = toml::from_str(content).map_err(|e| LibraryLoadError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        let mut archive = Self::default();
        for chain in raw.chains {
            archive.add(chain).map_err(|reason| LibraryLoadError::InvalidDefinition {
                path: origin.to_string(),
                reason,
            })?;
        }
        Ok(archive)
    }

    pub fn add(&mut self, chain: ClosableChain) -> Result<(), String> {
        let turning = chain
            .turning_link()
            .ok_or_else(|| {
                format!(
                    "turning point {} is outside a chain of {} links",
                    chain.turning_point,
                    chain.links.len()
                )
            })?
            .building_block;
        self.by_turning_point.entry(turning).or_default().push(chain);
        Ok(())
    }

    /// Chains turning on the building block `building_block`.
    pub fn chains_for(&self, building_block: usize) -> &[ClosableChain] {
        self.by_turning_point
            .get(&building_block)
            .map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_turning_point.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
