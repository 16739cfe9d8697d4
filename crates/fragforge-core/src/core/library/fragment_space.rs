use crate::core::models::attachment_point::{ApClass, AttachmentPoint};
use crate::core::models::edge::BondOrder;
use crate::core::models::vertex::{BuildingBlockType, MutationType, Vertex};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

fn default_heavy_atoms() -> usize {
    1
}

/// An attachment point as written in a library file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ApDefinition {
    pub class: ApClass,
    /// Atom the AP is rooted on. Defaults to the AP's own index.
    #[serde(default)]
    pub source_atom: Option<usize>,
}

/// A building block of the library: scaffold, fragment or capping group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct BuildingBlock {
    pub name: String,
    #[serde(default = "default_heavy_atoms")]
    pub heavy_atoms: usize,
    #[serde(default)]
    pub attachment_points: Vec<ApDefinition>,
    #[serde(default)]
    pub symmetric_aps: Vec<Vec<usize>>,
    #[serde(default)]
    pub ring_closing: bool,
    /// Contribution of this block to the additive fitness.
    #[serde(default)]
    pub fitness: f64,
    /// Mutation types allowed on vertices made from this block. All types when absent.
    #[serde(default)]
    pub mutations: Option<Vec<MutationType>>,
}

/// Points at one AP of one fragment in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockAp {
    pub building_block: usize,
    pub ap_index: usize,
}

/// Library file as deserialized, before validation and indexing.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawLibraryFile {
    #[serde(default)]
    scaffolds: Vec<BuildingBlock>,
    #[serde(default)]
    fragments: Vec<BuildingBlock>,
    #[serde(default)]
    caps: Vec<BuildingBlock>,
    #[serde(default)]
    compatibility: HashMap<String, Vec<ApClass>>,
    #[serde(default)]
    ring_closures: HashMap<String, Vec<ApClass>>,
    #[serde(default)]
    capping: HashMap<String, ApClass>,
    #[serde(default)]
    forbidden_ends: Vec<ApClass>,
    #[serde(default)]
    symmetric_classes: Vec<ApClass>,
    #[serde(default)]
    bond_orders: HashMap<String, BondOrder>,
}

/// Represents errors that can occur while loading a building-block library.
#[derive(Debug, Error)]
pub enum LibraryLoadError {
    /// The library file could not be read from disk.
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    /// The library file is not valid TOML or does not match the expected layout.
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    /// The file parsed, but its content contradicts itself.
    ///
    /// Raised for unparsable class keys, symmetry groups pointing at missing APs, capping
    /// groups without exactly one AP, and capping rules naming a class no cap provides.
    #[error("Invalid library definition in '{path}': {reason}")]
    InvalidDefinition { path: String, reason: String },
}

/// The building-block library consulted by every graph operation.
///
/// Holds the scaffolds, fragments and capping groups, plus the rules connecting them:
/// which AP classes may bond (source class to target classes), which classes may close rings
/// together, which capping group saturates a free AP of a given class, which classes must
/// never be left free, and which classes impose symmetric substitution.
#[derive(Debug, Clone, Default)]
pub struct FragmentSpace {
    scaffolds: Vec<BuildingBlock>,
    fragments: Vec<BuildingBlock>,
    caps: Vec<BuildingBlock>,
    compatibility: HashMap<ApClass, Vec<ApClass>>,
    ring_closures: HashMap<ApClass, Vec<ApClass>>,
    capping: HashMap<ApClass, ApClass>,
    forbidden_ends: HashSet<ApClass>,
    symmetric_classes: HashSet<ApClass>,
    bond_orders: HashMap<String, BondOrder>,
    compatible_aps: HashMap<ApClass, Vec<BlockAp>>,
}

impl FragmentSpace {
    /// Loads a library from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the library file.
    ///
    /// # Errors
    ///
    /// Returns `LibraryLoadError::Io` if the file cannot be read,
    /// `LibraryLoadError::Toml` if it is not a valid library file, and
    /// `LibraryLoadError::InvalidDefinition` if its rules are inconsistent.
    pub fn load(path: &Path) -> Result<Self, LibraryLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LibraryLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    /// Parses a library from TOML text; `origin` names the source in error messages.
    pub fn parse(content: &str, origin: &str) -> Result<Self, LibraryLoadError> {
        let raw: RawLibraryFile = toml::from_str(content).map_err(|e| LibraryLoadError::Toml {
            path: origin.to_string(),
            source: e,
        })?;
        Self::from_raw(raw, origin)
    }

    fn from_raw(raw: RawLibraryFile, origin: &str) -> Result<Self, LibraryLoadError> {
        let invalid = |reason: String| LibraryLoadError::InvalidDefinition {
            path: origin.to_string(),
            reason,
        };
        let parse_key = |key: &str| {
            key.parse::<ApClass>()
                .map_err(|e| invalid(e.to_string()))
        };

        for block in raw.scaffolds.iter().chain(&raw.fragments).chain(&raw.caps) {
            let n = block.attachment_points.len();
            if let Some(bad) = block.symmetric_aps.iter().flatten().find(|&&i| i >= n) {
                return Err(invalid(format!(
                    "building block '{}' declares symmetric AP {bad} but has only {n} APs",
                    block.name
                )));
            }
        }
        if let Some(cap) = raw.caps.iter().find(|c| c.attachment_points.len() != 1) {
            return Err(invalid(format!(
                "capping group '{}' must have exactly one attachment point",
                cap.name
            )));
        }

        let mut compatibility = HashMap::new();
        for (key, targets) in raw.compatibility {
            compatibility.insert(parse_key(&key)?, targets);
        }
        let mut ring_closures = HashMap::new();
        for (key, partners) in raw.ring_closures {
            ring_closures.insert(parse_key(&key)?, partners);
        }
        let mut capping = HashMap::new();
        for (key, cap_class) in raw.capping {
            if !raw
                .caps
                .iter()
                .any(|c| c.attachment_points[0].class == cap_class)
            {
                return Err(invalid(format!(
                    "capping rule for '{key}' names class '{cap_class}' that no capping group offers"
                )));
            }
            capping.insert(parse_key(&key)?, cap_class);
        }

        let mut space = Self {
            scaffolds: raw.scaffolds,
            fragments: raw.fragments,
            caps: raw.caps,
            compatibility,
            ring_closures,
            capping,
            forbidden_ends: raw.forbidden_ends.into_iter().collect(),
            symmetric_classes: raw.symmetric_classes.into_iter().collect(),
            bond_orders: raw.bond_orders,
            compatible_aps: HashMap::new(),
        };
        space.index_compatible_aps();
        Ok(space)
    }

    fn index_compatible_aps(&mut self) {
        let mut index: HashMap<ApClass, Vec<BlockAp>> = HashMap::new();
        for (src, targets) in &self.compatibility {
            let entry = index.entry(src.clone()).or_default();
            for (b, block) in self.fragments.iter().enumerate() {
                for (i, ap) in block.attachment_points.iter().enumerate() {
                    if targets.contains(&ap.class) {
                        entry.push(BlockAp {
                            building_block: b,
                            ap_index: i,
                        });
                    }
                }
            }
        }
        self.compatible_aps = index;
    }

    pub fn scaffolds(&self) -> &[BuildingBlock] {
        &self.scaffolds
    }

    pub fn fragments(&self) -> &[BuildingBlock] {
        &self.fragments
    }

    pub fn caps(&self) -> &[BuildingBlock] {
        &self.caps
    }

    pub fn building_blocks(&self, kind: BuildingBlockType) -> &[BuildingBlock] {
        match kind {
            BuildingBlockType::Scaffold => &self.scaffolds,
            BuildingBlockType::Fragment => &self.fragments,
            BuildingBlockType::Cap => &self.caps,
            BuildingBlockType::Undefined => &[],
        }
    }

    pub fn building_block(&self, kind: BuildingBlockType, id: usize) -> Option<&BuildingBlock> {
        self.building_blocks(kind).get(id)
    }

    /// Returns `true` if an edge from an AP of class `source` to one of class `target` is allowed.
    pub fn is_compatible(&self, source: &ApClass, target: &ApClass) -> bool {
        self.compatibility
            .get(source)
            .is_some_and(|targets| targets.contains(target))
    }

    /// Fragment APs that may be the target of an edge leaving an AP of class `source`.
    pub fn compatible_fragment_aps(&self, source: &ApClass) -> &[BlockAp] {
        self.compatible_aps
            .get(source)
            .map_or(&[], Vec::as_slice)
    }

    /// Like [`compatible_fragment_aps`](Self::compatible_fragment_aps), restricted to
    /// ring-closing fragments.
    pub fn ring_closing_fragment_aps(&self, source: &ApClass) -> Vec<BlockAp> {
        self.compatible_fragment_aps(source)
            .iter()
            .copied()
            .filter(|p| self.fragments[p.building_block].ring_closing)
            .collect()
    }

    /// Returns `true` if two ring-closing vertices hanging from APs of these classes may be
    /// joined into a ring.
    pub fn is_ring_closure_compatible(&self, a: &ApClass, b: &ApClass) -> bool {
        let allows = |x: &ApClass, y: &ApClass| {
            self.ring_closures
                .get(x)
                .is_some_and(|partners| partners.contains(y))
        };
        allows(a, b) || allows(b, a)
    }

    /// The capping group that saturates a free AP of class `class`, if any.
    pub fn capping_group_for(&self, class: &ApClass) -> Option<BlockAp> {
        let cap_class = self.capping.get(class)?;
        self.caps
            .iter()
            .position(|c| &c.attachment_points[0].class == cap_class)
            .map(|building_block| BlockAp {
                building_block,
                ap_index: 0,
            })
    }

    pub fn is_forbidden_end(&self, class: &ApClass) -> bool {
        self.forbidden_ends.contains(class)
    }

    /// Returns `true` if substitution on APs of this class is always symmetric.
    pub fn imposes_symmetry(&self, class: &ApClass) -> bool {
        self.symmetric_classes.contains(class)
    }

    /// Bond order of edges formed by an AP of this class; single unless the rule says otherwise.
    pub fn bond_order(&self, class: &ApClass) -> BondOrder {
        self.bond_orders
            .get(class.rule())
            .copied()
            .unwrap_or_default()
    }

    /// Creates a fresh vertex for a library building block.
    ///
    /// # Arguments
    ///
    /// * `kind` - Which list of the library `id` refers to.
    /// * `id` - Index of the block in that list.
    /// * `vertex_id` - Graph-local id given to the new vertex.
    ///
    /// # Return
    ///
    /// Returns `None` if no such building block exists.
    pub fn instantiate(&self, kind: BuildingBlockType, id: usize, vertex_id: u64) -> Option<Vertex> {
        let block = self.building_block(kind, id)?;
        let aps = block
            .attachment_points
            .iter()
            .enumerate()
            .map(|(i, def)| AttachmentPoint::new(def.class.clone(), def.source_atom.unwrap_or(i)))
            .collect();
        let allowed = match kind {
            BuildingBlockType::Cap => Vec::new(),
            _ => block
                .mutations
                .clone()
                .unwrap_or_else(|| MutationType::ALL.to_vec()),
        };
        Some(
            Vertex::new(vertex_id, id, kind, aps)
                .with_symmetric_aps(block.symmetric_aps.clone())
                .with_ring_closing(block.ring_closing)
                .with_heavy_atoms(block.heavy_atoms)
                .with_allowed_mutations(allowed),
        )
    }

    /// Picks a scaffold uniformly at random.
    pub fn random_scaffold(&self, rng: &mut impl Rng) -> Option<usize> {
        let ids: Vec<usize> = (0..self.scaffolds.len()).collect();
        ids.choose(rng).copied()
    }

    pub fn fitness_contribution(&self, kind: BuildingBlockType, id: usize) -> f64 {
        self.building_block(kind, id).map_or(0.0, |b| b.fitness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::library::test_utils::test_library;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    mod loading {
        use super::*;

        #[test]
        fn load_reads_library_from_file() {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(
                file,
                r#"
                [[scaffolds]]
                name = "core"
                attachment-points = [{{ class = "A:0" }}]

                [compatibility]
                "A:0" = ["A:1"]
                "#
            )
            .unwrap();
            let space = FragmentSpace::load(file.path()).unwrap();
            assert_eq!(space.scaffolds().len(), 1);
            assert!(space.is_compatible(&ApClass::new("A", 0), &ApClass::new("A", 1)));
        }

        #[test]
        fn load_reports_missing_file() {
            let err = FragmentSpace::load(Path::new("/nonexistent/library.toml")).unwrap_err();
            assert!(matches!(err, LibraryLoadError::Io { .. }));
        }

        #[test]
        fn parse_rejects_unknown_fields() {
            let err = FragmentSpace::parse("[[scaffolds]]\nname = \"x\"\ncolour = 1\n", "inline")
                .unwrap_err();
            assert!(matches!(err, LibraryLoadError::Toml { .. }));
        }

        #[test]
        fn parse_rejects_out_of_range_symmetry() {
            let err = FragmentSpace::parse(
                r#"
                [[fragments]]
                name = "f"
                attachment-points = [{ class = "A:1" }]
                symmetric-aps = [[0, 3]]
                "#,
                "inline",
            )
            .unwrap_err();
            assert!(matches!(err, LibraryLoadError::InvalidDefinition { .. }));
        }

        #[test]
        fn parse_rejects_capping_rule_without_cap() {
            let err = FragmentSpace::parse("[capping]\n\"A:0\" = \"H:0\"\n", "inline").unwrap_err();
            assert!(matches!(err, LibraryLoadError::InvalidDefinition { .. }));
        }

        #[test]
        fn parse_rejects_bad_class_key() {
            let err = FragmentSpace::parse("[compatibility]\n\"A\" = [\"A:1\"]\n", "inline")
                .unwrap_err();
            assert!(matches!(err, LibraryLoadError::InvalidDefinition { .. }));
        }
    }

    mod queries {
        use super::*;

        #[test]
        fn compatible_fragment_aps_follow_the_matrix() {
            let space = test_library();
            let aps = space.compatible_fragment_aps(&ApClass::new("A", 0));
            assert!(!aps.is_empty());
            for p in aps {
                let class = &space.fragments()[p.building_block].attachment_points[p.ap_index].class;
                assert_eq!(class, &ApClass::new("A", 1));
            }
            assert!(space.compatible_fragment_aps(&ApClass::new("Z", 0)).is_empty());
        }

        #[test]
        fn ring_closing_fragment_aps_only_lists_ring_closers() {
            let space = test_library();
            let rcvs = space.ring_closing_fragment_aps(&ApClass::new("A", 0));
            assert_eq!(rcvs.len(), 1);
            assert!(space.fragments()[rcvs[0].building_block].ring_closing);
        }

        #[test]
        fn capping_and_forbidden_ends() {
            let space = test_library();
            let cap = space.capping_group_for(&ApClass::new("A", 0)).unwrap();
            assert_eq!(space.caps()[cap.building_block].name, "H");
            assert!(space.capping_group_for(&ApClass::new("A", 1)).is_none());
            assert!(space.is_forbidden_end(&ApClass::new("X", 0)));
            assert!(!space.is_forbidden_end(&ApClass::new("A", 0)));
        }

        #[test]
        fn bond_order_defaults_to_single() {
            let space = test_library();
            assert_eq!(space.bond_order(&ApClass::new("A", 0)), BondOrder::Single);
            assert_eq!(space.bond_order(&ApClass::new("D", 0)), BondOrder::Double);
            assert_eq!(space.bond_order(&ApClass::new("Q", 0)), BondOrder::Single);
        }

        #[test]
        fn instantiate_copies_block_definition() {
            let space = test_library();
            let v = space
                .instantiate(BuildingBlockType::Scaffold, 0, 11)
                .unwrap();
            assert_eq!(v.id(), 11);
            assert_eq!(v.aps().len(), 3);
            assert_eq!(v.symmetric_ap_groups(), &[vec![0, 1, 2]]);
            assert_eq!(v.heavy_atoms(), 6);
            let cap = space.instantiate(BuildingBlockType::Cap, 0, 12).unwrap();
            assert!(cap.allowed_mutations().is_empty());
            assert!(space.instantiate(BuildingBlockType::Fragment, 99, 1).is_none());
        }

        #[test]
        fn random_scaffold_is_reproducible() {
            let space = test_library();
            let a = space.random_scaffold(&mut ChaCha8Rng::seed_from_u64(7));
            let b = space.random_scaffold(&mut ChaCha8Rng::seed_from_u64(7));
            assert_eq!(a, b);
            assert!(a.unwrap() < space.scaffolds().len());
        }
    }
}
