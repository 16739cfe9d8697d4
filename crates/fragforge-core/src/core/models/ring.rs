use super::edge::BondOrder;
use super::ids::VertexKey;
use super::vertex::BuildingBlockType;
use serde::Deserialize;

/// A logical cycle closing over the spanning tree.
///
/// The vertex list is the tree path between two ring-closing vertices, which sit at the head
/// and the tail. A ring never alters the tree: it only records that head and tail are bonded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    vertices: Vec<VertexKey>,
    order: BondOrder,
}

impl Ring {
    pub fn new(vertices: Vec<VertexKey>, order: BondOrder) -> Self {
        Self { vertices, order }
    }

    pub fn vertices(&self) -> &[VertexKey] {
        &self.vertices
    }

    pub fn order(&self) -> BondOrder {
        self.order
    }

    /// Number of vertices in the ring, ring-closing ones included.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn head(&self) -> Option<VertexKey> {
        self.vertices.first().copied()
    }

    pub fn tail(&self) -> Option<VertexKey> {
        self.vertices.last().copied()
    }

    pub fn contains(&self, vertex: VertexKey) -> bool {
        self.vertices.contains(&vertex)
    }

    pub fn position(&self, vertex: VertexKey) -> Option<usize> {
        self.vertices.iter().position(|&v| v == vertex)
    }

    /// Distance along the cycle between two members, going whichever way is shorter.
    pub fn distance(&self, a: VertexKey, b: VertexKey) -> Option<usize> {
        let (i, j) = (self.position(a)?, self.position(b)?);
        let direct = i.abs_diff(j);
        Some(direct.min(self.vertices.len() - direct))
    }

    /// Distance from `vertex` to whichever ring-closing end is nearer along the path.
    pub fn distance_to_nearest_end(&self, vertex: VertexKey) -> Option<usize> {
        let i = self.position(vertex)?;
        Some(i.min(self.vertices.len() - 1 - i))
    }

    pub fn closer_to_head(&self, a: VertexKey, b: VertexKey) -> Option<VertexKey> {
        let (i, j) = (self.position(a)?, self.position(b)?);
        Some(if i <= j { a } else { b })
    }

    pub fn closer_to_tail(&self, a: VertexKey, b: VertexKey) -> Option<VertexKey> {
        let (i, j) = (self.position(a)?, self.position(b)?);
        Some(if i > j { a } else { b })
    }

    pub(crate) fn remove_vertex(&mut self, vertex: VertexKey) -> bool {
        match self.position(vertex) {
            Some(pos) => {
                self.vertices.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert_vertex(&mut self, position: usize, vertex: VertexKey) {
        let position = position.min(self.vertices.len());
        self.vertices.insert(position, vertex);
    }

    pub(crate) fn replace_vertex(&mut self, old: VertexKey, new: VertexKey) {
        for v in &mut self.vertices {
            if *v == old {
                *v = new;
            }
        }
    }

    pub(crate) fn remap(&mut self, mut f: impl FnMut(VertexKey) -> Option<VertexKey>) -> bool {
        let mut mapped = Vec::with_capacity(self.vertices.len());
        for &v in &self.vertices {
            match f(v) {
                Some(n) => mapped.push(n),
                None => return false,
            }
        }
        self.vertices = mapped;
        true
    }
}

/// One building block of a [`ClosableChain`], seen from the chain's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ChainLink {
    pub building_block: usize,
    pub kind: BuildingBlockType,
    /// AP index pointing towards the left end of the chain.
    #[serde(default)]
    pub ap_to_left: Option<usize>,
    /// AP index pointing towards the right end of the chain.
    #[serde(default)]
    pub ap_to_right: Option<usize>,
}

/// A sequence of building blocks known to be able to close a ring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct ClosableChain {
    pub links: Vec<ChainLink>,
    /// Index in `links` of the block the chain turns on.
    pub turning_point: usize,
}

impl ClosableChain {
    pub fn turning_link(&self) -> Option<&ChainLink> {
        self.links.get(self.turning_point)
    }

    /// Position of the first link matching the given block, if any.
    pub fn position_of(&self, building_block: usize, kind: BuildingBlockType) -> Option<usize> {
        self.links
            .iter()
            .position(|l| l.building_block == building_block && l.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn key(n: u64) -> VertexKey {
        VertexKey::from(KeyData::from_ffi(n))
    }

    fn five_ring() -> Ring {
        Ring::new((1..=5).map(key).collect(), BondOrder::Single)
    }

    #[test]
    fn head_tail_and_positions() {
        let ring = five_ring();
        assert_eq!(ring.head(), Some(key(1)));
        assert_eq!(ring.tail(), Some(key(5)));
        assert_eq!(ring.position(key(3)), Some(2));
        assert_eq!(ring.position(key(9)), None);
        assert_eq!(ring.len(), 5);
    }

    #[test]
    fn distance_is_cyclic() {
        let ring = five_ring();
        assert_eq!(ring.distance(key(1), key(5)), Some(1));
        assert_eq!(ring.distance(key(2), key(4)), Some(2));
        assert_eq!(ring.distance_to_nearest_end(key(4)), Some(1));
        assert_eq!(ring.distance_to_nearest_end(key(3)), Some(2));
    }

    #[test]
    fn closer_to_head_and_tail() {
        let ring = five_ring();
        assert_eq!(ring.closer_to_head(key(4), key(2)), Some(key(2)));
        assert_eq!(ring.closer_to_tail(key(4), key(2)), Some(key(4)));
    }

    #[test]
    fn remove_and_insert_vertex() {
        let mut ring = five_ring();
        assert!(ring.remove_vertex(key(3)));
        assert!(!ring.remove_vertex(key(3)));
        ring.insert_vertex(2, key(8));
        assert_eq!(ring.vertices()[2], key(8));
        ring.replace_vertex(key(8), key(9));
        assert!(ring.contains(key(9)));
    }

    #[test]
    fn closable_chain_finds_turning_link() {
        let chain: ClosableChain = toml::from_str(
            r#"
            turning-point = 1
            links = [
                { building-block = 0, kind = "fragment", ap-to-right = 1 },
                { building-block = 2, kind = "scaffold", ap-to-left = 0, ap-to-right = 2 },
                { building-block = 0, kind = "fragment", ap-to-left = 0 },
            ]
            "#,
        )
        .unwrap();
        let link = chain.turning_link().unwrap();
        assert_eq!(link.building_block, 2);
        assert_eq!(link.kind, BuildingBlockType::Scaffold);
        assert_eq!(chain.position_of(0, BuildingBlockType::Fragment), Some(0));
    }
}
