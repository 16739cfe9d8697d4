use super::ids::VertexKey;

/// A set of vertices declared equivalent under constitutional symmetry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymmetricSet {
    members: Vec<VertexKey>,
}

impl SymmetricSet {
    pub fn new(members: Vec<VertexKey>) -> Self {
        let mut set = Self::default();
        for m in members {
            set.add(m);
        }
        set
    }

    pub fn add(&mut self, vertex: VertexKey) {
        if !self.members.contains(&vertex) {
            self.members.push(vertex);
        }
    }

    pub fn remove(&mut self, vertex: VertexKey) -> bool {
        let before = self.members.len();
        self.members.retain(|&v| v != vertex);
        before != self.members.len()
    }

    pub fn contains(&self, vertex: VertexKey) -> bool {
        self.members.contains(&vertex)
    }

    pub fn members(&self) -> &[VertexKey] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn replace(&mut self, old: VertexKey, new: VertexKey) {
        for v in &mut self.members {
            if *v == old {
                *v = new;
            }
        }
    }
}
