//! Arena-backed circular list of seam vertices.

/// Integer point in canvas (or cost-field) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A seam vertex. Frozen vertices never move during optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub point: Point,
    pub moveable: bool,
}

impl Vertex {
    pub const fn moveable(point: Point) -> Self {
        Self {
            point,
            moveable: true,
        }
    }

    pub const fn frozen(point: Point) -> Self {
        Self {
            point,
            moveable: false,
        }
    }
}

/// Handle of a node inside a [`VertexRing`].
pub type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    vertex: Vertex,
    prev: NodeId,
    next: NodeId,
    alive: bool,
}

/// Circular doubly linked list of vertices stored in one `Vec`.
///
/// Removed nodes stay in the arena and are skipped; ids stay valid until removal.
#[derive(Debug, Clone, Default)]
pub struct VertexRing {
    nodes: Vec<Node>,
    head: Option<NodeId>,
    len: usize,
}

impl VertexRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vertices(vertices: impl IntoIterator<Item = Vertex>) -> Self {
        let mut ring = Self::new();
        for vertex in vertices {
            ring.push_back(vertex);
        }
        ring
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    /// Last node, the one before the head.
    pub fn tail(&self) -> Option<NodeId> {
        self.head.map(|h| self.nodes[h].prev)
    }

    pub fn next(&self, id: NodeId) -> NodeId {
        self.nodes[id].next
    }

    pub fn prev(&self, id: NodeId) -> NodeId {
        self.nodes[id].prev
    }

    pub fn vertex(&self, id: NodeId) -> &Vertex {
        &self.nodes[id].vertex
    }

    pub fn vertex_mut(&mut self, id: NodeId) -> &mut Vertex {
        &mut self.nodes[id].vertex
    }

    /// Append before the head, closing the ring.
    pub fn push_back(&mut self, vertex: Vertex) -> NodeId {
        match self.tail() {
            Some(tail) => self.insert_after(tail, vertex),
            None => {
                let id = self.nodes.len();
                self.nodes.push(Node {
                    vertex,
                    prev: id,
                    next: id,
                    alive: true,
                });
                self.head = Some(id);
                self.len = 1;
                id
            }
        }
    }

    /// Insert `vertex` right after `id` and return the new node.
    pub fn insert_after(&mut self, id: NodeId, vertex: Vertex) -> NodeId {
        let next = self.nodes[id].next;
        let new = self.nodes.len();
        self.nodes.push(Node {
            vertex,
            prev: id,
            next,
            alive: true,
        });
        self.nodes[id].next = new;
        self.nodes[next].prev = new;
        self.len += 1;
        new
    }

    /// Unlink `id`. Returns the node that followed it, or `None` when the ring became empty.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeId> {
        if !self.nodes[id].alive {
            return None;
        }
        let Node { prev, next, .. } = self.nodes[id];
        self.nodes[id].alive = false;
        self.len -= 1;
        if self.len == 0 {
            self.head = None;
            return None;
        }
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        if self.head == Some(id) {
            self.head = Some(next);
        }
        Some(next)
    }

    /// Node ids in order, starting at the head.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len);
        if let Some(head) = self.head {
            let mut id = head;
            for _ in 0..self.len {
                out.push(id);
                id = self.nodes[id].next;
            }
        }
        out
    }

    /// Vertices in order, starting at the head.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.ids().into_iter().map(|id| self.nodes[id].vertex).collect()
    }

    /// Following `next` from the head returns to the head after exactly `len` steps.
    pub fn is_closed(&self) -> bool {
        let Some(head) = self.head else {
            return true;
        };
        let mut id = head;
        for step in 1..=self.len {
            id = self.nodes[id].next;
            if !self.nodes[id].alive {
                return false;
            }
            if id == head {
                return step == self.len;
            }
        }
        false
    }
}
