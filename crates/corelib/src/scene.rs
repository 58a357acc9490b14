//! Append-only scene graph: meshes, helpers and lights.
//!
//! Nodes are never removed or re-parented, so a `NodeId` stays valid for
//! the lifetime of the scene and the renderer can sync new nodes by index.

use crate::{Vec3, transform::Transform};

/// Index of a node in insertion order.
pub type NodeId = usize;

/// Handle to a mesh uploaded by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// Light arriving from `direction` (pointing from the surface towards the
/// light).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub direction: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    Mesh(MeshHandle),
    /// RGB axis lines of the given length.
    Axes { size: f32 },
    /// Square grid of `divisions` cells per side in the node's local XZ plane.
    Grid { size: f32, divisions: u32 },
    AmbientLight(AmbientLight),
    DirectionalLight(DirectionalLight),
}

impl NodeKind {
    #[inline]
    pub fn is_helper(&self) -> bool {
        matches!(self, NodeKind::Axes { .. } | NodeKind::Grid { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    pub transform: Transform,
    pub kind: NodeKind,
}

#[derive(Default)]
pub struct Scene {
    nodes: Vec<Node>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id.
    pub fn add(&mut self, kind: NodeKind, transform: Transform) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node { transform, kind });
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over `(id, node)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }

    /// Nodes appended at or after `from`.
    pub fn since(&self, from: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        self.iter().skip(from)
    }

    pub fn meshes(&self) -> impl Iterator<Item = MeshHandle> + '_ {
        self.nodes.iter().filter_map(|n| match n.kind {
            NodeKind::Mesh(h) => Some(h),
            _ => None,
        })
    }

    /// Sum of all ambient lights (color * intensity).
    pub fn ambient(&self) -> Vec3 {
        self.nodes
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::AmbientLight(l) => Some(l.color * l.intensity),
                _ => None,
            })
            .fold(Vec3::ZERO, |acc, c| acc + c)
    }

    pub fn directional_lights(&self) -> impl Iterator<Item = &DirectionalLight> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::DirectionalLight(l) => Some(l),
            _ => None,
        })
    }
}

/// `0xRRGGBB` to linear-ish RGB in `[0, 1]`.
pub fn color_from_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;

    #[test]
    fn ids_follow_insertion_order() {
        let mut scene = Scene::new();
        let a = scene.add(NodeKind::Axes { size: 10.0 }, Transform::identity());
        let b = scene.add(
            NodeKind::Grid { size: 350.0, divisions: 35 },
            Transform::identity(),
        );
        assert_eq!((a, b), (0, 1));
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.since(1).map(|(id, _)| id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn ambient_lights_accumulate() {
        let mut scene = Scene::new();
        assert_eq!(scene.ambient(), Vec3::ZERO);
        scene.add(
            NodeKind::AmbientLight(AmbientLight { color: color_from_hex(0xffffff), intensity: 1.0 }),
            Transform::identity(),
        );
        scene.add(
            NodeKind::AmbientLight(AmbientLight { color: vec3(1.0, 0.0, 0.0), intensity: 0.5 }),
            Transform::identity(),
        );
        assert_eq!(scene.ambient(), vec3(1.5, 1.0, 1.0));
    }

    #[test]
    fn meshes_are_listed_in_order() {
        let mut scene = Scene::new();
        scene.add(NodeKind::Mesh(MeshHandle(3)), Transform::identity());
        scene.add(NodeKind::Axes { size: 1.0 }, Transform::identity());
        scene.add(NodeKind::Mesh(MeshHandle(7)), Transform::identity());
        let handles: Vec<_> = scene.meshes().collect();
        assert_eq!(handles, vec![MeshHandle(3), MeshHandle(7)]);
        assert!(scene.get(1).unwrap().kind.is_helper());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(color_from_hex(0xff0000), vec3(1.0, 0.0, 0.0));
        assert_eq!(color_from_hex(0x000000), Vec3::ZERO);
    }
}
