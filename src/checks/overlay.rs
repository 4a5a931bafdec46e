//! Planar overlay of polygon boundaries
//!
//! Every ring segment of the inputs is noded into one planar graph. Each
//! bounded face of the graph gets an interior point, a membership test
//! decides which faces are kept, and the edges separating kept faces from
//! dropped ones are traced back into rings. Repair, gaps and overlaps are
//! all overlays that differ only in the membership test.
//!
//! The result is valid by construction: rings are simple cycles of the
//! graph, shells are counter-clockwise, holes clockwise, and two kept
//! pieces meeting at a single vertex come out as separate polygons.

use ahash::{AHashMap, AHashSet};
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BoundingRect, Intersects};
use geo_types::{Coord, Line, LineString, MultiPolygon, Polygon, Rect};
use ordered_float::OrderedFloat;

/// Re-noding rounds; floating point intersections can create new crossings
const MAX_NODING_ROUNDS: usize = 4;

/// Region of the plane made of the faces whose interior point passes `inside`
pub(crate) fn overlay<F>(segments: Vec<Line<f64>>, inside: F) -> MultiPolygon<f64>
where
    F: Fn(Coord<f64>) -> bool,
{
    PlanarGraph::from_segments(segments).region(inside)
}

/// Area covered by both geometries
pub(crate) fn intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) if ra.intersects(&rb) => {}
        _ => return MultiPolygon::new(Vec::new()),
    }
    let mut segments = geometry_segments(a);
    segments.extend(geometry_segments(b));
    overlay(segments, |p| covers(a, p) && covers(b, p))
}

/// Non-degenerate segments of every ring, non-finite points dropped
pub(crate) fn geometry_segments(geometry: &MultiPolygon<f64>) -> Vec<Line<f64>> {
    let mut segments = Vec::new();
    for polygon in &geometry.0 {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            let coords = closed_ring(&ring.0);
            segments.extend(
                coords
                    .windows(2)
                    .filter(|w| w[0] != w[1])
                    .map(|w| Line::new(w[0], w[1])),
            );
        }
    }
    segments
}

/// Even-odd membership: inside a shell and outside its holes, in any member
pub(crate) fn covers(geometry: &MultiPolygon<f64>, p: Coord<f64>) -> bool {
    geometry.0.iter().any(|polygon| {
        ring_contains(&polygon.exterior().0, p)
            && !polygon.interiors().iter().any(|hole| ring_contains(&hole.0, p))
    })
}

/// Ray casting parity test; the ring may be open or closed
pub(crate) fn ring_contains(ring: &[Coord<f64>], p: Coord<f64>) -> bool {
    let mut inside = false;
    let Some(&first) = ring.first() else {
        return false;
    };
    let closing = (ring.last() != Some(&first)).then_some(first);
    let mut prev = first;
    for &c in ring[1..].iter().chain(closing.iter()) {
        let (a, b) = (prev, c);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        prev = c;
    }
    inside
}

fn closed_ring(coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(coords.len() + 1);
    for c in coords.iter().filter(|c| c.x.is_finite() && c.y.is_finite()) {
        if out.last() != Some(c) {
            out.push(*c);
        }
    }
    if out.len() > 1 && out.first() != out.last() {
        out.push(out[0]);
    }
    out
}

type NodeKey = (OrderedFloat<f64>, OrderedFloat<f64>);

fn key(c: Coord<f64>) -> NodeKey {
    // -0.0 and 0.0 are the same node
    (OrderedFloat(c.x + 0.0), OrderedFloat(c.y + 0.0))
}

/// Split every segment at its intersections with the others
///
/// Returns the split segments, deduplicated, and whether anything was split.
fn node(segments: &[Line<f64>]) -> (Vec<Line<f64>>, bool) {
    let min_x = |s: &Line<f64>| s.start.x.min(s.end.x);
    let max_x = |s: &Line<f64>| s.start.x.max(s.end.x);

    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by(|&a, &b| min_x(&segments[a]).total_cmp(&min_x(&segments[b])));

    let mut cuts: Vec<Vec<Coord<f64>>> = segments.iter().map(|s| vec![s.start, s.end]).collect();
    for (k, &i) in order.iter().enumerate() {
        let reach = max_x(&segments[i]);
        for &j in &order[k + 1..] {
            if min_x(&segments[j]) > reach {
                break;
            }
            match line_intersection(segments[i], segments[j]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    cuts[i].push(intersection);
                    cuts[j].push(intersection);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for c in [intersection.start, intersection.end] {
                        cuts[i].push(c);
                        cuts[j].push(c);
                    }
                }
                None => {}
            }
        }
    }

    let mut split = false;
    let mut seen: AHashSet<(NodeKey, NodeKey)> = AHashSet::new();
    let mut noded = Vec::with_capacity(segments.len());
    for (segment, mut points) in segments.iter().zip(cuts) {
        let d = segment.delta();
        let along = |c: &Coord<f64>| (c.x - segment.start.x) * d.x + (c.y - segment.start.y) * d.y;
        points.sort_by(|a, b| along(a).total_cmp(&along(b)));
        points.dedup_by(|a, b| key(*a) == key(*b));
        if points.len() > 2 {
            split = true;
        }

        for pair in points.windows(2) {
            let (u, v) = (key(pair[0]), key(pair[1]));
            if u != v && seen.insert((u.min(v), u.max(v))) {
                noded.push(Line::new(pair[0], pair[1]));
            }
        }
    }
    (noded, split)
}

/// Undirected planar graph built from noded segments
struct PlanarGraph {
    nodes: Vec<Coord<f64>>,
    /// Neighbours of each node, sorted counter-clockwise by angle
    adjacency: Vec<Vec<usize>>,
}

/// The face walks of a graph and what they bound
struct Faces {
    /// Node walks, each with its face on the left
    cycles: Vec<Vec<usize>>,
    /// Closed coordinate ring of every walk
    rings: Vec<Vec<Coord<f64>>>,
    areas: Vec<f64>,
    /// Walk of every directed edge
    walk_of: AHashMap<(usize, usize), usize>,
    /// Connected component of every walk
    component: Vec<usize>,
    /// Outer walk of every component, keyed by component
    outer: AHashMap<usize, usize>,
    /// Bounded face directly enclosing each component
    enclosing: AHashMap<usize, Option<usize>>,
}

impl Faces {
    fn is_bounded(&self, walk: usize) -> bool {
        self.outer.get(&self.component[walk]) != Some(&walk) && self.areas[walk] > 0.0
    }

    /// Face on the left of a walk: itself when bounded, the face around
    /// its component when it is an outer walk
    fn face_of(&self, walk: usize) -> Option<usize> {
        if self.is_bounded(walk) {
            return Some(walk);
        }
        let component = self.component[walk];
        match self.outer.get(&component) {
            Some(&outer) if outer == walk => self.enclosing.get(&component).copied().flatten(),
            _ => None,
        }
    }
}

impl PlanarGraph {
    fn from_segments(mut segments: Vec<Line<f64>>) -> Self {
        for _ in 0..MAX_NODING_ROUNDS {
            let (noded, split) = node(&segments);
            segments = noded;
            if !split {
                break;
            }
        }

        let mut ids: AHashMap<NodeKey, usize> = AHashMap::new();
        let mut nodes = Vec::new();
        let mut edges: Vec<(usize, usize)> = Vec::with_capacity(segments.len());

        let mut node_id = |c: Coord<f64>| -> usize {
            *ids.entry(key(c)).or_insert_with(|| {
                nodes.push(c);
                nodes.len() - 1
            })
        };
        for segment in &segments {
            let (u, v) = (node_id(segment.start), node_id(segment.end));
            if u != v {
                edges.push((u, v));
            }
        }

        let mut adjacency = vec![Vec::new(); nodes.len()];
        for &(u, v) in &edges {
            adjacency[u].push(v);
            adjacency[v].push(u);
        }
        for (u, neighbours) in adjacency.iter_mut().enumerate() {
            let origin = nodes[u];
            let angle = |w: &usize| {
                let c = nodes[*w];
                (c.y - origin.y).atan2(c.x - origin.x)
            };
            neighbours.sort_by(|a, b| angle(a).total_cmp(&angle(b)));
            neighbours.dedup();
        }

        Self { nodes, adjacency }
    }

    fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Next edge after `a -> b`, turning as far clockwise as possible
    /// among the edges accepted by `allowed`
    fn turn(&self, a: usize, b: usize, allowed: impl Fn(usize, usize) -> bool) -> Option<usize> {
        let around = &self.adjacency[b];
        let back = around.iter().position(|&w| w == a)?;
        let mut k = back;
        loop {
            k = (k + around.len() - 1) % around.len();
            if allowed(b, around[k]) {
                return Some(around[k]);
            }
            if k == back {
                return None;
            }
        }
    }

    /// Follow directed edges from `start` until the walk closes
    fn walk(
        &self,
        start: (usize, usize),
        allowed: impl Fn(usize, usize) -> bool,
        mut visit: impl FnMut((usize, usize)),
    ) -> Vec<usize> {
        let limit = self.edge_count();
        let mut walk = Vec::new();
        let (mut a, mut b) = start;
        loop {
            visit((a, b));
            walk.push(a);
            let Some(next) = self.turn(a, b, &allowed) else {
                break;
            };
            a = b;
            b = next;
            if (a, b) == start || walk.len() > limit {
                break;
            }
        }
        walk
    }

    fn ring(&self, cycle: &[usize]) -> Vec<Coord<f64>> {
        let mut coords: Vec<Coord<f64>> = cycle.iter().map(|&i| self.nodes[i]).collect();
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
        coords
    }

    fn components(&self) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..self.nodes.len()).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for (u, neighbours) in self.adjacency.iter().enumerate() {
            for &v in neighbours {
                let (ru, rv) = (find(&mut parent, u), find(&mut parent, v));
                parent[ru] = rv;
            }
        }
        (0..self.nodes.len()).map(|u| find(&mut parent, u)).collect()
    }

    fn faces(&self) -> Faces {
        let mut walk_of: AHashMap<(usize, usize), usize> = AHashMap::new();
        let mut cycles = Vec::new();
        for (u, neighbours) in self.adjacency.iter().enumerate() {
            for &v in neighbours {
                if walk_of.contains_key(&(u, v)) {
                    continue;
                }
                let id = cycles.len();
                let cycle = self.walk((u, v), |_, _| true, |edge| {
                    walk_of.insert(edge, id);
                });
                cycles.push(cycle);
            }
        }

        let rings: Vec<Vec<Coord<f64>>> = cycles.iter().map(|c| self.ring(c)).collect();
        let areas: Vec<f64> = rings.iter().map(|r| signed_area(r)).collect();
        let node_component = self.components();
        let component: Vec<usize> = cycles.iter().map(|c| node_component[c[0]]).collect();

        let mut outer: AHashMap<usize, usize> = AHashMap::new();
        for (walk, &c) in component.iter().enumerate() {
            let entry = outer.entry(c).or_insert(walk);
            if areas[walk] < areas[*entry] {
                *entry = walk;
            }
        }

        let mut faces = Faces {
            cycles,
            rings,
            areas,
            walk_of,
            component,
            outer,
            enclosing: AHashMap::new(),
        };

        let bounds: Vec<Option<Rect<f64>>> = faces
            .rings
            .iter()
            .map(|r| LineString::from(r.clone()).bounding_rect())
            .collect();
        let bounded: Vec<usize> = (0..faces.cycles.len()).filter(|&w| faces.is_bounded(w)).collect();

        // Smallest bounded face of another component holding a node of this one
        let mut enclosing = AHashMap::new();
        for (&c, &outer_walk) in &faces.outer {
            let sample = self.nodes[faces.cycles[outer_walk][0]];
            let around = bounded
                .iter()
                .copied()
                .filter(|&w| faces.component[w] != c)
                .filter(|&w| bounds[w].is_some_and(|r| r.intersects(&sample)))
                .filter(|&w| ring_contains(&faces.rings[w], sample))
                .min_by(|&a, &b| faces.areas[a].total_cmp(&faces.areas[b]));
            enclosing.insert(c, around);
        }
        faces.enclosing = enclosing;
        faces
    }

    fn region<F>(&self, inside: F) -> MultiPolygon<f64>
    where
        F: Fn(Coord<f64>) -> bool,
    {
        if self.nodes.is_empty() {
            return MultiPolygon::new(Vec::new());
        }
        let faces = self.faces();

        // Holes of each bounded face: the outer walks of the components it encloses
        let mut holes_of: AHashMap<usize, Vec<usize>> = AHashMap::new();
        for (c, face) in &faces.enclosing {
            if let Some(face) = face {
                holes_of.entry(*face).or_default().push(faces.outer[c]);
            }
        }

        let kept: Vec<bool> = (0..faces.cycles.len())
            .map(|w| {
                if !faces.is_bounded(w) {
                    return false;
                }
                let mut rings: Vec<&[Coord<f64>]> = vec![faces.rings[w].as_slice()];
                if let Some(holes) = holes_of.get(&w) {
                    rings.extend(holes.iter().map(|&h| faces.rings[h].as_slice()));
                }
                interior_point(&rings).is_some_and(&inside)
            })
            .collect();

        let left_kept = |edge: (usize, usize)| {
            faces
                .walk_of
                .get(&edge)
                .and_then(|&w| faces.face_of(w))
                .is_some_and(|f| kept[f])
        };
        let boundary: AHashSet<(usize, usize)> = faces
            .walk_of
            .keys()
            .copied()
            .filter(|&(u, v)| left_kept((u, v)) && !left_kept((v, u)))
            .collect();

        let mut used: AHashSet<(usize, usize)> = AHashSet::new();
        let mut shells: Vec<(Vec<Coord<f64>>, f64)> = Vec::new();
        let mut holes: Vec<Vec<Coord<f64>>> = Vec::new();
        for (u, neighbours) in self.adjacency.iter().enumerate() {
            for &v in neighbours {
                if !boundary.contains(&(u, v)) || used.contains(&(u, v)) {
                    continue;
                }
                let walk = self.walk(
                    (u, v),
                    |a, b| boundary.contains(&(a, b)),
                    |edge| {
                        used.insert(edge);
                    },
                );
                for cycle in simple_cycles(walk) {
                    if cycle.len() < 3 {
                        continue;
                    }
                    let ring = self.ring(&cycle);
                    let area = signed_area(&ring);
                    if area > 0.0 {
                        shells.push((ring, area));
                    } else if area < 0.0 {
                        holes.push(ring);
                    }
                }
            }
        }

        assemble(shells, holes)
    }
}

/// Attach every hole to the smallest shell around it
fn assemble(shells: Vec<(Vec<Coord<f64>>, f64)>, holes: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
    for hole in holes {
        let sample = Coord {
            x: (hole[0].x + hole[1].x) / 2.0,
            y: (hole[0].y + hole[1].y) / 2.0,
        };
        let owner = shells
            .iter()
            .enumerate()
            .filter(|(_, (shell, _))| ring_contains(shell, sample))
            .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
            .map(|(i, _)| i);
        if let Some(owner) = owner {
            interiors[owner].push(LineString::new(hole));
        }
    }

    MultiPolygon::new(
        shells
            .into_iter()
            .zip(interiors)
            .map(|((shell, _), holes)| Polygon::new(LineString::new(shell), holes))
            .collect(),
    )
}

fn signed_area(ring: &[Coord<f64>]) -> f64 {
    Polygon::new(LineString::new(ring.to_vec()), vec![]).signed_area()
}

/// A point strictly inside the area bounded by `rings` under the even-odd rule
///
/// Scans the horizontal line through the widest gap between vertex heights
/// and returns the middle of the widest inside span.
fn interior_point(rings: &[&[Coord<f64>]]) -> Option<Coord<f64>> {
    let mut ys: Vec<f64> = rings.iter().flat_map(|r| r.iter().map(|c| c.y)).collect();
    ys.sort_by(f64::total_cmp);
    ys.dedup();
    let (low, high) = ys
        .windows(2)
        .map(|w| (w[0], w[1]))
        .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))?;
    let y = (low + high) / 2.0;

    let mut xs: Vec<f64> = rings
        .iter()
        .flat_map(|r| r.windows(2))
        .filter(|w| (w[0].y > y) != (w[1].y > y))
        .map(|w| w[0].x + (y - w[0].y) * (w[1].x - w[0].x) / (w[1].y - w[0].y))
        .collect();
    xs.sort_by(f64::total_cmp);

    xs.chunks_exact(2)
        .map(|span| (span[0], span[1]))
        .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
        .filter(|(left, right)| right > left)
        .map(|(left, right)| Coord {
            x: (left + right) / 2.0,
            y,
        })
}

/// Split a closed walk into simple cycles at repeated vertices
fn simple_cycles(walk: Vec<usize>) -> Vec<Vec<usize>> {
    let mut cycles = Vec::new();
    let mut stack: Vec<usize> = Vec::with_capacity(walk.len());
    for id in walk {
        if let Some(pos) = stack.iter().position(|&v| v == id) {
            cycles.push(stack.split_off(pos));
        }
        stack.push(id);
    }
    cycles.push(stack);
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]])
    }

    fn c(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_even_odd_parity() {
        let square = [c(0.0, 0.0), c(4.0, 0.0), c(4.0, 4.0), c(0.0, 4.0)];
        assert!(ring_contains(&square, c(1.0, 1.0)));
        assert!(!ring_contains(&square, c(5.0, 1.0)));
        assert!(!ring_contains(&[], c(1.0, 1.0)));
    }

    #[test]
    fn test_simple_cycles_split_at_repeats() {
        assert_eq!(simple_cycles(vec![0, 1, 2]), vec![vec![0, 1, 2]]);
        assert_eq!(simple_cycles(vec![1, 0, 2, 3, 0, 4]), vec![vec![0, 2, 3], vec![1, 0, 4]]);
    }

    #[test]
    fn test_node_splits_crossing_segments() {
        let (noded, split) = node(&[
            Line::new(c(0.0, 0.0), c(2.0, 2.0)),
            Line::new(c(0.0, 2.0), c(2.0, 0.0)),
        ]);
        assert!(split);
        assert_eq!(noded.len(), 4);

        let (again, split) = node(&noded);
        assert!(!split);
        assert_eq!(again.len(), 4);
    }

    #[test]
    fn test_node_merges_shared_edges() {
        let (noded, _) = node(&[
            Line::new(c(0.0, 0.0), c(2.0, 0.0)),
            Line::new(c(2.0, 0.0), c(1.0, 0.0)),
        ]);
        assert_eq!(noded.len(), 2);
    }

    #[test]
    fn test_interior_point_avoids_holes() {
        let shell = [c(0.0, 0.0), c(4.0, 0.0), c(4.0, 4.0), c(0.0, 4.0), c(0.0, 0.0)];
        let hole = [c(1.0, 1.0), c(1.0, 3.0), c(3.0, 3.0), c(3.0, 1.0), c(1.0, 1.0)];
        let rings: [&[Coord<f64>]; 2] = [&shell, &hole];
        let p = interior_point(&rings).unwrap();
        assert!(ring_contains(&shell, p));
        assert!(!ring_contains(&hole, p));

        let flat = [c(0.0, 1.0), c(3.0, 1.0), c(0.0, 1.0)];
        let rings: [&[Coord<f64>]; 1] = [&flat];
        assert!(interior_point(&rings).is_none());
    }

    #[test]
    fn test_intersection_of_squares() {
        let shared = intersection(&rect(0.0, 0.0, 2.0, 2.0), &rect(1.0, 1.0, 3.0, 3.0));
        assert_eq!(shared.0.len(), 1);
        assert!((shared.unsigned_area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_touching_squares_share_no_area() {
        assert!(intersection(&rect(0.0, 0.0, 2.0, 2.0), &rect(2.0, 0.0, 4.0, 2.0)).0.is_empty());
        assert!(intersection(&rect(0.0, 0.0, 2.0, 2.0), &rect(2.0, 2.0, 4.0, 4.0)).0.is_empty());
    }

    #[test]
    fn test_nested_component_becomes_a_hole() {
        let outer = rect(0.0, 0.0, 10.0, 10.0);
        let inner = rect(4.0, 4.0, 6.0, 6.0);
        let mut segments = geometry_segments(&outer);
        segments.extend(geometry_segments(&inner));

        let ring = overlay(segments, |p| covers(&outer, p) && !covers(&inner, p));
        assert_eq!(ring.0.len(), 1);
        assert_eq!(ring.0[0].interiors().len(), 1);
        assert!((ring.unsigned_area() - 96.0).abs() < 1e-12);
    }

    #[test]
    fn test_island_inside_a_hole_is_its_own_polygon() {
        let lake = MultiPolygon::new(vec![
            polygon!(
                exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
                interiors: [[(x: 2.0, y: 2.0), (x: 8.0, y: 2.0), (x: 8.0, y: 8.0), (x: 2.0, y: 8.0)]],
            ),
            polygon![(x: 4.0, y: 4.0), (x: 6.0, y: 4.0), (x: 6.0, y: 6.0), (x: 4.0, y: 6.0)],
        ]);
        let out = overlay(geometry_segments(&lake), |p| covers(&lake, p));

        assert_eq!(out.0.len(), 2);
        assert!((out.unsigned_area() - 68.0).abs() < 1e-12);
    }
}
