//! Layout orchestration: a fixed allow-list of layout algorithms.
//!
//! Layouts compute a complete set of positions and apply them in one step;
//! there is no animation. Starting a layout cancels the one in progress on
//! the same surface, and a cancelled or failed run leaves positions untouched.

use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::Point;

use super::scene::Scene;
use super::surface::Surface;

/// Physics constants for the force-directed layout.
const REPULSION_STRENGTH: f64 = 60_000.0;
const SPRING_STIFFNESS: f64 = 30.0;
const SPRING_REST_LENGTH: f64 = 120.0;
const DAMPING: f64 = 0.6;
const MIN_DISTANCE: f64 = 1.0;
const MAX_VELOCITY: f64 = 200.0;
const MASS_PER_CONNECTION: f64 = 0.5;
const FORCE_ITERATIONS: usize = 300;
const FORCE_TIMESTEP: f64 = 0.5;
/// How often (in iterations) a running force layout checks for cancellation.
const CANCEL_CHECK_INTERVAL: usize = 25;

/// Seed for the random layout so repeated runs place nodes identically.
const RANDOM_SEED: u64 = 0x6772_6170_686c_656e;

/// Layout algorithms the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutName {
    #[default]
    ForceDirected,
    Circular,
    Grid,
    Random,
    Concentric,
    BreadthFirst,
}

impl LayoutName {
    pub const ALL: [LayoutName; 6] = [
        LayoutName::ForceDirected,
        LayoutName::Circular,
        LayoutName::Grid,
        LayoutName::Random,
        LayoutName::Concentric,
        LayoutName::BreadthFirst,
    ];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutName::ForceDirected => "force-directed",
            LayoutName::Circular => "circular",
            LayoutName::Grid => "grid",
            LayoutName::Random => "random",
            LayoutName::Concentric => "concentric",
            LayoutName::BreadthFirst => "breadth-first",
        }
    }

    /// Look up a layout by canonical name or alias, case-insensitively.
    pub fn lookup(name: &str) -> Option<LayoutName> {
        match name.trim().to_lowercase().as_str() {
            "force-directed" | "force" | "cose" | "fcose" => Some(LayoutName::ForceDirected),
            "circular" | "circle" => Some(LayoutName::Circular),
            "grid" => Some(LayoutName::Grid),
            "random" => Some(LayoutName::Random),
            "concentric" => Some(LayoutName::Concentric),
            "breadth-first" | "breadthfirst" | "tree" | "hierarchical" => {
                Some(LayoutName::BreadthFirst)
            }
            _ => None,
        }
    }

    /// Resolve against the allow-list, falling back to `default` for unknown names.
    pub fn resolve(name: &str, default: LayoutName) -> LayoutName {
        Self::lookup(name).unwrap_or_else(|| {
            tracing::debug!(layout = %name, fallback = %default.as_str(), "Unknown layout, using fallback");
            default
        })
    }
}

impl std::fmt::Display for LayoutName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a layout computation registered on a surface.
///
/// Only the most recently started job may write positions back.
#[derive(Debug, Clone)]
pub struct LayoutJob {
    pub name: LayoutName,
    cancel: Arc<AtomicBool>,
}

impl LayoutJob {
    fn new(name: LayoutName) -> Self {
        Self {
            name,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn same_run(&self, other: &LayoutJob) -> bool {
        Arc::ptr_eq(&self.cancel, &other.cancel)
    }
}

/// Runs layouts against a surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutOrchestrator {
    pub default_layout: LayoutName,
}

impl LayoutOrchestrator {
    pub fn new(default_layout: LayoutName) -> Self {
        Self { default_layout }
    }

    /// Stop whatever layout is running on the surface and register a new job.
    pub fn start(&self, surface: &mut Surface, name: &str) -> LayoutJob {
        let name = LayoutName::resolve(name, self.default_layout);
        if let Some(previous) = surface.running_layout.take() {
            previous.stop();
            tracing::debug!(previous = %previous.name, next = %name, "Stopped running layout");
        }
        let job = LayoutJob::new(name);
        surface.running_layout = Some(job.clone());
        job
    }

    /// Write a finished job's positions back, if it is still the surface's current run.
    ///
    /// Returns whether positions were applied.
    pub fn finish(&self, surface: &mut Surface, job: &LayoutJob, positions: Option<Vec<Point>>) -> bool {
        let current = surface
            .running_layout
            .as_ref()
            .is_some_and(|running| running.same_run(job));
        if !current || job.is_stopped() {
            tracing::debug!(layout = %job.name, "Discarding positions from a stopped layout");
            return false;
        }
        surface.running_layout = None;

        let Some(positions) = positions else {
            tracing::warn!(layout = %job.name, "Layout produced no positions, keeping previous ones");
            return false;
        };
        match surface.set_positions(positions) {
            Ok(()) => {
                surface.current_layout = job.name;
                true
            }
            Err(e) => {
                tracing::warn!(layout = %job.name, error = %e, "Layout failed, keeping previous positions");
                false
            }
        }
    }

    /// Start, compute and apply a layout in one step.
    ///
    /// Returns the layout that actually ran (after fallback), or `None` if
    /// nothing was applied.
    pub fn apply(&self, surface: &mut Surface, name: &str) -> Option<LayoutName> {
        let job = self.start(surface, name);
        let positions = compute_positions(
            job.name,
            surface.scene(),
            surface.width(),
            surface.height(),
            &job.cancel,
        );
        self.finish(surface, &job, positions).then_some(job.name)
    }
}

/// Compute positions for every scene node, in node order.
///
/// Returns `None` if the run was cancelled or produced non-finite positions.
pub fn compute_positions(
    name: LayoutName,
    scene: &Scene,
    width: f64,
    height: f64,
    cancel: &AtomicBool,
) -> Option<Vec<Point>> {
    let n = scene.nodes.len();
    if n == 0 {
        return Some(Vec::new());
    }
    let spacing = max_node_size(scene) * 2.0;
    let center = Point::new(width / 2.0, height / 2.0);

    let positions = match name {
        LayoutName::ForceDirected => force_directed(scene, center, cancel)?,
        LayoutName::Circular => circular(n, center, width, height, spacing),
        LayoutName::Grid => grid(n, center, width, height, spacing),
        LayoutName::Random => random(n, width, height),
        LayoutName::Concentric => concentric(scene, center, spacing),
        LayoutName::BreadthFirst => breadth_first(scene, center, spacing),
    };

    positions
        .iter()
        .all(|p| p.x.is_finite() && p.y.is_finite())
        .then_some(positions)
}

fn max_node_size(scene: &Scene) -> f64 {
    scene
        .nodes
        .iter()
        .map(|n| n.size)
        .fold(1.0_f64, f64::max)
}

fn degrees(scene: &Scene) -> Vec<usize> {
    let mut degree = vec![0usize; scene.nodes.len()];
    for (s, t) in scene.index_pairs() {
        degree[s] += 1;
        degree[t] += 1;
    }
    degree
}

/// Evenly spaced points on a circle, starting at the top.
fn ring(count: usize, center: Point, radius: f64) -> impl Iterator<Item = Point> {
    (0..count).map(move |i| {
        let angle = -PI / 2.0 + 2.0 * PI * i as f64 / count as f64;
        Point::new(
            center.x + radius * angle.cos(),
            center.y + radius * angle.sin(),
        )
    })
}

fn circular(n: usize, center: Point, width: f64, height: f64, spacing: f64) -> Vec<Point> {
    if n == 1 {
        return vec![center];
    }
    // Large enough that neighbors on the ring do not overlap.
    let min_radius = spacing * n as f64 / (2.0 * PI);
    let fit_radius = (width.min(height) / 2.0 - spacing).max(0.0);
    ring(n, center, min_radius.max(fit_radius)).collect()
}

fn grid(n: usize, center: Point, width: f64, height: f64, spacing: f64) -> Vec<Point> {
    let aspect = if height > 0.0 { width / height } else { 1.0 };
    let cols = ((n as f64 * aspect).sqrt().ceil() as usize).clamp(1, n);
    let rows = n.div_ceil(cols);
    let cell = spacing.max(1.0);
    let origin = Point::new(
        center.x - (cols - 1) as f64 * cell / 2.0,
        center.y - (rows - 1) as f64 * cell / 2.0,
    );
    (0..n)
        .map(|i| {
            Point::new(
                origin.x + (i % cols) as f64 * cell,
                origin.y + (i / cols) as f64 * cell,
            )
        })
        .collect()
}

fn random(n: usize, width: f64, height: f64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(RANDOM_SEED);
    let (w, h) = (width.max(1.0), height.max(1.0));
    (0..n)
        .map(|_| Point::new(rng.gen_range(0.0..w), rng.gen_range(0.0..h)))
        .collect()
}

/// Rings by degree: best-connected nodes in the middle.
fn concentric(scene: &Scene, center: Point, spacing: f64) -> Vec<Point> {
    let degree = degrees(scene);
    let max_degree = degree.iter().copied().max().unwrap_or(0);
    let level_width = (max_degree / 4).max(1);

    let mut levels: Vec<Vec<usize>> = Vec::new();
    for (idx, &d) in degree.iter().enumerate() {
        let level = (max_degree - d) / level_width;
        if levels.len() <= level {
            levels.resize(level + 1, Vec::new());
        }
        levels[level].push(idx);
    }
    levels.retain(|l| !l.is_empty());

    let mut positions = vec![center; scene.nodes.len()];
    let mut radius = 0.0;
    for (i, level) in levels.iter().enumerate() {
        if i > 0 || level.len() > 1 {
            // Keep ring neighbors apart and rings from overlapping.
            let needed = spacing * level.len() as f64 / (2.0 * PI);
            radius = (radius + spacing).max(needed);
        }
        for (&idx, p) in level.iter().zip(ring(level.len(), center, radius)) {
            positions[idx] = if radius == 0.0 { center } else { p };
        }
    }
    positions
}

/// Layered BFS from root nodes (no incoming edges), edges traversed both ways.
fn breadth_first(scene: &Scene, center: Point, spacing: f64) -> Vec<Point> {
    let n = scene.nodes.len();
    let pairs = scene.index_pairs();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut has_incoming = vec![false; n];
    for &(s, t) in &pairs {
        adjacency[s].push(t);
        adjacency[t].push(s);
        if s != t {
            has_incoming[t] = true;
        }
    }

    let mut depth: Vec<Option<usize>> = vec![None; n];
    let mut queue = VecDeque::new();
    // Roots first, then any node left unreached (cycles, isolated components).
    let seeds = (0..n)
        .filter(|&i| !has_incoming[i])
        .chain(0..n)
        .collect::<Vec<_>>();
    for seed in seeds {
        if depth[seed].is_some() {
            continue;
        }
        depth[seed] = Some(0);
        queue.push_back(seed);
        while let Some(current) = queue.pop_front() {
            let d = depth[current].unwrap_or(0);
            for &next in &adjacency[current] {
                if depth[next].is_none() {
                    depth[next] = Some(d + 1);
                    queue.push_back(next);
                }
            }
        }
    }

    let mut layers: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, d) in depth.iter().enumerate() {
        layers.entry(d.unwrap_or(0)).or_default().push(idx);
    }
    let layer_count = layers.keys().max().map_or(1, |m| m + 1);
    let row_height = spacing * 1.5;
    let top = center.y - (layer_count - 1) as f64 * row_height / 2.0;

    let mut positions = vec![center; n];
    for (d, members) in layers {
        let row_width = (members.len() - 1) as f64 * spacing;
        for (i, idx) in members.into_iter().enumerate() {
            positions[idx] = Point::new(
                center.x - row_width / 2.0 + i as f64 * spacing,
                top + d as f64 * row_height,
            );
        }
    }
    positions
}

/// Force-directed placement (Eades model).
///
/// - Repulsion: inverse-square between all pairs
/// - Attraction: logarithmic springs along edges, zero force at rest length
/// - Centering: pure translation of the centroid onto `center`
/// - Cooling: the timestep shrinks linearly so the layout settles
fn force_directed(scene: &Scene, center: Point, cancel: &AtomicBool) -> Option<Vec<Point>> {
    let n = scene.nodes.len();
    let pairs = scene.index_pairs();
    let degree = degrees(scene);
    let masses: Vec<f64> = degree
        .iter()
        .map(|&d| 1.0 + d as f64 * MASS_PER_CONNECTION)
        .collect();

    // Deterministic start: spread on a circle sized for the node count.
    let start_radius = SPRING_REST_LENGTH * (n as f64).sqrt();
    let mut positions: Vec<Point> = if n == 1 {
        vec![center]
    } else {
        ring(n, center, start_radius).collect()
    };
    let mut velocities = vec![Point::default(); n];

    for iteration in 0..FORCE_ITERATIONS {
        if iteration % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::SeqCst) {
            return None;
        }
        let alpha = 1.0 - 0.9 * iteration as f64 / FORCE_ITERATIONS as f64;
        let dt = FORCE_TIMESTEP * alpha;

        // --- Repulsion ---
        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy) = (
                    positions[i].x - positions[j].x,
                    positions[i].y - positions[j].y,
                );
                let dist = (dx * dx + dy * dy).sqrt();
                // Coincident nodes get pushed apart along a fixed diagonal.
                let (ux, uy) = if dist < 1e-9 {
                    (std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2)
                } else {
                    (dx / dist, dy / dist)
                };
                let dist = dist.max(MIN_DISTANCE);
                let force = REPULSION_STRENGTH / (dist * dist);
                velocities[i].x += ux * force * dt / masses[i];
                velocities[i].y += uy * force * dt / masses[i];
                velocities[j].x -= ux * force * dt / masses[j];
                velocities[j].y -= uy * force * dt / masses[j];
            }
        }

        // --- Attraction ---
        for &(s, t) in &pairs {
            if s == t {
                continue;
            }
            let (dx, dy) = (
                positions[t].x - positions[s].x,
                positions[t].y - positions[s].y,
            );
            let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
            let force = SPRING_STIFFNESS * (dist / SPRING_REST_LENGTH).ln();
            let (ux, uy) = (dx / dist, dy / dist);
            velocities[s].x += ux * force * dt / masses[s];
            velocities[s].y += uy * force * dt / masses[s];
            velocities[t].x -= ux * force * dt / masses[t];
            velocities[t].y -= uy * force * dt / masses[t];
        }

        // --- Damping and integration ---
        for (p, v) in positions.iter_mut().zip(velocities.iter_mut()) {
            v.x *= DAMPING;
            v.y *= DAMPING;
            let speed = (v.x * v.x + v.y * v.y).sqrt();
            if speed > MAX_VELOCITY {
                v.x = v.x / speed * MAX_VELOCITY;
                v.y = v.y / speed * MAX_VELOCITY;
            }
            p.x += v.x * dt;
            p.y += v.y * dt;
        }

        // --- Centering ---
        let (sx, sy) = positions
            .iter()
            .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
        let (cx, cy) = (sx / n as f64, sy / n as f64);
        for p in &mut positions {
            p.x += center.x - cx;
            p.y += center.y - cy;
        }
    }

    Some(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::models::{Entity, Relation, VisualOverrides};
    use crate::visualization::scene::build_scene;

    fn chain(n: usize) -> Scene {
        let entities: Vec<Entity> = (0..n)
            .map(|i| Entity::new(i.to_string(), format!("N{}", i), "Concept"))
            .collect();
        let relations: Vec<Relation> = (1..n)
            .map(|i| Relation::new(format!("r{}", i), (i - 1).to_string(), i.to_string(), "next"))
            .collect();
        build_scene(&entities, &relations, &VisualOverrides::default(), &SceneConfig::default())
    }

    #[test]
    fn test_lookup_allow_list_and_aliases() {
        assert_eq!(LayoutName::lookup("circle"), Some(LayoutName::Circular));
        assert_eq!(LayoutName::lookup("COSE"), Some(LayoutName::ForceDirected));
        assert_eq!(LayoutName::lookup("breadthfirst"), Some(LayoutName::BreadthFirst));
        assert_eq!(LayoutName::lookup("spiral"), None);
        for name in LayoutName::ALL {
            assert_eq!(LayoutName::lookup(name.as_str()), Some(name));
        }
    }

    #[test]
    fn test_unknown_layout_falls_back() {
        assert_eq!(
            LayoutName::resolve("spiral", LayoutName::ForceDirected),
            LayoutName::ForceDirected
        );
        assert_eq!(LayoutName::resolve("grid", LayoutName::Circular), LayoutName::Grid);
    }

    #[test]
    fn test_every_layout_positions_every_node() {
        let scene = chain(7);
        let cancel = AtomicBool::new(false);
        for name in LayoutName::ALL {
            let positions = compute_positions(name, &scene, 800.0, 600.0, &cancel).unwrap();
            assert_eq!(positions.len(), 7, "{}", name);
            assert!(positions.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
        }
    }

    #[test]
    fn test_layouts_are_deterministic() {
        let scene = chain(5);
        let cancel = AtomicBool::new(false);
        for name in LayoutName::ALL {
            let a = compute_positions(name, &scene, 800.0, 600.0, &cancel);
            let b = compute_positions(name, &scene, 800.0, 600.0, &cancel);
            assert_eq!(a, b, "{}", name);
        }
    }

    #[test]
    fn test_force_directed_separates_nodes() {
        let scene = chain(4);
        let positions =
            force_directed(&scene, Point::new(400.0, 300.0), &AtomicBool::new(false)).unwrap();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                assert!(positions[i].distance(positions[j]) > 10.0);
            }
        }
    }

    #[test]
    fn test_cancelled_force_layout_returns_none() {
        let scene = chain(3);
        let cancel = AtomicBool::new(true);
        assert!(compute_positions(LayoutName::ForceDirected, &scene, 800.0, 600.0, &cancel).is_none());
    }

    #[test]
    fn test_breadth_first_layers_follow_depth() {
        let scene = chain(3);
        let positions = breadth_first(&scene, Point::new(0.0, 0.0), 40.0);
        assert!(positions[0].y < positions[1].y);
        assert!(positions[1].y < positions[2].y);
    }

    #[test]
    fn test_concentric_puts_hub_in_center() {
        let entities: Vec<Entity> = (0..5)
            .map(|i| Entity::new(i.to_string(), format!("N{}", i), "T"))
            .collect();
        let relations: Vec<Relation> = (1..5)
            .map(|i| Relation::new(format!("r{}", i), "0", i.to_string(), "x"))
            .collect();
        let scene = build_scene(&entities, &relations, &VisualOverrides::default(), &SceneConfig::default());
        let center = Point::new(100.0, 100.0);
        let positions = concentric(&scene, center, 40.0);
        assert_eq!(positions[0], center);
        assert!(positions[1].distance(center) > 0.0);
    }
}
