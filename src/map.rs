//! Tile map and the monster path.
//!
//! The map lives outside the entity store: it is immutable after
//! construction and shared by the driver and the pathfinding system. Tile
//! coordinates are integers; world coordinates are the continuous plane the
//! simulation moves entities on. A waypoint's world position is the center
//! of its tile.

use crate::config::LevelConfig;

/// Immutable level geometry: tile grid plus the waypoint polyline monsters
/// follow.
#[derive(Debug, Clone, PartialEq)]
pub struct PathMap {
    width: i32,
    height: i32,
    tile_size: f32,
    waypoints: Vec<(i32, i32)>,
}

impl PathMap {
    pub fn from_level(level: &LevelConfig) -> Self {
        Self {
            width: level.width,
            height: level.height,
            tile_size: level.tile_size,
            waypoints: level.waypoints.clone(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    /// Center of a tile in world coordinates.
    pub fn tile_center(&self, tile_x: i32, tile_y: i32) -> (f32, f32) {
        (
            tile_x as f32 * self.tile_size + self.tile_size / 2.0,
            tile_y as f32 * self.tile_size + self.tile_size / 2.0,
        )
    }

    /// World position of the waypoint at `index`.
    pub fn world_position(&self, index: usize) -> Option<(f32, f32)> {
        let &(tx, ty) = self.waypoints.get(index)?;
        Some(self.tile_center(tx, ty))
    }

    /// Tile containing a world position.
    pub fn tile_at(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.tile_size).floor() as i32,
            (y / self.tile_size).floor() as i32,
        )
    }

    pub fn in_bounds(&self, tile_x: i32, tile_y: i32) -> bool {
        tile_x >= 0 && tile_x < self.width && tile_y >= 0 && tile_y < self.height
    }

    /// Index of the waypoint whose center is closest to the world position.
    pub fn nearest_waypoint(&self, x: f32, y: f32) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, &(tx, ty)) in self.waypoints.iter().enumerate() {
            let (cx, cy) = self.tile_center(tx, ty);
            let d2 = (cx - x) * (cx - x) + (cy - y) * (cy - y);
            if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
                best = Some((index, d2));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Whether a tile lies on the monster path: within half a tile of any
    /// segment of the waypoint polyline. Towers may not be placed here.
    pub fn is_on_path(&self, tile_x: i32, tile_y: i32) -> bool {
        let p = (tile_x as f32, tile_y as f32);
        self.waypoints.windows(2).any(|pair| {
            let a = (pair[0].0 as f32, pair[0].1 as f32);
            let b = (pair[1].0 as f32, pair[1].1 as f32);
            point_segment_distance(p, a, b) <= 0.5
        })
    }
}

fn point_segment_distance(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let len2 = abx * abx + aby * aby;
    let t = if len2 > 0.0 {
        ((apx * abx + apy * aby) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + t * abx, a.1 + t * aby);
    ((p.0 - cx) * (p.0 - cx) + (p.1 - cy) * (p.1 - cy)).sqrt()
}
