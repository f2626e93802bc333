use crate::config::{GameConfig, TrackConfig};
use bevy::math::bounding::Aabb3d;
use bevy::prelude::*;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub struct TrackPlugin;

impl Plugin for TrackPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_race_track.run_if(resource_exists::<GameConfig>),
        );
    }
}

fn sync_race_track(
    mut commands: Commands,
    config: Res<GameConfig>,
    race_track: Option<Res<RaceTrack>>,
) {
    if race_track.is_some() && !config.is_changed() {
        return;
    }

    let Some(track_config) = config.active_track() else {
        warn!(
            "Track `{}` is not present in config; keeping the current track.",
            config.game.app.track
        );
        return;
    };

    let track = RaceTrack::from_config(track_config);
    info!(
        "Built track `{}`: {} centerline points, {} checkpoints.",
        track.id,
        track.surface.points().len(),
        track.checkpoints.len()
    );
    commands.insert_resource(track);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceQueryError {
    DegenerateTrack,
    NonFinitePoint,
}

impl Display for SurfaceQueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateTrack => write!(f, "track surface has fewer than two points"),
            Self::NonFinitePoint => write!(f, "query point is not finite"),
        }
    }
}

impl Error for SurfaceQueryError {}

pub trait TrackSurface {
    fn is_drivable(&self, point: Vec3) -> Result<bool, SurfaceQueryError>;

    fn surface_height(&self, x: f32, z: f32) -> Result<f32, SurfaceQueryError>;
}

#[derive(Debug, Clone)]
pub struct CenterlineTrack {
    points: Vec<Vec3>,
    half_width: f32,
}

#[derive(Debug, Clone, Copy)]
struct NearestCenterlinePoint {
    horizontal_distance: f32,
    height: f32,
}

impl CenterlineTrack {
    pub fn new(points: Vec<Vec3>, half_width: f32) -> Self {
        Self {
            points,
            half_width: half_width.max(0.0),
        }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn half_width(&self) -> f32 {
        self.half_width
    }

    pub fn segments(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        let count = self.points.len();
        (0..count).map(move |index| (self.points[index], self.points[(index + 1) % count]))
    }

    fn nearest(&self, x: f32, z: f32) -> Result<NearestCenterlinePoint, SurfaceQueryError> {
        if !x.is_finite() || !z.is_finite() {
            return Err(SurfaceQueryError::NonFinitePoint);
        }
        if self.points.len() < 2 {
            return Err(SurfaceQueryError::DegenerateTrack);
        }

        let query = Vec2::new(x, z);
        let mut best = NearestCenterlinePoint {
            horizontal_distance: f32::INFINITY,
            height: 0.0,
        };
        for (start, end) in self.segments() {
            let a = Vec2::new(start.x, start.z);
            let ab = Vec2::new(end.x, end.z) - a;
            let length_sq = ab.length_squared();
            let t = if length_sq <= f32::EPSILON {
                0.0
            } else {
                ((query - a).dot(ab) / length_sq).clamp(0.0, 1.0)
            };
            let distance = query.distance(a + ab * t);
            if distance < best.horizontal_distance {
                best = NearestCenterlinePoint {
                    horizontal_distance: distance,
                    height: start.y + (end.y - start.y) * t,
                };
            }
        }
        Ok(best)
    }
}

impl TrackSurface for CenterlineTrack {
    fn is_drivable(&self, point: Vec3) -> Result<bool, SurfaceQueryError> {
        let nearest = self.nearest(point.x, point.z)?;
        Ok(nearest.horizontal_distance <= self.half_width)
    }

    fn surface_height(&self, x: f32, z: f32) -> Result<f32, SurfaceQueryError> {
        Ok(self.nearest(x, z)?.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetPose {
    pub position: Vec3,
    pub direction: Vec3,
    pub rotation: Vec3,
}

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub index: usize,
    pub position: Vec3,
    pub reset_direction: Vec3,
    pub reset_rotation: Vec3,
    // Half of (width, height, depth); depth runs along `reset_direction`.
    pub half_extents: Vec3,
}

impl Checkpoint {
    pub fn trigger_bounds(&self) -> Aabb3d {
        oriented_box_bounds(self.position, self.reset_direction, self.half_extents)
    }

    pub fn reset_pose(&self) -> ResetPose {
        ResetPose {
            position: self.position,
            direction: horizontal_unit(self.reset_direction).unwrap_or(Vec3::Z),
            rotation: self.reset_rotation,
        }
    }
}

#[derive(Resource, Debug, Clone)]
pub struct RaceTrack {
    pub id: String,
    pub surface: CenterlineTrack,
    pub checkpoints: Vec<Checkpoint>,
    pub start: ResetPose,
}

impl RaceTrack {
    pub fn from_config(track: &TrackConfig) -> Self {
        let checkpoints = track
            .checkpoints
            .iter()
            .enumerate()
            .map(|(index, checkpoint)| Checkpoint {
                index,
                position: Vec3::from_array(checkpoint.position),
                reset_direction: Vec3::from_array(checkpoint.reset_direction),
                reset_rotation: Vec3::from_array(checkpoint.reset_rotation),
                half_extents: Vec3::new(checkpoint.width, checkpoint.height, checkpoint.depth)
                    * 0.5,
            })
            .collect();

        Self {
            id: track.id.clone(),
            surface: CenterlineTrack::new(
                track.centerline.iter().copied().map(Vec3::from_array).collect(),
                track.half_width,
            ),
            checkpoints,
            start: ResetPose {
                position: Vec3::from_array(track.start_position),
                direction: horizontal_unit(Vec3::from_array(track.start_direction))
                    .unwrap_or(Vec3::Z),
                rotation: Vec3::from_array(track.start_rotation),
            },
        }
    }
}

pub fn horizontal_unit(vector: Vec3) -> Option<Vec3> {
    Vec3::new(vector.x, 0.0, vector.z).try_normalize()
}

// Axis-aligned bounds of a box that is yawed to face `forward`.
// `half_extents` is (lateral, vertical, along `forward`).
pub fn oriented_box_bounds(center: Vec3, forward: Vec3, half_extents: Vec3) -> Aabb3d {
    let forward = horizontal_unit(forward).unwrap_or(Vec3::Z);
    let right = Vec3::Y.cross(forward);
    let half_size = right.abs() * half_extents.x
        + Vec3::Y * half_extents.y
        + forward.abs() * half_extents.z;
    Aabb3d::new(center, half_size)
}
