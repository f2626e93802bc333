use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";
const KNOWN_AUDIO_CUES: [&str; 3] = ["complete-lap", "complete-race", "out-of-bounds"];

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: {} vehicles, {} tracks, {} audio cues; racing `{}` on `{}` for {} laps.",
        config.vehicles_by_id.len(),
        config.tracks_by_id.len(),
        config.audio_cues_by_id.len(),
        config.game.app.default_vehicle,
        config.game.app.track,
        config.game.app.total_laps
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub vehicles: VehiclesFile,
    pub tracks: TracksFile,
    pub audio: AudioFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
    pub tracks_by_id: HashMap<String, TrackConfig>,
    pub audio_cues_by_id: HashMap<String, AudioCueConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;
        let tracks: TracksFile = read_toml(&config_dir.join("tracks.toml"))?;
        let audio: AudioFile = read_toml(&config_dir.join("audio.toml"))?;

        Self::from_files(game, vehicles, tracks, audio)
    }

    pub fn from_files(
        game: GameFile,
        vehicles: VehiclesFile,
        tracks: TracksFile,
        audio: AudioFile,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            tracks_by_id: to_index("tracks.toml::tracks", &tracks.tracks)?,
            audio_cues_by_id: to_index("audio.toml::cues", &audio.cues)?,
            game,
            vehicles,
            tracks,
            audio,
        };

        config.validate_references()?;
        Ok(config)
    }

    pub fn active_vehicle(&self) -> Option<&VehicleConfig> {
        self.vehicles_by_id.get(&self.game.app.default_vehicle)
    }

    pub fn active_track(&self) -> Option<&TrackConfig> {
        self.tracks_by_id.get(&self.game.app.track)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        let app = &self.game.app;
        if !self.vehicles_by_id.contains_key(&app.default_vehicle) {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.default_vehicle references unknown vehicle id `{}`",
                app.default_vehicle
            )));
        }
        if !self.tracks_by_id.contains_key(&app.track) {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.track references unknown track id `{}`",
                app.track
            )));
        }
        if app.total_laps == 0 {
            return Err(ConfigError::Validation(
                "game.toml::app.total_laps must be >= 1".to_string(),
            ));
        }
        if app.respawn_delay_seconds < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::app.respawn_delay_seconds must be >= 0".to_string(),
            ));
        }

        let camera = &self.game.camera;
        if camera.follow_distance < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.follow_distance must be >= 0".to_string(),
            ));
        }
        if camera.orbit_max_distance <= camera.orbit_min_distance
            || camera.orbit_min_distance <= 0.0
        {
            return Err(ConfigError::Validation(
                "game.toml::camera orbit distance range is invalid (0 < min < max)".to_string(),
            ));
        }
        if camera.orbit_sensitivity < 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::camera.orbit_sensitivity must be >= 0".to_string(),
            ));
        }

        if self.game.sfx.engine_reference_hz <= 0.0 {
            return Err(ConfigError::Validation(
                "game.toml::sfx.engine_reference_hz must be > 0".to_string(),
            ));
        }

        for (index, vehicle) in self.vehicles.vehicles.iter().enumerate() {
            for (field, value) in [
                ("acceleration", vehicle.acceleration),
                ("deceleration", vehicle.deceleration),
                ("friction", vehicle.friction),
                ("turn_rate", vehicle.turn_rate),
                ("max_roll", vehicle.max_roll),
                ("roll_lean_rate", vehicle.roll_lean_rate),
            ] {
                if value < 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].{field} must be >= 0"
                    )));
                }
            }
            for (field, value) in [
                ("width", vehicle.width),
                ("height", vehicle.height),
                ("length", vehicle.length),
            ] {
                if value <= 0.0 {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].{field} must be > 0"
                    )));
                }
            }
        }

        for (index, track) in self.tracks.tracks.iter().enumerate() {
            if track.half_width <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "tracks.toml::tracks[{index}].half_width must be > 0"
                )));
            }
            if track.centerline.len() < 3 {
                return Err(ConfigError::Validation(format!(
                    "tracks.toml::tracks[{index}].centerline needs at least 3 points to form a loop"
                )));
            }
            if track.checkpoints.len() < 2 {
                return Err(ConfigError::Validation(format!(
                    "tracks.toml::tracks[{index}].checkpoints must contain at least two checkpoints"
                )));
            }
            if is_zero_horizontal(track.start_direction) {
                return Err(ConfigError::Validation(format!(
                    "tracks.toml::tracks[{index}].start_direction must have a horizontal component"
                )));
            }
            for (checkpoint_index, checkpoint) in track.checkpoints.iter().enumerate() {
                if is_zero_horizontal(checkpoint.reset_direction) {
                    return Err(ConfigError::Validation(format!(
                        "tracks.toml::tracks[{index}].checkpoints[{checkpoint_index}].reset_direction must have a horizontal component"
                    )));
                }
                if checkpoint.width <= 0.0 || checkpoint.height <= 0.0 || checkpoint.depth <= 0.0
                {
                    return Err(ConfigError::Validation(format!(
                        "tracks.toml::tracks[{index}].checkpoints[{checkpoint_index}] width, height and depth must be > 0"
                    )));
                }
            }
        }

        for (index, cue) in self.audio.cues.iter().enumerate() {
            if !KNOWN_AUDIO_CUES.contains(&cue.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "audio.toml::cues[{index}].id `{}` is unsupported (expected complete-lap/complete-race/out-of-bounds)",
                    cue.id
                )));
            }
            if cue.path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "audio.toml::cues[{index}].path cannot be empty"
                )));
            }
        }

        Ok(())
    }
}

fn is_zero_horizontal(direction: [f32; 3]) -> bool {
    direction[0].abs() <= f32::EPSILON && direction[2].abs() <= f32::EPSILON
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub camera: CameraConfig,
    pub sfx: SfxConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub default_vehicle: String,
    pub track: String,
    pub total_laps: u32,
    #[serde(default = "default_respawn_delay_seconds")]
    pub respawn_delay_seconds: f32,
    #[serde(default = "default_steer_while_airborne")]
    pub steer_while_airborne: bool,
    #[serde(default)]
    pub debug_overlay: bool,
}

fn default_respawn_delay_seconds() -> f32 {
    1.0
}

fn default_steer_while_airborne() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_follow_distance")]
    pub follow_distance: f32,
    #[serde(default = "default_follow_height")]
    pub follow_height: f32,
    pub orbit_distance: f32,
    pub orbit_min_distance: f32,
    pub orbit_max_distance: f32,
    pub orbit_sensitivity: f32,
}

fn default_follow_distance() -> f32 {
    3.0
}

fn default_follow_height() -> f32 {
    1.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SfxConfig {
    pub enabled: bool,
    pub master_volume: f32,
    pub engine_volume: f32,
    pub engine_reference_hz: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub acceleration: f32,
    pub deceleration: f32,
    pub friction: f32,
    pub turn_rate: f32,
    pub max_roll: f32,
    #[serde(default = "default_roll_lean_rate")]
    pub roll_lean_rate: f32,
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],
    pub width: f32,
    pub height: f32,
    pub length: f32,
}

fn default_roll_lean_rate() -> f32 {
    6.0
}

fn default_gravity() -> [f32; 3] {
    [0.0, -9.81, 0.0]
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracksFile {
    pub tracks: Vec<TrackConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    pub id: String,
    pub half_width: f32,
    pub centerline: Vec<[f32; 3]>,
    pub start_position: [f32; 3],
    pub start_direction: [f32; 3],
    #[serde(default)]
    pub start_rotation: [f32; 3],
    pub checkpoints: Vec<CheckpointConfig>,
}

impl HasId for TrackConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    pub position: [f32; 3],
    pub reset_direction: [f32; 3],
    #[serde(default)]
    pub reset_rotation: [f32; 3],
    #[serde(default = "default_checkpoint_width")]
    pub width: f32,
    #[serde(default = "default_checkpoint_height")]
    pub height: f32,
    #[serde(default = "default_checkpoint_depth")]
    pub depth: f32,
}

fn default_checkpoint_width() -> f32 {
    12.0
}

fn default_checkpoint_height() -> f32 {
    6.0
}

fn default_checkpoint_depth() -> f32 {
    2.0
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AudioFile {
    #[serde(default)]
    pub cues: Vec<AudioCueConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioCueConfig {
    pub id: String,
    pub path: String,
    #[serde(default = "default_cue_volume")]
    pub volume: f32,
}

fn default_cue_volume() -> f32 {
    1.0
}

impl HasId for AudioCueConfig {
    fn id(&self) -> &str {
        &self.id
    }
}
