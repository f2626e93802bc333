use crate::config::{GameConfig, SfxConfig};
use crate::gameplay::progression::RaceSignal;
use crate::gameplay::vehicle::{EngineTone, PlayerVehicle};
use crate::gameplay::RaceStep;
use crate::states::GameState;
use bevy::audio::{
    AudioPlayer, AudioSink, AudioSinkPlayback, AudioSource, PlaybackSettings, Pitch, Volume,
};
use bevy::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Below this the engine is treated as silent.
const ENGINE_AUDIBLE_MIN_HZ: f32 = 1.0;
const ENGINE_MIN_PLAYBACK_SPEED: f32 = 0.05;
const ENGINE_MAX_PLAYBACK_SPEED: f32 = 8.0;
const ENGINE_TONE_LENGTH: Duration = Duration::from_secs(600);

pub struct RaceSfxPlugin;

impl Plugin for RaceSfxPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SfxMissingAssetWarnings>()
            .init_resource::<SfxCueAudioCache>()
            .add_systems(
                OnEnter(GameState::Racing),
                acquire_engine_tone.run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnExit(GameState::Racing), release_race_audio)
            .add_systems(
                Update,
                (update_engine_tone_audio, play_race_cues).in_set(RaceStep::Presentation),
            );
    }
}

#[derive(Component)]
struct EngineToneAudio;

#[derive(Component)]
struct RaceCueAudio;

#[derive(Resource, Debug, Default)]
struct SfxMissingAssetWarnings {
    missing_ids: HashSet<String>,
}

#[derive(Resource, Debug, Default)]
struct SfxCueAudioCache {
    handles_by_id: HashMap<String, Handle<AudioSource>>,
}

fn acquire_engine_tone(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut pitches: ResMut<Assets<Pitch>>,
    existing: Query<Entity, With<EngineToneAudio>>,
) {
    let sfx = &config.game.sfx;
    if !sfx.enabled || !existing.is_empty() {
        return;
    }

    let tone = pitches.add(Pitch::new(sfx.engine_reference_hz, ENGINE_TONE_LENGTH));
    commands.spawn((
        Name::new("EngineTone"),
        EngineToneAudio,
        AudioPlayer(tone),
        PlaybackSettings::LOOP.with_volume(Volume::Linear(0.0)),
    ));
    debug!("Engine tone acquired at {} Hz.", sfx.engine_reference_hz);
}

fn release_race_audio(
    mut commands: Commands,
    audio: Query<Entity, Or<(With<EngineToneAudio>, With<RaceCueAudio>)>>,
) {
    for entity in &audio {
        commands.entity(entity).try_despawn();
    }
}

fn engine_playback(frequency_hz: f32, sfx: &SfxConfig) -> (f32, f32) {
    if !frequency_hz.is_finite() || frequency_hz < ENGINE_AUDIBLE_MIN_HZ {
        return (ENGINE_MIN_PLAYBACK_SPEED, 0.0);
    }

    let speed = (frequency_hz / sfx.engine_reference_hz)
        .clamp(ENGINE_MIN_PLAYBACK_SPEED, ENGINE_MAX_PLAYBACK_SPEED);
    let volume = (sfx.master_volume * sfx.engine_volume).max(0.0);
    (speed, volume)
}

fn update_engine_tone_audio(
    config: Res<GameConfig>,
    player: Query<&EngineTone, With<PlayerVehicle>>,
    mut sinks: Query<&mut AudioSink, With<EngineToneAudio>>,
) {
    let Ok(tone) = player.single() else {
        return;
    };

    let (speed, volume) = engine_playback(tone.frequency_hz, &config.game.sfx);
    for mut sink in &mut sinks {
        sink.set_speed(speed);
        sink.set_volume(Volume::Linear(volume));
    }
}

fn play_race_cues(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut signals: MessageReader<RaceSignal>,
    mut audio_sources: ResMut<Assets<AudioSource>>,
    mut cache: ResMut<SfxCueAudioCache>,
    mut warnings: ResMut<SfxMissingAssetWarnings>,
) {
    let sfx = &config.game.sfx;
    for signal in signals.read() {
        if !signal.is_player || !sfx.enabled {
            continue;
        }

        let cue_id = signal.kind.id();
        let Some(cue) = config.audio_cues_by_id.get(cue_id) else {
            if warnings.missing_ids.insert(cue_id.to_string()) {
                warn!("No audio cue configured for `{cue_id}`.");
            }
            continue;
        };
        let Some(handle) = resolve_cue_handle(
            cue_id,
            &cue.path,
            &mut audio_sources,
            &mut cache,
            &mut warnings,
        ) else {
            continue;
        };

        let volume = (sfx.master_volume * cue.volume).max(0.0);
        if volume <= f32::EPSILON {
            continue;
        }
        debug!("Playing `{cue_id}` for {}.", signal.vehicle);
        commands.spawn((
            Name::new("RaceCue"),
            RaceCueAudio,
            AudioPlayer::<AudioSource>::new(handle),
            PlaybackSettings::DESPAWN.with_volume(Volume::Linear(volume)),
        ));
    }
}

fn resolve_cue_handle(
    cue_id: &str,
    asset_path: &str,
    audio_sources: &mut Assets<AudioSource>,
    cache: &mut SfxCueAudioCache,
    warnings: &mut SfxMissingAssetWarnings,
) -> Option<Handle<AudioSource>> {
    if let Some(handle) = cache.handles_by_id.get(cue_id) {
        return Some(handle.clone());
    }

    let file_path = resolve_asset_file_path(asset_path);
    let bytes = match fs::read(&file_path) {
        Ok(bytes) => bytes,
        Err(error) => {
            if warnings.missing_ids.insert(cue_id.to_string()) {
                warn!(
                    "Audio cue `{}` could not be read from `{}`: {}",
                    cue_id,
                    file_path.to_string_lossy(),
                    error
                );
            }
            return None;
        }
    };

    let handle = audio_sources.add(AudioSource {
        bytes: bytes.into(),
    });
    cache.handles_by_id.insert(cue_id.to_string(), handle.clone());
    Some(handle)
}

fn resolve_asset_file_path(asset_path: &str) -> PathBuf {
    Path::new("assets").join(asset_path)
}
