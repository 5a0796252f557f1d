use std::time::Duration;

use bevy::{audio::Volume, prelude::*};

use crate::{config::AudioSettings, match_flow::MatchPhase, roster::MatchEntity};

pub struct GameAudioPlugin;

impl Plugin for GameAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioSettings>()
            .add_systems(Startup, setup_audio)
            .add_systems(
                Update,
                (start_music.run_if(in_state(MatchPhase::TitleDisplay)), fade_music),
            );
    }
}

#[derive(Resource)]
pub struct GameAudio {
    pub fire: Handle<AudioSource>,
    pub charging: Handle<AudioSource>,
    pub music: Handle<AudioSource>,
}

pub fn setup_audio(mut commands: Commands, asset_server: Res<AssetServer>) {
    // Handles are valid right away; the files load in the background.
    commands.insert_resource(GameAudio {
        fire: asset_server.load("audio/shot_fire.wav"),
        charging: asset_server.load("audio/shot_charging.wav"),
        music: asset_server.load("audio/background_music.mp3"),
    });
}

/// The looping match track. It belongs to the match, so a new one starts on
/// every title screen.
#[derive(Component, Debug)]
pub struct BackgroundMusic {
    started_at: Duration,
    fade: MusicFade,
}

/// Full volume until `stop_after`, then a linear fade to silence over `fade`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicFade {
    pub volume: f32,
    pub stop_after: Duration,
    pub fade: Duration,
}

impl MusicFade {
    pub fn from_settings(settings: &AudioSettings) -> Self {
        Self {
            volume: settings.music_volume,
            stop_after: Duration::from_secs_f32(settings.music_stop_time.max(0.0)),
            fade: Duration::from_secs_f32(settings.music_fade.max(0.0)),
        }
    }

    /// Volume `playing_for` into the track, or None once it should be stopped.
    pub fn volume_at(&self, playing_for: Duration) -> Option<f32> {
        let Some(fading_for) = playing_for.checked_sub(self.stop_after) else {
            return Some(self.volume);
        };
        if fading_for >= self.fade {
            return None;
        }
        let left = 1.0 - fading_for.as_secs_f32() / self.fade.as_secs_f32();
        Some(self.volume * left)
    }
}

fn start_music(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<AudioSettings>,
    audio: Option<Res<GameAudio>>,
    playing: Query<(), With<BackgroundMusic>>,
) {
    let Some(audio) = audio else {
        return;
    };
    if !playing.is_empty() {
        return;
    }

    commands.spawn((
        BackgroundMusic {
            started_at: time.elapsed(),
            fade: MusicFade::from_settings(&settings),
        },
        MatchEntity,
        AudioPlayer::new(audio.music.clone()),
        PlaybackSettings::LOOP.with_volume(Volume::Linear(settings.music_volume)),
    ));
}

fn fade_music(
    mut commands: Commands,
    time: Res<Time>,
    mut music: Query<(Entity, &BackgroundMusic, &mut AudioSink)>,
) {
    for (entity, track, mut sink) in &mut music {
        let playing_for = time.elapsed().saturating_sub(track.started_at);
        match track.fade.volume_at(playing_for) {
            Some(volume) => sink.set_volume(Volume::Linear(volume)),
            None => {
                sink.stop();
                commands.entity(entity).despawn();
                info!("Background music stopped after {:.0}s", playing_for.as_secs_f32());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fade() -> MusicFade {
        MusicFade::from_settings(&AudioSettings {
            music_volume: 0.5,
            music_stop_time: 240.0,
            music_fade: 3.0,
            ..default()
        })
    }

    #[test]
    fn test_full_volume_before_stop_time() {
        assert_eq!(fade().volume_at(Duration::from_secs(10)), Some(0.5));
        assert_eq!(fade().volume_at(Duration::from_secs(240)), Some(0.5));
    }

    #[test]
    fn test_volume_falls_during_fade() {
        let halfway = fade().volume_at(Duration::from_millis(241_500)).unwrap();
        assert!((halfway - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_stops_once_faded_out() {
        assert_eq!(fade().volume_at(Duration::from_secs(243)), None);
        assert_eq!(fade().volume_at(Duration::from_secs(600)), None);
    }

    #[test]
    fn test_zero_fade_stops_immediately_at_stop_time() {
        let fade = MusicFade {
            volume: 1.0,
            stop_after: Duration::from_secs(5),
            fade: Duration::ZERO,
        };
        assert_eq!(fade.volume_at(Duration::from_secs(4)), Some(1.0));
        assert_eq!(fade.volume_at(Duration::from_secs(5)), None);
    }
}
