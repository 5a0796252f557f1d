use std::time::Duration;

use bevy::{audio::Volume, prelude::*};
use rand::Rng;

use crate::{
    audio::GameAudio,
    bot_spawner::uniform,
    config::{AudioSettings, BotSettings, ShootingSettings},
    match_flow::MatchSet,
    roster::Eliminated,
    shell::{launch_shell, muzzle_transform, ShellAssets},
};

pub struct AutoShootingPlugin;

impl Plugin for AutoShootingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioSettings>()
            .init_resource::<ShootingSettings>()
            .add_systems(Update, auto_fire_system.in_set(MatchSet::Combat));
    }
}

/// A bot's shooting loop: wait a random interval, shoot if allowed, repeat.
///
/// `can_shoot` is flipped by the round flow and only gates the trigger. The
/// shot clock keeps running while it is off.
#[derive(Component, Debug, Clone)]
pub struct AutoShooter {
    pub can_shoot: bool,
    timer: Timer,
    min_force: f32,
    max_force: f32,
    min_interval: f32,
    max_interval: f32,
}

impl AutoShooter {
    /// Starts disabled, with a random initial delay so bots spawned together
    /// don't all fire on the same frame.
    pub fn new(settings: &BotSettings, rng: &mut impl Rng) -> Self {
        let initial_delay = uniform(rng, settings.min_initial_delay, settings.max_initial_delay);
        Self {
            can_shoot: false,
            timer: Timer::from_seconds(initial_delay, TimerMode::Once),
            min_force: settings.min_launch_force,
            max_force: settings.max_launch_force,
            min_interval: settings.min_fire_interval,
            max_interval: settings.max_fire_interval,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.timer.remaining()
    }

    /// Advances the shot clock. When it runs out a new random interval starts,
    /// and the launch force is returned if the bot was able and allowed to shoot.
    pub fn tick(&mut self, delta: Duration, able: bool, rng: &mut impl Rng) -> Option<f32> {
        self.timer.tick(delta);
        if !self.timer.just_finished() {
            return None;
        }

        let shot = (able && self.can_shoot).then(|| uniform(rng, self.min_force, self.max_force));
        let wait = uniform(rng, self.min_interval, self.max_interval);
        self.timer = Timer::from_seconds(wait, TimerMode::Once);
        shot
    }
}

fn auto_fire_system(
    mut commands: Commands,
    time: Res<Time>,
    shooting: Res<ShootingSettings>,
    audio_settings: Res<AudioSettings>,
    shells: Option<Res<ShellAssets>>,
    audio: Option<Res<GameAudio>>,
    mut bots: Query<(&mut AutoShooter, &Transform, Has<Eliminated>)>,
) {
    let mut rng = rand::thread_rng();

    for (mut shooter, transform, eliminated) in &mut bots {
        let able = !eliminated && shells.is_some();
        let Some(force) = shooter.tick(time.delta(), able, &mut rng) else {
            continue;
        };
        let Some(shells) = shells.as_deref() else {
            continue;
        };

        launch_shell(&mut commands, shells, muzzle_transform(transform, &shooting), force);
        if let Some(audio) = audio.as_deref() {
            commands.spawn((
                AudioPlayer::new(audio.fire.clone()),
                PlaybackSettings::DESPAWN.with_volume(Volume::Linear(audio_settings.fire_volume)),
            ));
        }
    }
}
