use std::time::Duration;

use bevy::{audio::Volume, prelude::*};

use crate::{
    audio::GameAudio,
    config::{AudioSettings, ShootingSettings},
    match_flow::MatchSet,
    roster::{ControlAuthority, Eliminated},
    shell::{launch_shell, muzzle_transform, ShellAssets},
};

pub struct PlayerShootingPlugin;

impl Plugin for PlayerShootingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AudioSettings>()
            .init_resource::<ShootingSettings>()
            .add_systems(Update, player_fire_system.in_set(MatchSet::Combat));
    }
}

/// The key a player holds to charge and releases to fire.
#[derive(Component, Clone, Copy)]
pub struct FireKey(pub KeyCode);

impl FireKey {
    /// Only the first two players have a fire key bound.
    pub fn for_player(player_number: usize) -> Option<Self> {
        match player_number {
            1 => Some(FireKey(KeyCode::Space)),
            2 => Some(FireKey(KeyCode::Enter)),
            _ => None,
        }
    }
}

/// One frame of the fire button.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trigger {
    pub just_pressed: bool,
    pub held: bool,
    pub just_released: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotEvent {
    ChargeStarted,
    Fired(f32),
}

/// Hold-to-charge cannon with an anti-spam cooldown.
///
/// Holding the trigger raises the launch force from min to max over
/// `max_charge_time`. Releasing fires; reaching max fires on its own. While the
/// cooldown is running neither a new charge nor a shot can start.
#[derive(Component, Debug, Clone)]
pub struct ChargedShot {
    current_force: f32,
    fired: bool,
    since_last_shot: Duration,
    cooldown: Duration,
    min_force: f32,
    max_force: f32,
    charge_speed: f32,
}

impl ChargedShot {
    pub fn new(settings: &ShootingSettings) -> Self {
        let span = settings.max_launch_force - settings.min_launch_force;
        let charge_speed = if settings.max_charge_time > 0.0 {
            span / settings.max_charge_time
        } else {
            f32::INFINITY
        };
        let cooldown = settings.fire_cooldown();

        Self {
            current_force: settings.min_launch_force,
            fired: false,
            // Ready to fire as soon as the round starts.
            since_last_shot: cooldown,
            cooldown,
            min_force: settings.min_launch_force,
            max_force: settings.max_launch_force,
            charge_speed,
        }
    }

    pub fn current_force(&self) -> f32 {
        self.current_force
    }

    pub fn cooldown_ready(&self) -> bool {
        self.since_last_shot >= self.cooldown
    }

    /// Lets the cooldown run while the player has no control.
    pub fn idle(&mut self, delta: Duration) {
        self.since_last_shot = self.since_last_shot.saturating_add(delta);
    }

    pub fn update(&mut self, trigger: Trigger, delta: Duration) -> Option<ShotEvent> {
        self.idle(delta);
        let ready = self.cooldown_ready();

        if self.current_force >= self.max_force && !self.fired {
            self.current_force = self.max_force;
            if ready {
                return Some(self.fire());
            }
            None
        } else if trigger.just_pressed && ready {
            self.fired = false;
            self.current_force = self.min_force;
            Some(ShotEvent::ChargeStarted)
        } else if trigger.held && !self.fired {
            // A zero charge time means the shot is fully charged on the first held frame.
            self.current_force = if self.charge_speed.is_finite() {
                (self.current_force + self.charge_speed * delta.as_secs_f32()).min(self.max_force)
            } else {
                self.max_force
            };
            None
        } else if trigger.just_released && !self.fired && ready {
            Some(self.fire())
        } else {
            None
        }
    }

    fn fire(&mut self) -> ShotEvent {
        let force = self.current_force.min(self.max_force);
        self.fired = true;
        self.since_last_shot = Duration::ZERO;
        self.current_force = self.min_force;
        ShotEvent::Fired(force)
    }
}

fn player_fire_system(
    mut commands: Commands,
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    settings: Res<ShootingSettings>,
    audio_settings: Res<AudioSettings>,
    shells: Option<Res<ShellAssets>>,
    audio: Option<Res<GameAudio>>,
    mut tanks: Query<(
        &mut ChargedShot,
        &ControlAuthority,
        &FireKey,
        &Transform,
        Has<Eliminated>,
    )>,
) {
    for (mut shot, control, key, transform, eliminated) in &mut tanks {
        if !control.0 || eliminated {
            shot.idle(time.delta());
            continue;
        }

        let trigger = Trigger {
            just_pressed: keys.just_pressed(key.0),
            held: keys.pressed(key.0),
            just_released: keys.just_released(key.0),
        };

        match shot.update(trigger, time.delta()) {
            Some(ShotEvent::Fired(force)) => {
                if let Some(shells) = shells.as_deref() {
                    launch_shell(&mut commands, shells, muzzle_transform(transform, &settings), force);
                }
                if let Some(audio) = audio.as_deref() {
                    commands.spawn((
                        AudioPlayer::new(audio.fire.clone()),
                        PlaybackSettings::DESPAWN.with_volume(Volume::Linear(audio_settings.fire_volume)),
                    ));
                }
            }
            Some(ShotEvent::ChargeStarted) => {
                if let Some(audio) = audio.as_deref() {
                    commands.spawn((
                        AudioPlayer::new(audio.charging.clone()),
                        PlaybackSettings::DESPAWN,
                    ));
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(100);

    fn press() -> Trigger {
        Trigger {
            just_pressed: true,
            held: true,
            just_released: false,
        }
    }

    fn hold() -> Trigger {
        Trigger {
            just_pressed: false,
            held: true,
            just_released: false,
        }
    }

    fn release() -> Trigger {
        Trigger {
            just_pressed: false,
            held: false,
            just_released: true,
        }
    }

    #[test]
    fn test_tap_fires_minimum_force() {
        let settings = ShootingSettings::default();
        let mut shot = ChargedShot::new(&settings);

        assert_eq!(shot.update(press(), FRAME), Some(ShotEvent::ChargeStarted));
        assert_eq!(
            shot.update(release(), FRAME),
            Some(ShotEvent::Fired(settings.min_launch_force))
        );
    }

    #[test]
    fn test_holding_charges_and_auto_fires_at_max() {
        let settings = ShootingSettings::default();
        let mut shot = ChargedShot::new(&settings);
        shot.update(press(), FRAME);

        let mut fired = None;
        for _ in 0..20 {
            if let Some(ShotEvent::Fired(force)) = shot.update(hold(), FRAME) {
                fired = Some(force);
                break;
            }
        }

        assert_eq!(fired, Some(settings.max_launch_force));
        assert_eq!(shot.current_force(), settings.min_launch_force);
    }

    #[test]
    fn test_cooldown_blocks_a_second_shot() {
        let settings = ShootingSettings::default();
        let mut shot = ChargedShot::new(&settings);
        shot.update(press(), FRAME);
        assert!(matches!(shot.update(release(), FRAME), Some(ShotEvent::Fired(_))));

        // Immediately trying again does nothing.
        assert_eq!(shot.update(press(), FRAME), None);
        assert_eq!(shot.update(release(), FRAME), None);

        // Once the cooldown has run out, the next press charges again.
        shot.idle(settings.fire_cooldown());
        assert_eq!(shot.update(press(), FRAME), Some(ShotEvent::ChargeStarted));
    }

    #[test]
    fn test_instant_charge_fires_at_max_even_on_zero_length_frames() {
        let settings = ShootingSettings {
            max_charge_time: 0.0,
            ..default()
        };
        let mut shot = ChargedShot::new(&settings);

        assert_eq!(shot.update(press(), FRAME), Some(ShotEvent::ChargeStarted));
        assert_eq!(shot.update(hold(), Duration::ZERO), None);
        assert_eq!(shot.current_force(), settings.max_launch_force);
        assert_eq!(
            shot.update(hold(), Duration::ZERO),
            Some(ShotEvent::Fired(settings.max_launch_force))
        );
    }

    #[test]
    fn test_charge_never_overshoots_max() {
        let settings = ShootingSettings::default();
        let mut shot = ChargedShot::new(&settings);
        shot.update(press(), FRAME);

        // One long frame would charge far beyond the maximum.
        assert_eq!(shot.update(hold(), Duration::from_secs(10)), None);
        assert_eq!(shot.current_force(), settings.max_launch_force);
    }

    #[test]
    fn test_only_first_two_players_have_keys() {
        assert!(FireKey::for_player(1).is_some());
        assert!(FireKey::for_player(2).is_some());
        assert!(FireKey::for_player(3).is_none());
    }
}
