use std::path::PathBuf;
use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loads `match.ron` while the app is being built and inserts each section as
/// its own resource, so every system (including the very first `OnEnter`) can
/// read the tunables.
pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        let config = match load_config() {
            Ok(config) => config,
            Err(err @ ConfigError::Invalid(_)) => {
                error!("{}. Refusing to start with this match file.", err);
                app.add_systems(Startup, exit_on_invalid_config);
                MatchConfig::default()
            }
            Err(err) => {
                // Unreadable or corrupted file: keep playing with the defaults.
                error!("{}. Using default match settings.", err);
                MatchConfig::default()
            }
        };

        config.insert_into(app);
    }
}

const CONFIG_FILE_NAME: &str = "match.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse match config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid match config: {0}")]
    Invalid(String),
}

/// The whole match file. Every section falls back to its defaults when absent,
/// so a file that only sets `round: (rounds_to_win: 3)` is valid.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    pub round: MatchSettings,
    pub overlay: OverlaySettings,
    pub bots: BotSettings,
    pub shooting: ShootingSettings,
    pub audio: AudioSettings,
}

/// Round flow tunables. All times are in seconds.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MatchSettings {
    pub rounds_to_win: u32,
    pub start_delay: f32,
    pub end_delay: f32,
    /// Wait before leaving the match after a game winner or a timeout.
    pub final_delay: f32,
    pub max_game_time: f32,
    pub title_text: String,
    pub title_hold: f32,
    pub spawn_points: Vec<SpawnPoint>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            rounds_to_win: 5,
            start_delay: 3.0,
            end_delay: 3.0,
            final_delay: 5.0,
            max_game_time: 240.0,
            title_text: "¡TANQUES!".to_string(),
            title_hold: 2.0,
            spawn_points: vec![
                SpawnPoint {
                    position: [-20.0, 0.0, 0.0],
                    yaw_degrees: -90.0,
                    color: [0.16, 0.38, 0.85],
                },
                SpawnPoint {
                    position: [20.0, 0.0, 0.0],
                    yaw_degrees: 90.0,
                    color: [0.86, 0.2, 0.16],
                },
            ],
        }
    }
}

impl MatchSettings {
    pub fn start_delay(&self) -> Duration {
        seconds(self.start_delay)
    }

    pub fn end_delay(&self) -> Duration {
        seconds(self.end_delay)
    }

    pub fn final_delay(&self) -> Duration {
        seconds(self.final_delay)
    }

    pub fn max_game_time(&self) -> Duration {
        seconds(self.max_game_time)
    }

    pub fn title_hold(&self) -> Duration {
        seconds(self.title_hold)
    }
}

/// Where a player tank starts every round.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SpawnPoint {
    pub position: [f32; 3],
    /// Rotation around the vertical axis. 0 faces -Z.
    pub yaw_degrees: f32,
    /// Linear sRGB, used for the tank body.
    pub color: [f32; 3],
}

impl SpawnPoint {
    pub fn transform(&self) -> Transform {
        Transform::from_translation(Vec3::from_array(self.position))
            .with_rotation(Quat::from_rotation_y(self.yaw_degrees.to_radians()))
    }

    pub fn color(&self) -> Color {
        Color::srgb(self.color[0], self.color[1], self.color[2])
    }
}

#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OverlaySettings {
    /// Darkness of the overlay when fully shown (0 = transparent, 1 = opaque).
    pub max_alpha: f32,
    pub color: [f32; 3],
    pub fade_in: f32,
    pub fade_out: f32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            max_alpha: 0.65,
            color: [0.0, 0.0, 0.0],
            fade_in: 0.4,
            fade_out: 0.6,
        }
    }
}

impl OverlaySettings {
    pub fn fade_in(&self) -> Duration {
        seconds(self.fade_in)
    }

    pub fn fade_out(&self) -> Duration {
        seconds(self.fade_out)
    }
}

#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BotSettings {
    pub number_of_bots: usize,
    /// Width (x) and depth (z) of the rectangle bots spawn in, centred on the origin.
    pub map_size: [f32; 2],
    pub min_launch_force: f32,
    pub max_launch_force: f32,
    pub min_fire_interval: f32,
    pub max_fire_interval: f32,
    /// Bots wait a random time in this range before their first shot so they don't fire in sync.
    pub min_initial_delay: f32,
    pub max_initial_delay: f32,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            number_of_bots: 10,
            map_size: [100.0, 100.0],
            min_launch_force: 15.0,
            max_launch_force: 25.0,
            min_fire_interval: 2.0,
            max_fire_interval: 5.0,
            min_initial_delay: 1.0,
            max_initial_delay: 3.0,
        }
    }
}

#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ShootingSettings {
    pub min_launch_force: f32,
    pub max_launch_force: f32,
    /// Seconds of holding fire needed to go from min to max force.
    pub max_charge_time: f32,
    /// Minimum time between two player shots.
    pub fire_cooldown: f32,
    pub shell_gravity: f32,
    pub blast_radius: f32,
    /// Muzzle offset from the tank origin: height and distance forward.
    pub muzzle_height: f32,
    pub muzzle_forward: f32,
    /// Upward tilt of the barrel.
    pub muzzle_pitch_degrees: f32,
}

impl Default for ShootingSettings {
    fn default() -> Self {
        Self {
            min_launch_force: 15.0,
            max_launch_force: 30.0,
            max_charge_time: 0.75,
            fire_cooldown: 1.5,
            shell_gravity: 9.81,
            blast_radius: 4.0,
            muzzle_height: 1.7,
            muzzle_forward: 1.35,
            muzzle_pitch_degrees: 10.0,
        }
    }
}

impl ShootingSettings {
    pub fn fire_cooldown(&self) -> Duration {
        seconds(self.fire_cooldown)
    }
}

#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    pub music_volume: f32,
    /// Match time after which the background music starts fading out.
    pub music_stop_time: f32,
    pub music_fade: f32,
    pub fire_volume: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            music_volume: 0.5,
            music_stop_time: 240.0,
            music_fade: 3.0,
            fire_volume: 0.6,
        }
    }
}

impl MatchConfig {
    pub fn from_ron(contents: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig = ron::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the round flow cannot run with. Zero players, zero bots
    /// and zero-length delays are all fine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let round = &self.round;
        if round.rounds_to_win == 0 {
            return Err(ConfigError::Invalid(
                "round.rounds_to_win must be at least 1".to_string(),
            ));
        }
        check_seconds("round.start_delay", round.start_delay)?;
        check_seconds("round.end_delay", round.end_delay)?;
        check_seconds("round.final_delay", round.final_delay)?;
        check_seconds("round.max_game_time", round.max_game_time)?;
        check_seconds("round.title_hold", round.title_hold)?;
        for (index, spawn) in round.spawn_points.iter().enumerate() {
            if !spawn.position.iter().all(|v| v.is_finite()) || !spawn.yaw_degrees.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "round.spawn_points[{index}] must use finite coordinates"
                )));
            }
        }

        let overlay = &self.overlay;
        if !(0.0..=1.0).contains(&overlay.max_alpha) {
            return Err(ConfigError::Invalid(format!(
                "overlay.max_alpha must be within 0..=1 (got {})",
                overlay.max_alpha
            )));
        }
        check_seconds("overlay.fade_in", overlay.fade_in)?;
        check_seconds("overlay.fade_out", overlay.fade_out)?;

        let bots = &self.bots;
        if !bots.map_size.iter().all(|v| v.is_finite() && *v >= 0.0) {
            return Err(ConfigError::Invalid(
                "bots.map_size must be finite and non-negative".to_string(),
            ));
        }
        check_range(
            "bots.launch_force",
            bots.min_launch_force,
            bots.max_launch_force,
            check_non_negative,
        )?;
        check_range(
            "bots.fire_interval",
            bots.min_fire_interval,
            bots.max_fire_interval,
            check_seconds,
        )?;
        check_range(
            "bots.initial_delay",
            bots.min_initial_delay,
            bots.max_initial_delay,
            check_seconds,
        )?;

        let shooting = &self.shooting;
        check_range(
            "shooting.launch_force",
            shooting.min_launch_force,
            shooting.max_launch_force,
            check_non_negative,
        )?;
        check_seconds("shooting.max_charge_time", shooting.max_charge_time)?;
        check_seconds("shooting.fire_cooldown", shooting.fire_cooldown)?;
        check_non_negative("shooting.blast_radius", shooting.blast_radius)?;

        check_seconds("audio.music_stop_time", self.audio.music_stop_time)?;
        check_seconds("audio.music_fade", self.audio.music_fade)?;

        Ok(())
    }

    fn insert_into(self, app: &mut App) {
        app.insert_resource(self.round)
            .insert_resource(self.overlay)
            .insert_resource(self.bots)
            .insert_resource(self.shooting)
            .insert_resource(self.audio);
    }
}

/// Reads the match file, or returns the defaults when there is none.
pub fn load_config() -> Result<MatchConfig, ConfigError> {
    let Some(path) = config_file_path() else {
        info!("No {} found. Using default match settings.", CONFIG_FILE_NAME);
        return Ok(MatchConfig::default());
    };

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = MatchConfig::from_ron(&contents)?;
    info!("Loaded match settings from {:?}", path);
    Ok(config)
}

/// `match.ron` next to the executable's working directory wins over the one in
/// the user's config directory.
fn config_file_path() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("tank-rounds").join(CONFIG_FILE_NAME);
    user.exists().then_some(user)
}

fn exit_on_invalid_config(mut exit: MessageWriter<AppExit>) {
    exit.write(AppExit::error());
}

fn check_non_negative(name: &str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be a finite, non-negative number (got {value})"
        )))
    }
}

/// Non-negative and small enough to become a `Duration`.
fn check_seconds(name: &str, value: f32) -> Result<(), ConfigError> {
    check_non_negative(name, value)?;
    if Duration::try_from_secs_f32(value).is_err() {
        return Err(ConfigError::Invalid(format!(
            "{name} is too large to be a duration (got {value})"
        )));
    }
    Ok(())
}

fn check_range(
    name: &str,
    min: f32,
    max: f32,
    check: fn(&str, f32) -> Result<(), ConfigError>,
) -> Result<(), ConfigError> {
    check(&format!("{name} minimum"), min)?;
    check(&format!("{name} maximum"), max)?;
    if min > max {
        return Err(ConfigError::Invalid(format!(
            "{name} minimum ({min}) is greater than its maximum ({max})"
        )));
    }
    Ok(())
}

fn seconds(value: f32) -> Duration {
    Duration::from_secs_f32(value.max(0.0))
}
