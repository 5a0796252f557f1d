// roster.rs - The combatant registry: which player tanks are in the match,
// whether they are still alive, and how many rounds each has won.

use bevy::prelude::*;

use crate::{
    config::{MatchSettings, ShootingSettings},
    player_shooting::{ChargedShot, FireKey},
    visuals::CameraTarget,
};

/// Every tank in the arena, player or bot.
#[derive(Component)]
pub struct Tank;

/// The body colour the tank is drawn with.
#[derive(Component, Clone, Copy)]
pub struct TankColor(pub Color);

/// Inserted by whatever destroyed the tank; removed when the round resets.
/// A tank is alive exactly when it does not carry this marker.
#[derive(Component)]
pub struct Eliminated;

/// Whether the player may currently act (move, aim, fire).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAuthority(pub bool);

/// Everything that belongs to the current match and is torn down when it ends.
#[derive(Component)]
pub struct MatchEntity;

#[derive(Debug, Clone)]
pub struct Combatant {
    pub entity: Entity,
    pub player_number: usize,
    pub label: String,
    pub spawn: Transform,
    pub wins: u32,
}

/// The ordered roster of player tanks. Order is player number order, which is
/// also the order tallies are printed in.
#[derive(Resource, Debug, Default)]
pub struct Roster {
    combatants: Vec<Combatant>,
}

impl Roster {
    /// Registers a freshly spawned tank and hands it the next player number.
    pub fn register(&mut self, entity: Entity, spawn: Transform) -> &Combatant {
        let player_number = self.combatants.len() + 1;
        self.combatants.push(Combatant {
            entity,
            player_number,
            label: format!("PLAYER {player_number}"),
            spawn,
            wins: 0,
        });
        &self.combatants[player_number - 1]
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn get(&self, index: usize) -> Option<&Combatant> {
        self.combatants.get(index)
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    pub fn clear(&mut self) {
        self.combatants.clear();
    }

    pub fn alive_count(&self, is_alive: impl Fn(Entity) -> bool) -> usize {
        self.combatants
            .iter()
            .filter(|combatant| is_alive(combatant.entity))
            .count()
    }

    /// True once at most one tank is still standing. An empty or single-tank
    /// roster is trivially there already.
    pub fn one_tank_left(&self, is_alive: impl Fn(Entity) -> bool) -> bool {
        self.alive_count(is_alive) <= 1
    }

    /// The index of the sole survivor, or None for a draw.
    pub fn round_winner(&self, is_alive: impl Fn(Entity) -> bool) -> Option<usize> {
        if self.alive_count(&is_alive) != 1 {
            return None;
        }
        self.combatants
            .iter()
            .position(|combatant| is_alive(combatant.entity))
    }

    /// Wins only ever go up, one round at a time.
    pub fn award_round(&mut self, index: usize) {
        if let Some(combatant) = self.combatants.get_mut(index) {
            combatant.wins += 1;
        }
    }

    pub fn game_winner(&self, rounds_to_win: u32) -> Option<usize> {
        self.combatants
            .iter()
            .position(|combatant| combatant.wins >= rounds_to_win)
    }
}

/// Alive means: the tank still exists and has not been eliminated.
pub fn is_alive(tanks: &Query<Has<Eliminated>, With<Tank>>, entity: Entity) -> bool {
    tanks.get(entity).is_ok_and(|eliminated| !eliminated)
}

/// Spawns one player tank per configured spawn point and registers them in order.
pub fn spawn_combatants(
    commands: &mut Commands,
    settings: &MatchSettings,
    shooting: &ShootingSettings,
    roster: &mut Roster,
) {
    roster.clear();

    for spawn_point in &settings.spawn_points {
        let transform = spawn_point.transform();
        let color = spawn_point.color();
        let entity = commands
            .spawn((
                Tank,
                MatchEntity,
                transform,
                TankColor(color),
                CameraTarget,
                ControlAuthority(false),
                ChargedShot::new(shooting),
            ))
            .id();

        let combatant = roster.register(entity, transform);
        if let Some(key) = FireKey::for_player(combatant.player_number) {
            commands.entity(entity).insert(key);
        }
        info!("Spawned {} at {}", combatant.label, transform.translation);
    }

    if roster.len() <= 1 {
        warn!(
            "Match has {} player tank(s); every round will end immediately",
            roster.len()
        );
    }
}

/// Puts every player tank back on its spawn point, alive and with an empty charge.
pub fn reset_combatants(
    mut commands: Commands,
    roster: Res<Roster>,
    shooting: Res<ShootingSettings>,
) {
    for combatant in roster.combatants() {
        let Ok(mut tank) = commands.get_entity(combatant.entity) else {
            continue;
        };
        tank.remove::<Eliminated>().insert((
            combatant.spawn,
            Visibility::Inherited,
            ChargedShot::new(&shooting),
        ));
    }
}
