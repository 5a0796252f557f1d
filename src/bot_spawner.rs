use bevy::prelude::*;
use rand::Rng;

use crate::{
    auto_shooting::AutoShooter,
    config::BotSettings,
    roster::{MatchEntity, Tank},
};

/// Marker for autonomous tanks.
#[derive(Component)]
pub struct Bot;

/// Handles of the bots spawned for the current round, in spawn order.
///
/// This list is the only way the round flow reaches the bots: it is rebuilt on
/// every respawn and used to toggle their shooting.
#[derive(Resource, Debug, Default)]
pub struct BotPopulation {
    handles: Vec<Entity>,
}

impl BotPopulation {
    pub fn handles(&self) -> &[Entity] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Forgets every handle without touching the entities.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

/// Uniform sample in `[min, max)`. A collapsed range just returns `min`.
pub fn uniform(rng: &mut impl Rng, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

/// A point on the ground inside the map rectangle centred on the origin.
pub fn random_spawn_position(rng: &mut impl Rng, map_size: [f32; 2]) -> Vec3 {
    let half_width = map_size[0] / 2.0;
    let half_depth = map_size[1] / 2.0;
    Vec3::new(
        uniform(rng, -half_width, half_width),
        0.0,
        uniform(rng, -half_depth, half_depth),
    )
}

/// Destroys last round's bots and drops a fresh set at random positions.
/// Safe on the first round, when there is nothing to destroy yet.
pub fn respawn_bots(
    mut commands: Commands,
    mut population: ResMut<BotPopulation>,
    settings: Res<BotSettings>,
) {
    for bot in population.handles.drain(..) {
        // Bots can already be gone, e.g. torn down with the previous match.
        if let Ok(mut entity) = commands.get_entity(bot) {
            entity.despawn();
        }
    }

    let mut rng = rand::thread_rng();
    for _ in 0..settings.number_of_bots {
        let position = random_spawn_position(&mut rng, settings.map_size);
        let bot = commands
            .spawn((
                Bot,
                Tank,
                MatchEntity,
                Transform::from_translation(position),
                AutoShooter::new(&settings, &mut rng),
            ))
            .id();
        population.handles.push(bot);
    }

    info!("Respawned {} bots", population.len());
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn world_with_bots(number_of_bots: usize) -> World {
        let mut world = World::new();
        world.insert_resource(BotSettings {
            number_of_bots,
            ..default()
        });
        world.init_resource::<BotPopulation>();
        world
    }

    #[test]
    fn test_respawn_twice_keeps_population_size_and_drops_old_bots() {
        let mut world = world_with_bots(10);

        world.run_system_once(respawn_bots).expect("first respawn runs");
        let first: Vec<Entity> = world.resource::<BotPopulation>().handles().to_vec();
        assert_eq!(first.len(), 10);

        world.run_system_once(respawn_bots).expect("second respawn runs");
        let second: Vec<Entity> = world.resource::<BotPopulation>().handles().to_vec();
        assert_eq!(second.len(), 10);
        assert!(first.iter().all(|old| !second.contains(old)));

        let mut bots = world.query_filtered::<Entity, With<Bot>>();
        let live: Vec<Entity> = bots.iter(&world).collect();
        assert_eq!(live.len(), 10);
        assert!(live.iter().all(|bot| second.contains(bot)));
    }

    #[test]
    fn test_zero_bots_is_fine() {
        let mut world = world_with_bots(0);
        world.run_system_once(respawn_bots).expect("respawn runs");
        assert!(world.resource::<BotPopulation>().is_empty());
    }

    #[test]
    fn test_spawn_positions_stay_inside_the_map() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let position = random_spawn_position(&mut rng, [100.0, 40.0]);
            assert!((-50.0..=50.0).contains(&position.x));
            assert!((-20.0..=20.0).contains(&position.z));
            assert_eq!(position.y, 0.0);
        }
    }

    #[test]
    fn test_uniform_with_collapsed_range() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(uniform(&mut rng, 3.0, 3.0), 3.0);
        assert_eq!(random_spawn_position(&mut rng, [0.0, 0.0]), Vec3::ZERO);
    }
}
