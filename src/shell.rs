// shell.rs - Projectiles and the elimination they cause.
//
// Crude ballistics: a shell falls under gravity and, when it
// reaches the ground, eliminates every tank inside the blast radius.

use bevy::prelude::*;

use crate::{
    config::ShootingSettings,
    match_flow::MatchSet,
    roster::{Eliminated, MatchEntity, Tank},
};

pub struct ShellPlugin;

impl Plugin for ShellPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ShootingSettings>()
            .add_systems(Update, shell_flight_system.in_set(MatchSet::Combat));
    }
}

#[derive(Component, Debug)]
pub struct Shell {
    pub velocity: Vec3,
}

/// Mesh and material every shell is drawn with. Shooters only fire when this exists.
#[derive(Resource)]
pub struct ShellAssets {
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
}

/// Where shells leave the barrel, in world space.
pub fn muzzle_transform(tank: &Transform, settings: &ShootingSettings) -> Transform {
    let local = Transform::from_xyz(0.0, settings.muzzle_height, -settings.muzzle_forward)
        .with_rotation(Quat::from_rotation_x(settings.muzzle_pitch_degrees.to_radians()));
    tank.mul_transform(local)
}

pub fn launch_shell(commands: &mut Commands, assets: &ShellAssets, muzzle: Transform, force: f32) {
    commands.spawn((
        Shell {
            velocity: muzzle.forward() * force,
        },
        MatchEntity,
        muzzle,
        Mesh3d(assets.mesh.clone()),
        MeshMaterial3d(assets.material.clone()),
    ));
}

/// Moves a shell for one frame. Returns true when it has hit the ground.
pub fn step_shell(shell: &mut Shell, transform: &mut Transform, gravity: f32, dt: f32) -> bool {
    shell.velocity.y -= gravity * dt;
    transform.translation += shell.velocity * dt;
    transform.translation.y <= 0.0
}

fn shell_flight_system(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<ShootingSettings>,
    mut shells: Query<(Entity, &mut Shell, &mut Transform), Without<Tank>>,
    tanks: Query<(Entity, &Transform), (With<Tank>, Without<Eliminated>)>,
) {
    let dt = time.delta_secs();

    for (entity, mut shell, mut transform) in &mut shells {
        if !step_shell(&mut shell, &mut transform, settings.shell_gravity, dt) {
            continue;
        }

        let impact = transform.translation;
        for (tank, tank_transform) in &tanks {
            if tank_transform.translation.distance(impact) <= settings.blast_radius {
                commands.entity(tank).insert((Eliminated, Visibility::Hidden));
                debug!("Shell at {} eliminated {:?}", impact, tank);
            }
        }
        commands.entity(entity).despawn();
    }
}

/// Shells still in the air when a round starts would land on freshly reset tanks.
pub fn clear_shells(mut commands: Commands, shells: Query<Entity, With<Shell>>) {
    for entity in &shells {
        commands.entity(entity).despawn();
    }
}
