// visuals.rs - Camera, light, arena floor and the meshes tanks and shells are
// drawn with. Nothing in here affects the outcome of a round.

use bevy::prelude::*;

use crate::{
    bot_spawner::Bot,
    config::BotSettings,
    match_flow::MatchPhase,
    roster::{reset_combatants, Tank, TankColor},
    shell::ShellAssets,
};

/// Camera never sits closer to the framed point than this.
const MIN_CAMERA_DISTANCE: f32 = 30.0;
const BOT_COLOR: Color = Color::srgb(0.45, 0.45, 0.45);

pub struct VisualsPlugin;

impl Plugin for VisualsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_scene)
            .add_systems(
                OnEnter(MatchPhase::RoundStarting),
                frame_camera.after(reset_combatants),
            )
            .add_systems(Update, dress_new_tanks);
    }
}

#[derive(Component)]
pub struct ArenaCamera;

/// Tanks the camera keeps in frame at the start of every round.
#[derive(Component)]
pub struct CameraTarget;

/// Mesh shared by every tank; each tank gets its own coloured material.
#[derive(Resource)]
struct TankMesh(Handle<Mesh>);

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    bots: Option<Res<BotSettings>>,
) {
    commands.spawn((
        ArenaCamera,
        Camera3d::default(),
        camera_transform(Vec3::ZERO, MIN_CAMERA_DISTANCE),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 15000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(8.0, 20.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let [width, depth] = bots
        .map(|settings| settings.map_size)
        .unwrap_or([100.0, 100.0]);
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(width, depth))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.76, 0.6, 0.42),
            perceptual_roughness: 0.9,
            ..default()
        })),
    ));

    commands.insert_resource(TankMesh(meshes.add(Cuboid::new(2.0, 1.2, 3.0))));
    commands.insert_resource(ShellAssets {
        mesh: meshes.add(Sphere::new(0.25)),
        material: materials.add(StandardMaterial {
            base_color: Color::srgb(0.9, 0.75, 0.2),
            ..default()
        }),
    });
}

/// Gives freshly spawned tanks a body. Player tanks use their colour, bots are grey.
fn dress_new_tanks(
    mut commands: Commands,
    tank_mesh: Option<Res<TankMesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    tanks: Query<(Entity, Option<&TankColor>, Has<Bot>), Added<Tank>>,
) {
    let Some(tank_mesh) = tank_mesh else {
        return;
    };

    for (entity, color, is_bot) in &tanks {
        let base_color = match color {
            Some(color) if !is_bot => color.0,
            _ => BOT_COLOR,
        };
        commands.entity(entity).insert((
            Mesh3d(tank_mesh.0.clone()),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color,
                ..default()
            })),
        ));
    }
}

/// Average position of everything the camera should keep in view.
pub fn framing_center(targets: &[Vec3]) -> Vec3 {
    if targets.is_empty() {
        return Vec3::ZERO;
    }
    targets.iter().copied().sum::<Vec3>() / targets.len() as f32
}

/// Far enough back to keep every target on screen.
pub fn framing_distance(targets: &[Vec3], center: Vec3) -> f32 {
    let spread = targets
        .iter()
        .map(|target| target.distance(center))
        .fold(0.0, f32::max);
    (spread * 1.5 + 10.0).max(MIN_CAMERA_DISTANCE)
}

fn camera_transform(center: Vec3, distance: f32) -> Transform {
    let offset = Vec3::new(0.0, 1.0, 1.0).normalize() * distance;
    Transform::from_translation(center + offset).looking_at(center, Vec3::Y)
}

fn frame_camera(
    targets: Query<&Transform, (With<CameraTarget>, Without<ArenaCamera>)>,
    mut cameras: Query<&mut Transform, With<ArenaCamera>>,
) {
    let targets: Vec<Vec3> = targets.iter().map(|target| target.translation).collect();
    let center = framing_center(&targets);
    let distance = framing_distance(&targets, center);

    for mut transform in &mut cameras {
        *transform = camera_transform(center, distance);
    }
}
