use bevy::prelude::*;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Tanques".into(),
                ..default()
            }),
            ..default()
        }))
        // Config goes first so every other plugin sees the loaded settings.
        .add_plugins(config::ConfigPlugin)
        .add_plugins((
            match_flow::MatchFlowPlugin,
            overlay::OverlayPlugin,
            hud::HudPlugin,
            player_shooting::PlayerShootingPlugin,
            auto_shooting::AutoShootingPlugin,
            shell::ShellPlugin,
            audio::GameAudioPlugin,
            visuals::VisualsPlugin,
        ))
        .run();
}

mod announcements;
mod audio;
mod auto_shooting;
mod bot_spawner;
mod config;
mod hud;
mod match_flow;
mod overlay;
mod player_shooting;
mod roster;
mod shell;
mod visuals;
