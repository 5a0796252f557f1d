use bevy::prelude::*;

use crate::{
    match_flow::MatchSet,
    overlay::{advance_overlay, RoundOverlay},
};

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HudText>()
            .add_systems(Startup, spawn_hud)
            .add_systems(
                Update,
                (sync_hud_text, sync_overlay_widgets)
                    .chain()
                    .in_set(MatchSet::Presentation)
                    .after(advance_overlay),
            );
    }
}

/// What the HUD should say. Systems write here; `sync_hud_text` puts it on screen.
#[derive(Resource, Debug, Default, Clone, PartialEq, Eq)]
pub struct HudText {
    pub message: String,
    pub timer: String,
}

impl HudText {
    pub fn clear(&mut self) {
        self.message.clear();
        self.timer.clear();
    }
}

/// The full-screen dark panel behind the texts.
#[derive(Component)]
struct DarkOverlay;

/// The big centred message (title, round banner, results).
#[derive(Component)]
struct MessageText;

#[derive(Component)]
struct TimerText;

fn spawn_hud(mut commands: Commands) {
    // Spawned first so it renders behind the message text.
    commands.spawn((
        DarkOverlay,
        Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            position_type: PositionType::Absolute,
            ..default()
        },
        BackgroundColor(Color::NONE),
    ));

    commands
        .spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            position_type: PositionType::Absolute,
            justify_content: JustifyContent::Center,
            align_items: AlignItems::Center,
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                MessageText,
                Text::new(""),
                TextFont {
                    font_size: 56.0,
                    ..default()
                },
                TextColor(Color::srgba(1.0, 1.0, 1.0, 0.0)),
                TextLayout::new_with_justify(Justify::Center),
                Visibility::Hidden,
            ));
        });

    commands.spawn((
        TimerText,
        Text::new(""),
        TextFont {
            font_size: 32.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(16.0),
            right: Val::Px(24.0),
            ..default()
        },
    ));
}

fn sync_hud_text(
    hud: Res<HudText>,
    mut messages: Query<&mut Text, (With<MessageText>, Without<TimerText>)>,
    mut timers: Query<&mut Text, (With<TimerText>, Without<MessageText>)>,
) {
    if !hud.is_changed() {
        return;
    }
    for mut text in &mut messages {
        text.0.clone_from(&hud.message);
    }
    for mut text in &mut timers {
        text.0.clone_from(&hud.timer);
    }
}

/// Copies the overlay's alpha onto the dark panel and its text alpha and
/// visibility onto the message text.
fn sync_overlay_widgets(
    overlay: Option<Res<RoundOverlay>>,
    mut panels: Query<&mut BackgroundColor, With<DarkOverlay>>,
    mut messages: Query<(&mut TextColor, &mut Visibility), With<MessageText>>,
) {
    let Some(overlay) = overlay else {
        // Without an overlay the message is simply always shown.
        for (mut color, mut visibility) in &mut messages {
            color.0 = Color::WHITE;
            *visibility = Visibility::Inherited;
        }
        return;
    };

    let [r, g, b] = overlay.color();
    for mut background in &mut panels {
        background.0 = Color::srgba(r, g, b, overlay.alpha());
    }
    for (mut color, mut visibility) in &mut messages {
        color.0 = Color::srgba(1.0, 1.0, 1.0, overlay.text_alpha());
        *visibility = if overlay.texts_visible() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}
