// overlay.rs - The darkening layer that fades in and out between rounds.
//
// RoundOverlay is a small sequencer: each request (title, show, hide) replaces
// whatever was queued, and the queue is advanced once per frame. It only holds
// numbers; the HUD plugin copies them onto the actual UI nodes.

use std::{collections::VecDeque, time::Duration};

use bevy::prelude::*;

use crate::{config::OverlaySettings, hud::HudText, match_flow::MatchSet};

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HudText>()
            .init_resource::<RoundOverlay>()
            .add_systems(Update, advance_overlay.in_set(MatchSet::Presentation));
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    duration: Duration,
    elapsed: Duration,
    /// Fading in: texts end fully opaque. Fading out: texts end hidden.
    reveal: bool,
    started: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum OverlayStep {
    Fade(Fade),
    Hold(Timer),
}

#[derive(Resource, Debug)]
pub struct RoundOverlay {
    settings: OverlaySettings,
    alpha: f32,
    text_alpha: f32,
    texts_visible: bool,
    steps: VecDeque<OverlayStep>,
    pending_title: Option<String>,
}

impl FromWorld for RoundOverlay {
    fn from_world(world: &mut World) -> Self {
        let settings = world
            .get_resource::<OverlaySettings>()
            .cloned()
            .unwrap_or_default();
        Self::new(settings)
    }
}

impl RoundOverlay {
    pub fn new(settings: OverlaySettings) -> Self {
        Self {
            settings,
            alpha: 0.0,
            text_alpha: 0.0,
            texts_visible: false,
            steps: VecDeque::new(),
            pending_title: None,
        }
    }

    /// Title card: fade in with `text`, hold, fade back out.
    pub fn show_title(&mut self, text: impl Into<String>, hold: Duration) {
        self.steps.clear();
        self.pending_title = Some(text.into());
        self.steps.push_back(self.fade_in_step());
        self.steps
            .push_back(OverlayStep::Hold(Timer::new(hold, TimerMode::Once)));
        self.steps.push_back(self.fade_out_step());
    }

    pub fn show(&mut self) {
        self.steps.clear();
        self.steps.push_back(self.fade_in_step());
    }

    pub fn hide(&mut self) {
        self.steps.clear();
        self.steps.push_back(self.fade_out_step());
    }

    /// Back to fully transparent with nothing queued.
    pub fn reset(&mut self) {
        self.steps.clear();
        self.pending_title = None;
        self.alpha = 0.0;
        self.text_alpha = 0.0;
        self.texts_visible = false;
    }

    pub fn fade_in(&self) -> Duration {
        self.settings.fade_in()
    }

    pub fn fade_out(&self) -> Duration {
        self.settings.fade_out()
    }

    pub fn max_alpha(&self) -> f32 {
        self.settings.max_alpha
    }

    pub fn color(&self) -> [f32; 3] {
        self.settings.color
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn text_alpha(&self) -> f32 {
        self.text_alpha
    }

    pub fn texts_visible(&self) -> bool {
        self.texts_visible
    }

    pub fn is_idle(&self) -> bool {
        self.steps.is_empty()
    }

    /// Target alpha of the fade currently running, if the front step is a fade.
    pub fn fade_target(&self) -> Option<f32> {
        match self.steps.front() {
            Some(OverlayStep::Fade(fade)) => Some(fade.to),
            _ => None,
        }
    }

    /// Number of fades queued, including the running one.
    pub fn queued_fades(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, OverlayStep::Fade(_)))
            .count()
    }

    /// Title text set by `show_title` that has not been put on screen yet.
    pub fn take_title(&mut self) -> Option<String> {
        self.pending_title.take()
    }

    pub fn tick(&mut self, delta: Duration) {
        let max_alpha = self.settings.max_alpha;
        let Some(step) = self.steps.front_mut() else {
            return;
        };

        let finished = match step {
            OverlayStep::Hold(timer) => {
                timer.tick(delta);
                timer.is_finished()
            }
            OverlayStep::Fade(fade) => {
                if !fade.started {
                    fade.started = true;
                    if fade.reveal {
                        self.text_alpha = 0.0;
                    }
                    self.texts_visible = true;
                }

                fade.elapsed += delta;
                if fade.elapsed < fade.duration {
                    let t = (fade.elapsed.as_secs_f32() / fade.duration.as_secs_f32()).clamp(0.0, 1.0);
                    self.alpha = fade.from + (fade.to - fade.from) * t;
                    self.text_alpha = text_alpha_for(self.alpha, max_alpha, fade.reveal);
                    false
                } else {
                    // Snap to the exact target so no rounding error is left behind.
                    self.alpha = fade.to;
                    if fade.reveal {
                        self.text_alpha = 1.0;
                    } else {
                        self.text_alpha = 0.0;
                        self.texts_visible = false;
                    }
                    true
                }
            }
        };

        if finished {
            self.steps.pop_front();
        }
    }

    fn fade_in_step(&self) -> OverlayStep {
        OverlayStep::Fade(Fade {
            from: 0.0,
            to: self.settings.max_alpha,
            duration: self.settings.fade_in(),
            elapsed: Duration::ZERO,
            reveal: true,
            started: false,
        })
    }

    fn fade_out_step(&self) -> OverlayStep {
        OverlayStep::Fade(Fade {
            from: self.settings.max_alpha,
            to: 0.0,
            duration: self.settings.fade_out(),
            elapsed: Duration::ZERO,
            reveal: false,
            started: false,
        })
    }
}

/// Texts follow the overlay, reaching full opacity exactly when the overlay
/// reaches its configured darkness.
fn text_alpha_for(alpha: f32, max_alpha: f32, reveal: bool) -> f32 {
    if max_alpha > 0.0 {
        (alpha / max_alpha).clamp(0.0, 1.0)
    } else if reveal {
        1.0
    } else {
        0.0
    }
}

pub fn advance_overlay(time: Res<Time>, mut overlay: ResMut<RoundOverlay>, mut hud: ResMut<HudText>) {
    if let Some(title) = overlay.take_title() {
        hud.message = title;
    }
    overlay.tick(time.delta());
}
