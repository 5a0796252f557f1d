// match_flow.rs - The round state machine.
//
// A match goes TitleDisplay → (RoundStarting → RoundPlaying → RoundEnding)* →
// MatchOver, and MatchOver drops straight back to a fresh TitleDisplay.
//
// Every wait inside a phase is explicit: the `PhaseStep` resource says what the
// current phase is parked on (a one-frame yield or a timer) and what to do once
// it is over. `advance_phase` is the only thing that moves it forward.

use std::time::Duration;

use bevy::prelude::*;

use crate::{
    announcements,
    auto_shooting::AutoShooter,
    bot_spawner::{respawn_bots, BotPopulation},
    config::{BotSettings, MatchSettings, ShootingSettings},
    hud::HudText,
    overlay::RoundOverlay,
    roster::{
        is_alive, reset_combatants, spawn_combatants, ControlAuthority, Eliminated, MatchEntity,
        Roster, Tank,
    },
    shell::clear_shells,
};

pub struct MatchFlowPlugin;

impl Plugin for MatchFlowPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<MatchPhase>()
            .init_resource::<MatchSettings>()
            .init_resource::<ShootingSettings>()
            .init_resource::<BotSettings>()
            .init_resource::<HudText>()
            .init_resource::<Roster>()
            .init_resource::<BotPopulation>()
            .init_resource::<RoundState>()
            .init_resource::<MatchClock>()
            .init_resource::<PhaseStep>()
            // The round flow decides first, then the overlay/HUD react, then the shooting happens.
            .configure_sets(
                Update,
                (MatchSet::Flow, MatchSet::Presentation, MatchSet::Combat).chain(),
            )
            .add_systems(OnEnter(MatchPhase::TitleDisplay), setup_match)
            .add_systems(
                OnEnter(MatchPhase::RoundStarting),
                (
                    reset_combatants,
                    clear_shells,
                    disable_control,
                    respawn_bots,
                    announce_round,
                )
                    .chain(),
            )
            .add_systems(
                OnEnter(MatchPhase::RoundPlaying),
                (enable_control, begin_play).chain(),
            )
            .add_systems(
                OnEnter(MatchPhase::RoundEnding),
                (disable_control, conclude_round).chain(),
            )
            .add_systems(OnEnter(MatchPhase::MatchOver), return_to_title)
            .add_systems(
                Update,
                (
                    poll_round.run_if(in_state(MatchPhase::RoundPlaying)),
                    advance_phase,
                )
                    .in_set(MatchSet::Flow),
            );
    }
}

#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchPhase {
    #[default]
    TitleDisplay,
    RoundStarting,
    RoundPlaying,
    RoundEnding,
    MatchOver,
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchSet {
    Flow,
    Presentation,
    Combat,
}

/// Why the last round stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundExit {
    LastTankStanding,
    TimeCap,
}

#[derive(Resource, Debug, Default)]
pub struct RoundState {
    /// 0 before the first round, then 1, 2, ...
    pub round_number: u32,
    pub exit: Option<RoundExit>,
    /// Roster index of the round winner, None for a draw.
    pub winner: Option<usize>,
    pub game_winner: Option<usize>,
}

/// Match-wide clock. Times are `Time::elapsed()` readings.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct MatchClock {
    pub started_at: Duration,
    pub max_duration: Duration,
    pub ended_at: Option<Duration>,
}

impl MatchClock {
    pub fn start(now: Duration, max_duration: Duration) -> Self {
        Self {
            started_at: now,
            max_duration,
            ended_at: None,
        }
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }

    /// Never negative, even on the frame the cap is overshot.
    pub fn remaining(&self, now: Duration) -> Duration {
        self.max_duration.saturating_sub(self.elapsed(now))
    }

    pub fn is_expired(&self, now: Duration) -> bool {
        self.elapsed(now) >= self.max_duration
    }
}

/// What to do when the current wait is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    PlayTitle,
    StartRounds,
    RevealArena,
    BeginPlay,
    NextRound,
    EndMatch,
}

/// Where the current phase is suspended.
#[derive(Resource, Debug, Default)]
pub enum PhaseStep {
    /// Nothing pending; the phase is driven by its own polling (RoundPlaying).
    #[default]
    Idle,
    /// Give up this frame, continue next frame.
    Yield(Continuation),
    Ready(Continuation),
    Wait(Timer, Continuation),
}

impl PhaseStep {
    pub fn wait(duration: Duration, then: Continuation) -> Self {
        PhaseStep::Wait(Timer::new(duration, TimerMode::Once), then)
    }
}

fn advance_phase(
    time: Res<Time>,
    settings: Res<MatchSettings>,
    mut step: ResMut<PhaseStep>,
    mut next: ResMut<NextState<MatchPhase>>,
    mut overlay: Option<ResMut<RoundOverlay>>,
) {
    let continuation = match &mut *step {
        PhaseStep::Idle => return,
        PhaseStep::Yield(then) => {
            let then = *then;
            *step = PhaseStep::Ready(then);
            return;
        }
        PhaseStep::Ready(then) => *then,
        PhaseStep::Wait(timer, then) => {
            timer.tick(time.delta());
            if !timer.is_finished() {
                return;
            }
            *then
        }
    };
    *step = PhaseStep::Idle;

    match continuation {
        Continuation::PlayTitle => match overlay.as_deref_mut() {
            Some(overlay) => {
                overlay.show_title(settings.title_text.clone(), settings.title_hold());
                *step = PhaseStep::wait(
                    settings.title_hold().saturating_add(overlay.fade_in()),
                    Continuation::StartRounds,
                );
            }
            None => next.set(MatchPhase::RoundStarting),
        },
        Continuation::StartRounds | Continuation::NextRound => next.set(MatchPhase::RoundStarting),
        Continuation::RevealArena => {
            // Wait exactly as long as the overlay takes to fade out.
            let fade_out = match overlay.as_deref_mut() {
                Some(overlay) => {
                    overlay.hide();
                    overlay.fade_out()
                }
                None => Duration::ZERO,
            };
            *step = PhaseStep::wait(fade_out, Continuation::BeginPlay);
        }
        Continuation::BeginPlay => next.set(MatchPhase::RoundPlaying),
        Continuation::EndMatch => next.set(MatchPhase::MatchOver),
    }
}

fn setup_match(
    mut commands: Commands,
    time: Res<Time>,
    settings: Res<MatchSettings>,
    shooting: Res<ShootingSettings>,
    mut roster: ResMut<Roster>,
    mut round: ResMut<RoundState>,
    mut clock: ResMut<MatchClock>,
    mut step: ResMut<PhaseStep>,
) {
    spawn_combatants(&mut commands, &settings, &shooting, &mut roster);
    *round = RoundState::default();
    *clock = MatchClock::start(time.elapsed(), settings.max_game_time());
    // Let everything spawned this frame settle before the title plays.
    *step = PhaseStep::Yield(Continuation::PlayTitle);

    info!(
        "Match set up: {} players, first to {} rounds, {}s time cap",
        roster.len(),
        settings.rounds_to_win,
        settings.max_game_time
    );
}

fn set_control_authority(
    enabled: bool,
    roster: &Roster,
    population: &BotPopulation,
    controls: &mut Query<&mut ControlAuthority>,
    shooters: &mut Query<&mut AutoShooter>,
) {
    for combatant in roster.combatants() {
        if let Ok(mut control) = controls.get_mut(combatant.entity) {
            control.0 = enabled;
        }
    }
    for &bot in population.handles() {
        if let Ok(mut shooter) = shooters.get_mut(bot) {
            shooter.can_shoot = enabled;
        }
    }
}

fn enable_control(
    roster: Res<Roster>,
    population: Res<BotPopulation>,
    mut controls: Query<&mut ControlAuthority>,
    mut shooters: Query<&mut AutoShooter>,
) {
    set_control_authority(true, &roster, &population, &mut controls, &mut shooters);
}

fn disable_control(
    roster: Res<Roster>,
    population: Res<BotPopulation>,
    mut controls: Query<&mut ControlAuthority>,
    mut shooters: Query<&mut AutoShooter>,
) {
    set_control_authority(false, &roster, &population, &mut controls, &mut shooters);
}

fn announce_round(
    settings: Res<MatchSettings>,
    mut round: ResMut<RoundState>,
    mut hud: ResMut<HudText>,
    mut overlay: Option<ResMut<RoundOverlay>>,
    mut step: ResMut<PhaseStep>,
) {
    round.round_number += 1;
    round.exit = None;
    round.winner = None;

    hud.message = announcements::round_banner(round.round_number);
    if let Some(overlay) = overlay.as_deref_mut() {
        overlay.show();
    }
    *step = PhaseStep::wait(settings.start_delay(), Continuation::RevealArena);

    info!("Round {} starting", round.round_number);
}

fn begin_play(mut hud: ResMut<HudText>, mut step: ResMut<PhaseStep>) {
    hud.message.clear();
    *step = PhaseStep::Idle;
}

/// Runs every frame of RoundPlaying until one tank is left or time is up.
fn poll_round(
    time: Res<Time>,
    clock: Res<MatchClock>,
    roster: Res<Roster>,
    tanks: Query<Has<Eliminated>, With<Tank>>,
    mut hud: ResMut<HudText>,
    mut round: ResMut<RoundState>,
    mut next: ResMut<NextState<MatchPhase>>,
) {
    if roster.one_tank_left(|entity| is_alive(&tanks, entity)) {
        round.exit = Some(RoundExit::LastTankStanding);
        next.set(MatchPhase::RoundEnding);
        return;
    }

    let now = time.elapsed();
    hud.timer = announcements::countdown(clock.remaining(now));

    if clock.is_expired(now) {
        round.exit = Some(RoundExit::TimeCap);
        next.set(MatchPhase::RoundEnding);
    }
}

fn conclude_round(
    time: Res<Time>,
    settings: Res<MatchSettings>,
    tanks: Query<Has<Eliminated>, With<Tank>>,
    mut roster: ResMut<Roster>,
    mut round: ResMut<RoundState>,
    mut clock: ResMut<MatchClock>,
    mut hud: ResMut<HudText>,
    mut overlay: Option<ResMut<RoundOverlay>>,
    mut step: ResMut<PhaseStep>,
) {
    let exit = round.exit.unwrap_or(RoundExit::LastTankStanding);
    // Running out of time is a loss for everybody, whoever happens to be standing.
    let winner = match exit {
        RoundExit::LastTankStanding => roster.round_winner(|entity| is_alive(&tanks, entity)),
        RoundExit::TimeCap => None,
    };
    if let Some(index) = winner {
        roster.award_round(index);
    }
    round.winner = winner;
    round.game_winner = roster.game_winner(settings.rounds_to_win);

    hud.timer.clear();
    if let Some(overlay) = overlay.as_deref_mut() {
        overlay.show();
    }

    if exit == RoundExit::TimeCap {
        warn!("Time cap reached during round {}", round.round_number);
        hud.message = announcements::TIMEOUT.to_string();
        *step = PhaseStep::wait(settings.final_delay(), Continuation::EndMatch);
        return;
    }

    if let Some(game_winner) = round.game_winner {
        let now = time.elapsed();
        clock.ended_at = Some(now);
        let total = clock.elapsed(now);

        hud.message = format!(
            "{}\n\n{}",
            announcements::end_message(&roster, winner, Some((game_winner, total))),
            announcements::final_summary(&roster, game_winner)
        );
        if let Some(combatant) = roster.get(game_winner) {
            info!(
                "{} wins the match after {} rounds ({:.1}s)",
                combatant.label,
                round.round_number,
                total.as_secs_f32()
            );
        }
        *step = PhaseStep::wait(settings.final_delay(), Continuation::EndMatch);
        return;
    }

    hud.message = announcements::end_message(&roster, winner, None);
    match winner.and_then(|index| roster.get(index)) {
        Some(combatant) => info!("{} wins round {}", combatant.label, round.round_number),
        None => info!("Round {} is a draw", round.round_number),
    }
    *step = PhaseStep::wait(settings.end_delay(), Continuation::NextRound);
}

/// Tears the finished match down and goes back to the title, like reloading
/// the entry screen.
fn return_to_title(
    mut commands: Commands,
    entities: Query<Entity, With<MatchEntity>>,
    mut roster: ResMut<Roster>,
    mut population: ResMut<BotPopulation>,
    mut round: ResMut<RoundState>,
    mut hud: ResMut<HudText>,
    mut overlay: Option<ResMut<RoundOverlay>>,
    mut step: ResMut<PhaseStep>,
    mut next: ResMut<NextState<MatchPhase>>,
) {
    for entity in &entities {
        commands.entity(entity).despawn();
    }
    roster.clear();
    population.clear();
    *round = RoundState::default();
    hud.clear();
    if let Some(overlay) = overlay.as_deref_mut() {
        overlay.reset();
    }
    *step = PhaseStep::Idle;
    next.set(MatchPhase::TitleDisplay);

    info!("Match over, returning to the title screen");
}

#[cfg(test)]
mod tests {
    use bevy::{state::app::StatesPlugin, time::TimeUpdateStrategy};

    use super::*;
    use crate::{
        config::{OverlaySettings, SpawnPoint},
        overlay::OverlayPlugin,
    };

    const FRAME: Duration = Duration::from_millis(50);

    fn quick_settings(players: usize) -> MatchSettings {
        MatchSettings {
            start_delay: 0.2,
            end_delay: 0.2,
            final_delay: 0.3,
            title_hold: 0.1,
            spawn_points: (0..players)
                .map(|i| SpawnPoint {
                    position: [i as f32 * 10.0, 0.0, 0.0],
                    yaw_degrees: 0.0,
                    color: [1.0, 1.0, 1.0],
                })
                .collect(),
            ..default()
        }
    }

    fn headless_app(settings: MatchSettings, bots: usize, with_overlay: bool) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, StatesPlugin))
            .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME))
            .insert_resource(settings)
            .insert_resource(BotSettings {
                number_of_bots: bots,
                ..default()
            })
            .add_plugins(MatchFlowPlugin);
        if with_overlay {
            app.insert_resource(OverlaySettings {
                fade_in: 0.1,
                fade_out: 0.1,
                ..default()
            })
            .add_plugins(OverlayPlugin);
        }
        app
    }

    fn phase(app: &App) -> MatchPhase {
        *app.world().resource::<State<MatchPhase>>().get()
    }

    fn run_until(app: &mut App, target: MatchPhase, max_frames: usize) -> bool {
        for _ in 0..max_frames {
            app.update();
            if phase(app) == target {
                return true;
            }
        }
        false
    }

    fn eliminate_player(app: &mut App, index: usize) {
        let entity = app.world().resource::<Roster>().combatants()[index].entity;
        app.world_mut().entity_mut(entity).insert(Eliminated);
    }

    fn wins(app: &App) -> Vec<u32> {
        app.world()
            .resource::<Roster>()
            .combatants()
            .iter()
            .map(|c| c.wins)
            .collect()
    }

    fn player_controls(app: &mut App) -> Vec<bool> {
        let mut query = app.world_mut().query::<&ControlAuthority>();
        query.iter(app.world()).map(|control| control.0).collect()
    }

    fn bot_triggers(app: &mut App) -> Vec<bool> {
        let mut query = app.world_mut().query::<&AutoShooter>();
        query.iter(app.world()).map(|shooter| shooter.can_shoot).collect()
    }

    #[test]
    fn test_match_clock_remaining_never_goes_negative() {
        let clock = MatchClock::start(Duration::from_secs(10), Duration::from_secs(240));

        assert_eq!(clock.remaining(Duration::from_secs(70)), Duration::from_secs(180));
        assert!(!clock.is_expired(Duration::from_secs(249)));
        assert!(clock.is_expired(Duration::from_secs(250)));
        assert_eq!(clock.remaining(Duration::from_secs(400)), Duration::ZERO);
    }

    #[test]
    fn test_first_to_five_wins_the_match() {
        let mut app = headless_app(quick_settings(2), 0, true);

        let mut rounds_seen = Vec::new();
        let mut last_ending = None;
        let mut reached_match_over = false;

        for _ in 0..5_000 {
            app.update();

            let round_number = app.world().resource::<RoundState>().round_number;
            if round_number > 0 && rounds_seen.last() != Some(&round_number) {
                rounds_seen.push(round_number);
            }

            match phase(&app) {
                MatchPhase::RoundPlaying => eliminate_player(&mut app, 1),
                MatchPhase::RoundEnding => {
                    let message = app.world().resource::<HudText>().message.clone();
                    last_ending = Some((message, wins(&app)));
                }
                MatchPhase::MatchOver => {
                    reached_match_over = true;
                    break;
                }
                _ => {}
            }
        }

        assert!(reached_match_over, "match never ended");
        assert_eq!(rounds_seen, vec![1, 2, 3, 4, 5]);

        let (message, final_wins) = last_ending.expect("saw at least one round ending");
        assert_eq!(final_wins, vec![5, 0]);
        assert!(message.starts_with("PLAYER 1 GANA EL JUEGO!\nTIEMPO TOTAL: "));
        assert!(message.contains("PLAYER 1: 5 VICTORIAS\nPLAYER 2: 0 VICTORIAS\n"));

        // The next frame starts a brand new match.
        assert!(run_until(&mut app, MatchPhase::TitleDisplay, 5));
        app.update();
        assert_eq!(wins(&app), vec![0, 0]);
        assert_eq!(app.world().resource::<RoundState>().round_number, 0);
        let mut tanks = app.world_mut().query_filtered::<Entity, With<Tank>>();
        assert_eq!(tanks.iter(app.world()).count(), 2);
    }

    #[test]
    fn test_time_cap_ends_the_match_without_a_winner() {
        let mut settings = quick_settings(3);
        settings.max_game_time = 1.5;
        let mut app = headless_app(settings, 0, true);

        let mut ending = None;
        let mut last_timer = String::new();
        let mut reached_match_over = false;

        for _ in 0..500 {
            app.update();
            match phase(&app) {
                MatchPhase::RoundPlaying => {
                    last_timer = app.world().resource::<HudText>().timer.clone();
                }
                MatchPhase::RoundEnding => {
                    let round = app.world().resource::<RoundState>();
                    ending = Some((
                        app.world().resource::<HudText>().message.clone(),
                        round.exit,
                        round.round_number,
                        wins(&app),
                    ));
                }
                MatchPhase::MatchOver => {
                    reached_match_over = true;
                    break;
                }
                _ => {}
            }
        }

        assert!(reached_match_over, "time cap never ended the match");
        let (message, exit, round_number, final_wins) = ending.expect("round ended");
        assert_eq!(message, announcements::TIMEOUT);
        assert_eq!(exit, Some(RoundExit::TimeCap));
        assert_eq!(round_number, 1);
        assert_eq!(final_wins, vec![0, 0, 0]);
        assert!(last_timer.starts_with("TIEMPO: 00:0"), "timer was {last_timer:?}");
    }

    #[test]
    fn test_round_runs_without_an_overlay() {
        let mut app = headless_app(quick_settings(2), 0, false);

        assert!(run_until(&mut app, MatchPhase::RoundPlaying, 100));
        assert_eq!(app.world().resource::<RoundState>().round_number, 1);
        assert!(app.world().resource::<HudText>().message.is_empty());
    }

    #[test]
    fn test_control_is_only_granted_while_playing() {
        let mut app = headless_app(quick_settings(2), 3, true);

        assert!(run_until(&mut app, MatchPhase::RoundStarting, 100));
        assert_eq!(app.world().resource::<BotPopulation>().len(), 3);
        assert_eq!(player_controls(&mut app), vec![false, false]);
        assert_eq!(bot_triggers(&mut app), vec![false; 3]);

        assert!(run_until(&mut app, MatchPhase::RoundPlaying, 100));
        assert_eq!(player_controls(&mut app), vec![true, true]);
        assert_eq!(bot_triggers(&mut app), vec![true; 3]);

        eliminate_player(&mut app, 0);
        assert!(run_until(&mut app, MatchPhase::RoundEnding, 10));
        assert_eq!(player_controls(&mut app), vec![false, false]);
        assert_eq!(bot_triggers(&mut app), vec![false; 3]);
        assert_eq!(wins(&app), vec![0, 1]);
    }

    #[test]
    fn test_bots_are_replaced_every_round() {
        let mut app = headless_app(quick_settings(2), 4, true);

        assert!(run_until(&mut app, MatchPhase::RoundPlaying, 100));
        let first: Vec<Entity> = app.world().resource::<BotPopulation>().handles().to_vec();

        eliminate_player(&mut app, 0);
        assert!(run_until(&mut app, MatchPhase::RoundStarting, 100));
        let second: Vec<Entity> = app.world().resource::<BotPopulation>().handles().to_vec();

        assert_eq!(second.len(), 4);
        assert!(first.iter().all(|bot| !second.contains(bot)));
        assert_eq!(app.world().resource::<RoundState>().round_number, 2);
    }

    #[test]
    fn test_empty_roster_plays_draw_rounds() {
        let mut app = headless_app(quick_settings(0), 0, true);

        assert!(run_until(&mut app, MatchPhase::RoundEnding, 100));
        assert!(app
            .world()
            .resource::<HudText>()
            .message
            .starts_with(announcements::DRAW));

        assert!(run_until(&mut app, MatchPhase::RoundStarting, 100));
        assert_eq!(app.world().resource::<RoundState>().round_number, 2);
    }

    #[test]
    fn test_title_text_is_shown_before_the_first_round() {
        let mut app = headless_app(quick_settings(2), 0, true);

        let mut saw_title = false;
        for _ in 0..20 {
            app.update();
            if phase(&app) != MatchPhase::TitleDisplay {
                break;
            }
            if app.world().resource::<HudText>().message == "¡TANQUES!" {
                saw_title = true;
            }
        }

        assert!(saw_title);
        assert_eq!(phase(&app), MatchPhase::RoundStarting);
        assert_eq!(app.world().resource::<HudText>().message, "ROUND 1");
    }
}
