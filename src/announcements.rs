// announcements.rs - Every piece of text the round flow puts on screen.

use std::fmt::Write;
use std::time::Duration;

use crate::roster::Roster;

pub const DRAW: &str = "EMPATE!";
pub const TIMEOUT: &str = "¡TIEMPO AGOTADO!\nAMBOS JUGADORES PIERDEN";

pub fn round_banner(round_number: u32) -> String {
    format!("ROUND {round_number}")
}

/// `TIEMPO: mm:ss`, whole seconds, never negative.
pub fn countdown(remaining: Duration) -> String {
    let total = remaining.as_secs();
    format!("TIEMPO: {:02}:{:02}", total / 60, total % 60)
}

/// The round result: headline, then every player's tally. When somebody has
/// just won the whole game, the headline and tally give way to the game-winner
/// line and the total match time.
pub fn end_message(
    roster: &Roster,
    round_winner: Option<usize>,
    game_winner: Option<(usize, Duration)>,
) -> String {
    if let Some((winner, total)) = game_winner {
        if let Some(combatant) = roster.get(winner) {
            let seconds = total.as_secs();
            return format!(
                "{} GANA EL JUEGO!\nTIEMPO TOTAL: {}m {}s\n",
                combatant.label,
                seconds / 60,
                seconds % 60
            );
        }
    }

    let mut message = match round_winner.and_then(|index| roster.get(index)) {
        Some(combatant) => format!("{} GANA LA RONDA!", combatant.label),
        None => DRAW.to_string(),
    };

    message.push_str("\n\n\n\n");
    for combatant in roster.combatants() {
        let _ = writeln!(message, "{}: {} GANA", combatant.label, combatant.wins);
    }
    message
}

/// Closing summary with every player's final number of wins.
pub fn final_summary(roster: &Roster, game_winner: usize) -> String {
    let mut summary = String::new();
    if let Some(combatant) = roster.get(game_winner) {
        let _ = writeln!(summary, "{} GANA EL JUEGO!", combatant.label);
    }
    for combatant in roster.combatants() {
        let _ = writeln!(summary, "{}: {} VICTORIAS", combatant.label, combatant.wins);
    }
    summary
}
