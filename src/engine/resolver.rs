//! Point → game → set → match state machine.

use rand::Rng;

use super::score::{
    ScoreState, Side, ADVANTAGE, FORTY, GAMES_PER_SET, TIEBREAK_POINTS,
};

/// Play one point: the server wins it with probability `p_server`.
///
/// The outcome depends only on `state`, `p_server` and the next draw from
/// `rng`, so a seeded generator replays the same match.
pub fn resolve_point<R: Rng + ?Sized>(state: &ScoreState, p_server: f64, rng: &mut R) -> ScoreState {
    let winner = if rng.gen::<f64>() < p_server {
        state.server
    } else {
        state.receiver()
    };
    award_point(state, winner)
}

/// Credit one point to `winner` and apply any game/set/match completion.
/// A finished match is returned unchanged.
pub fn award_point(state: &ScoreState, winner: Side) -> ScoreState {
    let mut next = *state;
    if next.is_complete() {
        return next;
    }
    if next.in_tiebreak() {
        tiebreak_point(&mut next, winner);
    } else {
        game_point(&mut next, winner);
    }
    next
}

fn game_point(s: &mut ScoreState, winner: Side) {
    let w = winner.index();
    let l = winner.other().index();
    match (s.points[w], s.points[l]) {
        // Advantage lost, back to deuce.
        (FORTY, ADVANTAGE) => s.points[l] = FORTY,
        (FORTY, FORTY) => s.points[w] = ADVANTAGE,
        (ADVANTAGE, _) | (FORTY, _) => win_game(s, winner),
        _ => s.points[w] += 1,
    }
}

fn win_game(s: &mut ScoreState, winner: Side) {
    let w = winner.index();
    let l = winner.other().index();
    s.points = [0, 0];
    s.games[w] += 1;
    s.server = s.server.other();
    if s.games[w] >= GAMES_PER_SET && s.games[w] >= s.games[l] + 2 {
        win_set(s, winner);
    }
}

fn tiebreak_point(s: &mut ScoreState, winner: Side) {
    let w = winner.index();
    let l = winner.other().index();
    let played = u32::from(s.points[0]) + u32::from(s.points[1]);
    let opened_by = tiebreak_opener(s.server, played);

    s.points[w] += 1;
    if s.points[w] >= TIEBREAK_POINTS && s.points[w] >= s.points[l] + 2 {
        s.points = [0, 0];
        s.games[w] += 1;
        // The tiebreak receiver opens the next set.
        s.server = opened_by.other();
        win_set(s, winner);
    } else if played % 2 == 0 {
        // Service changes after the first point, then every two points.
        s.server = s.server.other();
    }
}

/// Who served the first point of a tiebreak, given who serves point
/// number `played` (zero-based).
fn tiebreak_opener(current: Side, played: u32) -> Side {
    if ((played + 1) / 2) % 2 == 0 {
        current
    } else {
        current.other()
    }
}

fn win_set(s: &mut ScoreState, winner: Side) {
    s.sets[winner.index()] += 1;
    s.games = [0, 0];
}
