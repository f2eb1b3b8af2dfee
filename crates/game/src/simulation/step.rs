use crate::collision::ScoreEvent;
use crate::rules::GameRules;
use crate::runner::{EliminationCause, Landing, RunnerState, WORLD_UNITS_PER_METER};
use crate::session::{PlayerId, Session};
use crate::track::{MysteryKind, Segment, SegmentKind};

#[derive(Debug, Default)]
pub struct RunnerStep {
    pub landing: Option<Landing>,
    pub score_events: Vec<ScoreEvent>,
}

/// Moves one living runner and settles everything its new position triggers:
/// landing score, combo, speed boost and item pickups.
pub fn advance_runner(
    rules: &GameRules,
    runner: &mut RunnerState,
    holding_jump: bool,
    segments: &mut [Segment],
    time_factor: f32,
    now_ms: f64,
) -> RunnerStep {
    let mut step = RunnerStep::default();
    if !runner.alive {
        return step;
    }

    let motion = rules.motion();
    let collision = rules.collision();
    let speed = motion.config().speed_multiplier(runner.distance_meters());

    step.landing = motion.advance(runner, segments, speed, holding_jump, time_factor, now_ms);
    if let Some(landing) = step.landing.as_ref().filter(|l| l.was_airborne) {
        step.score_events.extend(collision.landing_bonus(runner, landing));
        step.score_events.extend(collision.register_combo(runner, landing));
        if landing.kind == SegmentKind::Mystery(MysteryKind::SpeedBoost) {
            motion.apply_speed_boost(runner);
        }
    }
    step.score_events.extend(collision.resolve(runner, segments));
    step
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elimination {
    pub player_id: PlayerId,
    pub cause: EliminationCause,
    pub final_score: i64,
}

#[derive(Debug, Default)]
pub struct StepReport {
    /// Segments generated during this step, in track order.
    pub new_segments: Vec<Segment>,
    pub eliminations: Vec<Elimination>,
    pub score_events: Vec<(PlayerId, ScoreEvent)>,
    pub pruned: usize,
}

/// One authoritative step of a session: runners move, the track grows ahead of
/// the leader, eliminations are checked, then segments behind everyone are dropped.
pub fn step_session(
    session: &mut Session,
    rules: &GameRules,
    time_factor: f32,
    dt_ms: f64,
) -> StepReport {
    let mut report = StepReport::default();
    session.advance_clock(dt_ms);
    let now_ms = session.elapsed_ms();
    let prior_leader = session.leader_x();
    let world = rules.world();

    let (participants, track) = session.split_mut();

    for (&player_id, participant) in participants.iter_mut() {
        let step = advance_runner(
            rules,
            &mut participant.runner,
            participant.holding_jump,
            track.segments_mut(),
            time_factor,
            now_ms,
        );
        report
            .score_events
            .extend(step.score_events.into_iter().map(|e| (player_id, e)));
    }

    let leader_x = participants
        .values()
        .map(|p| p.runner.position.x)
        .fold(prior_leader, f32::max);
    let difficulty = rules.difficulty(leader_x / WORLD_UNITS_PER_METER);
    report.new_segments = track.extend_to(leader_x + world.lookahead, difficulty);

    for (&player_id, participant) in participants.iter_mut() {
        let runner = &mut participant.runner;
        if let Some(cause) = rules
            .collision()
            .check_elimination(runner, track.segments(), now_ms)
        {
            report.eliminations.push(Elimination {
                player_id,
                cause,
                final_score: runner.total_score(),
            });
        }
    }

    let rearmost = participants
        .values()
        .filter(|p| p.runner.alive)
        .map(|p| p.runner.position.x)
        .reduce(f32::min);
    if let Some(rearmost) = rearmost {
        report.pruned = track.prune_behind(rearmost - world.prune_margin);
    }

    session.record_leader(leader_x);
    report
}
