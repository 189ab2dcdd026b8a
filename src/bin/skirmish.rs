//! Headless Skirmish Runner
//!
//! Runs a small scripted-vs-AI battle and prints a per-combat summary plus
//! a final JSON report. Useful for eyeballing engine behaviour and for
//! deterministic regression runs via --seed.

use banneret::ai::{AiBehaviour, AiController, AiDecision};
use banneret::board::{self, GridBoard, PathConstraints};
use banneret::combat::action::Action;
use banneret::combat::playback::PlaybackEvent;
use banneret::combat::{CombatPhaseSolver, Engagement};
use banneret::components::component::Component;
use banneret::components::dispatch;
use banneret::context::BattleContext;
use banneret::core::error::Result;
use banneret::core::types::{Nid, Pos, StatId, Team};
use banneret::item::ItemDef;
use banneret::unit::Unit;
use clap::Parser;
use serde::Serialize;

/// Headless Skirmish Runner - scripted side vs AI side
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run a small deterministic skirmish and output a report")]
struct Args {
    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Map width in tiles
    #[arg(long, default_value_t = 12)]
    map_width: i32,

    /// Map height in tiles
    #[arg(long, default_value_t = 10)]
    map_height: i32,

    /// Maximum turns before the run is called a draw
    #[arg(long, default_value_t = 20)]
    max_turns: u32,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Print each combat's playback events
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct UnitReport {
    nid: String,
    team: String,
    hp: i32,
}

/// JSON output structure
#[derive(Serialize)]
struct SkirmishReport {
    outcome: String,
    turns: u32,
    combats: u32,
    seed: u64,
    survivors: Vec<UnitReport>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut ctx = BattleContext::new(
        Box::new(GridBoard::new(args.map_width, args.map_height)),
        seed,
    );
    let mut controllers = setup(&mut ctx, args.map_width, args.map_height);

    let mut combats = 0u32;
    let mut turns = 0u32;
    for turn in 1..=args.max_turns {
        turns = turn;
        refresh_turn(&mut ctx);

        player_phase(&mut ctx, &mut combats, args.verbose)?;
        if side_defeated(&ctx, Team::Enemy) || side_defeated(&ctx, Team::Player) {
            break;
        }
        enemy_phase(&mut ctx, &mut controllers, &mut combats, args.verbose)?;
        if side_defeated(&ctx, Team::Enemy) || side_defeated(&ctx, Team::Player) {
            break;
        }
    }

    let outcome = if side_defeated(&ctx, Team::Enemy) {
        "player_victory"
    } else if side_defeated(&ctx, Team::Player) {
        "enemy_victory"
    } else {
        "draw"
    };
    let survivors = ctx
        .units
        .iter()
        .filter(|u| u.is_alive())
        .map(|u| UnitReport {
            nid: u.nid.to_string(),
            team: format!("{:?}", u.team),
            hp: u.hp,
        })
        .collect();
    let report = SkirmishReport {
        outcome: outcome.to_string(),
        turns,
        combats,
        seed,
        survivors,
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} after {} turns, {} combats (seed {})",
            report.outcome, report.turns, report.combats, report.seed
        );
        for unit in &report.survivors {
            println!("  {} [{}] {} hp", unit.nid, unit.team, unit.hp);
        }
    }
    Ok(())
}

/// Two small squads facing each other across the map
fn setup(ctx: &mut BattleContext, width: i32, height: i32) -> Vec<AiController> {
    let iron_sword = ctx.items.load(&ItemDef::new(
        "iron_sword",
        vec![
            Component::Weapon,
            Component::TargetsEnemies,
            Component::MinRange { value: 1 },
            Component::MaxRange { value: 1 },
            Component::Damage { value: 6 },
            Component::Hit { value: 85 },
            Component::Crit { value: 5 },
            Component::WeaponType {
                value: "sword".to_string(),
            },
            Component::Uses { starting: 40 },
        ],
    ));
    let short_bow = ctx.items.load(&ItemDef::new(
        "short_bow",
        vec![
            Component::Weapon,
            Component::TargetsEnemies,
            Component::MinRange { value: 2 },
            Component::MaxRange { value: 2 },
            Component::Damage { value: 5 },
            Component::Hit { value: 80 },
            Component::Uses { starting: 30 },
        ],
    ));
    let steel_axe = ctx.items.load(&ItemDef::new(
        "steel_axe",
        vec![
            Component::Weapon,
            Component::TargetsEnemies,
            Component::MinRange { value: 1 },
            Component::MaxRange { value: 1 },
            Component::Damage { value: 9 },
            Component::Hit { value: 70 },
            Component::WeaponType {
                value: "axe".to_string(),
            },
            Component::Uses { starting: 35 },
        ],
    ));
    let iron_axe = ctx.items.load(&ItemDef::new(
        "iron_axe",
        vec![
            Component::Weapon,
            Component::TargetsEnemies,
            Component::MinRange { value: 1 },
            Component::MaxRange { value: 1 },
            Component::Damage { value: 7 },
            Component::Hit { value: 75 },
            Component::WeaponType {
                value: "axe".to_string(),
            },
            Component::Uses { starting: 40 },
        ],
    ));

    let mid = height / 2;
    ctx.place(
        Unit::new("lancer", Team::Player)
            .with_stat(StatId::Hp, 24)
            .with_stat(StatId::Str, 4)
            .with_stat(StatId::Skl, 8)
            .with_stat(StatId::Spd, 7)
            .with_stat(StatId::Def, 5)
            .with_stat(StatId::Mov, 4)
            .at(Pos::new(1, mid - 1))
            .with_item(iron_sword),
    );
    ctx.place(
        Unit::new("archer", Team::Player)
            .with_stat(StatId::Hp, 20)
            .with_stat(StatId::Str, 3)
            .with_stat(StatId::Skl, 9)
            .with_stat(StatId::Spd, 6)
            .with_stat(StatId::Def, 3)
            .with_stat(StatId::Mov, 4)
            .at(Pos::new(1, mid + 1))
            .with_item(short_bow),
    );
    ctx.place(
        Unit::new("brigand", Team::Enemy)
            .with_stat(StatId::Hp, 26)
            .with_stat(StatId::Str, 5)
            .with_stat(StatId::Skl, 5)
            .with_stat(StatId::Spd, 4)
            .with_stat(StatId::Def, 3)
            .with_stat(StatId::Mov, 4)
            .at(Pos::new(width - 2, mid - 1))
            .with_item(steel_axe),
    );
    ctx.place(
        Unit::new("marauder", Team::Enemy)
            .with_stat(StatId::Hp, 22)
            .with_stat(StatId::Str, 4)
            .with_stat(StatId::Skl, 6)
            .with_stat(StatId::Spd, 5)
            .with_stat(StatId::Def, 2)
            .with_stat(StatId::Mov, 4)
            .at(Pos::new(width - 2, mid + 1))
            .with_item(iron_axe),
    );

    vec![
        AiController::new(
            Nid::from("brigand"),
            vec![AiBehaviour::attack(), AiBehaviour::pursue()],
        ),
        AiController::new(
            Nid::from("marauder"),
            vec![AiBehaviour::attack(), AiBehaviour::pursue()],
        ),
    ]
}

fn refresh_turn(ctx: &mut BattleContext) {
    let moves: Vec<(Nid, i32)> = ctx
        .units
        .iter()
        .map(|u| (u.nid.clone(), u.stat(StatId::Mov)))
        .collect();
    for (nid, mov) in moves {
        if let Some(unit) = ctx.units.get_mut(&nid) {
            unit.movement_left = mov;
            unit.finished = false;
            unit.has_attacked = false;
        }
    }
}

fn side_defeated(ctx: &BattleContext, team: Team) -> bool {
    !ctx.units.iter().any(|u| u.team == team && u.is_alive())
}

/// Scripted player side: close with the nearest enemy and swing when in
/// range
fn player_phase(ctx: &mut BattleContext, combats: &mut u32, verbose: bool) -> Result<()> {
    let roster: Vec<Nid> = ctx
        .units
        .iter()
        .filter(|u| u.team == Team::Player && u.is_alive())
        .map(|u| u.nid.clone())
        .collect();
    for nid in roster {
        let Some(unit) = ctx.units.get(&nid) else {
            continue;
        };
        let Some(mut here) = unit.position else {
            continue;
        };
        let Some(goal) = nearest_enemy(ctx, &nid) else {
            continue;
        };
        let Some(item_id) = dispatch::get_weapon(unit, &ctx.items) else {
            continue;
        };
        let unit = ctx.unit(&nid)?;
        let item = ctx.item(item_id)?;
        let min = dispatch::minimum_range(unit, item);
        let max = dispatch::maximum_range(unit, item);

        if !(min..=max).contains(&here.distance(goal)) {
            let team = unit.team;
            let movement = unit.movement_left;
            if let Some(path) = ctx.board.shortest_path(
                here,
                goal,
                PathConstraints {
                    adj_good_enough: true,
                    mover_team: Some(team),
                },
            ) {
                if let Some(stop) = board::travel_along(&*ctx.board, &path, movement) {
                    let cost = here.distance(stop) as i32;
                    Action::Move {
                        unit: nid.clone(),
                        to: stop,
                        cost,
                    }
                    .apply(ctx);
                    here = stop;
                }
            }
        }
        if (min..=max).contains(&here.distance(goal)) {
            run_engagement(ctx, &nid, item_id, goal, verbose)?;
            *combats += 1;
        }
    }
    Ok(())
}

fn enemy_phase(
    ctx: &mut BattleContext,
    controllers: &mut [AiController],
    combats: &mut u32,
    verbose: bool,
) -> Result<()> {
    for controller in controllers.iter_mut() {
        controller.reset();
        let mut slices = 0;
        while !controller.think(ctx)? {
            slices += 1;
            if slices > 100_000 {
                break;
            }
        }
        match controller.take_decision() {
            Some(AiDecision::Attack {
                item,
                target_pos,
                move_to,
            }) => {
                let Some(actor) = acting_unit(controller.unit(), ctx) else {
                    continue;
                };
                let here = ctx.unit(&actor)?.position;
                if here != Some(move_to) {
                    let cost = here.map(|h| h.distance(move_to) as i32).unwrap_or(0);
                    Action::Move {
                        unit: actor.clone(),
                        to: move_to,
                        cost,
                    }
                    .apply(ctx);
                }
                run_engagement(ctx, &actor, item, target_pos, verbose)?;
                *combats += 1;
                if let Some(retreat) = controller.canto_retreat(ctx) {
                    Action::Move {
                        unit: actor.clone(),
                        to: retreat,
                        cost: 0,
                    }
                    .apply(ctx);
                }
                Action::Wait { unit: actor }.apply(ctx);
            }
            Some(AiDecision::MoveTo { pos, .. }) => {
                let Some(actor) = acting_unit(controller.unit(), ctx) else {
                    continue;
                };
                let cost = ctx
                    .unit(&actor)?
                    .position
                    .map(|h| h.distance(pos) as i32)
                    .unwrap_or(0);
                Action::Move {
                    unit: actor.clone(),
                    to: pos,
                    cost,
                }
                .apply(ctx);
                Action::Wait { unit: actor }.apply(ctx);
            }
            Some(AiDecision::Pass) | None => {}
        }
    }
    Ok(())
}

fn run_engagement(
    ctx: &mut BattleContext,
    attacker: &Nid,
    item: banneret::item::ItemId,
    target_pos: Pos,
    verbose: bool,
) -> Result<()> {
    let engagement = Engagement::engage(ctx, attacker, item, vec![target_pos])?;
    let mut solver = CombatPhaseSolver::new(ctx, engagement)?;
    while !solver.is_exhausted() {
        let (_, playback) = solver.step(ctx)?;
        if verbose {
            for event in &playback {
                if let PlaybackEvent::DamageHit {
                    attacker,
                    defender,
                    damage,
                }
                | PlaybackEvent::DamageCrit {
                    attacker,
                    defender,
                    damage,
                } = event
                {
                    eprintln!("  {attacker} hits {defender} for {damage}");
                }
            }
        }
        solver.advance();
    }
    Ok(())
}

fn nearest_enemy(ctx: &BattleContext, nid: &Nid) -> Option<Pos> {
    let unit = ctx.units.get(nid)?;
    let here = unit.position?;
    ctx.units
        .iter()
        .filter(|u| u.is_alive() && unit.team.is_enemy(u.team))
        .filter_map(|u| u.position)
        .min_by_key(|pos| here.distance(*pos))
}

fn acting_unit(nid: &Nid, ctx: &BattleContext) -> Option<Nid> {
    ctx.units
        .get(nid)
        .filter(|u| u.is_alive())
        .map(|u| u.nid.clone())
}
