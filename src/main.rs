//! Pie in the Sky Server
//!
//! Headless demo: two AI players fight until one wins, then a replica
//! replays the executed messages to check the result is reproducible.
//!
//! Usage: `pie-in-the-sky-server [config.json]`

use anyhow::{bail, Context};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pie_in_the_sky::{
    TICK_RATE, VERSION,
    game::{
        ai::AiActor,
        config::GameConfig,
        engine::Engine,
        events::GameEventData,
        token::ActorId,
    },
    session::{Broadcast, Replica},
};

/// Frames before the demo gives up on a winner (10 minutes at 60 Hz).
const MAX_FRAMES: u64 = 36_000;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Pie in the Sky Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            GameConfig::from_json_str(&text).with_context(|| format!("loading {path}"))?
        }
        None => GameConfig::default(),
    };

    demo_match(config)
}

/// Run one AI-vs-AI match and verify it by replay.
fn demo_match(config: GameConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let dt = 1.0 / TICK_RATE as f64;
    let mut engine = Engine::new(config.clone())?;
    for i in 0..config.num_players as u32 {
        let seed = 12345 + u64::from(i);
        engine.add_actor(Box::new(AiActor::new(
            ActorId(i + 1),
            format!("ai-{}", i + 1),
            seed,
            config.ai_fire_interval,
            config.ai_aim_jitter,
        )));
    }

    let mut broadcasts = Vec::new();
    let mut total_events = 0;

    let report = engine.start()?;
    broadcasts.extend(report.applied.iter().map(|a| Broadcast::from_applied(report.frame, a)));
    info!(
        players = engine.world().players().len(),
        tokens = engine.world().registry().len(),
        "Field laid out"
    );

    while !engine.world().is_over() && engine.world().frame() < MAX_FRAMES {
        let report = engine.update(dt)?;
        broadcasts.extend(report.applied.iter().map(|a| Broadcast::from_applied(report.frame, a)));
        total_events += report.events.len();

        // Report every 10 seconds
        if report.frame % (10 * u64::from(TICK_RATE)) == 0 {
            let world = engine.world();
            info!(
                "Frame {}: {} bullets, {} targets, {} events so far",
                report.frame,
                world.bullets().count(),
                world.targets().count(),
                total_events
            );
        }

        for event in &report.events {
            match &event.data {
                GameEventData::BulletHit { struck, struck_kind, destroyed: true, shooter, .. } => {
                    info!("{:?} {} destroyed by player {}", struck_kind, struck, shooter);
                }
                GameEventData::GameEnded { winner } => {
                    info!("Match ended! Winner: player {}", winner);
                }
                GameEventData::MessageRejected { sender, message, reason } => {
                    debug!("{} rejected for {}: {}", message, sender, reason);
                }
                _ => {}
            }
        }
    }

    // Print final results
    info!("=== Match Results ===");
    let world = engine.world();
    match world.winner() {
        Some(winner) => info!("Winner: player {} at frame {}", winner, world.frame()),
        None => warn!("No winner after {} frames", world.frame()),
    }
    for player in world.players().values() {
        info!(
            "Player {} ({}): {} targets left, arsenal {}/{}",
            player.id,
            player.name,
            player.targets.len(),
            player.arsenal(),
            player.max_arsenal()
        );
    }
    let hash = world.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));
    info!("Total events: {}", total_events);

    // Verify determinism by replaying
    info!("=== Verifying Determinism ===");
    let mut replica = Replica::new(config, dt);
    for broadcast in &broadcasts {
        replica.apply(broadcast)?;
    }
    replica.advance_to(world.frame())?;
    let replay_hash = replica.world().compute_hash();

    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash != replay_hash {
        bail!("DETERMINISM FAILURE: Hashes differ!");
    }
    info!("DETERMINISM VERIFIED: Hashes match!");
    Ok(())
}
