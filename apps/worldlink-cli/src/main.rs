use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use worldlink_common::{Delta, EntityId, Field, SharedEntity, VIDEO_MARKER, Vector3};
use worldlink_input::{ManualPose, Viewpoint};
use worldlink_kernel::{RemoteLogSink, SyncConfig, WorldManager};
use worldlink_protocol::{ClientInfo, InboundEvent, OutboundMessage, RecordingBus, SceneEvent, Welcome};
use worldlink_tools::{Loopback, SyncInspector};

#[derive(Parser)]
#[command(name = "worldlink-cli", about = "CLI tool for worldlink operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config file (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Validate and print the effective config
    Config {
        /// Write the effective config to this path
        #[arg(long)]
        write: Option<PathBuf>,
    },
    /// Run an offline session against a scripted server
    Simulate {
        /// Number of sampling periods to run
        #[arg(short, long, default_value = "10")]
        ticks: u64,
        /// World to enter
        #[arg(short, long)]
        world: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let remote_log = RemoteLogSink::new();
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .with(remote_log.layer())
        .init();

    let config = match &cli.config {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SyncConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("worldlink-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("tools: {}", worldlink_tools::crate_info());
            println!(
                "engine: fps={} tolerance={} server={}",
                config.fps, config.tolerance, config.server_url
            );
        }
        Commands::Config { write } => {
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if let Some(path) = write {
                config
                    .save(&path)
                    .with_context(|| format!("writing config {}", path.display()))?;
                println!("written to {}", path.display());
            }
        }
        Commands::Simulate { ticks, world } => {
            config.validate()?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            runtime.block_on(simulate(config, world, ticks, remote_log))?;
        }
    }

    Ok(())
}

fn welcome(id: u64, permanents: Vec<SharedEntity>) -> InboundEvent {
    InboundEvent::Welcome(Welcome {
        client: ClientInfo {
            id: EntityId(id),
            ..ClientInfo::default()
        },
        permanents,
    })
}

fn added(entity: SharedEntity, scene_size: usize) -> InboundEvent {
    InboundEvent::Scene(SceneEvent::added(entity, scene_size))
}

async fn simulate(
    config: SyncConfig,
    world: Option<String>,
    ticks: u64,
    remote_log: RemoteLogSink,
) -> anyhow::Result<()> {
    let bus = RecordingBus::new();
    let pose = ManualPose::new();
    let loopback = Loopback::new();
    let mut manager = WorldManager::new(
        config,
        Box::new(bus.clone()),
        Box::new(pose.clone()),
        loopback.collaborators(),
    );
    manager.attach_remote_log(remote_log);
    manager.set_world(world);
    manager.add_my_change_listener(Rc::new(|changes: &[Delta]| {
        tracing::debug!(count = changes.len(), "local changes published");
    }));

    // Scripted server: acknowledge the connection and, if asked, the world.
    let entered = manager.enter(vec![Delta::new(Field::Name, "cli")]);
    let fountain = SharedEntity::new(EntityId(100)).with_mesh("/content/fountain.glb");
    manager.handle(welcome(1, vec![fountain]));
    if manager.session().pending_phase().is_some() {
        manager.handle(welcome(1, Vec::new()));
    }
    let accepted = entered
        .await
        .context("enter was dropped")?
        .context("enter failed")?;
    println!("entered as client {}", accepted.client.id);

    let bot = SharedEntity {
        has_avatar: true,
        name: Some("bot".into()),
        ..SharedEntity::new(EntityId(2)).with_mesh("/babylon/dolphin/dolphin.glb")
    };
    manager.handle(added(bot, 2));
    manager.handle(added(SharedEntity::new(EntityId(3)).with_mesh("/content/crate.glb"), 3));
    manager.handle(added(SharedEntity::new(EntityId(4)).with_mesh(VIDEO_MARKER), 4));
    loopback.pump(&mut manager);

    let period = manager.config().tick_period();
    let dt = period.as_secs_f32();
    let mut interval = tokio::time::interval(period);
    for step in 0..ticks {
        interval.tick().await;
        let t = step as f32 * dt;
        pose.set_viewpoint(Some(Viewpoint::at(Vec3::new(t.sin(), 1.6, t.cos()))));
        manager.handle(InboundEvent::Changes {
            id: EntityId(2),
            changes: vec![Delta::new(Field::Position, Vector3::new(t, 0.0, 0.0))],
        });
        manager.poll_timer(Instant::now());
        manager.advance(dt);
        loopback.pump(&mut manager);
    }

    manager.handle(InboundEvent::Scene(SceneEvent::removed(EntityId(3), 3)));

    println!("{}", SyncInspector::summary(&manager));
    for id in SyncInspector::list_entities(&manager) {
        if let Some(info) = SyncInspector::inspect_entity(&manager, id) {
            println!("  {info}");
        }
    }
    let sent = bus.messages();
    let batches = sent
        .iter()
        .filter(|m| matches!(m, OutboundMessage::MyChanges(_)))
        .count();
    println!("sent {} messages, {batches} change batches", sent.len());

    manager.handle(InboundEvent::Connection(false));
    println!("{}", SyncInspector::summary(&manager));
    Ok(())
}
