mod config;
mod events;
mod server;
mod simulation;

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use tokio::time::{Instant, MissedTickBehavior};

use config::SandboxConfig;
use events::SandboxEvent;
use server::SyncSandbox;
use tether::{PacketLossSimulation, SyncConfig};

#[derive(Parser)]
#[command(name = "tether-server")]
#[command(about = "Transform sync sandbox: one server, several clients, one moving platform")]
struct Args {
    #[arg(short, long, default_value_t = 3)]
    clients: u32,

    #[arg(short, long, default_value_t = tether::net::DEFAULT_FRAME_RATE)]
    frame_rate: u32,

    #[arg(short, long, default_value_t = 20.0, help = "Simulated seconds to run")]
    duration: f32,

    #[arg(long, default_value_t = tether::net::DEFAULT_SEND_RATE)]
    send_rate: f32,

    #[arg(long, default_value_t = 0.1, help = "Interpolation delay in seconds")]
    interp_delay: f32,

    #[arg(long, default_value_t = 0.5, help = "Seconds before an idle owner stops sending")]
    inactive_delay: f32,

    #[arg(long, help = "Snap to samples instead of interpolating")]
    no_interpolate: bool,

    #[arg(long, default_value_t = 5.0, help = "Largest accepted move per submit")]
    max_move: f32,

    #[arg(long, help = "Pace frames with the wall clock")]
    realtime: bool,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    #[arg(long, help = "Enable global packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,
}

impl Args {
    fn into_config(self) -> Result<SandboxConfig> {
        if self.frame_rate == 0 {
            bail!("frame rate must be positive");
        }
        if !(0.0..=100.0).contains(&self.loss_percent) {
            bail!("loss percent must be within 0-100, got {}", self.loss_percent);
        }

        let global_packet_loss = if self.simulate_packet_loss {
            Some(PacketLossSimulation {
                enabled: true,
                loss_percent: self.loss_percent,
                min_latency_ms: self.min_latency,
                max_latency_ms: self.max_latency.max(self.min_latency),
                jitter_ms: self.jitter,
            })
        } else {
            None
        };

        let sync = SyncConfig {
            send_rate: self.send_rate,
            interpolate: !self.no_interpolate,
            interp_delay: self.interp_delay,
            inactive_delay: self.inactive_delay,
            ..Default::default()
        }
        .validated();

        Ok(SandboxConfig {
            frame_rate: self.frame_rate,
            clients: self.clients,
            duration_secs: self.duration,
            seed: self.seed,
            max_move: self.max_move,
            sync,
            global_packet_loss,
            ..Default::default()
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let realtime = args.realtime;
    let config = args.into_config()?;
    let frame_dt = 1.0 / config.frame_rate as f32;

    log::info!(
        "Sandbox started: {} clients at {} Hz for {:.0}s",
        config.clients,
        config.frame_rate,
        config.duration_secs
    );
    let mut sandbox = SyncSandbox::new(config);
    let running = sandbox.running();

    let mut interval = tokio::time::interval(Duration::from_secs_f32(frame_dt));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last_frame = Instant::now();

    while sandbox.is_running() {
        let delta = if realtime {
            tokio::select! {
                _ = interval.tick() => {}
                result = &mut ctrl_c => {
                    result?;
                    log::info!("Interrupted");
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
            let now = Instant::now();
            let delta = now - last_frame;
            last_frame = now;
            delta.as_secs_f32()
        } else {
            frame_dt
        };

        sandbox.frame(delta);
        for event in sandbox.drain_events() {
            log_event(&event);
        }
    }

    sandbox.shutdown();
    for event in sandbox.drain_events() {
        log_event(&event);
    }

    let net = sandbox.network_stats();
    let stats = sandbox.stats();
    log::info!(
        "Finished at t={:.1}s after {} frames: {} packets sent, {} dropped, {} malformed",
        sandbox.now(),
        stats.frames,
        net.packets_sent,
        net.packets_dropped,
        net.packets_malformed
    );
    log::info!(
        "View error: mean {:.3}, max {:.3} over {} samples; {} sync events",
        stats.mean_error(),
        stats.max_error,
        stats.error_samples,
        stats.sync_events
    );
    Ok(())
}

fn log_event(event: &SandboxEvent) {
    match event {
        SandboxEvent::ClientJoined { client_id } => {
            log::info!("Client {} joined", client_id);
        }
        SandboxEvent::ClientDisconnected { client_id, reason } => {
            log::info!("Client {} {}", client_id, reason.as_str());
        }
        SandboxEvent::Boarded {
            client_id,
            platform,
        } => {
            log::info!(
                "Client {} boarded platform {}:{}",
                client_id,
                platform.owner_id,
                platform.slot_index
            );
        }
        SandboxEvent::Sync { endpoint, event } => {
            log::debug!("[{}] object {}: {}", endpoint, event.object_id(), event.as_str());
        }
    }
}
