use std::sync::Arc;
use std::time::Duration;

use log::info;
use rand::Rng;

use glimmer::{Animator, Broadcaster, CountdownTimer, EffectKind, Orchestrator, Settings};
use wledlink::{spawn_target_refresh, subnet_broadcast_targets, Targets, WledSender};

#[tokio::main]
async fn main() -> Result<(), String> {
    env_logger::init();

    let settings = Settings::load()?;
    info!(
        "starting with {} LEDs, target {}:{}",
        settings.led_count, settings.target_address, settings.target_port
    );

    let animator = Animator::new(settings.led_count);

    let fixed_endpoint = settings.target_endpoint()?;
    let targets = match fixed_endpoint {
        Some(endpoint) => Targets::new(vec![endpoint]),
        None => Targets::new(subnet_broadcast_targets(settings.target_port)),
    };
    let refresh = fixed_endpoint.is_none().then(|| {
        spawn_target_refresh(
            targets.clone(),
            settings.target_port,
            settings.discovery_interval(),
        )
    });

    let sender = Arc::new(
        WledSender::bind(targets)
            .await
            .map_err(|err| format!("failed to bind UDP sender: {err}"))?,
    );

    let broadcaster = Broadcaster::new(
        animator.clone(),
        sender,
        settings.update_interval(),
        settings.frame_timeout_secs,
    );
    let broadcast_handle = broadcaster.spawn();

    let timer = CountdownTimer::new();
    let orchestrator_handle =
        Orchestrator::new(animator.clone(), broadcaster.clone(), timer.clone()).spawn();

    if settings.autostart {
        let pre_secs = rand::thread_rng()
            .gen_range(settings.pre_countdown_min_secs..=settings.pre_countdown_max_secs);
        info!("autostarting countdown with {pre_secs}s pre-countdown");
        timer.start_with_pre_countdown(
            Duration::from_secs(pre_secs),
            settings.countdown_duration(),
            settings.countdown_deviation(),
        );
    } else {
        broadcaster.set_active(true);
        animator.start_kind(EffectKind::Rainbow).await?;
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| format!("failed to listen for shutdown signal: {err}"))?;
    info!("shutting down");

    timer.stop();
    orchestrator_handle.stop().await;
    broadcast_handle.stop().await;
    if let Some(refresh) = refresh {
        refresh.stop().await;
    }
    animator.stop().await;

    Ok(())
}
