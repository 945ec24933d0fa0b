use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use glimmer::{
    Animator, Broadcaster, CountdownEvent, CountdownPhase, CountdownTimer, EffectBuilder,
    EffectKind,
};
use wledlink::{Targets, WledSender};

#[tokio::test]
async fn rainbow_then_stop_leaves_a_dark_strip() {
    let animator = Animator::new(30);
    animator.start_kind(EffectKind::Rainbow).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(animator.snapshot().iter().any(|byte| *byte != 0));

    animator.stop().await;
    let snapshot = animator.snapshot();
    assert_eq!(snapshot.len(), 90);
    assert!(snapshot.iter().all(|byte| *byte == 0));
}

#[tokio::test(start_paused = true)]
async fn pre_countdown_sequence_runs_to_completion() {
    let timer = CountdownTimer::new();
    let mut rx = timer.subscribe();

    timer.start_with_pre_countdown(
        Duration::from_secs(3),
        Duration::from_secs(10),
        Duration::ZERO,
    );

    match rx.recv().await.unwrap() {
        CountdownEvent::PreCountdownStarted { duration } => {
            assert_eq!(duration, Duration::from_secs(3));
        }
        other => panic!("expected pre-countdown start, got {other:?}"),
    }

    let mut pre_ticks = 0u32;
    let mut main_ticks = 0u32;
    loop {
        match timeout(Duration::from_secs(120), rx.recv())
            .await
            .expect("countdown stalled")
            .unwrap()
        {
            CountdownEvent::Tick {
                phase: CountdownPhase::PreCountdown,
                ..
            } => pre_ticks += 1,
            CountdownEvent::Tick {
                phase: CountdownPhase::Running,
                ..
            } => main_ticks += 1,
            CountdownEvent::Started { duration } => {
                assert_eq!(duration, Duration::from_secs(10));
                assert_eq!(pre_ticks, 3);
            }
            CountdownEvent::Ended => break,
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(pre_ticks, 3);
    assert_eq!(main_ticks, 10);
    assert!(!timer.is_running());
}

#[tokio::test]
async fn broadcaster_emits_the_exact_wire_frame() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let targets = Targets::new(vec![receiver.local_addr().unwrap()]);
    let sender = Arc::new(WledSender::bind(targets).await.unwrap());

    // A three LED rainbow's first frame is exactly red, green, blue; a long
    // inter-frame delay keeps it on display while the broadcaster samples.
    let animator = Animator::new(3);
    animator
        .start_built(
            EffectBuilder::new(EffectKind::Rainbow).with_speed(Duration::from_secs(10)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let broadcaster = Broadcaster::new(animator.clone(), sender, Duration::from_millis(16), 1);
    broadcaster.set_active(true);
    let handle = broadcaster.spawn();

    let mut buf = [0u8; 32];
    let (len, _) = timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
        .await
        .expect("no frame received")
        .unwrap();
    assert_eq!(
        &buf[..len],
        &[2, 1, 255, 0, 0, 0, 255, 0, 0, 0, 255]
    );

    handle.stop().await;
    animator.stop().await;
}

#[tokio::test]
async fn rejected_effect_leaves_the_running_one_untouched() {
    let animator = Animator::new(4);
    animator
        .start_built(
            EffectBuilder::new(EffectKind::Solid)
                .with_color(glimmer::Rgb::GREEN)
                .with_speed_ms(5),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = animator
        .start_built(EffectBuilder::new(EffectKind::Solid).with_color(glimmer::Rgb::BLACK))
        .await
        .unwrap_err();
    assert!(!err.is_empty());
    assert_eq!(animator.current_effect(), EffectKind::Solid);
    assert_eq!(animator.snapshot()[..3], [0, 255, 0]);

    animator.stop().await;
}
