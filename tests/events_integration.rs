//! Event bus and asset gate integration tests: subscription management,
//! handler isolation, re-entrant transport calls from handlers, and load
//! coalescing / failure / retry.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use spriteplayer::error::{PlayerError, PlayerResult};
use spriteplayer::resources::loader::{
    AssetLoader, AssetPayload, AssetRequest, DeferredLoader, ThreadedLoader, Ticket,
};
use spriteplayer::resources::scheduler::FrameQueue;
use spriteplayer::resources::surface::{CanvasContent, RetainedCanvas};
use spriteplayer::{EventKind, Listener, PlayState, PlayerEvent, RawOptions, SpritePlayer};

type Player<L> = SpritePlayer<L, RetainedCanvas<String>, FrameQueue, fn() -> f64>;

fn origin() -> f64 {
    0.0
}

fn options() -> RawOptions {
    RawOptions::new()
        .with_frame_count(6)
        .with_frame_size(16, 16)
        .with_sheet("hero.png")
}

fn make_player<L>(loader: L, options: RawOptions) -> Player<L>
where
    L: AssetLoader<Image = String>,
{
    SpritePlayer::from_options(
        &options,
        loader,
        RetainedCanvas::new(),
        FrameQueue::new(),
        origin as fn() -> f64,
    )
    .unwrap()
}

fn deferred() -> Player<DeferredLoader<String>> {
    make_player(DeferredLoader::new(), options())
}

fn serve(request: &AssetRequest) -> PlayerResult<AssetPayload<String>> {
    Ok(AssetPayload::Image(request.url().to_string()))
}

fn load(player: &mut Player<DeferredLoader<String>>) {
    player.loader_mut().service(serve);
    player.poll_assets().unwrap();
}

fn record<L>(player: &mut Player<L>) -> Rc<RefCell<Vec<String>>>
where
    L: AssetLoader<Image = String>,
{
    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in EventKind::ALL {
        let log = Rc::clone(&log);
        player.listen(kind, move |event, _| {
            let entry = match event {
                PlayerEvent::TimeUpdate { frame, .. } => format!("timeupdate {frame}"),
                other => other.name().to_string(),
            };
            log.borrow_mut().push(entry);
        });
    }
    log
}

#[test]
fn play_twice_while_loading_requests_once() {
    let mut player = deferred();
    let log = record(&mut player);
    player.play().unwrap();
    player.play().unwrap();
    assert_eq!(player.loader().issued(), 1);

    load(&mut player);
    player.play().unwrap();
    assert_eq!(*log.borrow(), vec!["play"]);
    assert_eq!(player.loader().issued(), 1);
}

#[test]
fn failed_load_reports_and_later_play_retries() {
    let mut player = deferred();
    let log = record(&mut player);
    player.play().unwrap();
    player
        .loader_mut()
        .service(|request| Err(PlayerError::load(request.url(), "404 Not Found")));

    let err = player.poll_assets().unwrap_err();
    assert!(matches!(err, PlayerError::Load { ref url, .. } if url == "hero.png"));
    assert_eq!(player.last_error(), Some(&err));
    assert_eq!(player.state(), PlayState::Idle);
    assert!(!player.is_loading());
    assert!(log.borrow().is_empty());

    player.play().unwrap();
    assert_eq!(player.loader().issued(), 2);
    load(&mut player);
    assert_eq!(player.state(), PlayState::Playing);
    assert_eq!(*log.borrow(), vec!["play"]);
}

#[test]
fn failed_frame_leaves_no_results_behind() {
    let mut player = make_player(
        DeferredLoader::new(),
        RawOptions::new()
            .with_frame_count(3)
            .with_frame_size(16, 16)
            .with_sequence("clip.txt"),
    );
    player.play().unwrap();
    player
        .loader_mut()
        .service(|_| Ok(AssetPayload::Text("a|b|c".to_string())));
    player.poll_assets().unwrap();
    player.loader_mut().service(|request| match request.url() {
        "a" => Err(PlayerError::load("a", "404 Not Found")),
        url => Ok(AssetPayload::Image(url.to_string())),
    });
    assert!(player.poll_assets().is_err());

    for id in 1..=4 {
        assert!(player.loader_mut().poll(Ticket(id)).is_pending(), "ticket {id}");
    }
    assert!(player.loader().outstanding().is_empty());
}

#[test]
fn pause_twice_emits_one_pause() {
    let mut player = deferred();
    let log = record(&mut player);
    player.play().unwrap();
    load(&mut player);
    player.pause();
    player.pause();
    assert_eq!(*log.borrow(), vec!["play", "pause"]);
}

#[test]
fn off_all_silences_every_event() {
    let mut player = deferred();
    let log = record(&mut player);
    player.off_all();

    assert_eq!(player.emit(PlayerEvent::Play), 0);
    player.play().unwrap();
    load(&mut player);
    player.run_frame(16.0).unwrap();
    player.pause();
    assert!(log.borrow().is_empty());
    assert_eq!(player.draw_count(), 1);
}

#[test]
fn off_removes_one_registration() {
    let mut player = deferred();
    let hits = Rc::new(RefCell::new(0));
    let listener = {
        let hits = Rc::clone(&hits);
        Listener::new(move |_, _| *hits.borrow_mut() += 1)
    };
    player.on(EventKind::Pause, &listener);
    player.on(EventKind::Pause, &listener);

    assert_eq!(player.emit(PlayerEvent::Pause), 2);
    assert!(player.off(EventKind::Pause, &listener));
    assert_eq!(player.emit(PlayerEvent::Pause), 1);
    assert_eq!(*hits.borrow(), 3);

    player.off_kind(EventKind::Pause);
    assert_eq!(player.listener_count(EventKind::Pause), 0);
}

#[test]
fn emit_does_not_change_playback_state() {
    let mut player = deferred();
    let log = record(&mut player);
    assert_eq!(player.emit(PlayerEvent::Ended), 1);
    assert_eq!(*log.borrow(), vec!["ended"]);
    assert_eq!(player.state(), PlayState::Idle);
}

#[test]
fn panicking_handler_does_not_block_others() {
    let mut player = deferred();
    player.listen(EventKind::TimeUpdate, |_, _| panic!("status widget crashed"));
    let log = record(&mut player);
    player.play().unwrap();
    load(&mut player);
    for i in 1..=3 {
        player.run_frame(i as f64 * 16.0).unwrap();
    }
    assert_eq!(
        *log.borrow(),
        vec!["play", "timeupdate 0", "timeupdate 1", "timeupdate 2"]
    );
    assert_eq!(player.state(), PlayState::Playing);
}

#[test]
fn pause_from_play_handler_is_safe() {
    let mut player = deferred();
    let log = record(&mut player);
    player.listen(EventKind::Play, |_, ctx| ctx.pause());
    player.play().unwrap();
    load(&mut player);

    assert_eq!(*log.borrow(), vec!["play", "pause"]);
    assert_eq!(player.state(), PlayState::Idle);
    assert!(player.scheduler().is_idle());
}

#[test]
fn replay_from_ended_handler() {
    let mut player = make_player(DeferredLoader::new(), options().with_frame_count(2));
    let log = record(&mut player);
    let replays = Rc::new(RefCell::new(0));
    {
        let replays = Rc::clone(&replays);
        player.listen(EventKind::Ended, move |_, ctx| {
            let mut n = replays.borrow_mut();
            if *n == 0 {
                *n += 1;
                ctx.play();
            }
        });
    }
    player.play().unwrap();
    load(&mut player);
    for i in 1..=6 {
        player.run_frame(i as f64 * 16.0).unwrap();
    }
    assert_eq!(
        *log.borrow(),
        vec![
            "play",
            "timeupdate 0",
            "timeupdate 1",
            "ended",
            "play",
            "timeupdate 0",
            "timeupdate 1",
            "ended",
        ]
    );
}

#[test]
fn handlers_see_updated_status() {
    let mut player = deferred();
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = Rc::clone(&seen);
        player.listen(EventKind::TimeUpdate, move |event, ctx| {
            let status = *ctx.status();
            if let PlayerEvent::TimeUpdate { frame, .. } = event {
                assert_eq!(status.current_frame, *frame);
            }
            assert!(status.current_frame < status.frame_count);
            seen.borrow_mut().push(status.state);
        });
    }
    player.play().unwrap();
    load(&mut player);
    player.run_frame(16.0).unwrap();
    assert_eq!(*seen.borrow(), vec![PlayState::Playing]);
}

#[test]
fn seek_and_subscribe_from_handler() {
    let mut player = deferred();
    let log = record(&mut player);
    let late = {
        let log = Rc::clone(&log);
        Listener::new(move |_, _| log.borrow_mut().push("late".to_string()))
    };
    player.listen(EventKind::Play, move |_, ctx| {
        ctx.on(EventKind::TimeUpdate, &late);
        ctx.set_current_frame(3);
    });
    player.play().unwrap();
    load(&mut player);

    assert_eq!(*log.borrow(), vec!["play", "timeupdate 3", "late"]);
    player.run_frame(16.0).unwrap();
    assert_eq!(player.current_frame(), 4);
}

#[test]
fn threaded_loader_starts_playback() {
    let loader = ThreadedLoader::spawn(|request: &AssetRequest| {
        Ok(AssetPayload::Image(format!("decoded:{}", request.url())))
    });
    let mut player = make_player(loader, options().with_auto_play(true));
    let log = record(&mut player);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !player.is_playing() {
        assert!(Instant::now() < deadline, "load never completed");
        player.poll_assets().unwrap();
        std::thread::sleep(Duration::from_millis(1));
    }
    player.run_frame(16.0).unwrap();

    assert_eq!(*log.borrow(), vec!["play", "timeupdate 0"]);
    match player.surface().content() {
        CanvasContent::Region { image, src } => {
            assert_eq!(image, "decoded:hero.png");
            assert_eq!((src.x, src.y, src.width, src.height), (0, 0, 16, 16));
        }
        other => panic!("unexpected canvas {other:?}"),
    }
}

#[test]
fn json_options_with_legacy_names() {
    let options = RawOptions::from_json_str(
        r#"{
            "autoPlay": false,
            "drawClock": 10,
            "drawUnit": "fps",
            "frameCount": 20,
            "frameHeight": 270,
            "frameWidth": 480,
            "imgSrc": "assets/underground-traffic.jpg",
            "loop": true,
            "spritesPerRow": 10
        }"#,
    )
    .unwrap();
    let mut player = make_player(DeferredLoader::new(), options);
    assert_eq!(player.config().fps_interval_ms(), Some(100.0));
    assert_eq!(
        (player.surface().width, player.surface().height),
        (480, 270)
    );
    player.play().unwrap();
    load(&mut player);
    player.set_current_frame(12);
    match player.surface().content() {
        CanvasContent::Region { src, .. } => assert_eq!((src.x, src.y), (960, 270)),
        other => panic!("unexpected canvas {other:?}"),
    }
}

#[test]
fn conflicting_sources_fail_construction() {
    let result = SpritePlayer::from_options(
        &options().with_sequence("clip.txt"),
        DeferredLoader::<String>::new(),
        RetainedCanvas::<String>::new(),
        FrameQueue::new(),
        origin as fn() -> f64,
    );
    assert!(matches!(result, Err(PlayerError::Config(_))));
}
