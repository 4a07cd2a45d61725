//! Sprite player demo.
//!
//! Opens a raylib window and plays a sprite sheet or an image sequence with
//! keyboard transport controls:
//!
//! | key | action |
//! |-----|--------|
//! | Space | play / pause |
//! | R | replay from frame 0 |
//! | H | seek to 0.5 s (fps mode only) |
//! | Left / Right | step one frame |
//!
//! # Main Loop
//!
//! 1. Service asset requests: files are read with [`FileFetcher`], images
//!    become textures in a [`TextureStore`] and the player only sees their keys
//! 2. [`SpritePlayer::run_frame`] polls the load and delivers due redraw
//!    callbacks
//! 3. Keys are mapped to transport calls
//! 4. Whatever the [`RetainedCanvas`] shows is drawn, scaled, with a status
//!    line kept up to date by event listeners
//!
//! # Running
//!
//! ```sh
//! cargo run --release --features raylib -- --options demo/underground.json --root demo
//! cargo run --release --features raylib -- --sheet walk.png --frame-count 8 \
//!     --frame-width 32 --frame-height 32 --draw-mode fps --draw-clock 12 --loop --listen ended
//! ```

// Do not create console on Windows
#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use raylib::prelude::*;

use spriteplayer::components::sprite::FrameRect;
use spriteplayer::resources::loader::{AssetPayload, AssetRequest, DeferredLoader, FileFetcher};
use spriteplayer::resources::scheduler::{Clock, FrameQueue, WallClock};
use spriteplayer::resources::surface::{CanvasContent, RetainedCanvas};
use spriteplayer::{
    DrawMode, EventKind, PlayerError, PlayerEvent, PlayerResult, RawOptions, SpritePlayer,
};

const STATUS_BAR_HEIGHT: i32 = 32;
const MIN_WINDOW_SIZE: i32 = 320;

type DemoPlayer = SpritePlayer<DeferredLoader<usize>, RetainedCanvas<usize>, FrameQueue, WallClock>;

/// Sprite sheet / image sequence player
#[derive(Parser)]
#[command(version, about = "Plays a sprite sheet or an image sequence in a window.")]
struct Cli {
    /// Options file (.json or .ini). Flags below override its values.
    #[arg(long, value_name = "PATH")]
    options: Option<PathBuf>,

    /// Sprite sheet image
    #[arg(long, value_name = "URL")]
    sheet: Option<String>,

    /// Sequence manifest listing one image per frame
    #[arg(long, value_name = "URL")]
    sequence: Option<String>,

    /// Manifest entry delimiter
    #[arg(long)]
    delimiter: Option<String>,

    #[arg(long)]
    frame_count: Option<u32>,

    #[arg(long)]
    frame_width: Option<u32>,

    #[arg(long)]
    frame_height: Option<u32>,

    #[arg(long)]
    sprites_per_row: Option<u32>,

    /// repaint or fps
    #[arg(long)]
    draw_mode: Option<DrawMode>,

    /// Callbacks to skip (repaint) or frames per second (fps)
    #[arg(long)]
    draw_clock: Option<u32>,

    #[arg(long = "loop")]
    looped: bool,

    #[arg(long)]
    auto_play: bool,

    #[arg(long)]
    clear_before_draw: bool,

    /// Directory asset URLs are resolved against
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Window pixels per frame pixel
    #[arg(long, default_value_t = 2)]
    scale: u32,

    /// Log every event of this kind (play, pause, ended, timeupdate)
    #[arg(long = "listen", value_name = "EVENT")]
    listen: Vec<String>,
}

impl Cli {
    fn raw_options(&self) -> PlayerResult<RawOptions> {
        let mut options = match &self.options {
            Some(path) => RawOptions::load_file(path)?,
            None => RawOptions::new(),
        };
        if let Some(url) = &self.sheet {
            options = options.with_sheet(url.as_str());
        }
        if let Some(url) = &self.sequence {
            options = options.with_sequence(url.as_str());
        }
        if let Some(delimiter) = &self.delimiter {
            options = options.with_delimiter(delimiter.as_str());
        }
        if let Some(count) = self.frame_count {
            options = options.with_frame_count(count);
        }
        if let (Some(w), Some(h)) = (self.frame_width, self.frame_height) {
            options = options.with_frame_size(w, h);
        }
        if let Some(per_row) = self.sprites_per_row {
            options = options.with_sprites_per_row(per_row);
        }
        if let Some(mode) = self.draw_mode {
            options = options.with_draw_mode(mode);
        }
        if let Some(clock) = self.draw_clock {
            options = options.with_draw_clock(clock);
        }
        if self.looped {
            options = options.with_loop(true);
        }
        if self.auto_play {
            options = options.with_auto_play(true);
        }
        if self.clear_before_draw {
            options = options.with_clear_before_draw(true);
        }
        Ok(options)
    }

    fn listen_kinds(&self) -> PlayerResult<Vec<EventKind>> {
        self.listen
            .iter()
            .map(|name| {
                EventKind::from_name(name)
                    .ok_or_else(|| PlayerError::config(format!("unknown event '{name}'")))
            })
            .collect()
    }
}

/// Textures owned by the demo; the player refers to them by index.
#[derive(Default)]
struct TextureStore {
    textures: Vec<Texture2D>,
}

impl TextureStore {
    fn insert(&mut self, texture: Texture2D) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    fn get(&self, key: usize) -> Option<&Texture2D> {
        self.textures.get(key)
    }
}

/// What the status line shows, updated from event listeners.
struct StatusLine {
    label: &'static str,
    frame: u32,
    time: Option<f64>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let options_and_kinds = cli
        .raw_options()
        .and_then(|options| Ok((options, cli.listen_kinds()?)));
    let (options, listen_kinds) = match options_and_kinds {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let clock = WallClock::new();
    let mut player: DemoPlayer = match SpritePlayer::from_options(
        &options,
        DeferredLoader::new(),
        RetainedCanvas::new(),
        FrameQueue::new(),
        clock,
    ) {
        Ok(player) => player,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let status = Rc::new(RefCell::new(StatusLine {
        label: "Stopped",
        frame: 0,
        time: None,
    }));
    attach_status_listeners(&mut player, &status);
    for kind in listen_kinds {
        player.listen(kind, |event, ctx| {
            log::info!("{event:?} at frame {}", ctx.status().current_frame);
        });
    }

    let scale = i32::try_from(cli.scale.max(1)).unwrap_or(i32::MAX);
    let canvas_w = scaled(player.config().frame_width, scale);
    let canvas_h = scaled(player.config().frame_height, scale);
    let (mut rl, thread) = raylib::init()
        .size(
            canvas_w.max(MIN_WINDOW_SIZE),
            canvas_h.max(MIN_WINDOW_SIZE) + STATUS_BAR_HEIGHT,
        )
        .title("Sprite Player")
        .build();
    rl.set_target_fps(60);

    let fetcher = FileFetcher::new(&cli.root);
    let mut textures = TextureStore::default();
    let frame_count = player.config().frame_count;

    log::info!("Sprite player ready: {frame_count} frame(s)");

    while !rl.window_should_close() {
        service_requests(&mut rl, &thread, &fetcher, &mut textures, &mut player);

        // errors are already logged and kept in last_error
        let _ = player.run_frame(clock.now_ms());

        handle_keys(&rl, &mut player);

        let line = {
            let s = status.borrow();
            match s.time {
                Some(t) => format!("{}  {} of {}  {:.2}s", s.label, s.frame + 1, frame_count, t),
                None => format!("{}  {} of {}", s.label, s.frame + 1, frame_count),
            }
        };
        let error_line = player.last_error().map(|e| e.to_string());

        let mut d = rl.begin_drawing(&thread);
        d.clear_background(Color::DARKGRAY);
        draw_canvas(&mut d, &textures, player.surface(), scale);
        let bar_y = d.get_screen_height() - STATUS_BAR_HEIGHT;
        d.draw_rectangle(0, bar_y, d.get_screen_width(), STATUS_BAR_HEIGHT, Color::BLACK);
        d.draw_text(&line, 8, bar_y + 8, 16, Color::RAYWHITE);
        if let Some(err) = error_line {
            d.draw_text(&err, 8, 8, 10, Color::RED);
        }
    }
}

fn attach_status_listeners(player: &mut DemoPlayer, status: &Rc<RefCell<StatusLine>>) {
    for kind in [EventKind::Play, EventKind::Pause, EventKind::Ended] {
        let status = Rc::clone(status);
        player.listen(kind, move |event, _| {
            status.borrow_mut().label = match event {
                PlayerEvent::Play => "Playing",
                PlayerEvent::Pause => "Paused",
                _ => "Ended",
            };
        });
    }
    let status = Rc::clone(status);
    player.listen(EventKind::TimeUpdate, move |event, _| {
        if let PlayerEvent::TimeUpdate { frame, time } = event {
            let mut s = status.borrow_mut();
            s.frame = *frame;
            s.time = *time;
        }
    });
}

fn handle_keys(rl: &RaylibHandle, player: &mut DemoPlayer) {
    if rl.is_key_pressed(KeyboardKey::KEY_SPACE) {
        if player.is_playing() {
            player.pause();
        } else {
            let _ = player.play();
        }
    }
    if rl.is_key_pressed(KeyboardKey::KEY_R) {
        player.set_current_frame(0);
        let _ = player.play();
    }
    if rl.is_key_pressed(KeyboardKey::KEY_H) {
        let _ = player.set_current_time(0.5);
    }
    if rl.is_key_pressed(KeyboardKey::KEY_RIGHT) {
        player.set_current_frame(player.current_frame() + 1);
    }
    if rl.is_key_pressed(KeyboardKey::KEY_LEFT) {
        player.set_current_frame(player.current_frame().saturating_sub(1));
    }
}

/// Answer the player's asset requests. Runs on the render thread because
/// textures can only be created there.
fn service_requests(
    rl: &mut RaylibHandle,
    thread: &RaylibThread,
    fetcher: &FileFetcher,
    textures: &mut TextureStore,
    player: &mut DemoPlayer,
) {
    for (ticket, request) in player.loader_mut().take_requests() {
        let result = fetch_request(rl, thread, fetcher, textures, &request);
        player.loader_mut().complete(ticket, result);
    }
}

fn fetch_request(
    rl: &mut RaylibHandle,
    thread: &RaylibThread,
    fetcher: &FileFetcher,
    textures: &mut TextureStore,
    request: &AssetRequest,
) -> PlayerResult<AssetPayload<usize>> {
    let url = request.url();
    match fetcher.fetch(request)? {
        AssetPayload::Text(text) => Ok(AssetPayload::Text(text)),
        AssetPayload::Image(bytes) => {
            let filetype = Path::new(url)
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_else(|| ".png".to_string());
            let image = Image::load_image_from_mem(&filetype, &bytes)
                .map_err(|e| PlayerError::load(url, e.to_string()))?;
            let texture = rl
                .load_texture_from_image(thread, &image)
                .map_err(|e| PlayerError::load(url, e.to_string()))?;
            log::debug!("Texture {url} loaded ({}x{})", texture.width, texture.height);
            Ok(AssetPayload::Image(textures.insert(texture)))
        }
    }
}

fn draw_canvas(
    d: &mut RaylibDrawHandle,
    textures: &TextureStore,
    canvas: &RetainedCanvas<usize>,
    scale: i32,
) {
    let dest = Rectangle {
        x: 0.0,
        y: 0.0,
        width: scaled(canvas.width, scale) as f32,
        height: scaled(canvas.height, scale) as f32,
    };
    let (key, src) = match canvas.content() {
        CanvasContent::Blank => return,
        CanvasContent::Region { image, src } => (*image, to_rectangle(*src)),
        CanvasContent::Image(image) => {
            let Some(tex) = textures.get(*image) else {
                return;
            };
            let full = Rectangle {
                x: 0.0,
                y: 0.0,
                width: tex.width as f32,
                height: tex.height as f32,
            };
            (*image, full)
        }
    };
    if let Some(tex) = textures.get(key) {
        d.draw_texture_pro(tex, src, dest, Vector2::zero(), 0.0, Color::WHITE);
    }
}

fn scaled(pixels: u32, scale: i32) -> i32 {
    i32::try_from(pixels)
        .unwrap_or(i32::MAX)
        .saturating_mul(scale)
}

fn to_rectangle(rect: FrameRect) -> Rectangle {
    Rectangle {
        x: rect.x as f32,
        y: rect.y as f32,
        width: rect.width as f32,
        height: rect.height as f32,
    }
}
