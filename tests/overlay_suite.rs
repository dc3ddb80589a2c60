use beatfx::audio::AudioFeatures;
use beatfx::frame::Frame;
use beatfx::messages::{
    draw_text, text_size, ActiveMessage, Animation, MessageBook, MessageOverlay, MessagePosition, Placement,
    DEFAULT_MESSAGES,
};
use std::path::Path;
use std::time::{Duration, Instant};

fn overlay(seed: u64) -> MessageOverlay {
    MessageOverlay::with_seed(
        MessageBook::defaults(),
        Duration::from_secs(10),
        Duration::from_secs(5),
        seed,
    )
}

fn lit_pixels(f: &Frame) -> usize {
    f.data().chunks_exact(3).filter(|p| p.iter().any(|&v| v > 0)).count()
}

// ── MessageBook ─────────────────────────────────────────────────────────────

#[test]
fn book_trims_and_skips_blank_lines() {
    let book = MessageBook::from_lines("  first \n\n\tsecond\n   \nthird");
    assert_eq!(book.messages(), ["first", "second", "third"]);
}

#[test]
fn blank_book_falls_back_to_defaults() {
    let book = MessageBook::from_lines(" \n\n ");
    assert_eq!(book.len(), DEFAULT_MESSAGES.len());
    assert_eq!(book, MessageBook::defaults());
    assert!(!book.is_empty());
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let book = MessageBook::load(Some(Path::new("/nonexistent/beatfx/messages.txt")));
    assert_eq!(book, MessageBook::defaults());
    assert_eq!(MessageBook::load(None), MessageBook::defaults());
}

#[test]
fn messages_file_is_read_line_by_line() {
    let path = std::env::temp_dir().join(format!("beatfx-messages-{}.txt", std::process::id()));
    std::fs::write(&path, "Hands up\nTurn it up\n").expect("write temp file");
    let book = MessageBook::load(Some(&path));
    let _ = std::fs::remove_file(&path);
    assert_eq!(book.messages(), ["Hands up", "Turn it up"]);
}

// ── Scheduling ──────────────────────────────────────────────────────────────

#[test]
fn first_frame_shows_a_message_immediately() {
    let mut o = overlay(1);
    let now = Instant::now();
    o.apply(Frame::new(320, 180), &AudioFeatures::default(), now);
    let active = o.active().expect("a message should be picked on the first frame");
    assert!(DEFAULT_MESSAGES.contains(&active.text.as_str()));
    assert!((1.0..=3.0).contains(&active.scale), "scale {}", active.scale);
    assert_eq!(active.started, now);
}

#[test]
fn message_expires_then_next_waits_for_interval() {
    let mut o = overlay(2);
    let t0 = Instant::now();
    let feats = AudioFeatures::default();
    let frame = Frame::new(320, 180);

    o.apply(frame.clone(), &feats, t0);
    assert!(o.active().is_some());
    o.apply(frame.clone(), &feats, t0 + Duration::from_secs(5));
    assert!(o.active().is_some(), "still within the display duration");

    o.apply(frame.clone(), &feats, t0 + Duration::from_secs(6));
    assert!(o.active().is_none(), "expired after 5 s");
    o.apply(frame.clone(), &feats, t0 + Duration::from_secs(9));
    assert!(o.active().is_none(), "next pick waits for the interval");

    let t1 = t0 + Duration::from_secs(10);
    o.apply(frame, &feats, t1);
    assert_eq!(o.active().map(|m| m.started), Some(t1));
}

#[test]
fn disabled_overlay_leaves_frames_alone() {
    let mut o = overlay(3);
    o.set_enabled(false);
    let frame = Frame::new(320, 180);
    let out = o.apply(frame.clone(), &AudioFeatures::default(), Instant::now());
    assert_eq!(out, frame);
    assert!(o.active().is_none());
}

#[test]
fn shown_message_is_drawn_and_resets_the_interval() {
    let mut o = overlay(4);
    let t0 = Instant::now();
    let mut msg = ActiveMessage::new("BEAT", t0);
    msg.color = [255, 0, 0];
    o.show(msg);

    let out = o.apply(Frame::new(320, 180), &AudioFeatures::default(), t0);
    assert!(out.data().chunks_exact(3).any(|p| p == [255, 0, 0]), "red text expected");
    assert_eq!(o.active().map(|m| m.text.as_str()), Some("BEAT"));
}

#[test]
fn beat_brightens_the_text() {
    let t0 = Instant::now();
    let draw = |beat: bool| {
        let mut o = overlay(5);
        let mut msg = ActiveMessage::new("HI", t0);
        msg.color = [100, 100, 100];
        o.show(msg);
        let feats = AudioFeatures {
            beat,
            ..AudioFeatures::default()
        };
        o.apply(Frame::new(200, 144), &feats, t0)
    };
    let max = |f: &Frame| f.data().iter().copied().max().unwrap_or(0);
    assert_eq!(max(&draw(false)), 100);
    assert_eq!(max(&draw(true)), 150);
}

#[test]
fn every_animation_draws_something_mid_display() {
    let t0 = Instant::now();
    for animation in [Animation::Static, Animation::Scroll, Animation::Pulse, Animation::Wave] {
        let mut o = overlay(6);
        let mut msg = ActiveMessage::new("GO", t0);
        msg.animation = animation;
        msg.glow = true;
        o.show(msg);
        let out = o.apply(
            Frame::new(320, 180),
            &AudioFeatures::default(),
            t0 + Duration::from_millis(2_500),
        );
        assert!(lit_pixels(&out) > 0, "{animation:?} drew nothing");
    }
}

// ── Positions and text ──────────────────────────────────────────────────────

#[test]
fn fixed_position_is_returned_verbatim() {
    let p = MessagePosition::Fixed { x: 12, y: -4 };
    assert_eq!(p.resolve((640, 360), (100, 20), (0.9, 0.1)), (12, -4));
}

#[test]
fn computed_positions_respect_margins() {
    let frame = (640, 360);
    let text = (100, 20);
    let at = |p: Placement| MessagePosition::Computed(p).resolve(frame, text, (0.0, 1.0));
    assert_eq!(at(Placement::Center), (270, 170));
    assert_eq!(at(Placement::Top), (270, 30));
    assert_eq!(at(Placement::Bottom), (270, 310));
    assert_eq!(at(Placement::Left), (30, 170));
    assert_eq!(at(Placement::Right), (510, 170));
    assert_eq!(at(Placement::Random), (30, 310));
}

#[test]
fn random_placement_is_stable_for_fixed_jitter() {
    let p = MessagePosition::Computed(Placement::Random);
    let a = p.resolve((640, 360), (100, 20), (0.25, 0.75));
    let b = p.resolve((640, 360), (100, 20), (0.25, 0.75));
    assert_eq!(a, b);
}

#[test]
fn text_size_scales_with_pixel_size() {
    assert_eq!(text_size("", 3), (0, 15));
    assert_eq!(text_size("A", 1), (3, 5));
    assert_eq!(text_size("AB", 2), (14, 10));
}

#[test]
fn draw_text_clips_at_frame_edges() {
    let mut f = Frame::new(10, 10);
    draw_text(&mut f, "HELLO", -6, -2, 2, [255, 255, 255], 1.0);
    assert!(lit_pixels(&f) > 0);
    let mut g = Frame::new(10, 10);
    draw_text(&mut g, "HELLO", 50, 50, 2, [255, 255, 255], 1.0);
    assert_eq!(lit_pixels(&g), 0);
}
