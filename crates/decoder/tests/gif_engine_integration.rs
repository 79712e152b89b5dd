//! End-to-end integration tests for the GIF engine behind `SessionManager`.
//!
//! GIF files are generated in-process with `gif::Encoder`, so these tests run
//! on any platform without fixtures:
//!
//! ```bash
//! cargo test -p gp-decoder --test gif_engine_integration
//! ```

use std::borrow::Cow;
use std::io::{Cursor, Write};
use std::sync::Arc;

use gp_common::{CachingStrategy, DecodeStatus, Dimensions, SessionError, SessionId};
use gp_decoder::{BundledResources, DirAssetProvider, GifEngine, GifSource, SessionManager};

// ---------------------------------------------------------------------------
// Helpers: synthetic GIFs
// ---------------------------------------------------------------------------

const PALETTE: [u8; 12] = [255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
const RED: u32 = 0xFFFF_0000;
const GREEN: u32 = 0xFF00_FF00;
const BLUE: u32 = 0xFF00_00FF;
const WHITE: u32 = 0xFFFF_FFFF;

/// One frame: palette index, delay (centiseconds), and the sub-rectangle it covers.
struct FrameSpec {
    index: u8,
    delay: u16,
    left: u16,
    top: u16,
    width: u16,
    height: u16,
}

impl FrameSpec {
    fn full(index: u8, delay: u16, width: u16, height: u16) -> Self {
        Self {
            index,
            delay,
            left: 0,
            top: 0,
            width,
            height,
        }
    }
}

fn encode(width: u16, height: u16, frames: &[FrameSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, width, height, &PALETTE).unwrap();
        for spec in frames {
            let pixels = vec![spec.index; spec.width as usize * spec.height as usize];
            let frame = gif::Frame {
                left: spec.left,
                top: spec.top,
                width: spec.width,
                height: spec.height,
                delay: spec.delay,
                dispose: gif::DisposalMethod::Keep,
                buffer: Cow::Owned(pixels),
                ..gif::Frame::default()
            };
            encoder.write_frame(&frame).unwrap();
        }
    }
    out
}

/// Four full-canvas 4x4 frames: red, green, blue, white.
fn four_colour_gif() -> Vec<u8> {
    encode(
        4,
        4,
        &[
            FrameSpec::full(0, 10, 4, 4),
            FrameSpec::full(1, 10, 4, 4),
            FrameSpec::full(2, 10, 4, 4),
            FrameSpec::full(3, 10, 4, 4),
        ],
    )
}

fn manager() -> SessionManager {
    SessionManager::new(GifEngine::new())
}

fn solid(pixels: &[u32], colour: u32) -> bool {
    pixels.iter().all(|px| *px == colour)
}

// ---------------------------------------------------------------------------
// Loading from every source kind
// ---------------------------------------------------------------------------

#[test]
fn load_from_bytes_reports_metadata() {
    let manager = manager();
    let id = manager.load(GifSource::bytes(four_colour_gif())).unwrap();

    let meta = manager.metadata(id).unwrap();
    assert_eq!(meta.frame_count, 4);
    assert_eq!(meta.dimensions(), Dimensions::new(4, 4));
    assert_eq!(meta.delay_of(3), 100);
    assert_eq!(meta.current_frame, 0);
    assert_eq!(meta.status, DecodeStatus::Ok);
    assert_eq!(meta.loop_duration_ms(), 400);
}

#[test]
fn load_from_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&four_colour_gif()).unwrap();

    let manager = manager();
    let id = manager.load(GifSource::path(file.path())).unwrap();
    assert_eq!(manager.frame_count(id).unwrap(), 4);
}

#[test]
fn load_from_stream_asset_and_resource() {
    let manager = manager();

    let from_stream = manager
        .load(GifSource::stream(Cursor::new(four_colour_gif())))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("anim.gif"), four_colour_gif()).unwrap();
    let assets = Arc::new(DirAssetProvider::new(dir.path()));
    let from_asset = manager.load(GifSource::asset(assets, "anim.gif")).unwrap();

    let mut resources = BundledResources::new();
    resources.insert(42, four_colour_gif());
    let from_resource = manager
        .load(GifSource::resource(Arc::new(resources), 42))
        .unwrap();

    for id in [from_stream, from_asset, from_resource] {
        assert_eq!(manager.frame_count(id).unwrap(), 4);
    }
    assert_eq!(manager.live_count(), 3);
}

#[test]
fn invalid_bytes_fail_to_load() {
    let manager = manager();
    let err = manager.load(GifSource::bytes(b"GIF89a-truncated".to_vec())).unwrap_err();
    assert!(matches!(err, SessionError::LoadFailed { .. }));
    assert_eq!(manager.live_count(), 0);
}

#[test]
fn missing_file_fails_to_load() {
    let manager = manager();
    let err = manager
        .load(GifSource::path("/nonexistent/dir/anim.gif"))
        .unwrap_err();
    assert!(matches!(err, SessionError::LoadFailed { status: 0 }));
}

// ---------------------------------------------------------------------------
// Frame stepping and compositing
// ---------------------------------------------------------------------------

#[test]
fn frames_composite_with_disposal() {
    // Frame 1 only paints the top-left 2x2 corner; frame 0 must show through.
    let data = encode(
        4,
        4,
        &[
            FrameSpec::full(0, 10, 4, 4),
            FrameSpec {
                index: 1,
                delay: 10,
                left: 0,
                top: 0,
                width: 2,
                height: 2,
            },
        ],
    );
    let manager = manager();
    let id = manager.load(GifSource::bytes(data)).unwrap();

    let mut pixels = vec![0u32; 16];
    manager.copy_frame_pixels(&mut pixels, 1, id).unwrap();
    assert_eq!(pixels[0], GREEN);
    assert_eq!(pixels[5], GREEN);
    assert_eq!(pixels[3], RED);
    assert_eq!(pixels[15], RED);
}

#[test]
fn sequential_advance_matches_seek() {
    let manager = manager();

    let stepped = manager.load(GifSource::bytes(four_colour_gif())).unwrap();
    for frame in 1..4 {
        manager.advance_to(frame, stepped).unwrap();
    }
    let by_steps = manager.frame_pixels(stepped).unwrap();

    let seeked = manager.load(GifSource::bytes(four_colour_gif())).unwrap();
    manager.seek_forward(seeked, 3).unwrap();
    let by_seek = manager.frame_pixels(seeked).unwrap();

    assert_eq!(by_steps, by_seek);
    assert!(solid(&by_seek, WHITE));
}

#[test]
fn seek_wraps_through_last_frame() {
    let manager = manager();
    let id = manager.load(GifSource::bytes(four_colour_gif())).unwrap();
    manager.seek_forward(id, 3).unwrap();
    manager.seek_forward(id, 1).unwrap();
    assert_eq!(manager.current_frame(id).unwrap(), 1);
    assert!(solid(&manager.frame_pixels(id).unwrap(), GREEN));
}

#[test]
fn out_of_range_frame_is_rejected() {
    let manager = manager();
    let id = manager.load(GifSource::bytes(four_colour_gif())).unwrap();
    let err = manager.advance_to(4, id).unwrap_err();
    assert!(matches!(
        err,
        SessionError::FrameOutOfRange {
            frame: 4,
            frame_count: 4
        }
    ));
}

#[test]
fn wrong_buffer_size_is_reported() {
    let manager = manager();
    let id = manager.load(GifSource::bytes(four_colour_gif())).unwrap();
    let mut small = vec![1u32; 15];
    let err = manager.copy_pixels(&mut small, id).unwrap_err();
    assert!(matches!(
        err,
        SessionError::WrongBufferSize {
            expected: 16,
            actual: 15
        }
    ));
    assert!(solid(&small, 1));
}

// ---------------------------------------------------------------------------
// Caching strategies
// ---------------------------------------------------------------------------

#[test]
fn every_strategy_yields_identical_frames() {
    let mut reference: Option<Vec<Vec<u32>>> = None;
    for strategy in [
        CachingStrategy::Disabled,
        CachingStrategy::WhenDecoded,
        CachingStrategy::PreCache,
    ] {
        let manager = manager();
        manager.set_caching_strategy(strategy);
        let id = manager.load(GifSource::bytes(four_colour_gif())).unwrap();

        // Two full loops, so the second pass exercises rewinds or cache hits.
        let mut frames = Vec::new();
        let mut buf = vec![0u32; 16];
        for step in 0..8u32 {
            let frame = step % 4;
            if frame != 0 || step != 0 {
                manager.advance_to(frame, id).unwrap();
            }
            manager.copy_pixels(&mut buf, id).unwrap();
            frames.push(buf.clone());
        }

        assert!(solid(&frames[2], BLUE), "{strategy:?}");
        assert_eq!(frames[..4], frames[4..], "{strategy:?}");
        match &reference {
            Some(expected) => assert_eq!(expected, &frames, "{strategy:?}"),
            None => reference = Some(frames),
        }
    }
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[test]
fn destroyed_session_is_unreachable() {
    let manager = manager();
    let id = manager.load(GifSource::bytes(four_colour_gif())).unwrap();
    assert!(manager.destroy(id));
    assert!(!manager.is_alive(id));
    assert!(matches!(
        manager.metadata(id),
        Err(SessionError::NoSuchSession(_))
    ));
    assert!(!manager.destroy(id));
    assert!(!manager.destroy(SessionId::INVALID));
}
