// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the decode loop

mod common;

use common::{MarkerDecoder, MockBackend};
use qr_checkin::backends::camera::{FacingMode, FrameSource, StreamHandle};
use qr_checkin::constants::QualityTier;
use qr_checkin::errors::CaptureErrorKind;
use qr_checkin::frame_processor::{DecodeLoop, LoopExit, StrategyChain};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn decode_loop(markers: &[(u8, &str)]) -> DecodeLoop {
    let chain = StrategyChain::standard(MarkerDecoder::new(markers), 1.2);
    DecodeLoop::new(Arc::new(chain)).with_interval(Duration::from_millis(1))
}

fn live_stream(backend: &MockBackend) -> (FrameSource, StreamHandle) {
    let source = FrameSource::new(backend.arc());
    let handle = source
        .acquire(None, QualityTier::Low, FacingMode::Environment)
        .unwrap();
    (source, handle)
}

#[tokio::test]
async fn test_inverted_only_emits_once() {
    let backend = MockBackend::new(&[("a", "Back Camera")]);
    // Every frame is 200; only its inverse (55) is recognised
    backend.script_frames(&[200; 64]);
    let (source, handle) = live_stream(&backend);

    let calls = Arc::new(AtomicUsize::new(0));
    let texts = Arc::new(Mutex::new(Vec::new()));
    let (calls_in, texts_in) = (Arc::clone(&calls), Arc::clone(&texts));

    let loop_handle = decode_loop(&[(55, "inverted")]).run_until(handle.reader(), move |result| {
        calls_in.fetch_add(1, Ordering::SeqCst);
        texts_in.lock().unwrap().push(result.raw_text);
    });

    let exit = tokio::time::timeout(TIMEOUT, loop_handle.wait()).await.unwrap();
    assert_eq!(exit, LoopExit::Decoded);

    let served = backend.served();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*texts.lock().unwrap(), vec!["inverted".to_string()]);
    // No iterations after the result
    assert_eq!(backend.served(), served);
    assert_eq!(served, 1);

    source.release(Some(&handle));
}

#[tokio::test]
async fn test_cancel_delivers_nothing() {
    let backend = MockBackend::new(&[("a", "Back Camera")]);
    let (source, handle) = live_stream(&backend);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = Arc::clone(&calls);
    let loop_handle = decode_loop(&[(200, "never")]).run_until(handle.reader(), move |_| {
        calls_in.fetch_add(1, Ordering::SeqCst);
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    let exit = tokio::time::timeout(TIMEOUT, loop_handle.cancel_and_wait())
        .await
        .unwrap();
    assert_eq!(exit, LoopExit::Cancelled);
    assert!(loop_handle.is_finished());

    let served = backend.served();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.served(), served);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    source.release(Some(&handle));
}

#[tokio::test]
async fn test_released_stream_ends_loop() {
    let backend = MockBackend::new(&[("a", "Back Camera")]);
    let (source, handle) = live_stream(&backend);

    let loop_handle = decode_loop(&[]).run_until(handle.reader(), |_| {});
    tokio::time::sleep(Duration::from_millis(10)).await;
    source.release(Some(&handle));

    let exit = tokio::time::timeout(TIMEOUT, loop_handle.wait()).await.unwrap();
    match exit {
        LoopExit::StreamEnded(e) => assert_eq!(e.kind, CaptureErrorKind::StreamInterrupted),
        other => panic!("unexpected exit {:?}", other),
    }
}

#[tokio::test]
async fn test_interrupted_stream_ends_loop() {
    let backend = MockBackend::new(&[("a", "Back Camera")]);
    backend.interrupt_after(2);
    let (_source, handle) = live_stream(&backend);

    let loop_handle = decode_loop(&[]).run_until(handle.reader(), |_| {});
    let exit = tokio::time::timeout(TIMEOUT, loop_handle.wait()).await.unwrap();
    assert!(matches!(exit, LoopExit::StreamEnded(_)));
    assert_eq!(backend.served(), 2);
}
