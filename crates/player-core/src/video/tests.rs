use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ffmpeg_next::Rational;

use super::driver::{DecodeStep, PlayerSession};
use super::queue::FrameQueue;
use super::timing::StreamTiming;
use super::types::{DecodeStatus, FrameBuffer, VideoInfo};
use crate::error::PlayerError;

fn frame(pts: i64) -> FrameBuffer {
    FrameBuffer {
        pixels: vec![0u8; 12],
        pts,
    }
}

fn test_info() -> VideoInfo {
    VideoInfo {
        width: 2,
        height: 2,
        fps: 25.0,
        frame_size: 12,
    }
}

fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn queue_is_fifo_and_bounded() {
    let queue = FrameQueue::new(3);
    assert!(queue.is_empty());
    for pts in [10, 20, 30] {
        queue.push(frame(pts)).expect("queue is open");
    }
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.capacity(), 3);

    let order: Vec<i64> = (0..3).map(|_| queue.pop().expect("frame queued").pts).collect();
    assert_eq!(order, vec![10, 20, 30]);
    assert!(queue.is_empty());
}

#[test]
fn try_pop_never_blocks() {
    let queue = FrameQueue::new(2);
    assert!(queue.try_pop().is_none());
    queue.push(frame(1)).expect("queue is open");
    assert_eq!(queue.try_pop().expect("frame queued").pts, 1);
    assert!(queue.try_pop().is_none());
}

#[test]
fn full_queue_blocks_producer_until_pops() {
    let queue = Arc::new(FrameQueue::new(30));
    let producer_done = Arc::new(AtomicBool::new(false));

    let producer = {
        let queue = Arc::clone(&queue);
        let done = Arc::clone(&producer_done);
        thread::spawn(move || {
            for pts in 0..35 {
                queue.push(frame(pts)).expect("queue stays open");
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    // The producer must fill to capacity and then stall, with the five
    // remaining frames still unsent.
    assert!(wait_until(Duration::from_secs(5), || queue.len() == 30));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(queue.len(), 30);
    assert!(!producer_done.load(Ordering::SeqCst));

    let observed: Vec<i64> = (0..35).map(|_| queue.pop().expect("frame queued").pts).collect();
    producer.join().expect("producer exits");

    assert_eq!(observed, (0..35).collect::<Vec<_>>());
    assert!(producer_done.load(Ordering::SeqCst));
    assert!(queue.is_empty());
}

#[test]
fn close_releases_a_blocked_push_and_returns_the_frame() {
    let queue = Arc::new(FrameQueue::new(1));
    queue.push(frame(1)).expect("queue is open");

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.push(frame(2)))
    };

    thread::sleep(Duration::from_millis(20));
    queue.close();

    let refused = producer.join().expect("producer exits");
    assert_eq!(refused.expect_err("push refused after close").pts, 2);
}

#[test]
fn close_releases_a_blocked_pop() {
    let queue = Arc::new(FrameQueue::new(4));
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(20));
    queue.close();
    assert!(consumer.join().expect("consumer exits").is_none());
}

#[test]
fn closed_queue_drains_then_reports_end() {
    let queue = FrameQueue::new(4);
    queue.push(frame(1)).expect("queue is open");
    queue.push(frame(2)).expect("queue is open");
    assert!(!queue.is_closed());
    queue.close();

    assert!(queue.is_closed());
    assert!(queue.push(frame(3)).is_err());
    assert_eq!(queue.pop().expect("buffered frame").pts, 1);
    assert_eq!(queue.pop().expect("buffered frame").pts, 2);
    assert!(queue.pop().is_none());
}

#[test]
fn timing_derives_delay_and_time_base() {
    let timing =
        StreamTiming::new(Rational::new(25, 1), Rational::new(1, 90000)).expect("valid metadata");
    assert_eq!(timing.fps(), 25.0);
    assert!((timing.frame_delay() - 0.04).abs() < 1e-12);
    assert!((timing.time_base_double() - 1.111e-5).abs() < 1e-8);

    assert_eq!(timing.presentation_micros(90_000), 1_000_000);
    assert_eq!(timing.presentation_micros(45_000), 500_000);
    assert_eq!(timing.presentation_micros(0), 0);
}

#[test]
fn timing_conversion_floors() {
    let timing =
        StreamTiming::new(Rational::new(30, 1), Rational::new(1, 3)).expect("valid metadata");
    // 1/3 s = 333333.33.. us, floored.
    assert_eq!(timing.presentation_micros(1), 333_333);
}

#[test]
fn timing_rejects_malformed_metadata() {
    let zero_fps = StreamTiming::new(Rational::new(0, 1), Rational::new(1, 90000));
    assert!(matches!(
        zero_fps.expect_err("zero fps is malformed"),
        PlayerError::BadStreamMetadata(_)
    ));

    let zero_time_base = StreamTiming::new(Rational::new(25, 1), Rational::new(0, 1));
    assert!(matches!(
        zero_time_base.expect_err("zero time base is malformed"),
        PlayerError::BadStreamMetadata(_)
    ));
}

/// Pushes one frame per call with increasing timestamps, forever.
struct EndlessProducer {
    next_pts: i64,
}

impl DecodeStep for EndlessProducer {
    fn decode(&mut self, queue: &FrameQueue) -> DecodeStatus {
        let pts = self.next_pts;
        self.next_pts += 40_000;
        let _ = queue.push(frame(pts));
        DecodeStatus::Continue
    }
}

/// Emits a fixed number of frames, then fails fatally.
struct FatalAfter {
    remaining: usize,
    next_pts: i64,
}

impl DecodeStep for FatalAfter {
    fn decode(&mut self, queue: &FrameQueue) -> DecodeStatus {
        if self.remaining == 0 {
            return DecodeStatus::Fatal(PlayerError::FrameAllocation(12));
        }
        self.remaining -= 1;
        let pts = self.next_pts;
        self.next_pts += 40_000;
        let _ = queue.push(frame(pts));
        DecodeStatus::Continue
    }
}

/// Reports a rewound source a few times before frames start flowing, the
/// shape of an end-of-stream loop.
struct RetryThenProduce {
    retries: usize,
    next_pts: i64,
}

impl DecodeStep for RetryThenProduce {
    fn decode(&mut self, queue: &FrameQueue) -> DecodeStatus {
        if self.retries > 0 {
            self.retries -= 1;
            return DecodeStatus::Retry;
        }
        let pts = self.next_pts;
        self.next_pts += 40_000;
        let _ = queue.push(frame(pts));
        DecodeStatus::Continue
    }
}

#[test]
fn driver_delivers_frames_in_order_and_closes_after_fatal() {
    let session = PlayerSession::start(|| {
        Ok((
            FatalAfter {
                remaining: 3,
                next_pts: 0,
            },
            test_info(),
        ))
    })
    .expect("session starts");

    let shared = session.shared();
    let observed: Vec<i64> = (0..3)
        .map(|_| shared.queue().pop().expect("frame produced").pts)
        .collect();
    assert_eq!(observed, vec![0, 40_000, 80_000]);

    // After the fatal step the loop exits and closes the queue.
    assert!(shared.queue().pop().is_none());
    assert!(shared.queue().is_closed());
    session.stop();
}

#[test]
fn driver_keeps_looping_through_retries() {
    let session = PlayerSession::start(|| {
        Ok((
            RetryThenProduce {
                retries: 5,
                next_pts: 10,
            },
            test_info(),
        ))
    })
    .expect("session starts");

    let first = session.queue().pop().expect("frames flow after retries");
    assert_eq!(first.pts, 10);
    session.stop();
}

#[test]
fn initialization_failure_surfaces_from_start() {
    let result = PlayerSession::start::<EndlessProducer, _>(|| {
        Err(PlayerError::DecoderInit("no such codec".into()))
    });
    assert!(matches!(
        result.expect_err("factory error propagates"),
        PlayerError::DecoderInit(_)
    ));
}

#[test]
fn stop_unblocks_a_producer_stalled_on_a_full_queue() {
    let session =
        PlayerSession::with_capacity(2, || Ok((EndlessProducer { next_pts: 0 }, test_info())))
            .expect("session starts");
    let shared = session.shared();

    // Let the producer fill the queue and park inside push.
    assert!(wait_until(Duration::from_secs(5), || shared.queue().len() == 2));
    thread::sleep(Duration::from_millis(20));

    // Must return rather than deadlock against the full queue.
    session.stop();
    assert!(!shared.is_playing());

    // Buffered frames stay poppable, then the closed queue reports the end.
    let mut last = -1;
    while let Some(buffer) = shared.queue().try_pop() {
        assert!(buffer.pts > last);
        last = buffer.pts;
    }
    assert!(shared.queue().pop().is_none());
}
