// FramePool - lock-free frame recycling between acquisition and pipeline
//
// Object pool built on two SPSC (single producer, single consumer) ring
// buffers. The capture callback must never allocate, so all frame storage is
// allocated up front and circulated between the two threads:
//
// 1. Capture thread pops an empty frame from the pool queue
// 2. Capture thread fills it with downsampled EMG samples
// 3. Capture thread pushes it to the data queue
// 4. Pipeline thread pops it, filters it, extracts band power
// 5. Pipeline thread returns the spent frame to the pool queue
//
// If the pool runs dry (pipeline stalled), the capture thread drops samples
// rather than block or allocate.

use rtrb::{Consumer, Producer};

/// Frames pre-allocated per session. At a 4 Hz update rate this is four
/// seconds of headroom before the capture side has to shed data.
pub const DEFAULT_FRAME_COUNT: usize = 16;

/// One frame of downsampled EMG samples.
pub type EmgFrame = Vec<f32>;

/// Ownership-split ends of the dual-queue system, returned by
/// `FramePool::new`. The capture thread takes `pool_consumer` and
/// `data_producer`; the pipeline thread takes the other two.
pub struct FramePoolChannels {
    /// Capture side pushes filled frames here
    pub data_producer: Producer<EmgFrame>,
    /// Pipeline side pops filled frames here
    pub data_consumer: Consumer<EmgFrame>,
    /// Pipeline side returns spent frames here
    pub pool_producer: Producer<EmgFrame>,
    /// Capture side pops empty frames here
    pub pool_consumer: Consumer<EmgFrame>,
}

/// The capture thread's ends: pop empty, push filled.
pub struct CaptureThreadChannels {
    pub pool_consumer: Consumer<EmgFrame>,
    pub data_producer: Producer<EmgFrame>,
}

/// The pipeline thread's ends: pop filled, return spent.
pub struct PipelineThreadChannels {
    pub data_consumer: Consumer<EmgFrame>,
    pub pool_producer: Producer<EmgFrame>,
}

impl FramePoolChannels {
    /// Split into the per-thread halves. Each half is Send and moves into
    /// its owning thread; the SPSC contract holds because each queue end
    /// lands in exactly one place.
    pub fn split_for_threads(self) -> (CaptureThreadChannels, PipelineThreadChannels) {
        (
            CaptureThreadChannels {
                pool_consumer: self.pool_consumer,
                data_producer: self.data_producer,
            },
            PipelineThreadChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

pub struct FramePool;

impl FramePool {
    /// Pre-allocate `frame_count` frames of `frame_len` samples each and
    /// park them all in the pool queue. This is the only place frame storage
    /// is allocated.
    ///
    /// # Panics
    /// Panics if `frame_count` or `frame_len` is 0.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(frame_count: usize, frame_len: usize) -> FramePoolChannels {
        assert!(frame_count > 0, "frame_count must be greater than 0");
        assert!(frame_len > 0, "frame_len must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(frame_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(frame_count);

        for _ in 0..frame_count {
            let frame = Vec::with_capacity(frame_len);
            if pool_producer.push(frame).is_err() {
                unreachable!("pool queue sized to frame_count");
            }
        }

        FramePoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_frames_start_in_pool() {
        let mut channels = FramePool::new(16, 1000);

        let mut available = 0;
        while channels.pool_consumer.pop().is_ok() {
            available += 1;
        }
        assert_eq!(available, 16, "expected 16 frames parked in pool queue");
        assert!(
            channels.data_consumer.pop().is_err(),
            "data queue should start empty"
        );
    }

    #[test]
    fn test_frames_carry_requested_capacity() {
        let mut channels = FramePool::new(1, 1000);
        let frame = channels.pool_consumer.pop().expect("one frame in pool");
        assert!(frame.is_empty(), "frames start empty, not zero-filled");
        assert!(frame.capacity() >= 1000);
    }

    #[test]
    fn test_frame_circulation() {
        let mut channels = FramePool::new(4, 250);

        // Capture side: pop empty, fill, hand to pipeline.
        let mut frame = channels.pool_consumer.pop().expect("frame in pool");
        frame.push(0.5);
        channels.data_producer.push(frame).expect("room in data queue");

        // Pipeline side: pop filled, process, recycle.
        let mut frame = channels.data_consumer.pop().expect("frame in data queue");
        assert_eq!(frame[0], 0.5, "samples survive the hand-off");
        frame.clear();
        channels.pool_producer.push(frame).expect("room in pool queue");

        let frame = channels.pool_consumer.pop().expect("frame back in pool");
        assert!(frame.is_empty(), "recycled frame arrives cleared");
    }

    #[test]
    fn test_pool_exhaustion_is_observable() {
        let mut channels = FramePool::new(2, 10);
        let a = channels.pool_consumer.pop().unwrap();
        let b = channels.pool_consumer.pop().unwrap();
        // Capture thread sees Err and sheds samples instead of blocking.
        assert!(channels.pool_consumer.pop().is_err());

        channels.data_producer.push(a).unwrap();
        channels.data_producer.push(b).unwrap();
        let a = channels.data_consumer.pop().unwrap();
        channels.pool_producer.push(a).unwrap();
        assert!(channels.pool_consumer.pop().is_ok());
    }

    #[test]
    fn test_split_halves_share_the_queues() {
        let channels = FramePool::new(2, 8);
        let (mut capture, mut pipeline) = channels.split_for_threads();

        let mut frame = capture.pool_consumer.pop().unwrap();
        frame.push(1.0);
        capture.data_producer.push(frame).unwrap();

        let frame = pipeline.data_consumer.pop().unwrap();
        assert_eq!(frame[0], 1.0);
        pipeline.pool_producer.push(frame).unwrap();
    }

    #[test]
    fn test_channels_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Producer<EmgFrame>>();
        assert_send::<Consumer<EmgFrame>>();
        assert_send::<FramePoolChannels>();
    }

    #[test]
    #[should_panic(expected = "frame_count must be greater than 0")]
    fn test_zero_frame_count_panics() {
        FramePool::new(0, 1000);
    }

    #[test]
    #[should_panic(expected = "frame_len must be greater than 0")]
    fn test_zero_frame_len_panics() {
        FramePool::new(16, 0);
    }
}
