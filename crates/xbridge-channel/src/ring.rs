//! The bounded FIFO byte ring over a shared region.
//!
//! Records are stored as `[len u32][bytes]`, wrapping across the ring end
//! with a split copy. Cursors are monotonically increasing byte counts
//! (`head` for the producer, `tail` for the consumer); the ring offset is
//! `cursor & (capacity - 1)`. A full ring blocks the producer (backpressure)
//! and an empty ring blocks the consumer, both on futex words in the header.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::futex;
use crate::shm::SharedRegion;
use crate::ChannelError;

const LEN_PREFIX: usize = 4;

/// One direction of the bridge: exactly one producer role and one consumer
/// role. Producers from several threads serialize on the in-region lock;
/// the consumer side must be a single thread.
pub struct Channel {
    region: SharedRegion,
}

impl Channel {
    /// Create the region (executing side).
    pub fn create(path: &Path, capacity: usize) -> Result<Self, ChannelError> {
        Ok(Self {
            region: SharedRegion::create(path, capacity)?,
        })
    }

    /// Open the counterpart's region (issuing side).
    pub fn open(path: &Path) -> Result<Self, ChannelError> {
        Ok(Self {
            region: SharedRegion::open(path)?,
        })
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Bytes currently queued (length prefixes included).
    pub fn depth(&self) -> usize {
        let h = self.region.header();
        (h.head.load(Ordering::Acquire) - h.tail.load(Ordering::Acquire)) as usize
    }

    pub fn is_closed(&self) -> bool {
        self.region.is_closed()
    }

    /// Mark the channel closed and wake every waiter on both sides.
    pub fn close(&self) {
        let h = self.region.header();
        h.closed.store(1, Ordering::Release);
        h.ready_seq.fetch_add(1, Ordering::Release);
        h.space_seq.fetch_add(1, Ordering::Release);
        futex::wake_all(&h.ready_seq);
        futex::wake_all(&h.space_seq);
    }

    /// Enqueue one record. Blocks while the ring lacks space (backpressure;
    /// records are never dropped) and fails only when the channel is closed
    /// or the record can never fit.
    pub fn push(&self, record: &[u8]) -> Result<(), ChannelError> {
        let capacity = self.capacity();
        let need = LEN_PREFIX + record.len();
        if need > capacity {
            return Err(ChannelError::RecordTooLarge {
                size: record.len(),
                capacity,
            });
        }

        let h = self.region.header();
        let _guard = futex::lock(&h.producer_lock, &h.producer_pid);

        // Under the producer lock, head is ours alone; tail advances
        // concurrently as the consumer drains.
        let head = h.head.load(Ordering::Relaxed);
        loop {
            if self.is_closed() {
                return Err(ChannelError::Closed);
            }
            let tail = h.tail.load(Ordering::Acquire);
            let free = capacity - (head - tail) as usize;
            if free >= need {
                break;
            }
            // Sequence-checked sleep so a pop between the check and the
            // wait cannot be missed.
            let seq = h.space_seq.load(Ordering::Acquire);
            if h.tail.load(Ordering::Acquire) != tail {
                continue;
            }
            futex::wait(&h.space_seq, seq, None);
        }

        self.write_ring(head, &(record.len() as u32).to_le_bytes());
        self.write_ring(head + LEN_PREFIX as u64, record);
        h.head.store(head + need as u64, Ordering::Release);

        h.ready_seq.fetch_add(1, Ordering::Release);
        futex::wake_one(&h.ready_seq);
        Ok(())
    }

    /// Dequeue the oldest record, blocking up to `timeout` (forever when
    /// `None`). Returns `Ok(None)` on timeout. Once closed, remaining
    /// records still drain; only then does `Err(Closed)` surface.
    pub fn pop(&self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, ChannelError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let h = self.region.header();
        let capacity = self.capacity();

        loop {
            let tail = h.tail.load(Ordering::Relaxed);
            let head = h.head.load(Ordering::Acquire);
            if head != tail {
                let mut len_buf = [0u8; LEN_PREFIX];
                self.read_ring(tail, &mut len_buf);
                let len = u32::from_le_bytes(len_buf) as usize;
                if LEN_PREFIX + len > capacity || (head - tail) < (LEN_PREFIX + len) as u64 {
                    // A bogus length would desynchronize the cursors for
                    // good; surface it rather than walking garbage.
                    warn!(len, queued = head - tail, "channel record length corrupt");
                    return Err(ChannelError::Corrupted("record length out of range"));
                }

                let mut record = vec![0u8; len];
                self.read_ring(tail + LEN_PREFIX as u64, &mut record);
                h.tail
                    .store(tail + (LEN_PREFIX + len) as u64, Ordering::Release);

                h.space_seq.fetch_add(1, Ordering::Release);
                futex::wake_one(&h.space_seq);
                return Ok(Some(record));
            }

            if self.is_closed() {
                return Err(ChannelError::Closed);
            }
            if let Some(d) = deadline {
                let now = Instant::now();
                if now >= d {
                    return Ok(None);
                }
                let seq = h.ready_seq.load(Ordering::Acquire);
                if h.head.load(Ordering::Acquire) != tail {
                    continue;
                }
                futex::wait(&h.ready_seq, seq, Some(d - now));
            } else {
                let seq = h.ready_seq.load(Ordering::Acquire);
                if h.head.load(Ordering::Acquire) != tail {
                    continue;
                }
                futex::wait(&h.ready_seq, seq, None);
            }
        }
    }

    fn mask(&self) -> u64 {
        self.capacity() as u64 - 1
    }

    fn write_ring(&self, pos: u64, src: &[u8]) {
        let offset = (pos & self.mask()) as usize;
        let first = src.len().min(self.capacity() - offset);
        let base = self.region.data_ptr();
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), base.add(offset), first);
            if first < src.len() {
                std::ptr::copy_nonoverlapping(src.as_ptr().add(first), base, src.len() - first);
            }
        }
    }

    fn read_ring(&self, pos: u64, dst: &mut [u8]) {
        let offset = (pos & self.mask()) as usize;
        let first = dst.len().min(self.capacity() - offset);
        let base = self.region.data_ptr();
        unsafe {
            std::ptr::copy_nonoverlapping(base.add(offset), dst.as_mut_ptr(), first);
            if first < dst.len() {
                std::ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), dst.len() - first);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn pair(capacity: usize) -> (Arc<Channel>, Arc<Channel>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.ring");
        let producer = Arc::new(Channel::create(&path, capacity).unwrap());
        let consumer = Arc::new(Channel::open(&path).unwrap());
        (producer, consumer, dir)
    }

    #[test]
    fn fifo_order_preserved() {
        let (tx, rx, _dir) = pair(4096);
        tx.push(b"c1").unwrap();
        tx.push(b"c2").unwrap();
        tx.push(b"c3").unwrap();
        assert_eq!(rx.pop(None).unwrap().unwrap(), b"c1");
        assert_eq!(rx.pop(None).unwrap().unwrap(), b"c2");
        assert_eq!(rx.pop(None).unwrap().unwrap(), b"c3");
    }

    #[test]
    fn wraparound_many_records() {
        let (tx, rx, _dir) = pair(1024);
        // Far more bytes than the capacity; records straddle the ring end.
        for i in 0u32..2000 {
            let payload = i.to_le_bytes().repeat(1 + (i % 13) as usize);
            tx.push(&payload).unwrap();
            let got = rx.pop(None).unwrap().unwrap();
            assert_eq!(got, payload, "record {i}");
        }
    }

    #[test]
    fn pop_times_out_when_empty() {
        let (_tx, rx, _dir) = pair(1024);
        let start = Instant::now();
        let got = rx.pop(Some(Duration::from_millis(50))).unwrap();
        assert!(got.is_none());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn full_ring_blocks_producer_until_pop() {
        let (tx, rx, _dir) = pair(1024);
        let record = vec![0xAAu8; 200];
        // 1024-byte ring, 204 bytes per record: five fit, the sixth blocks.
        for _ in 0..5 {
            tx.push(&record).unwrap();
        }

        let unblocked = Arc::new(AtomicBool::new(false));
        let flag = unblocked.clone();
        let tx2 = tx.clone();
        let rec = record.clone();
        let pusher = std::thread::spawn(move || {
            tx2.push(&rec).unwrap();
            flag.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(100));
        assert!(
            !unblocked.load(Ordering::SeqCst),
            "push should block on a full ring"
        );

        assert!(rx.pop(None).unwrap().is_some());
        pusher.join().unwrap();
        assert!(unblocked.load(Ordering::SeqCst));
        // Nothing was dropped: five records remain.
        for _ in 0..5 {
            assert!(rx.pop(Some(Duration::from_millis(500))).unwrap().is_some());
        }
    }

    #[test]
    fn oversized_record_rejected_outright() {
        let (tx, _rx, _dir) = pair(1024);
        let err = tx.push(&vec![0u8; 4096]).unwrap_err();
        assert!(matches!(err, ChannelError::RecordTooLarge { .. }));
    }

    #[test]
    fn close_wakes_blocked_consumer() {
        let (tx, rx, _dir) = pair(1024);
        let popper = std::thread::spawn(move || rx.pop(Some(Duration::from_secs(10))));
        std::thread::sleep(Duration::from_millis(50));
        tx.close();
        let res = popper.join().unwrap();
        assert!(matches!(res, Err(ChannelError::Closed)));
    }

    #[test]
    fn close_drains_queued_records_first() {
        let (tx, rx, _dir) = pair(1024);
        tx.push(b"last words").unwrap();
        tx.close();
        assert_eq!(rx.pop(None).unwrap().unwrap(), b"last words");
        assert!(matches!(rx.pop(None), Err(ChannelError::Closed)));
    }

    #[test]
    fn push_after_close_fails() {
        let (tx, _rx, _dir) = pair(1024);
        tx.close();
        assert!(matches!(tx.push(b"x"), Err(ChannelError::Closed)));
    }

    #[test]
    fn concurrent_producers_interleave_without_loss() {
        let (tx, rx, _dir) = pair(8192);
        let mut handles = Vec::new();
        for t in 0u8..4 {
            let tx = tx.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0u32..250 {
                    let mut rec = vec![t];
                    rec.extend_from_slice(&i.to_le_bytes());
                    tx.push(&rec).unwrap();
                }
            }));
        }

        let mut seen = [0u32; 4];
        let mut last = [None::<u32>; 4];
        for _ in 0..1000 {
            let rec = rx.pop(Some(Duration::from_secs(5))).unwrap().unwrap();
            let t = rec[0] as usize;
            let i = u32::from_le_bytes(rec[1..5].try_into().unwrap());
            // Per-producer order must hold even though producers interleave.
            if let Some(prev) = last[t] {
                assert!(i > prev, "producer {t} reordered: {prev} then {i}");
            }
            last[t] = Some(i);
            seen[t] += 1;
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(seen, [250; 4]);
    }
}
