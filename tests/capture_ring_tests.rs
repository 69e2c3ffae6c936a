use replaycap::{CaptureRing, CompressedFrame};

fn frame(tag: &str) -> CompressedFrame {
    CompressedFrame::new(tag.as_bytes().to_vec())
}

fn tags(frames: &[CompressedFrame]) -> Vec<String> {
    frames
        .iter()
        .map(|f| String::from_utf8_lossy(f.as_bytes()).into_owned())
        .collect()
}

#[test]
fn test_partial_fill_keeps_insertion_order() {
    let mut ring = CaptureRing::new(4).unwrap();
    ring.insert(frame("A"));
    ring.insert(frame("B"));

    assert_eq!(tags(&ring.snapshot()), vec!["A", "B"]);
    assert_eq!(ring.len(), 2);
}

#[test]
fn test_wraparound_drops_oldest() {
    let mut ring = CaptureRing::new(4).unwrap();
    for tag in ["A", "B", "C", "D", "E"] {
        ring.insert(frame(tag));
    }

    assert_eq!(tags(&ring.snapshot()), vec!["B", "C", "D", "E"]);

    let stats = ring.stats();
    assert_eq!(stats.occupied, 4);
    assert_eq!(stats.total_inserted, 5);
    assert_eq!(stats.overwritten, 1);
}

#[test]
fn test_snapshot_is_independent_of_later_inserts() {
    let mut ring = CaptureRing::new(3).unwrap();
    ring.insert(frame("A"));
    ring.insert(frame("B"));
    let before = ring.snapshot();

    for tag in ["C", "D", "E", "F"] {
        ring.insert(frame(tag));
    }

    assert_eq!(tags(&before), vec!["A", "B"]);
    assert_eq!(tags(&ring.snapshot()), vec!["D", "E", "F"]);
}

#[test]
fn test_retention_sizes_the_ring() {
    let ring = CaptureRing::with_retention(60, 30).unwrap();
    assert_eq!(ring.capacity(), 1800);
    assert!(ring.is_empty());
    assert!(ring.snapshot().is_empty());

    assert!(CaptureRing::new(0).is_err());
    assert!(CaptureRing::with_retention(0, 30).is_err());
}

#[test]
fn test_long_run_never_exceeds_capacity() {
    let mut ring = CaptureRing::new(7).unwrap();
    for i in 0..1000u32 {
        ring.insert(CompressedFrame::new(i.to_be_bytes().to_vec()));
        assert!(ring.len() <= 7);
    }

    let last: Vec<u32> = ring
        .snapshot()
        .iter()
        .map(|f| u32::from_be_bytes(f.as_bytes().try_into().unwrap()))
        .collect();
    assert_eq!(last, (993..1000).collect::<Vec<_>>());
    assert_eq!(ring.stats().bytes_held, 7 * 4);
}
