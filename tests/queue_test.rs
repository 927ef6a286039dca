/*!
 * Message Queue Tests
 * Pooled priority queues and pipe-backed byte FIFOs
 */

use osa_kernel::{ByteFifo, MessagePriority, MessageQueue, OsaError, Outcome, Timeout};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_full_queue_with_no_wait_is_pending() {
    let queue = MessageQueue::create(3, 8).unwrap();
    for i in 0..3u8 {
        assert_eq!(
            queue
                .send(&[i], Timeout::NoWait, MessagePriority::Normal)
                .unwrap(),
            Outcome::Ready(1)
        );
    }
    assert_eq!(
        queue
            .send(b"x", Timeout::NoWait, MessagePriority::Normal)
            .unwrap(),
        Outcome::Pending
    );

    let stats = queue.stats();
    assert_eq!(stats.queued, 3);
    assert_eq!(stats.free, 0);
    assert_eq!(stats.send_timeouts, 1);
}

#[test]
fn test_urgent_jumps_the_line() {
    let queue = MessageQueue::create(4, 8).unwrap();
    let _ = queue.send(b"A", Timeout::NoWait, MessagePriority::Normal).unwrap();
    let _ = queue.send(b"B", Timeout::NoWait, MessagePriority::Normal).unwrap();
    let _ = queue.send(b"C", Timeout::NoWait, MessagePriority::Urgent).unwrap();

    let order: Vec<Vec<u8>> = (0..3)
        .map(|_| queue.receive_vec(Timeout::NoWait).unwrap().ready().unwrap())
        .collect();
    assert_eq!(order, vec![b"C".to_vec(), b"A".to_vec(), b"B".to_vec()]);
    assert_eq!(queue.receive_vec(Timeout::NoWait).unwrap(), Outcome::Pending);
}

#[test]
fn test_urgent_messages_stay_fifo_among_themselves() {
    let queue = MessageQueue::create(6, 8).unwrap();
    for (payload, priority) in [
        (b"A", MessagePriority::Normal),
        (b"B", MessagePriority::Normal),
        (b"U", MessagePriority::Urgent),
        (b"V", MessagePriority::Urgent),
        (b"C", MessagePriority::Normal),
    ] {
        let _ = queue.send(payload, Timeout::NoWait, priority).unwrap();
    }

    let order: Vec<Vec<u8>> = (0..5)
        .map(|_| queue.receive_vec(Timeout::NoWait).unwrap().ready().unwrap())
        .collect();
    assert_eq!(
        order,
        vec![
            b"U".to_vec(),
            b"V".to_vec(),
            b"A".to_vec(),
            b"B".to_vec(),
            b"C".to_vec()
        ]
    );
}

#[test]
fn test_short_buffer_truncates() {
    let queue = MessageQueue::create(2, 16).unwrap();
    let _ = queue
        .send(b"0123456789", Timeout::NoWait, MessagePriority::Normal)
        .unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(
        queue.receive(&mut buf, Timeout::NoWait).unwrap(),
        Outcome::Ready(4)
    );
    assert_eq!(&buf, b"0123");
    assert_eq!(queue.count().unwrap(), 0);
}

#[test]
fn test_oversized_message_rejected() {
    let queue = MessageQueue::create(2, 4).unwrap();
    let err = queue
        .send(b"too long", Timeout::Forever, MessagePriority::Normal)
        .unwrap_err();
    assert!(matches!(err, OsaError::InvalidArgument { .. }));
}

#[test]
fn test_blocked_sender_resumes_after_receive() {
    let queue = Arc::new(MessageQueue::create(1, 4).unwrap());
    let _ = queue.send(b"one", Timeout::NoWait, MessagePriority::Normal).unwrap();

    let sender = {
        let queue = queue.clone();
        thread::spawn(move || queue.send(b"two", Timeout::Millis(2_000), MessagePriority::Normal))
    };

    thread::sleep(Duration::from_millis(30));
    assert_eq!(
        queue.receive_vec(Timeout::NoWait).unwrap(),
        Outcome::Ready(b"one".to_vec())
    );
    assert_eq!(sender.join().unwrap().unwrap(), Outcome::Ready(3));
    assert_eq!(
        queue.receive_vec(Timeout::Millis(500)).unwrap(),
        Outcome::Ready(b"two".to_vec())
    );
}

#[test]
fn test_delete_wakes_receiver() {
    let queue = Arc::new(MessageQueue::create(2, 4).unwrap());
    let receiver = {
        let queue = queue.clone();
        thread::spawn(move || queue.receive_vec(Timeout::Forever))
    };

    thread::sleep(Duration::from_millis(30));
    queue.delete().unwrap();
    assert!(matches!(
        receiver.join().unwrap(),
        Err(OsaError::InvalidHandle { .. })
    ));
}

#[test]
fn test_fifo_across_threads() {
    let fifo = Arc::new(ByteFifo::create().unwrap());
    let writer = {
        let fifo = fifo.clone();
        thread::spawn(move || {
            fifo.put(b"abcd").unwrap();
            fifo.put(b"efgh").unwrap();
        })
    };
    writer.join().unwrap();
    assert_eq!(fifo.count(), 8);

    let mut buf = [0u8; 8];
    fifo.get(&mut buf).unwrap();
    assert_eq!(&buf, b"abcdefgh");
    assert_eq!(fifo.count(), 0);

    let mut one = [0u8; 1];
    assert_eq!(
        fifo.get_timeout(&mut one, Timeout::Millis(20)).unwrap(),
        Outcome::Pending
    );
}

proptest! {
    /// Normal-priority messages come out in the order they went in
    #[test]
    fn prop_normal_messages_keep_order(
        messages in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..16)
    ) {
        let queue = MessageQueue::create(16, 32).unwrap();
        for m in &messages {
            prop_assert!(queue.send(m, Timeout::NoWait, MessagePriority::Normal).unwrap().is_ready());
        }
        for m in &messages {
            let got = queue.receive_vec(Timeout::NoWait).unwrap();
            prop_assert_eq!(got, Outcome::Ready(m.clone()));
        }
        prop_assert_eq!(queue.free_slots().unwrap(), 16);
    }
}
