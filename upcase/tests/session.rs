use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use upcase::{BlockingMode, IoError, ReadError, Session, WriteError};

#[tokio::test]
async fn test_write_then_read() {
    let session = Session::open(8192, BlockingMode::Blocking).unwrap();

    assert_eq!(session.write(b"Hello, World!").unwrap(), 13);
    assert_eq!(session.read(13).await.unwrap(), b"HELLO, WORLD!");
}

#[tokio::test]
async fn test_session_stays_usable_after_too_large() {
    let session = Session::open(4, BlockingMode::NonBlocking).unwrap();

    assert_eq!(
        session.write(b"12345"),
        Err(WriteError::TooLarge { len: 5, capacity: 4 })
    );
    assert_eq!(session.read(4).await, Err(ReadError::WouldBlock));

    session.write(b"abcd").unwrap();
    assert_eq!(session.read(4).await.unwrap(), b"ABCD");
}

#[tokio::test]
async fn test_non_blocking_session_reports_would_block() {
    let session = Session::open(16, BlockingMode::NonBlocking).unwrap();
    assert_eq!(session.mode(), BlockingMode::NonBlocking);

    let result = timeout(Duration::from_millis(100), session.read(16))
        .await
        .expect("non-blocking read must not suspend");
    assert_eq!(result, Err(ReadError::WouldBlock));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_writer_and_reader_share_one_session() {
    let session = Arc::new(Session::open(64, BlockingMode::Blocking).unwrap());

    let reader = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.read(64).await }
    });

    sleep(Duration::from_millis(50)).await;
    session.write(b"from the other side").unwrap();

    let out = timeout(Duration::from_secs(5), reader)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(out, b"FROM THE OTHER SIDE");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupt_blocked_session_read() {
    let session = Arc::new(Session::open(64, BlockingMode::Blocking).unwrap());

    let reader = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.read(64).await }
    });

    sleep(Duration::from_millis(50)).await;
    session.interrupt();

    let result = timeout(Duration::from_secs(5), reader)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, Err(ReadError::Interrupted));
    assert_eq!(session.available(), 0);

    session.write(b"still works").unwrap();
    assert_eq!(session.read(64).await.unwrap(), b"STILL WORKS");
}

#[tokio::test]
async fn test_dropping_a_read_future_consumes_nothing() {
    let session = Session::open(16, BlockingMode::Blocking).unwrap();

    let cancelled = timeout(Duration::from_millis(20), session.read(16)).await;
    assert!(cancelled.is_err());

    session.write(b"later").unwrap();
    assert_eq!(session.read(16).await.unwrap(), b"LATER");
}

#[tokio::test]
async fn test_stream_traits() {
    use embedded_io_async::{Read, Write};

    let mut session = Session::open(16, BlockingMode::NonBlocking).unwrap();

    let n = Write::write(&mut session, b"stream").await.unwrap();
    assert_eq!(n, 6);

    let mut buf = [0u8; 16];
    let n = Read::read(&mut session, &mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"STREAM");

    assert_eq!(
        Read::read(&mut session, &mut buf).await,
        Err(IoError::WouldBlock)
    );
    assert_eq!(
        Write::write(&mut session, &[b'a'; 17]).await,
        Err(IoError::TooLarge)
    );
}

#[tokio::test]
async fn test_closed_session_rejects_io() {
    let mut session = Session::open(16, BlockingMode::Blocking).unwrap();
    session.write(b"gone").unwrap();

    session.close();

    assert!(!session.is_open());
    assert_eq!(session.handle(), None);
    assert_eq!(session.available(), 0);
    assert_eq!(session.read(4).await, Err(ReadError::Closed));
    assert_eq!(session.write(b"x"), Err(WriteError::Closed));
}
