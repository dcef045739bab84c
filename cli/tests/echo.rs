use upcase::{BlockingMode, Device, DeviceConfig, WriteError};
use upcase_cli::{echo_once, echo_stream};

#[tokio::test]
async fn test_echo_once() {
    let device = Device::init(DeviceConfig::default()).unwrap();

    let out = echo_once(&device, BlockingMode::Blocking, b"hello upcase")
        .await
        .unwrap();
    assert_eq!(out, b"HELLO UPCASE");
    assert_eq!(device.open_sessions(), 0);
}

#[tokio::test]
async fn test_echo_once_non_blocking() {
    let device = Device::init(DeviceConfig::default()).unwrap();

    let out = echo_once(&device, BlockingMode::NonBlocking, b"quick")
        .await
        .unwrap();
    assert_eq!(out, b"QUICK");
}

#[tokio::test]
async fn test_echo_once_too_large() {
    let device = Device::init(DeviceConfig::with_buffer_size(4)).unwrap();

    let err = echo_once(&device, BlockingMode::Blocking, b"too long")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        upcase::Error::Write(WriteError::TooLarge { len: 8, capacity: 4 })
    ));
    assert_eq!(device.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_echo_stream() {
    let device = Device::init(DeviceConfig::default()).unwrap();

    let mut chunks = Vec::new();
    let total = echo_stream(&device, BlockingMode::Blocking, b"abc", 20, |chunk| {
        chunks.push(chunk.to_vec());
    })
    .await
    .unwrap();

    assert_eq!(chunks.len(), 20);
    assert_eq!(total, chunks.iter().map(Vec::len).sum::<usize>());
    for chunk in &chunks {
        assert!(!chunk.is_empty());
        assert!(chunk.iter().all(|b| b"ABC".contains(b)));
    }
    assert_eq!(device.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_echo_stream_non_blocking() {
    let device = Device::init(DeviceConfig::default()).unwrap();

    let total = echo_stream(&device, BlockingMode::NonBlocking, b"xy", 5, |_| {})
        .await
        .unwrap();
    assert!(total >= 5);
}
