use super::*;
use std::time::Duration;
use tasklog_sources::fields;
use tokio::io::AsyncReadExt;

const TIMEOUT: Duration = Duration::from_secs(5);

fn start_bridge(
    queue: usize,
    pipe_capacity: usize,
) -> (
    mpsc::Sender<SyslogRecord>,
    PipeReader,
    Arc<BridgeMetrics>,
    tokio::task::JoinHandle<io::Result<BridgeStats>>,
) {
    let (record_tx, record_rx) = mpsc::channel(queue);
    let (writer, reader) = pipe(pipe_capacity);
    let bridge = StreamBridge::new(record_rx, MessageDecoder::new(), writer);
    let metrics = Arc::clone(bridge.metrics());
    let handle = tokio::spawn(bridge.pump());
    (record_tx, reader, metrics, handle)
}

#[tokio::test]
async fn test_content_forwarded_in_order_then_eof() {
    let (record_tx, mut reader, _metrics, handle) = start_bridge(8, 1024);

    record_tx.send(SyslogRecord::with_content("hello\n")).await.unwrap();
    record_tx.send(SyslogRecord::with_content("world\n")).await.unwrap();
    drop(record_tx);

    let mut output = Vec::new();
    tokio::time::timeout(TIMEOUT, reader.read_to_end(&mut output))
        .await
        .expect("reader did not see EOF")
        .unwrap();
    assert_eq!(output, b"hello\nworld\n");

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(
        stats,
        BridgeStats {
            records_forwarded: 2,
            records_dropped: 0,
            bytes_forwarded: 12,
            sink_failed: false,
        }
    );
}

#[tokio::test]
async fn test_malformed_record_dropped_stream_continues() {
    let (record_tx, mut reader, _metrics, handle) = start_bridge(8, 1024);

    let mut headers_only = SyslogRecord::new();
    headers_only.insert(fields::HOSTNAME, "host");

    record_tx.send(SyslogRecord::with_content("before\n")).await.unwrap();
    record_tx.send(headers_only).await.unwrap();
    record_tx.send(SyslogRecord::with_content("after\n")).await.unwrap();
    drop(record_tx);

    let mut output = Vec::new();
    reader.read_to_end(&mut output).await.unwrap();
    assert_eq!(output, b"before\nafter\n");

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.records_forwarded, 2);
    assert_eq!(stats.records_dropped, 1);
}

#[tokio::test]
async fn test_full_pipe_suspends_pump() {
    let (record_tx, mut reader, metrics, handle) = start_bridge(8, 4);

    record_tx.send(SyslogRecord::with_content("aaaa")).await.unwrap();
    record_tx.send(SyslogRecord::with_content("bbbb")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second record cannot fit until the reader drains the first
    assert_eq!(metrics.snapshot().records_forwarded, 1);

    drop(record_tx);
    let mut output = Vec::new();
    reader.read_to_end(&mut output).await.unwrap();
    assert_eq!(output, b"aaaabbbb");
    assert_eq!(handle.await.unwrap().unwrap().records_forwarded, 2);
}

#[tokio::test]
async fn test_dropped_reader_stops_pump() {
    let (record_tx, reader, metrics, handle) = start_bridge(8, 1024);
    drop(reader);

    record_tx.send(SyslogRecord::with_content("lost\n")).await.unwrap();

    let result = tokio::time::timeout(TIMEOUT, handle)
        .await
        .expect("pump kept running")
        .unwrap();
    assert!(result.is_err());
    assert!(metrics.snapshot().sink_failed);

    // Channel is closed for the listener
    assert!(record_tx.send(SyslogRecord::with_content("x\n")).await.is_err());
}

#[tokio::test]
async fn test_sink_failure_stops_listener() {
    use tasklog_sources::{SyslogTcpSource, SyslogTcpSourceConfig, SyslogTcpSourceError};
    use tokio::io::AsyncWriteExt;
    use tokio_util::sync::CancellationToken;

    let (record_tx, record_rx) = mpsc::channel(8);
    let (writer, reader) = pipe(1024);
    drop(reader);

    let source = SyslogTcpSource::bind(SyslogTcpSourceConfig::default(), record_tx)
        .await
        .unwrap();
    let addr = source.local_addr();
    let listener = tokio::spawn(source.run(CancellationToken::new(), CancellationToken::new()));
    let bridge = StreamBridge::new(record_rx, MessageDecoder::new(), writer);
    let metrics = Arc::clone(bridge.metrics());
    let pump = tokio::spawn(bridge.pump());

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client.write_all(b"<14>lost\n").await.unwrap();

    assert!(tokio::time::timeout(TIMEOUT, pump).await.unwrap().unwrap().is_err());
    let result = tokio::time::timeout(TIMEOUT, listener)
        .await
        .expect("listener kept accepting")
        .unwrap();
    assert!(matches!(result, Err(SyslogTcpSourceError::ChannelClosed)));
    assert!(metrics.snapshot().sink_failed);
    assert!(std::net::TcpListener::bind(addr).is_ok());
}
