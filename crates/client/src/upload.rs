//! Segmented upload of a local file.

use std::path::Path;

use segstore_engine::{SegmentMessage, SegmentReader, StoreError};
use segstore_protocol::StoreResult;
use segstore_protocol::messages::StoreSegmentResponse;

use crate::client::{ClientError, StoreClient};

/// Progress of an upload, reported after every accepted segment.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    pub file_id: String,
    pub segments_sent: u64,
    pub segments_total: u64,
    pub bytes_sent: u64,
    pub file_size: u64,
}

impl UploadProgress {
    /// Percentage of the file acknowledged by the service.
    pub fn percent(&self) -> f64 {
        if self.file_size == 0 {
            return 100.0;
        }
        self.bytes_sent as f64 / self.file_size as f64 * 100.0
    }
}

impl StoreClient {
    /// Uploads `path` as a sequence of segments.
    ///
    /// Segment 1 carries the file name, later segments the `file_id` the
    /// service assigned, and the last one `result=store` with the total size
    /// and SHA-256. If reading the local file fails mid-transfer the service
    /// is told to cancel. If `segment_size` is 0 the default is used.
    pub async fn upload_file(
        &self,
        path: &Path,
        segment_size: usize,
        mut progress: impl FnMut(&UploadProgress),
    ) -> Result<StoreSegmentResponse, ClientError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::InvalidName(path.display().to_string()))?;

        let mut reader = SegmentReader::new(path, segment_size)?;
        let segments_total = reader.segment_count();
        let mut file_id: Option<String> = None;

        loop {
            let segment = match reader.next_segment() {
                Ok(Some(segment)) => segment,
                Ok(None) => {
                    return Err(ClientError::UnexpectedResponse(
                        "file ended before the last segment".into(),
                    ));
                }
                Err(e) => {
                    if let Some(id) = &file_id {
                        self.cancel_transfer(id, reader.offset()).await;
                    }
                    return Err(e.into());
                }
            };

            let mut msg = match &file_id {
                None => SegmentMessage::first(name.clone()),
                Some(id) => SegmentMessage::next(id.clone(), segment.number as i64),
            };
            if segment.is_last {
                msg = msg.with_store(reader.file_size() as i64, reader.hex_digest());
            }

            let resp = self.store_segment(&msg, &segment.data).await?;
            tracing::debug!(
                file_id = %resp.file_id,
                segment = segment.number,
                "segment acknowledged"
            );

            progress(&UploadProgress {
                file_id: resp.file_id.clone(),
                segments_sent: resp.segments_received,
                segments_total,
                bytes_sent: reader.offset(),
                file_size: reader.file_size(),
            });

            if segment.is_last {
                if resp.result != Some(StoreResult::Store) {
                    return Err(ClientError::UnexpectedResponse(format!(
                        "last segment not stored: {:?}",
                        resp.result
                    )));
                }
                return Ok(resp);
            }
            file_id = Some(resp.file_id);
        }
    }

    /// Best-effort cancel of a transfer this client abandoned.
    ///
    /// Cancel skips the ordering check, so any segment number past the
    /// first addresses the open transfer.
    async fn cancel_transfer(&self, file_id: &str, bytes_sent: u64) {
        let msg = SegmentMessage::next(file_id, 2).with_cancel();
        match self.store_segment(&msg, &[]).await {
            Ok(_) => tracing::info!(file_id, bytes_sent, "transfer canceled"),
            Err(e) => tracing::warn!(file_id, "failed to cancel transfer: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;

    use segstore_engine::{SessionRegistry, StoreManager, checksum_bytes};
    use segstore_protocol::MessageType;
    use segstore_protocol::envelope::Message;
    use segstore_protocol::messages::StoreSegmentRequest;
    use segstore_server::{Handler, HandlerFuture, Sender, ServerConfig, StoreServer};
    use tempfile::TempDir;

    /// Minimal in-process service backed by the real engine.
    struct EngineHandler {
        manager: StoreManager,
    }

    impl Handler for EngineHandler {
        fn on_store_segment(
            &self,
            sender: Sender,
            header: StoreSegmentRequest,
            payload: Vec<u8>,
        ) -> HandlerFuture<'_> {
            Box::pin(async move {
                let result = SegmentMessage::from_request(&header)
                    .and_then(|msg| self.manager.store_segment(&msg, &payload));
                let reply = match result {
                    Ok(r) => {
                        let resp = StoreSegmentResponse::from(r);
                        Message::new(&header.id, MessageType::StoreSegmentResponse, Some(&resp))
                            .unwrap()
                    }
                    Err(e) => Message::error(&header.id, e.to_wire()),
                };
                let _ = sender.send_msg(reply);
            })
        }
    }

    async fn start(storage: &Path) -> (Arc<StoreServer<EngineHandler>>, String) {
        let registry = Arc::new(SessionRegistry::open(storage).unwrap());
        let handler = EngineHandler {
            manager: StoreManager::new(registry),
        };
        let config = ServerConfig {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        };
        let server = StoreServer::new(config, handler);
        let runner = Arc::clone(&server);
        tokio::spawn(async move {
            let _ = runner.run().await;
        });

        for _ in 0..100 {
            let port = server.port().await;
            if port > 0 {
                return (server, format!("ws://127.0.0.1:{port}"));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("server did not bind");
    }

    #[tokio::test]
    async fn uploads_file_in_segments() {
        let storage = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let path = src.path().join("data.bin");
        std::fs::write(&path, &data).unwrap();

        let (server, url) = start(storage.path()).await;
        let client = StoreClient::connect(&url).await.unwrap();

        let mut reports = Vec::new();
        let resp = client
            .upload_file(&path, 4096, |p| reports.push(p.clone()))
            .await
            .unwrap();

        assert_eq!(resp.result, Some(StoreResult::Store));
        assert_eq!(resp.segments_received, 3);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports.last().unwrap().percent(), 100.0);
        assert!(reports.windows(2).all(|w| w[0].bytes_sent < w[1].bytes_sent));

        let stored = storage.path().join(&resp.file_id).join("data.bin");
        assert_eq!(std::fs::read(stored).unwrap(), data);
        assert_eq!(server.handler().manager.registry().active_count(), 0);

        client.close().await;
        server.shutdown();
    }

    #[tokio::test]
    async fn uploads_empty_file() {
        let storage = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let path = src.path().join("empty.txt");
        std::fs::write(&path, b"").unwrap();

        let (server, url) = start(storage.path()).await;
        let client = StoreClient::connect(&url).await.unwrap();
        let resp = client.upload_file(&path, 0, |_| {}).await.unwrap();

        assert_eq!(resp.segments_received, 1);
        let stored = storage.path().join(&resp.file_id).join("empty.txt");
        assert_eq!(std::fs::metadata(stored).unwrap().len(), 0);

        server.shutdown();
    }

    #[tokio::test]
    async fn service_errors_carry_kind() {
        let storage = TempDir::new().unwrap();
        let (server, url) = start(storage.path()).await;
        let client = StoreClient::connect(&url).await.unwrap();

        let first = client
            .store_segment(&SegmentMessage::first("a.txt"), b"AB")
            .await
            .unwrap();
        assert_eq!(first.segments_received, 1);

        let err = client
            .store_segment(&SegmentMessage::next(&first.file_id, 3), b"CD")
            .await
            .unwrap_err();
        match &err {
            ClientError::Service(wire) => {
                assert_eq!(wire.code, 409);
                assert_eq!(wire.kind, "out_of_order_segment");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let last = SegmentMessage::next(&first.file_id, 2).with_store(4, checksum_bytes(b"ABCD"));
        let done = client.store_segment(&last, b"CD").await.unwrap();
        assert_eq!(done.result, Some(StoreResult::Store));

        server.shutdown();
    }

    #[tokio::test]
    async fn missing_local_file() {
        let storage = TempDir::new().unwrap();
        let (server, url) = start(storage.path()).await;
        let client = StoreClient::connect(&url).await.unwrap();

        let err = client
            .upload_file(&storage.path().join("nope.bin"), 0, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Local(StoreError::Io(_))));
        assert_eq!(server.handler().manager.registry().active_count(), 0);

        server.shutdown();
    }

    #[test]
    fn progress_percent() {
        let p = UploadProgress {
            file_id: "f".into(),
            segments_sent: 1,
            segments_total: 4,
            bytes_sent: 25,
            file_size: 100,
        };
        assert_eq!(p.percent(), 25.0);
    }
}
