//! Socket Transport - newline-delimited JSON over a Unix socket
//!
//! Each client line is one `WireRequest`, answered by exactly one
//! `WireReply` line. A client owns at most one display connection at a
//! time; `create_updater` replaces it. Once the host closes that
//! connection the client must create a new one.

use anyhow::{anyhow, Context, Result};
use fos_display::{ConnectionId, DisplayHandle, SharedMemoryRegion};
use fos_gfx::{Bitmap, Point, Rect, Size};
use fos_render::{RenderCommandService, TextDrawCommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WireRequest {
    DrawText {
        commands: Vec<TextDrawCommand>,
    },
    CreateUpdater,
    AllocateFramebuffer {
        path: PathBuf,
        size: Size,
        /// Claimed region length; the file's length when absent
        #[serde(default)]
        len: Option<usize>,
    },
    Draw {
        damage: Rect,
    },
    /// Show the text cursor at a surface position, `null` hides it
    SetCursor {
        cursor: Option<Point>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireReply {
    Ok,
    Created { connection: u64 },
    Drawn(Rect),
    Error(String),
}

/// Accept clients until the listener fails
pub async fn serve(
    listener: UnixListener,
    display: DisplayHandle,
    service: Arc<RenderCommandService>,
) -> Result<()> {
    loop {
        let (stream, _) = listener.accept().await.context("Accept failed")?;
        let session = Session::new(display.clone(), service.clone());

        tokio::spawn(async move {
            if let Err(e) = session.run(stream).await {
                warn!("Client error: {:#}", e);
            }
        });
    }
}

/// One client's view of the display
pub struct Session {
    display: DisplayHandle,
    service: Arc<RenderCommandService>,
    connection: Option<ConnectionId>,
}

impl Session {
    pub fn new(display: DisplayHandle, service: Arc<RenderCommandService>) -> Self {
        Self {
            display,
            service,
            connection: None,
        }
    }

    pub async fn run(mut self, stream: UnixStream) -> Result<()> {
        info!("Client connected");

        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let reply = match serde_json::from_str::<WireRequest>(&line) {
                Ok(request) => self.handle(request).await,
                Err(e) => WireReply::Error(format!("Invalid request: {}", e)),
            };

            let mut out = serde_json::to_vec(&reply)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
        }

        info!("Client disconnected");
        Ok(())
    }

    pub async fn handle(&mut self, request: WireRequest) -> WireReply {
        debug!("Handling {:?}", request);

        match self.dispatch(request).await {
            Ok(reply) => reply,
            Err(e) => WireReply::Error(format!("{:#}", e)),
        }
    }

    async fn dispatch(&mut self, request: WireRequest) -> Result<WireReply> {
        match request {
            WireRequest::DrawText { commands } => {
                let service = self.service.clone();
                tokio::task::spawn_blocking(move || service.draw_text(commands)).await??;
                Ok(WireReply::Ok)
            }
            WireRequest::CreateUpdater => {
                let connection = self.display.create_updater()?;
                self.connection = Some(connection);
                Ok(WireReply::Created {
                    connection: connection.0,
                })
            }
            WireRequest::AllocateFramebuffer { path, size, len } => {
                let connection = self.connection()?;
                let len = match len {
                    Some(len) => len,
                    None => usize::try_from(std::fs::metadata(&path)?.len())?,
                };
                let region = SharedMemoryRegion::open(&path, len)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                let (tx, rx) = oneshot::channel();

                self.display
                    .allocate_framebuffer(connection, size, region, move |result| {
                        let _ = tx.send(result);
                    })?;

                match rx.await {
                    Ok(Ok(())) => Ok(WireReply::Ok),
                    Ok(Err(err)) => {
                        self.connection = None;
                        Err(anyhow!("{}", err))
                    }
                    Err(_) => {
                        self.connection = None;
                        Err(anyhow!("Allocation abandoned"))
                    }
                }
            }
            WireRequest::Draw { damage } => {
                let connection = self.connection()?;
                let (tx, rx) = oneshot::channel();

                self.display.draw(connection, damage, move |bitmap| {
                    let _ = tx.send(drawn_rect(damage, &bitmap));
                })?;

                // The reply is dropped unanswered when the host closed the connection
                match rx.await {
                    Ok(rect) => Ok(WireReply::Drawn(rect)),
                    Err(_) => {
                        self.connection = None;
                        Err(anyhow!("Draw abandoned, connection closed"))
                    }
                }
            }
            WireRequest::SetCursor { cursor } => {
                let service = self.service.clone();
                tokio::task::spawn_blocking(move || service.set_cursor(cursor)).await??;
                Ok(WireReply::Ok)
            }
        }
    }

    fn connection(&self) -> Result<ConnectionId> {
        self.connection
            .ok_or_else(|| anyhow!("No updater, send create_updater first"))
    }
}

/// Where the acknowledged pixels sit on the surface
fn drawn_rect(damage: Rect, bitmap: &Bitmap) -> Rect {
    if bitmap.size().is_empty() {
        return Rect::new(damage.x, damage.y, 0, 0);
    }
    Rect::new(
        damage.x.max(0),
        damage.y.max(0),
        bitmap.width(),
        bitmap.height(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_display::{DisplayHost, NoopHooks, PaintCallback, UpdaterConfig};
    use fos_render::{Renderer, RendererHandle, Text};
    use std::io::{self, Write};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        batches: Arc<Mutex<Vec<Vec<Text>>>>,
    }

    impl Renderer for Recorder {
        fn draw_text(&mut self, texts: Vec<Text>) {
            self.batches.lock().unwrap().push(texts);
        }

        fn draw_bitmap(&mut self, _rect: Rect, _bitmap: &Bitmap) {}

        fn render(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (DisplayHost, Session, Recorder) {
        let paint: PaintCallback = Arc::new(|_rect: Rect, _bitmap: &Bitmap| {});
        let host = DisplayHost::spawn(UpdaterConfig::default(), paint, Box::new(NoopHooks));
        let recorder = Recorder::default();
        let service = RenderCommandService::new(RendererHandle::with_renderer(recorder.clone()));
        let session = Session::new(host.handle(), Arc::new(service));
        (host, session, recorder)
    }

    fn parse(line: &str) -> WireRequest {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(parse(r#"{"op": "create_updater"}"#), WireRequest::CreateUpdater);
        assert_eq!(
            parse(r#"{"op": "draw", "damage": {"x": 0, "y": 0, "width": 5, "height": 5}}"#),
            WireRequest::Draw {
                damage: Rect::new(0, 0, 5, 5)
            }
        );
        assert_eq!(
            serde_json::to_string(&WireReply::Drawn(Rect::new(1, 2, 3, 4))).unwrap(),
            r#"{"drawn":{"x":1,"y":2,"width":3,"height":4}}"#
        );
        assert_eq!(
            parse(r#"{"op": "set_cursor", "cursor": {"x": 3, "y": 4}}"#),
            WireRequest::SetCursor {
                cursor: Some(Point::new(3, 4))
            }
        );
        assert_eq!(
            parse(r#"{"op": "set_cursor", "cursor": null}"#),
            WireRequest::SetCursor { cursor: None }
        );
        assert_eq!(
            serde_json::to_string(&WireReply::Error("nope".into())).unwrap(),
            r#"{"error":"nope"}"#
        );
    }

    #[tokio::test]
    async fn test_allocate_and_draw() {
        let (host, mut session, _) = setup();
        let file = region_file(20 * 20 * 4);

        assert!(matches!(
            session.handle(WireRequest::CreateUpdater).await,
            WireReply::Created { .. }
        ));
        assert_eq!(
            session
                .handle(WireRequest::AllocateFramebuffer {
                    path: file.path().to_path_buf(),
                    size: Size::new(20, 20),
                    len: None,
                })
                .await,
            WireReply::Ok
        );
        assert_eq!(
            session
                .handle(WireRequest::Draw {
                    damage: Rect::new(10, 10, 30, 30)
                })
                .await,
            WireReply::Drawn(Rect::new(10, 10, 10, 10))
        );

        host.shutdown();
    }

    fn region_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0; len]).unwrap();
        file
    }

    #[tokio::test]
    async fn test_mapping_failure_is_reported() {
        let (host, mut session, _) = setup();
        let small = region_file(1024);
        let fits = region_file(8 * 8 * 4);

        session.handle(WireRequest::CreateUpdater).await;
        let reply = session
            .handle(WireRequest::AllocateFramebuffer {
                path: small.path().to_path_buf(),
                size: Size::new(64, 64),
                len: None,
            })
            .await;
        assert!(matches!(&reply, WireReply::Error(e) if e.starts_with("Mapping error")));

        // The failed connection is gone, later requests say so
        let reply = session
            .handle(WireRequest::AllocateFramebuffer {
                path: fits.path().to_path_buf(),
                size: Size::new(8, 8),
                len: None,
            })
            .await;
        assert!(matches!(&reply, WireReply::Error(e) if e.starts_with("No updater")));

        // A fresh connection works again
        session.handle(WireRequest::CreateUpdater).await;
        assert_eq!(
            session
                .handle(WireRequest::AllocateFramebuffer {
                    path: fits.path().to_path_buf(),
                    size: Size::new(8, 8),
                    len: None,
                })
                .await,
            WireReply::Ok
        );
        assert_eq!(
            session
                .handle(WireRequest::Draw {
                    damage: Rect::new(0, 0, 8, 8)
                })
                .await,
            WireReply::Drawn(Rect::new(0, 0, 8, 8))
        );

        host.shutdown();
    }

    #[tokio::test]
    async fn test_replaced_connection_is_reported() {
        let (host, mut first, _) = setup();
        let mut second = Session::new(host.handle(), first.service.clone());
        let fits = region_file(4 * 4 * 4);

        first.handle(WireRequest::CreateUpdater).await;
        second.handle(WireRequest::CreateUpdater).await;

        let reply = first
            .handle(WireRequest::AllocateFramebuffer {
                path: fits.path().to_path_buf(),
                size: Size::new(4, 4),
                len: None,
            })
            .await;
        assert!(matches!(&reply, WireReply::Error(e) if e.ends_with("is no longer the active connection")));

        host.shutdown();
    }

    #[tokio::test]
    async fn test_draw_before_allocate_is_abandoned() {
        let (host, mut session, _) = setup();

        session.handle(WireRequest::CreateUpdater).await;
        let reply = session
            .handle(WireRequest::Draw {
                damage: Rect::new(0, 0, 5, 5),
            })
            .await;
        assert_eq!(
            reply,
            WireReply::Error("Draw abandoned, connection closed".to_string())
        );
        assert!(matches!(
            session.handle(WireRequest::Draw { damage: Rect::new(0, 0, 5, 5) }).await,
            WireReply::Error(e) if e.starts_with("No updater")
        ));

        host.shutdown();
    }

    #[tokio::test]
    async fn test_requests_need_an_updater() {
        let (host, mut session, _) = setup();

        let reply = session
            .handle(WireRequest::Draw {
                damage: Rect::new(0, 0, 5, 5),
            })
            .await;
        assert!(matches!(reply, WireReply::Error(_)));

        host.shutdown();
    }

    #[tokio::test]
    async fn test_text_over_the_socket() {
        let (host, session, recorder) = setup();
        let (client, server) = UnixStream::pair().unwrap();
        let task = tokio::spawn(session.run(server));

        let (reader, mut writer) = client.into_split();
        let mut replies = BufReader::new(reader).lines();

        writer
            .write_all(
                br#"{"op":"draw_text","commands":[{"contents":"hi","bounds":{"x":10,"y":10,"width":20,"height":10},"color":{"r":255,"g":0,"b":0}}]}"#,
            )
            .await
            .unwrap();
        writer.write_all(b"\nnot json\n").await.unwrap();

        assert_eq!(replies.next_line().await.unwrap().unwrap(), r#""ok""#);
        let error = replies.next_line().await.unwrap().unwrap();
        assert!(error.starts_with(r#"{"error":"Invalid request"#));

        drop(writer);
        task.await.unwrap().unwrap();

        let batches = recorder.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].contents, "hi");

        host.shutdown();
    }
}
