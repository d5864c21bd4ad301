use async_trait::async_trait;
use feedlens_core::{CoreError, MessageBus, Request, Response};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::service::BackgroundService;

pub type Envelope = (Request, oneshot::Sender<Response>);

/// Page-side end of the channel into the background context.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    sender: mpsc::Sender<Envelope>,
}

impl ChannelBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessageBus for ChannelBus {
    async fn send(&self, request: Request) -> Result<Response, CoreError> {
        let action = request.action();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender
            .send((request, reply_tx))
            .await
            .map_err(|_| CoreError::ContextInvalidated {
                context: format!("{action}: background context is gone"),
            })?;

        reply_rx.await.map_err(|_| CoreError::ContextInvalidated {
            context: format!("{action}: no reply from background context"),
        })
    }
}

/// Serves requests until every [`ChannelBus`] handle is dropped.
///
/// Each request runs on its own task, so replies may complete out of order.
pub fn serve(service: Arc<BackgroundService>, mut receiver: mpsc::Receiver<Envelope>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Background context listening");
        while let Some((request, reply)) = receiver.recv().await {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let response = service.handle(request).await;
                if reply.send(response).is_err() {
                    debug!("Requester went away before the reply");
                }
            });
        }
        info!("Background context stopped");
    })
}
