use crate::net::output::Envelope;
use crate::net::sink::ClientSink;
use async_trait::async_trait;
use futures::SinkExt;

pub struct WebSocketSink<S, M> {
    ws: S,
    _phantom: std::marker::PhantomData<M>,
}

impl<S, M> WebSocketSink<S, M> {
    pub fn new(ws: S) -> Self {
        Self {
            ws,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<S, M> ClientSink for WebSocketSink<S, M>
where
    S: SinkExt<M> + Unpin + Send,
    S::Error: std::error::Error + Send + Sync + 'static,
    M: From<String> + Send,
{
    async fn send_frame(&mut self, env: Envelope, seq: u64) -> anyhow::Result<()> {
        let json = serde_json::to_string(&env)?;
        tracing::trace!(seq, kind = %env.kind, "ws frame");

        self.ws
            .send(M::from(json))
            .await
            .map_err(|e| anyhow::Error::msg(format!("websocket send failed: {e}")))?;

        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.ws
            .close()
            .await
            .map_err(|e| anyhow::Error::msg(format!("websocket close failed: {e}")))
    }
}
