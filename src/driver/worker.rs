use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{validate, ExchangeConfig};
use crate::driver::events::{ExchangeEvent, TransportEvent};
use crate::errors::ExchangeError;
use crate::net::{ExchangeHandle, HttpExchange, ReadyState, ResponseMetadata, TransportError, TransportErrorKind};

/// Applies transport events to a single exchange, one at a time.
///
/// The worker ends when the exchange reaches `Done`, when it is cancelled, or when the driver
/// breaks the event contract. On misuse the exchange is failed with an `Other` transport error,
/// so consumers still see `Done`, and `run` returns the misuse error.
pub struct ExchangeWorker {
    exchange: ExchangeHandle,
    event_rx: mpsc::Receiver<TransportEvent>,
    notify_tx: broadcast::Sender<ExchangeEvent>,
    cancel: CancellationToken,
}

impl ExchangeWorker {
    pub fn new(
        exchange: ExchangeHandle,
        event_rx: mpsc::Receiver<TransportEvent>,
        notify_tx: broadcast::Sender<ExchangeEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            exchange,
            event_rx,
            notify_tx,
            cancel,
        }
    }

    pub async fn run(mut self) -> Result<(), ExchangeError> {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    log::debug!("Exchange[{}]: cancelled", self.exchange.id());
                    self.terminate(TransportError::cancelled())?;
                    return Ok(());
                }

                msg = self.event_rx.recv() => {
                    let Some(event) = msg else {
                        // All senders are gone before the exchange finished
                        self.terminate(TransportError::new(
                            TransportErrorKind::Connection,
                            "transport closed before the exchange completed",
                        ))?;
                        return Ok(());
                    };

                    if let Err(e) = self.handle_event(event) {
                        let _ = self.notify_tx.send(ExchangeEvent::Misuse {
                            exchange_id: self.exchange.id(),
                            message: e.to_string(),
                        });
                        // Nobody will drive this exchange any further; consumers still need `Done`
                        let failure = TransportError::new(
                            TransportErrorKind::Other,
                            format!("transport driver misuse: {e}"),
                        );
                        if let Err(err) = self.terminate(failure) {
                            log::error!("Exchange[{}]: cannot terminate after misuse: {}", self.exchange.id(), err);
                        }
                        return Err(e);
                    }

                    if self.exchange.ready_state().is_done() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Fails the exchange unless it already finished.
    fn terminate(&self, error: TransportError) -> Result<(), ExchangeError> {
        let before = self.exchange.ready_state();
        if before.is_done() {
            return Ok(());
        }
        self.exchange.fail(error)?;
        self.announce(before);
        Ok(())
    }

    pub fn handle_event(&mut self, event: TransportEvent) -> Result<(), ExchangeError> {
        let before = self.exchange.ready_state();

        match event {
            TransportEvent::Request(request) => self.exchange.set_request(request)?,
            TransportEvent::Opened => self.exchange.open()?,
            TransportEvent::Response(response) => self.exchange.set_response(response)?,
            TransportEvent::Data(chunk) => {
                let progress = self.exchange.download_progress();
                self.exchange.append_data(&chunk)?;

                let now = self.exchange.download_progress();
                if now > progress {
                    let _ = self.notify_tx.send(ExchangeEvent::DownloadProgress {
                        exchange_id: self.exchange.id(),
                        progress: now,
                    });
                }
            }
            TransportEvent::UploadProgress { sent, total } => {
                let progress = self.exchange.upload_progress();
                self.exchange.update_upload_progress(sent, total);

                let now = self.exchange.upload_progress();
                if now > progress {
                    let _ = self.notify_tx.send(ExchangeEvent::UploadProgress {
                        exchange_id: self.exchange.id(),
                        progress: now,
                    });
                }
            }
            TransportEvent::Completed => self.exchange.finish()?,
            TransportEvent::Failed(error) => self.exchange.fail(error)?,
        }

        self.announce(before);
        Ok(())
    }

    /// Sends state change (and completion) notifications relative to `before`.
    fn announce(&self, before: ReadyState) {
        let after = self.exchange.ready_state();
        if after == before {
            return;
        }

        let exchange_id = self.exchange.id();
        let _ = self.notify_tx.send(ExchangeEvent::ReadyStateChanged { exchange_id, state: after });
        if after.is_done() {
            let _ = self.notify_tx.send(ExchangeEvent::Finished {
                exchange_id,
                error: self.exchange.error(),
            });
        }
    }
}

/// Owner side of a spawned [`ExchangeWorker`].
pub struct DriverHandle {
    exchange: ExchangeHandle,
    event_tx: mpsc::Sender<TransportEvent>,
    notify_tx: broadcast::Sender<ExchangeEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ExchangeError>>,
}

impl DriverHandle {
    /// Creates a fresh exchange and spawns its worker on the current tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    pub fn spawn(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        validate(config)?;
        let exchange = HttpExchange::with_config(config)?.into_handle();
        let (event_tx, event_rx) = mpsc::channel(config.driver_channel_capacity);
        let (notify_tx, _) = broadcast::channel(config.notify_channel_capacity);
        let cancel = CancellationToken::new();

        let worker = ExchangeWorker::new(exchange.clone(), event_rx, notify_tx.clone(), cancel.child_token());
        let task = tokio::spawn(worker.run());

        Ok(Self {
            exchange,
            event_tx,
            notify_tx,
            cancel,
            task,
        })
    }

    pub fn exchange(&self) -> &ExchangeHandle {
        &self.exchange
    }

    /// Additional sender, for transport code running on other tasks.
    pub fn sender(&self) -> mpsc::Sender<TransportEvent> {
        self.event_tx.clone()
    }

    /// Subscribes to notifications. Only events sent after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeEvent> {
        self.notify_tx.subscribe()
    }

    pub async fn send(&self, event: TransportEvent) -> Result<(), ExchangeError> {
        self.event_tx.send(event).await.map_err(|_| ExchangeError::DriverClosed)
    }

    /// Streams a `reqwest` response into the exchange: head, body chunks, then completion.
    ///
    /// The request must already be bound and opened. A body read error is delivered as a
    /// transport failure instead of being returned.
    pub async fn feed_response(&self, mut response: reqwest::Response) -> Result<(), ExchangeError> {
        self.send(TransportEvent::Response(ResponseMetadata::from(&response))).await?;

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => self.send(TransportEvent::Data(chunk.to_vec())).await?,
                Ok(None) => return self.send(TransportEvent::Completed).await,
                Err(e) => return self.send(TransportEvent::Failed(e.into())).await,
            }
        }
    }

    /// Cancels the exchange. It ends in `Done` with a `Cancelled` transport error.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the worker to stop and returns its result.
    pub async fn join(self) -> Result<(), ExchangeError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Exchange[{}]: worker task failed: {}", self.exchange.id(), e);
                Err(ExchangeError::DriverClosed)
            }
        }
    }
}
