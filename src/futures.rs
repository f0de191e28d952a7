use client::tracing;
use std::{any::Any, future::Future, sync::mpsc};

type AnyItem = Box<dyn Any + Send + 'static>;

/// Spawns futures on the tokio runtime and carries their outputs back to
/// the UI thread, where they are drained per output type once per frame.
pub struct Futures {
    queue: Vec<AnyItem>,
    rx: mpsc::Receiver<AnyItem>,
    tx: mpsc::Sender<AnyItem>,
    ctx: Option<egui::Context>,
}

impl Futures {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            ctx: None,
            queue: Vec::new(),
        }
    }

    pub fn init(&mut self, ctx: &egui::Context) {
        self.ctx = Some(ctx.clone());
    }

    pub fn spawn<Fut, Out>(&self, fut: Fut)
    where
        Fut: Future<Output = Out> + Send + 'static,
        Out: Send + 'static,
    {
        let tx = self.tx.clone();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let result = fut.await;
            if tx.send(Box::new(result)).is_err() {
                tracing::debug!("future output dropped before result was sent");
            }
            if let Some(ctx) = ctx {
                ctx.request_repaint();
            }
        });
    }

    /// Moves any completed outputs into the queue. Run once per frame.
    pub fn poll(&mut self) {
        while let Ok(item) = self.rx.try_recv() {
            self.queue.push(item);
        }
    }

    /// Extracts all queued outputs which have the type `T`.
    pub fn drain<T: 'static>(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.queue.len() {
            if self.queue[i].is::<T>() {
                let item = self.queue.remove(i);
                out.push(*item.downcast::<T>().expect("type compared above"));
            } else {
                i += 1;
            }
        }
        out
    }
}

impl Default for Futures {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! handle_future {
    ($state:ident, |$val:ident: $val_ty:ty| $handler:expr) => {
        for $val in $state.futures.drain::<$val_ty>() {
            $handler
        }
    };
}

pub(crate) use handle_future;
