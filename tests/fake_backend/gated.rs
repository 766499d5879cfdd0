//! A backend whose replies are released by the test
//!
//! Every call parks on arrival. The test inspects what is parked and
//! releases calls one by one, in any order, either answered from the
//! wrapped `MemoryBackend` or failed at the transport level. A call the
//! tracker abandons drops out of the parked list on its own.

use async_trait::async_trait;
use mail_ui_core::{Backend, Error, MemoryBackend, Method, Request, Result, Snapshot};
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::{Notify, oneshot};

enum Release {
    Answer,
    Fail(String),
}

struct Parked {
    request: Request,
    release: oneshot::Sender<Release>,
}

#[derive(Default)]
struct Gate {
    parked: Vec<Parked>,
    answered: usize,
}

impl Gate {
    /// Parked calls whose caller is still waiting.
    fn live(&mut self) -> &mut Vec<Parked> {
        self.parked.retain(|p| !p.release.is_closed());
        &mut self.parked
    }
}

pub struct GatedBackend {
    inner: MemoryBackend,
    gate: Mutex<Gate>,
    changed: Notify,
}

impl GatedBackend {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: MemoryBackend::new(snapshot),
            gate: Mutex::new(Gate::default()),
            changed: Notify::new(),
        }
    }

    /// Wait until at least `n` calls are parked.
    pub async fn wait_parked(&self, n: usize) {
        loop {
            if self.gate.lock().unwrap().live().len() >= n {
                return;
            }
            self.changed.notified().await;
        }
    }

    /// Wait until `n` calls in total have been answered or failed.
    ///
    /// Once this returns on a current-thread runtime, the answers have
    /// reached the tracker's settlement queue.
    pub async fn wait_answered(&self, n: usize) {
        loop {
            if self.gate.lock().unwrap().answered >= n {
                return;
            }
            self.changed.notified().await;
        }
    }

    /// Methods of the parked calls, in arrival order.
    pub fn parked(&self) -> Vec<Method> {
        self.gate
            .lock()
            .unwrap()
            .live()
            .iter()
            .map(|p| p.request.method)
            .collect()
    }

    /// Parameters of the parked call at `index`.
    pub fn parked_request(&self, index: usize) -> Request {
        self.gate.lock().unwrap().live()[index].request.clone()
    }

    /// Answer the parked call at `index`.
    pub fn release(&self, index: usize) {
        self.open(index, Release::Answer);
    }

    /// Answer the first parked call of `method`.
    pub fn release_method(&self, method: Method) {
        let index = self
            .parked()
            .iter()
            .position(|m| *m == method)
            .unwrap_or_else(|| panic!("no parked {method} call"));
        self.release(index);
    }

    /// Fail the parked call at `index` with a transport error.
    pub fn fail(&self, index: usize, message: &str) {
        self.open(index, Release::Fail(message.to_string()));
    }

    /// Answer every parked call, newest first.
    pub fn release_all_reversed(&self) {
        let parked: Vec<Parked> = std::mem::take(self.gate.lock().unwrap().live());
        for call in parked.into_iter().rev() {
            let _ = call.release.send(Release::Answer);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }

    fn open(&self, index: usize, release: Release) {
        let call = self.gate.lock().unwrap().live().remove(index);
        let _ = call.release.send(release);
    }
}

#[async_trait]
impl Backend for GatedBackend {
    async fn call(&self, request: Request) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.gate.lock().unwrap().parked.push(Parked {
            request: request.clone(),
            release: tx,
        });
        self.changed.notify_one();

        let release = rx
            .await
            .map_err(|_| Error::Transport("gate closed".to_string()))?;
        let reply = match release {
            Release::Answer => self.inner.call(request).await,
            Release::Fail(message) => Err(Error::Transport(message)),
        };

        self.gate.lock().unwrap().answered += 1;
        self.changed.notify_one();
        reply
    }
}
