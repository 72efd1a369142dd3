use std::sync::Arc;

use tokio::sync::watch;

/// Triggers the [`StopSignal`] it was created with.
#[derive(Debug)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.sender.send_replace(true);
    }
}

/// Cooperative cancellation flag shared by background tasks.
#[derive(Clone, Debug)]
pub struct StopSignal {
    receiver: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn root() -> (StopHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        (StopHandle { sender: Arc::new(sender) }, Self { receiver })
    }

    /// A signal that fires when either `self` or the returned handle is triggered.
    ///
    /// Must be called from within a tokio runtime.
    pub fn child(&self) -> (StopHandle, Self) {
        let (sender, receiver) = watch::channel(self.is_stopped());
        let sender = Arc::new(sender);

        let parent = self.clone();
        let forward = Arc::clone(&sender);
        tokio::spawn(async move {
            tokio::select! {
                () = parent.stopped() => {
                    forward.send_replace(true);
                }
                () = forward.closed() => {}
            }
        });

        (StopHandle { sender }, Self { receiver })
    }

    pub fn is_stopped(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal fires. Never resolves if every handle was dropped untriggered.
    pub async fn stopped(&self) {
        let mut receiver = self.receiver.clone();
        let result = receiver.wait_for(|stopped| *stopped).await.map(|_| ());
        if result.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
