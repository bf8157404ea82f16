// Template acquisition requests
// A lookup that has no template asks whoever owns user interaction to
// capture one, then waits for the answer on a oneshot channel.
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub struct AcquisitionRequest {
    pub element_name: String,
    pub description: String,
    /// `true` means a template for the element is now in the library
    pub response_tx: oneshot::Sender<bool>,
}

impl AcquisitionRequest {
    pub fn respond(self, acquired: bool) {
        if self.response_tx.send(acquired).is_err() {
            log::debug!("Requester for '{}' went away before the answer", self.element_name);
        }
    }
}

/// Sending half handed to the element locator
#[derive(Debug, Clone)]
pub struct AcquisitionClient {
    tx: mpsc::Sender<AcquisitionRequest>,
}

impl AcquisitionClient {
    pub fn new(tx: mpsc::Sender<AcquisitionRequest>) -> Self {
        Self { tx }
    }

    /// Ask for a template and wait; a closed channel counts as a refusal
    pub async fn request(&self, element_name: &str, description: &str) -> bool {
        let (response_tx, response_rx) = oneshot::channel();
        let request = AcquisitionRequest {
            element_name: element_name.to_string(),
            description: description.to_string(),
            response_tx,
        };
        if self.tx.send(request).await.is_err() {
            log::warn!("No template capture handler for '{}'", element_name);
            return false;
        }
        response_rx.await.unwrap_or(false)
    }
}

/// Helper function to create the acquisition channel
pub fn create_acquisition_channel() -> (AcquisitionClient, mpsc::Receiver<AcquisitionRequest>) {
    let (tx, rx) = mpsc::channel(8);
    (AcquisitionClient::new(tx), rx)
}
