pub(crate) mod read;
pub(crate) mod write;

use std::collections::HashMap;
use std::sync::Arc;

use segstore_protocol::envelope::Message;
use tokio::sync::{Mutex, oneshot};

/// Requests waiting for their response, keyed by request id.
pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;
