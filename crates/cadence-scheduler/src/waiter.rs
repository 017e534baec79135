//! Material update completion routing for manual triggers.
//!
//! A manual trigger refreshes its materials before scheduling. The refresh
//! itself happens out-of-band in the material update subsystem; completion
//! comes back here, one message per material per update cycle, and is fanned
//! out to the waiter task of every in-flight manual trigger. Each waiter
//! filters by its own pending set, so delivering a message to a trigger that
//! is not waiting on that material is harmless.

use cadence_core::material::Material;
use cadence_core::PipelineName;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::debug;

/// Completion report for one material's update cycle.
#[derive(Debug, Clone)]
pub enum MaterialUpdateMessage {
    Completed { material: Material },
    Failed { material: Material, reason: String },
}

impl MaterialUpdateMessage {
    pub fn material(&self) -> &Material {
        match self {
            MaterialUpdateMessage::Completed { material } => material,
            MaterialUpdateMessage::Failed { material, .. } => material,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MaterialUpdateMessage::Failed { .. })
    }
}

/// Registry of in-flight manual triggers waiting on material updates.
///
/// The material update subsystem delivers completions through
/// [`on_material_update`](Self::on_material_update); registered waiter tasks
/// consume them from their channel. There is no update timeout: a stalled
/// material update leaves its pipeline's trigger flag set until the process
/// restarts, which operators surface through the health service.
pub struct MaterialUpdateNotifier {
    listeners: RwLock<HashMap<PipelineName, UnboundedSender<MaterialUpdateMessage>>>,
}

impl MaterialUpdateNotifier {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, pipeline: PipelineName, sender: UnboundedSender<MaterialUpdateMessage>) {
        debug!(pipeline = %pipeline, "registering material update listener");
        self.listeners.write().await.insert(pipeline, sender);
    }

    pub async fn remove(&self, pipeline: &PipelineName) {
        debug!(pipeline = %pipeline, "removing material update listener");
        self.listeners.write().await.remove(pipeline);
    }

    pub async fn has_listener_for(&self, pipeline: &PipelineName) -> bool {
        self.listeners.read().await.contains_key(pipeline)
    }

    /// Entry point for the material update subsystem: fan the completion out
    /// to every waiting trigger.
    pub async fn on_material_update(&self, message: MaterialUpdateMessage) {
        let listeners = self.listeners.read().await;
        for sender in listeners.values() {
            // A closed channel means the waiter already finished; skip it.
            let _ = sender.send(message.clone());
        }
    }
}

impl Default for MaterialUpdateNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::config::MaterialConfig;
    use tokio::sync::mpsc;

    fn material(url: &str) -> Material {
        Material::new(MaterialConfig::Git {
            url: url.to_string(),
            branch: "master".to_string(),
            username: None,
        })
    }

    #[tokio::test]
    async fn test_routes_messages_to_registered_listeners() {
        let notifier = MaterialUpdateNotifier::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        notifier.register("p1".into(), tx).await;

        notifier
            .on_material_update(MaterialUpdateMessage::Completed {
                material: material("url"),
            })
            .await;

        let message = rx.recv().await.unwrap();
        assert!(!message.is_failure());
    }

    #[tokio::test]
    async fn test_removed_listener_gets_nothing() {
        let notifier = MaterialUpdateNotifier::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        notifier.register("p1".into(), tx).await;
        notifier.remove(&"p1".into()).await;
        assert!(!notifier.has_listener_for(&"p1".into()).await);

        notifier
            .on_material_update(MaterialUpdateMessage::Completed {
                material: material("url"),
            })
            .await;

        assert!(rx.try_recv().is_err());
    }
}
