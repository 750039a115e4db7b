use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::chord::migration;
use crate::chord::routing;
use crate::chord::types::{ChordState, File, FileBatch, IdSpace, NodeId, NodeSnapshot, NodeStatus};
use crate::chord::ACTOR_MAILBOX_SIZE;
use crate::error::ChordError;
use crate::storage::{Bucket, ContentStore};

/// Actor Messages
/// Each message includes a oneshot sender, so the actor processes the message and sends the response back through the corresponding sender
#[derive(Debug)]
pub enum ChordMessage {
    // Lifecycle
    Create {
        respond_to: oneshot::Sender<()>,
    },
    BeginJoin {
        respond_to: oneshot::Sender<()>,
    },
    SetStatus {
        status: NodeStatus,
        respond_to: oneshot::Sender<()>,
    },
    GetStatus {
        respond_to: oneshot::Sender<NodeStatus>,
    },
    /// Enter `Leaving` and export the bucket in the same step, so nothing
    /// can be stored between the export and the status change.
    BeginLeave {
        respond_to: oneshot::Sender<FileBatch>,
    },

    // Routing
    FindSuccessor {
        id: NodeId,
        respond_to: oneshot::Sender<(bool, String)>,
    },

    // Ring maintenance
    GetPredecessor {
        respond_to: oneshot::Sender<Option<String>>,
    },
    Notify {
        candidate: String,
        respond_to: oneshot::Sender<bool>,
    },
    ClearPredecessor {
        expected: String,
        respond_to: oneshot::Sender<bool>,
    },
    GetSuccessors {
        respond_to: oneshot::Sender<Vec<Option<String>>>,
    },
    SetSuccessor {
        successor: String,
        respond_to: oneshot::Sender<()>,
    },
    ReplaceSuccessor {
        expected: String,
        successor: String,
        respond_to: oneshot::Sender<bool>,
    },
    ReconcileSuccessors {
        successor: String,
        list: Vec<String>,
        respond_to: oneshot::Sender<bool>,
    },
    PromoteSuccessor {
        failed: String,
        index: usize,
        respond_to: oneshot::Sender<Option<String>>,
    },
    SetFinger {
        index: usize,
        address: String,
        respond_to: oneshot::Sender<()>,
    },

    // Data
    StoreFile {
        file: File,
        respond_to: oneshot::Sender<Result<(), ChordError>>,
    },
    BulkInstall {
        files: FileBatch,
        respond_to: oneshot::Sender<Result<usize, ChordError>>,
    },
    TakeTransferSet {
        new_predecessor: NodeId,
        respond_to: oneshot::Sender<Result<FileBatch, ChordError>>,
    },
    DiscardAll {
        respond_to: oneshot::Sender<()>,
    },

    Snapshot {
        respond_to: oneshot::Sender<NodeSnapshot>,
    },
}

/// The Actor responsible for handling chord messages.
/// It is the only owner of the ring state and the bucket.
pub struct ChordActor {
    state: ChordState,
    bucket: Bucket,
    store: Arc<dyn ContentStore>,
    receiver: mpsc::Receiver<ChordMessage>,
}

impl ChordActor {
    pub fn new(state: ChordState, store: Arc<dyn ContentStore>, receiver: mpsc::Receiver<ChordMessage>) -> Self {
        Self {
            state,
            bucket: Bucket::new(),
            store,
            receiver,
        }
    }

    /// Runs until every handle has been dropped.
    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        debug!("Ring actor for {} stopped", self.state.node_id);
    }

    async fn handle_message(&mut self, msg: ChordMessage) {
        match msg {
            ChordMessage::Create { respond_to } => {
                let me = self.state.address.clone();
                self.state.predecessor = Some(me.clone());
                self.state.set_successor(me);
                self.state.status = NodeStatus::Active;
                info!("Node {} created a new ring of size 2^{}", self.state.node_id, self.state.space.bits());
                let _ = respond_to.send(());
            }
            ChordMessage::BeginJoin { respond_to } => {
                self.state.predecessor = None;
                self.state.status = NodeStatus::Joining;
                let _ = respond_to.send(());
            }
            ChordMessage::SetStatus { status, respond_to } => {
                debug!("Node {} status {} -> {}", self.state.node_id, self.state.status, status);
                self.state.status = status;
                let _ = respond_to.send(());
            }
            ChordMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.state.status);
            }
            ChordMessage::BeginLeave { respond_to } => {
                self.state.status = NodeStatus::Leaving;
                let batch = migration::export_all(&self.bucket, self.store.as_ref(), self.state.node_id).await;
                let _ = respond_to.send(batch);
            }
            ChordMessage::FindSuccessor { id, respond_to } => {
                let _ = respond_to.send(routing::find_successor(&self.state, &id));
            }
            ChordMessage::GetPredecessor { respond_to } => {
                let _ = respond_to.send(self.state.predecessor.clone());
            }
            ChordMessage::Notify { candidate, respond_to } => {
                let changed = self.state.notify(candidate);
                if changed {
                    info!("Node {} adopted predecessor {:?}", self.state.node_id, self.state.predecessor);
                }
                let _ = respond_to.send(changed);
            }
            ChordMessage::ClearPredecessor { expected, respond_to } => {
                let cleared = self.state.predecessor.as_ref() == Some(&expected);
                if cleared {
                    warn!("Node {} cleared failed predecessor {}", self.state.node_id, expected);
                    self.state.predecessor = None;
                }
                let _ = respond_to.send(cleared);
            }
            ChordMessage::GetSuccessors { respond_to } => {
                let _ = respond_to.send(self.state.successors.clone());
            }
            ChordMessage::SetSuccessor { successor, respond_to } => {
                self.state.set_successor(successor);
                let _ = respond_to.send(());
            }
            ChordMessage::ReplaceSuccessor {
                expected,
                successor,
                respond_to,
            } => {
                let replaced = self.state.successor() == Some(&expected);
                if replaced {
                    debug!("Node {} successor {} -> {}", self.state.node_id, expected, successor);
                    self.state.successors[0] = Some(successor);
                }
                let _ = respond_to.send(replaced);
            }
            ChordMessage::ReconcileSuccessors {
                successor,
                list,
                respond_to,
            } => {
                let current = self.state.successor() == Some(&successor);
                if current {
                    self.state.reconcile_successors(successor, list);
                }
                let _ = respond_to.send(current);
            }
            ChordMessage::PromoteSuccessor {
                failed,
                index,
                respond_to,
            } => {
                let promoted = if self.state.successor() == Some(&failed) {
                    self.state.promote_successor(index)
                } else {
                    None
                };
                if let Some(new_successor) = &promoted {
                    warn!(
                        "Node {} replaced failed successor {} with {}",
                        self.state.node_id, failed, new_successor
                    );
                }
                let _ = respond_to.send(promoted);
            }
            ChordMessage::SetFinger {
                index,
                address,
                respond_to,
            } => {
                if let Some(entry) = self.state.finger_table.get_mut(index) {
                    *entry = Some(address);
                }
                let _ = respond_to.send(());
            }
            ChordMessage::StoreFile { file, respond_to } => {
                let result = self.store_file(file).await;
                let _ = respond_to.send(result);
            }
            ChordMessage::BulkInstall { files, respond_to } => {
                let result = self.bulk_install(files).await;
                let _ = respond_to.send(result);
            }
            ChordMessage::TakeTransferSet {
                new_predecessor,
                respond_to,
            } => {
                let result = self.take_transfer_set(new_predecessor).await;
                let _ = respond_to.send(result);
            }
            ChordMessage::DiscardAll { respond_to } => {
                migration::discard_all(&mut self.bucket, self.store.as_ref(), self.state.node_id).await;
                let _ = respond_to.send(());
            }
            ChordMessage::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    /// Data changes are refused once the node has started leaving: the
    /// bucket must stay equal to the handoff payload.
    fn accepts_data(&self) -> Result<(), ChordError> {
        match self.state.status {
            NodeStatus::Leaving | NodeStatus::Stopped => Err(ChordError::NotActive(format!(
                "{} is {}",
                self.state.address, self.state.status
            ))),
            _ => Ok(()),
        }
    }

    async fn store_file(&mut self, file: File) -> Result<(), ChordError> {
        self.accepts_data()?;
        if !self.state.owns(&file.id) {
            warn!("Node {} refused {} with foreign id {}", self.state.node_id, file.name, file.id);
            return Err(ChordError::NotOwner { id: file.id });
        }
        migration::store_file(&mut self.bucket, self.store.as_ref(), self.state.node_id, file).await?;
        Ok(())
    }

    async fn bulk_install(&mut self, files: FileBatch) -> Result<usize, ChordError> {
        self.accepts_data()?;
        let owner = self.state.node_id;
        let installed = migration::bulk_install(&mut self.bucket, self.store.as_ref(), owner, files).await;
        info!("Node {} installed {} transferred files", owner, installed);
        Ok(installed)
    }

    async fn take_transfer_set(&mut self, new_predecessor: NodeId) -> Result<FileBatch, ChordError> {
        self.accepts_data()?;
        let owner = self.state.node_id;
        let old_predecessor = self
            .state
            .predecessor
            .as_ref()
            .map_or(owner, |p| self.state.id_of(p));
        Ok(migration::take_transfer_set(
            &mut self.bucket,
            self.store.as_ref(),
            owner,
            old_predecessor,
            new_predecessor,
        )
        .await)
    }

    fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            node_id: self.state.node_id,
            address: self.state.address.clone(),
            label: self.state.label.clone(),
            ring_bits: self.state.space.bits(),
            status: self.state.status,
            predecessor: self.state.predecessor.clone(),
            successors: self.state.successors.clone(),
            fingers: self.state.finger_table.clone(),
            bucket: self.bucket.to_map(),
        }
    }
}

/// Actor handle for interacting with the ChordActor.
/// Immutable node facts are cached here so reading them never queues behind
/// state mutations.
#[derive(Clone, Debug)]
pub struct ChordHandle {
    sender: mpsc::Sender<ChordMessage>,
    space: IdSpace,
    node_id: NodeId,
    address: String,
    label: String,
}

impl ChordHandle {
    pub fn new(state: ChordState, store: Arc<dyn ContentStore>) -> (Self, ChordActor) {
        let (sender, receiver) = mpsc::channel(ACTOR_MAILBOX_SIZE);
        let handle = Self {
            sender,
            space: state.space,
            node_id: state.node_id,
            address: state.address.clone(),
            label: state.label.clone(),
        };
        (handle, ChordActor::new(state, store, receiver))
    }

    pub fn space(&self) -> IdSpace {
        self.space
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ChordMessage) -> Result<T, ChordError> {
        let (send, recv) = oneshot::channel();
        self.sender
            .send(make(send))
            .await
            .map_err(|_| ChordError::ActorUnavailable)?;
        recv.await.map_err(|_| ChordError::ActorUnavailable)
    }

    pub async fn create(&self) -> Result<(), ChordError> {
        self.request(|respond_to| ChordMessage::Create { respond_to }).await
    }

    pub async fn begin_join(&self) -> Result<(), ChordError> {
        self.request(|respond_to| ChordMessage::BeginJoin { respond_to }).await
    }

    pub async fn set_status(&self, status: NodeStatus) -> Result<(), ChordError> {
        self.request(|respond_to| ChordMessage::SetStatus { status, respond_to }).await
    }

    pub async fn status(&self) -> Result<NodeStatus, ChordError> {
        self.request(|respond_to| ChordMessage::GetStatus { respond_to }).await
    }

    pub async fn find_successor(&self, id: NodeId) -> Result<(bool, String), ChordError> {
        self.request(|respond_to| ChordMessage::FindSuccessor { id, respond_to }).await
    }

    pub async fn predecessor(&self) -> Result<Option<String>, ChordError> {
        self.request(|respond_to| ChordMessage::GetPredecessor { respond_to }).await
    }

    pub async fn notify(&self, candidate: String) -> Result<bool, ChordError> {
        self.request(|respond_to| ChordMessage::Notify { candidate, respond_to }).await
    }

    /// Clear the predecessor only if it is still `expected`.
    pub async fn clear_predecessor(&self, expected: String) -> Result<bool, ChordError> {
        self.request(|respond_to| ChordMessage::ClearPredecessor { expected, respond_to }).await
    }

    /// The full successor list including cleared slots.
    pub async fn successors(&self) -> Result<Vec<Option<String>>, ChordError> {
        self.request(|respond_to| ChordMessage::GetSuccessors { respond_to }).await
    }

    pub async fn successor(&self) -> Result<Option<String>, ChordError> {
        Ok(self.successors().await?.into_iter().next().flatten())
    }

    /// Non-empty successor entries, as served to peers.
    pub async fn successor_list(&self) -> Result<Vec<String>, ChordError> {
        Ok(self.successors().await?.into_iter().flatten().collect())
    }

    /// Set successor and first finger together.
    pub async fn set_successor(&self, successor: String) -> Result<(), ChordError> {
        self.request(|respond_to| ChordMessage::SetSuccessor { successor, respond_to }).await
    }

    pub async fn replace_successor(&self, expected: String, successor: String) -> Result<bool, ChordError> {
        self.request(|respond_to| ChordMessage::ReplaceSuccessor {
            expected,
            successor,
            respond_to,
        })
        .await
    }

    pub async fn reconcile_successors(&self, successor: String, list: Vec<String>) -> Result<bool, ChordError> {
        self.request(|respond_to| ChordMessage::ReconcileSuccessors {
            successor,
            list,
            respond_to,
        })
        .await
    }

    pub async fn promote_successor(&self, failed: String, index: usize) -> Result<Option<String>, ChordError> {
        self.request(|respond_to| ChordMessage::PromoteSuccessor {
            failed,
            index,
            respond_to,
        })
        .await
    }

    pub async fn set_finger(&self, index: usize, address: String) -> Result<(), ChordError> {
        self.request(|respond_to| ChordMessage::SetFinger {
            index,
            address,
            respond_to,
        })
        .await
    }

    pub async fn store_file(&self, file: File) -> Result<(), ChordError> {
        self.request(|respond_to| ChordMessage::StoreFile { file, respond_to })
            .await?
    }

    pub async fn bulk_install(&self, files: FileBatch) -> Result<usize, ChordError> {
        self.request(|respond_to| ChordMessage::BulkInstall { files, respond_to })
            .await?
    }

    pub async fn take_transfer_set(&self, new_predecessor: NodeId) -> Result<FileBatch, ChordError> {
        self.request(|respond_to| ChordMessage::TakeTransferSet {
            new_predecessor,
            respond_to,
        })
        .await?
    }

    /// Switch to `Leaving` and return everything stored, atomically.
    pub async fn begin_leave(&self) -> Result<FileBatch, ChordError> {
        self.request(|respond_to| ChordMessage::BeginLeave { respond_to }).await
    }

    pub async fn discard_all(&self) -> Result<(), ChordError> {
        self.request(|respond_to| ChordMessage::DiscardAll { respond_to }).await
    }

    pub async fn snapshot(&self) -> Result<NodeSnapshot, ChordError> {
        self.request(|respond_to| ChordMessage::Snapshot { respond_to }).await
    }
}
