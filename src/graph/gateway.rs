use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, warn};

use crate::util::substitute_id;

use super::error::FetchError;
use super::model::NodeDescriptor;
use super::registry::FetchTicket;

pub struct FetchReply {
    pub ticket: FetchTicket,
    pub node_id: String,
    pub result: Result<NodeDescriptor, FetchError>,
}

/// Resolves a node id to its descriptor, asynchronously.
///
/// `request` must not block; the reply shows up in a later `poll`.
pub trait ChildGateway {
    fn request(&mut self, ticket: FetchTicket, node_id: &str);

    /// Best effort: a cancelled reply may still arrive and is ignored by the caller.
    fn cancel(&mut self, _ticket: FetchTicket) {}

    fn poll(&mut self) -> Vec<FetchReply>;
}

struct InFlight {
    ticket: FetchTicket,
    node_id: String,
    rx: Receiver<Result<NodeDescriptor, FetchError>>,
}

/// Reads `<template with [%id%] replaced>` from disk on worker threads.
///
/// Each request owns its reply channel; cancelling drops the receiver and a
/// worker that goes away without answering is reported as
/// [`FetchError::Disconnected`].
pub struct FileGateway {
    location_template: String,
    in_flight: Vec<InFlight>,
}

impl FileGateway {
    pub fn new(location_template: impl Into<String>) -> Self {
        Self {
            location_template: location_template.into(),
            in_flight: Vec::new(),
        }
    }

    pub fn location_for(&self, node_id: &str) -> PathBuf {
        PathBuf::from(substitute_id(&self.location_template, node_id))
    }

    fn load(path: PathBuf) -> Result<NodeDescriptor, FetchError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| FetchError::Decode { path, source })
    }
}

impl ChildGateway for FileGateway {
    fn request(&mut self, ticket: FetchTicket, node_id: &str) {
        let (tx, rx) = mpsc::channel();
        if node_id.is_empty() || node_id.contains(['/', '\\']) || node_id.contains("..") {
            warn!(?ticket, node_id, "refusing to fetch an id that is not a plain name");
            let _ = tx.send(Err(FetchError::Rejected(format!(
                "node id {node_id:?} cannot be used in a data location"
            ))));
        } else {
            let path = self.location_for(node_id);
            debug!(?ticket, path = %path.display(), "fetching children");
            thread::spawn(move || {
                let _ = tx.send(Self::load(path));
            });
        }
        self.in_flight.push(InFlight {
            ticket,
            node_id: node_id.to_owned(),
            rx,
        });
    }

    fn cancel(&mut self, ticket: FetchTicket) {
        let before = self.in_flight.len();
        self.in_flight.retain(|request| request.ticket != ticket);
        if self.in_flight.len() < before {
            debug!(?ticket, "dropping cancelled fetch");
        }
    }

    fn poll(&mut self) -> Vec<FetchReply> {
        let mut replies = Vec::new();
        self.in_flight.retain(|request| {
            let result = match request.rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    warn!(ticket = ?request.ticket, node_id = %request.node_id, "fetch worker went away");
                    Err(FetchError::Disconnected)
                }
            };
            replies.push(FetchReply {
                ticket: request.ticket,
                node_id: request.node_id.clone(),
                result,
            });
            false
        });
        replies
    }
}
