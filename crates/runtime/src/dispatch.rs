// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session dispatch across a runtime's instances.
//!
//! `listen` binds a session to one instance picked round-robin; the
//! binding is fixed for the session's lifetime — there is no rebalancing
//! after the fact.

use std::sync::Arc;

use thiserror::Error;

use warden_core::broadcast::{self, Subscription, SESSION_QUEUE_DEPTH};
use warden_core::error::NotFoundError;
use warden_wire::SessionMessage;

use crate::runtime::LocalPluginRuntime;

/// Failures while writing a request frame into a session.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("failed to write to plugin stdin: {0}")]
    Io(#[from] std::io::Error),
}

impl LocalPluginRuntime {
    /// Subscribe to replies for `session_id`. The subscription detaches
    /// the listener and clears the binding when dropped.
    pub fn listen(
        &self,
        session_id: &str,
    ) -> Result<Subscription<SessionMessage>, NotFoundError> {
        let instance = self.pick_lowest_load_instance()?;

        self.session_to_instance
            .write()
            .insert(session_id.to_string(), Arc::clone(&instance));

        let (sender, subscription) = broadcast::channel(SESSION_QUEUE_DEPTH);

        let weak_runtime = self.weak_self();
        let weak_instance = Arc::downgrade(&instance);
        let close_session_id = session_id.to_string();
        subscription.on_close(move || {
            if let Some(instance) = weak_instance.upgrade() {
                instance.detach_listener(&close_session_id);
            }
            if let Some(runtime) = weak_runtime.upgrade() {
                runtime.session_to_instance.write().remove(&close_session_id);
            }
        });

        instance.attach_listener(session_id, sender);
        Ok(subscription)
    }

    /// Write one request frame to the instance bound to `session_id`.
    pub async fn write(&self, session_id: &str, data: &[u8]) -> Result<(), WriteError> {
        let instance = self
            .session_to_instance
            .read()
            .get(session_id)
            .cloned()
            .ok_or(NotFoundError::Session)?;

        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.extend_from_slice(data);
        frame.push(b'\n');
        instance.write(&frame).await?;
        Ok(())
    }
}
