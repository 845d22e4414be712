//! Scriptable transport for tests and demos
//!
//! [`RecordingApi`] records every write and succeeds unless a failure was
//! scripted for the key with [`RecordingApi::fail_key`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::appliance::ApplianceApi;
use crate::error::{HomeConnectError, HomeConnectResult};

/// A write that reached the transport
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    SetOption {
        ha_id: String,
        key: String,
        value: Value,
    },
    ApplySetting {
        ha_id: String,
        key: String,
        value: Value,
    },
}

impl ApiCall {
    /// The value that was sent
    pub fn value(&self) -> &Value {
        match self {
            ApiCall::SetOption { value, .. } | ApiCall::ApplySetting { value, .. } => value,
        }
    }
}

/// Transport that records writes instead of sending them
#[derive(Debug, Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    failures: Mutex<HashMap<String, HomeConnectError>>,
}

impl RecordingApi {
    /// Create a transport where every write succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `key` fail with `error`
    pub fn fail_key(&self, key: impl Into<String>, error: HomeConnectError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), error);
    }

    /// Stop failing writes to `key`
    pub fn clear_failure(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// All writes seen so far, in order
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent write
    pub fn last_call(&self) -> Option<ApiCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    fn record(&self, key: &str, call: ApiCall) -> HomeConnectResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        match self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ApplianceApi for RecordingApi {
    async fn set_option(&self, ha_id: &str, key: &str, value: Value) -> HomeConnectResult<()> {
        self.record(
            key,
            ApiCall::SetOption {
                ha_id: ha_id.to_string(),
                key: key.to_string(),
                value,
            },
        )
    }

    async fn apply_setting(&self, ha_id: &str, key: &str, value: Value) -> HomeConnectResult<()> {
        self.record(
            key,
            ApiCall::ApplySetting {
                ha_id: ha_id.to_string(),
                key: key.to_string(),
                value,
            },
        )
    }
}
