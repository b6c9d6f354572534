//! In-process backends
//!
//! Drop-in implementations of [`StackDescriber`], [`KeyManagement`] and
//! [`ObjectStore`] for tests and local use. Each records how often it was
//! called and can be told to fail the next N calls with a given error.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::{DataKey, KeyManagement, DATA_KEY_SIZE, NONCE_SIZE};
use crate::error::BackendError;
use crate::resolver::{StackDescriber, StackOutputs};
use crate::storage::{ListPage, ObjectStore};

const DEFAULT_PAGE_SIZE: usize = 1000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ═══════════════════════════════════════════════════════════════════════════
// Stacks
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct StackState {
    stacks: HashMap<String, StackOutputs>,
    describe_calls: usize,
    faults: VecDeque<BackendError>,
}

/// Stack outputs held in memory
#[derive(Default)]
pub struct MemoryStacks {
    state: Mutex<StackState>,
}

impl MemoryStacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a stack and its outputs
    pub fn add_stack<I, K, V>(&self, name: &str, outputs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        lock(&self.state)
            .stacks
            .insert(name.to_string(), outputs.into_iter().collect());
    }

    /// Fail the next `times` describe calls with `error`
    pub fn fail_next(&self, times: usize, error: BackendError) {
        lock(&self.state)
            .faults
            .extend(std::iter::repeat_n(error, times));
    }

    pub fn describe_calls(&self) -> usize {
        lock(&self.state).describe_calls
    }
}

#[async_trait]
impl StackDescriber for MemoryStacks {
    async fn describe_outputs(&self, stack: &str) -> Result<StackOutputs, BackendError> {
        let mut state = lock(&self.state);
        state.describe_calls += 1;
        if let Some(error) = state.faults.pop_front() {
            return Err(error);
        }
        state.stacks.get(stack).cloned().ok_or_else(|| {
            BackendError::not_found(format!("Stack with id {stack} does not exist"))
                .with_code("ValidationError")
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Key management
// ═══════════════════════════════════════════════════════════════════════════

struct MasterKey {
    material: Zeroizing<[u8; DATA_KEY_SIZE]>,
    enabled: bool,
}

#[derive(Default)]
struct KmsState {
    keys: HashMap<String, MasterKey>,
    generate_calls: usize,
    decrypt_calls: usize,
    faults: VecDeque<BackendError>,
}

/// KMS stand-in wrapping data keys with per-ARN AES-256-GCM master keys
///
/// Wrapped keys are bound to the ARN that issued them, so unwrapping under
/// another ARN fails the way KMS does.
#[derive(Default)]
pub struct MemoryKms {
    state: Mutex<KmsState>,
}

impl MemoryKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an enabled master key for `key_arn`
    pub fn add_key(&self, key_arn: &str) {
        let mut material = Zeroizing::new([0u8; DATA_KEY_SIZE]);
        rand::rng().fill_bytes(material.as_mut());
        lock(&self.state).keys.insert(
            key_arn.to_string(),
            MasterKey {
                material,
                enabled: true,
            },
        );
    }

    pub fn disable_key(&self, key_arn: &str) {
        if let Some(key) = lock(&self.state).keys.get_mut(key_arn) {
            key.enabled = false;
        }
    }

    pub fn enable_key(&self, key_arn: &str) {
        if let Some(key) = lock(&self.state).keys.get_mut(key_arn) {
            key.enabled = true;
        }
    }

    /// Fail the next `times` calls of either operation with `error`
    pub fn fail_next(&self, times: usize, error: BackendError) {
        lock(&self.state)
            .faults
            .extend(std::iter::repeat_n(error, times));
    }

    pub fn generate_calls(&self) -> usize {
        lock(&self.state).generate_calls
    }

    pub fn decrypt_calls(&self) -> usize {
        lock(&self.state).decrypt_calls
    }
}

fn usable_key<'a>(
    keys: &'a HashMap<String, MasterKey>,
    key_arn: &str,
) -> Result<&'a MasterKey, BackendError> {
    let key = keys.get(key_arn).ok_or_else(|| {
        BackendError::not_found(format!("Key '{key_arn}' does not exist"))
            .with_code("NotFoundException")
    })?;
    if !key.enabled {
        return Err(BackendError::invalid(format!("{key_arn} is disabled"))
            .with_code("DisabledException"));
    }
    Ok(key)
}

fn invalid_ciphertext() -> BackendError {
    BackendError::invalid("The ciphertext is invalid").with_code("InvalidCiphertextException")
}

#[async_trait]
impl KeyManagement for MemoryKms {
    async fn generate_data_key(&self, key_arn: &str) -> Result<DataKey, BackendError> {
        let mut state = lock(&self.state);
        state.generate_calls += 1;
        if let Some(error) = state.faults.pop_front() {
            return Err(error);
        }
        let master = usable_key(&state.keys, key_arn)?;

        let mut plaintext = Zeroizing::new(vec![0u8; DATA_KEY_SIZE]);
        rand::rng().fill_bytes(plaintext.as_mut_slice());
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce);

        let sealed = Aes256Gcm::new_from_slice(master.material.as_ref())
            .map_err(|e| BackendError::other(e.to_string()))?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext.as_slice(),
                    aad: key_arn.as_bytes(),
                },
            )
            .map_err(|e| BackendError::other(e.to_string()))?;

        let mut wrapped = nonce.to_vec();
        wrapped.extend_from_slice(&sealed);
        Ok(DataKey { plaintext, wrapped })
    }

    async fn decrypt_data_key(
        &self,
        wrapped: &[u8],
        key_arn: &str,
    ) -> Result<Zeroizing<Vec<u8>>, BackendError> {
        let mut state = lock(&self.state);
        state.decrypt_calls += 1;
        if let Some(error) = state.faults.pop_front() {
            return Err(error);
        }
        let master = usable_key(&state.keys, key_arn)?;

        if wrapped.len() <= NONCE_SIZE {
            return Err(invalid_ciphertext());
        }
        let (nonce, sealed) = wrapped.split_at(NONCE_SIZE);

        Aes256Gcm::new_from_slice(master.material.as_ref())
            .map_err(|e| BackendError::other(e.to_string()))?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: key_arn.as_bytes(),
                },
            )
            .map(Zeroizing::new)
            .map_err(|_| invalid_ciphertext())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Object storage
// ═══════════════════════════════════════════════════════════════════════════

/// Operations of [`MemoryObjectStore`], for call counts and fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectOp {
    Put,
    Get,
    Head,
    Delete,
    List,
}

#[derive(Default)]
struct StoreState {
    buckets: HashMap<String, BTreeMap<String, Vec<u8>>>,
    calls: HashMap<ObjectOp, usize>,
    faults: HashMap<ObjectOp, VecDeque<BackendError>>,
}

impl StoreState {
    fn begin(&mut self, op: ObjectOp) -> Result<(), BackendError> {
        *self.calls.entry(op).or_default() += 1;
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Buckets of objects held in memory, listed in lexical key order like S3
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
    page_size: usize,
    latency: Option<Duration>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
        }
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum keys per list page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `times` calls of `op` with `error`
    pub fn fail_next(&self, op: ObjectOp, times: usize, error: BackendError) {
        lock(&self.state)
            .faults
            .entry(op)
            .or_default()
            .extend(std::iter::repeat_n(error, times));
    }

    pub fn calls(&self, op: ObjectOp) -> usize {
        lock(&self.state).calls.get(&op).copied().unwrap_or(0)
    }

    /// Total calls across all operations
    pub fn total_calls(&self) -> usize {
        lock(&self.state).calls.values().sum()
    }

    /// Raw object bytes, bypassing call counting
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    /// Write raw object bytes, bypassing call counting
    pub fn put_raw(&self, bucket: &str, key: &str, body: Vec<u8>) {
        lock(&self.state)
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), BackendError> {
        self.delay().await;
        let mut state = lock(&self.state);
        state.begin(ObjectOp::Put)?;
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.to_vec());
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BackendError> {
        self.delay().await;
        let mut state = lock(&self.state);
        state.begin(ObjectOp::Get)?;
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| {
                BackendError::not_found(format!("The specified key does not exist: {key}"))
                    .with_code("NoSuchKey")
            })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, BackendError> {
        self.delay().await;
        let mut state = lock(&self.state);
        state.begin(ObjectOp::Head)?;
        Ok(state
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        self.delay().await;
        let mut state = lock(&self.state);
        state.begin(ObjectOp::Delete)?;
        if let Some(objects) = state.buckets.get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, BackendError> {
        self.delay().await;
        let mut state = lock(&self.state);
        state.begin(ObjectOp::List)?;

        let Some(objects) = state.buckets.get(bucket) else {
            return Ok(ListPage::default());
        };

        // The token is the last key of the previous page.
        let mut matching = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| continuation_token.is_none_or(|token| key.as_str() > token));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next_token = match (matching.next(), keys.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(ListPage { keys, next_token })
    }
}
