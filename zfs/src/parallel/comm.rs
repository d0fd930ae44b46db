//! Message passing between SPMD processes
//!
//! Every process is an OS thread started by [`World::run`]. Processes share no
//! memory; they talk through one unbounded channel per process. Values are
//! serialised with bincode and matched on `(context, source, tag)`, so messages
//! of different communicators never mix and messages from one sender arrive in
//! the order they were sent.
//!
//! Collectives are funnelled through rank 0 of the communicator. A process
//! that fails or panics tells everyone else to stop; any receive blocked on a
//! stopped run returns [`ParallelError::Aborted`].

use super::error::ParallelError;
use serde::{de::DeserializeOwned, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::iter::Sum;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::{debug, info_span};

/// Tags at or above this value are used by collectives.
pub const RESERVED_TAGS: u32 = 0xFFFF_0000;

const TAG_GATHER: u32 = RESERVED_TAGS + 1;
const TAG_BCAST: u32 = RESERVED_TAGS + 2;

const WORLD_CONTEXT: u64 = 0;
const NO_FAILURE: usize = usize::MAX;

enum Payload {
    Data(Vec<u8>),
    Abort { origin: usize },
}

struct Envelope {
    context: u64,
    source: usize,
    tag: u32,
    payload: Payload,
}

impl Envelope {
    fn abort(origin: usize) -> Self {
        Envelope {
            context: WORLD_CONTEXT,
            source: origin,
            tag: 0,
            payload: Payload::Abort { origin },
        }
    }

    fn matches(&self, context: u64, source: usize, tag: u32) -> bool {
        self.context == context && self.source == source && self.tag == tag
    }

    fn into_bytes(self) -> Vec<u8> {
        match self.payload {
            Payload::Data(bytes) => bytes,
            Payload::Abort { .. } => Vec::new(),
        }
    }
}

/// The per-process end of the channel network.
struct Endpoint {
    rank: usize,
    outboxes: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    /// Arrived but not yet requested
    pending: RefCell<VecDeque<Envelope>>,
    aborted: Cell<Option<usize>>,
}

impl Endpoint {
    fn post(&self, dest: usize, envelope: Envelope) -> Result<(), ParallelError> {
        let outbox = self.outboxes.get(dest).ok_or(ParallelError::InvalidRank {
            rank: dest,
            size: self.outboxes.len(),
        })?;
        outbox
            .send(envelope)
            .map_err(|_| ParallelError::Disconnected { rank: dest })
    }

    fn take(&self, context: u64, source: usize, tag: u32) -> Result<Vec<u8>, ParallelError> {
        if let Some(origin) = self.aborted.get() {
            return Err(ParallelError::Aborted { origin });
        }

        {
            let mut pending = self.pending.borrow_mut();
            if let Some(pos) = pending.iter().position(|e| e.matches(context, source, tag)) {
                if let Some(envelope) = pending.remove(pos) {
                    return Ok(envelope.into_bytes());
                }
            }
        }

        loop {
            // never disconnected: the endpoint holds a sender to itself
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| ParallelError::Disconnected { rank: source })?;
            if let Payload::Abort { origin } = envelope.payload {
                self.aborted.set(Some(origin));
                return Err(ParallelError::Aborted { origin });
            }
            if envelope.matches(context, source, tag) {
                return Ok(envelope.into_bytes());
            }
            self.pending.borrow_mut().push_back(envelope);
        }
    }

    fn abort(&self) {
        for (dest, outbox) in self.outboxes.iter().enumerate() {
            if dest != self.rank {
                // peers that already finished have dropped their inbox
                let _ = outbox.send(Envelope::abort(self.rank));
            }
        }
    }
}

/// A group of processes that can exchange messages.
///
/// Cheap to clone; clones share the underlying endpoint and split counter.
/// Not `Send`: a communicator lives and dies on its own process.
#[derive(Clone)]
pub struct Communicator {
    endpoint: Rc<Endpoint>,
    context: u64,
    /// World ranks of the members, indexed by rank in this communicator
    members: Rc<Vec<usize>>,
    rank: usize,
    splits: Rc<Cell<u64>>,
}

impl Communicator {
    fn world(rank: usize, outboxes: Vec<Sender<Envelope>>, inbox: Receiver<Envelope>) -> Self {
        let size = outboxes.len();
        Communicator {
            endpoint: Rc::new(Endpoint {
                rank,
                outboxes,
                inbox,
                pending: RefCell::new(VecDeque::new()),
                aborted: Cell::new(None),
            }),
            context: WORLD_CONTEXT,
            members: Rc::new((0..size).collect()),
            rank,
            splits: Rc::new(Cell::new(0)),
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn world_rank(&self) -> usize {
        self.endpoint.rank
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    fn member(&self, rank: usize) -> Result<usize, ParallelError> {
        self.members
            .get(rank)
            .copied()
            .ok_or(ParallelError::InvalidRank {
                rank,
                size: self.size(),
            })
    }

    /// Send `value` to process `dest` of this communicator. Never blocks.
    pub fn send<T: Serialize>(&self, dest: usize, tag: u32, value: &T) -> Result<(), ParallelError> {
        let world_dest = self.member(dest)?;
        let bytes = bincode::serialize(value)?;
        self.endpoint.post(
            world_dest,
            Envelope {
                context: self.context,
                source: self.endpoint.rank,
                tag,
                payload: Payload::Data(bytes),
            },
        )
    }

    /// Block until a message with `tag` from process `source` arrives.
    pub fn recv<T: DeserializeOwned>(&self, source: usize, tag: u32) -> Result<T, ParallelError> {
        let world_source = self.member(source)?;
        let bytes = self.endpoint.take(self.context, world_source, tag)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Send to `dest` and receive from `source` with the same tag.
    pub fn sendrecv<S: Serialize, R: DeserializeOwned>(
        &self,
        dest: usize,
        source: usize,
        tag: u32,
        value: &S,
    ) -> Result<R, ParallelError> {
        self.send(dest, tag, value)?;
        self.recv(source, tag)
    }

    /// Collect one value per process on rank 0, in rank order.
    ///
    /// Returns `None` on every other rank.
    pub fn gather<T: Serialize + DeserializeOwned>(
        &self,
        value: T,
    ) -> Result<Option<Vec<T>>, ParallelError> {
        if !self.is_root() {
            self.send(0, TAG_GATHER, &value)?;
            return Ok(None);
        }
        let mut all = Vec::with_capacity(self.size());
        all.push(value);
        for source in 1..self.size() {
            all.push(self.recv(source, TAG_GATHER)?);
        }
        Ok(Some(all))
    }

    /// Overwrite `value` on every process with its value on rank 0.
    pub fn broadcast<T: Serialize + DeserializeOwned>(&self, value: &mut T) -> Result<(), ParallelError> {
        if self.is_root() {
            for dest in 1..self.size() {
                self.send(dest, TAG_BCAST, value)?;
            }
        } else {
            *value = self.recv(0, TAG_BCAST)?;
        }
        Ok(())
    }

    /// Every process receives the values of all processes, in rank order.
    pub fn all_gather<T: Serialize + DeserializeOwned>(&self, value: T) -> Result<Vec<T>, ParallelError> {
        let mut all = self.gather(value)?.unwrap_or_default();
        self.broadcast(&mut all)?;
        Ok(all)
    }

    pub fn all_reduce_sum<T>(&self, value: T) -> Result<T, ParallelError>
    where
        T: Serialize + DeserializeOwned + Sum<T>,
    {
        Ok(self.all_gather(value)?.into_iter().sum())
    }

    pub fn barrier(&self) -> Result<(), ParallelError> {
        self.all_gather(()).map(|_| ())
    }

    /// Partition the communicator. Processes passing the same `color` end up
    /// in the same new communicator, ranked by ascending `key`.
    ///
    /// Collective: every member must call `split` in the same order.
    pub fn split(&self, color: usize, key: usize) -> Result<Communicator, ParallelError> {
        let me = self.world_rank();
        let entries = self.all_gather((color, key, me))?;

        let mut group: Vec<(usize, usize)> = entries
            .into_iter()
            .filter(|(c, _, _)| *c == color)
            .map(|(_, k, w)| (k, w))
            .collect();
        group.sort_unstable();
        let members: Vec<usize> = group.into_iter().map(|(_, w)| w).collect();
        let rank = members
            .iter()
            .position(|&w| w == me)
            .ok_or(ParallelError::InvalidRank {
                rank: me,
                size: members.len(),
            })?;

        let seq = self.splits.get();
        self.splits.set(seq + 1);

        Ok(Communicator {
            endpoint: Rc::clone(&self.endpoint),
            context: derive_context(self.context, seq, color),
            members: Rc::new(members),
            rank,
            splits: Rc::new(Cell::new(0)),
        })
    }

    /// Tell every other process to stop.
    pub fn abort(&self) {
        self.endpoint.abort();
    }
}

/// Context of the `seq`-th split of communicator `parent` for `color`.
fn derive_context(parent: u64, seq: u64, color: usize) -> u64 {
    let mut x = parent
        ^ seq.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (color as u64).wrapping_add(1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Stops the other processes unless disarmed; fires on error and on panic.
struct AbortGuard<'a> {
    comm: &'a Communicator,
    first_failure: &'a AtomicUsize,
    armed: bool,
}

impl<'a> AbortGuard<'a> {
    fn new(comm: &'a Communicator, first_failure: &'a AtomicUsize) -> Self {
        AbortGuard {
            comm,
            first_failure,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let rank = self.comm.world_rank();
        let _ = self.first_failure.compare_exchange(
            NO_FAILURE,
            rank,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if self.comm.endpoint.aborted.get().is_none() {
            debug!("process {} stops the run", rank);
            self.comm.abort();
        }
    }
}

enum Outcome<T, E> {
    Done(T),
    Failed(E),
    Panicked,
}

/// Launcher of SPMD runs.
pub struct World;

impl World {
    /// Run `body` on `nprocs` processes and return their results in rank order.
    ///
    /// If any process fails, the error of the process that failed first is
    /// returned; processes that merely observed the abort are not reported.
    pub fn run<T, E, F>(nprocs: usize, body: F) -> Result<Vec<T>, E>
    where
        T: Send,
        E: Send + From<ParallelError>,
        F: Fn(&Communicator) -> Result<T, E> + Sync,
    {
        if nprocs == 0 {
            return Err(ParallelError::NoProcesses.into());
        }

        let (outboxes, inboxes): (Vec<_>, Vec<_>) =
            (0..nprocs).map(|_| mpsc::channel::<Envelope>()).unzip();
        let first_failure = AtomicUsize::new(NO_FAILURE);
        let body = &body;
        let first_failure_ref = &first_failure;

        let (outcomes, spawn_error) = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(nprocs);
            let mut spawn_error = None;

            for (rank, inbox) in inboxes.into_iter().enumerate() {
                let process_outboxes = outboxes.clone();
                let spawned = thread::Builder::new()
                    .name(format!("proc-{}", rank))
                    .spawn_scoped(scope, move || {
                        let span = info_span!("proc", rank);
                        let _enter = span.enter();
                        let comm = Communicator::world(rank, process_outboxes, inbox);
                        let mut guard = AbortGuard::new(&comm, first_failure_ref);
                        let result = body(&comm);
                        if result.is_ok() {
                            guard.disarm();
                        }
                        result
                    });

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        let _ = first_failure_ref.compare_exchange(
                            NO_FAILURE,
                            rank,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        );
                        for outbox in &outboxes {
                            let _ = outbox.send(Envelope::abort(rank));
                        }
                        spawn_error = Some(err);
                        break;
                    }
                }
            }

            let outcomes: Vec<Outcome<T, E>> = handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(Ok(value)) => Outcome::Done(value),
                    Ok(Err(err)) => Outcome::Failed(err),
                    Err(_) => Outcome::Panicked,
                })
                .collect();
            (outcomes, spawn_error)
        });

        if let Some(err) = spawn_error {
            return Err(ParallelError::Spawn(err).into());
        }

        let failure = first_failure.load(Ordering::SeqCst);
        let mut values = Vec::with_capacity(nprocs);
        let mut root_cause = None;
        let mut secondary = None;
        for (rank, outcome) in outcomes.into_iter().enumerate() {
            let err = match outcome {
                Outcome::Done(value) => {
                    values.push(value);
                    continue;
                }
                Outcome::Failed(err) => err,
                Outcome::Panicked => ParallelError::Panicked { rank }.into(),
            };
            if rank == failure {
                root_cause = Some(err);
            } else if secondary.is_none() {
                secondary = Some(err);
            }
        }

        match root_cause.or(secondary) {
            Some(err) => Err(err),
            None => Ok(values),
        }
    }
}
