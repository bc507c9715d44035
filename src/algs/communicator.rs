//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the exchange routines
//! call `.wait()` before they trust that a buffer is ready, and drain every
//! send handle before returning.
//!
//! Three backends are provided:
//! - [`NoComm`]: rank 0 of 1; every operation is a no-op.
//! - [`ThreadComm`]: a group of ranks living as threads of one process,
//!   sharing a mailbox. Used to exercise the distributed protocol without an
//!   MPI runtime.
//! - `MpiComm` (feature `mpi-support`): the real multi-process backend.

use std::collections::VecDeque;
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;

/// Non-blocking communication interface (minimal by design).
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle<'a>: Wait
    where
        Self: 'a;

    /// Post a send of `buf` to `peer`. The payload is copied before returning.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive from `peer`. `expected_len` is the announced message
    /// length; `wait` returns the bytes actually received so callers can
    /// detect a mismatch.
    fn irecv<'a>(&'a self, peer: usize, tag: u16, expected_len: usize) -> Self::RecvHandle<'a>;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Block until every rank of the group has reached the barrier.
    fn barrier(&self);

    /// True for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Message tag used to keep independent exchanges apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Tag `n` steps after this one (wrapping).
    #[inline]
    pub const fn offset(self, n: u16) -> Self {
        CommTag(self.0.wrapping_add(n))
    }
}

/// The tags used by one graph: three for `finalize()`, one for
/// `global_num_entries()`. Tag bases of graphs sharing a communicator must
/// be at least [`GraphCommTags::SPAN`] apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphCommTags {
    /// Fixed-size byte-count exchange.
    pub sizes: CommTag,
    /// Variable-length payload exchange.
    pub data: CommTag,
    /// Post-merge failure status round.
    pub status: CommTag,
    /// Entry count reduction.
    pub reduce: CommTag,
}

impl GraphCommTags {
    /// Number of consecutive tags taken by [`GraphCommTags::from_base`].
    pub const SPAN: u16 = 4;

    pub const fn from_base(base: CommTag) -> Self {
        Self {
            sizes: base,
            data: base.offset(1),
            status: base.offset(2),
            reduce: base.offset(3),
        }
    }
}

impl Default for GraphCommTags {
    fn default() -> Self {
        // Below 0x7FFF so the tags are valid under any MPI_TAG_UB.
        Self::from_base(CommTag::new(0x5A00))
    }
}

/// Compile-time no-op comm for pure serial use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle<'a> = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) -> Self::SendHandle {}
    fn irecv<'a>(&'a self, _peer: usize, _tag: u16, _expected_len: usize) -> Self::RecvHandle<'a> {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn barrier(&self) {}
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- ThreadComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

struct ThreadWorld {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    barrier: Barrier,
}

/// One rank of an in-process group. Messages between the same
/// `(src, dst, tag)` triple are delivered in FIFO order.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    world: Arc<ThreadWorld>,
    recv_timeout: Option<Duration>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.world.size)
            .field("recv_timeout", &self.recv_timeout)
            .finish()
    }
}

impl ThreadComm {
    /// Create a group of `size` ranks sharing one mailbox and barrier.
    /// Hand one communicator to each thread.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let world = Arc::new(ThreadWorld {
            size,
            mailbox: DashMap::new(),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                world: Arc::clone(&world),
                recv_timeout: None,
            })
            .collect()
    }

    /// Give up on a receive after `timeout`; `wait` then returns `None`,
    /// which the exchange routines report as a communication error.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }
}

pub struct ThreadRecvHandle<'a> {
    world: &'a ThreadWorld,
    key: Key,
    deadline: Option<Instant>,
}

impl Wait for ThreadRecvHandle<'_> {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.world.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return None;
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle<'a> = ThreadRecvHandle<'a>;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.world
            .mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv<'a>(&'a self, peer: usize, tag: u16, _expected_len: usize) -> Self::RecvHandle<'a> {
        ThreadRecvHandle {
            world: &self.world,
            key: (peer, self.rank, tag),
            deadline: self.recv_timeout.map(|t| Instant::now() + t),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn barrier(&self) {
        self.world.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::graph_error::SparseGraphError;
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{
        Communicator as _, CommunicatorCollectives as _, Destination as _, Source as _,
    };

    /// MPI world communicator. Owns the MPI environment when built with
    /// [`MpiComm::new`]; dropping it finalizes MPI.
    pub struct MpiComm {
        _universe: Option<Universe>,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, SparseGraphError> {
            let universe = mpi::initialize().ok_or_else(|| SparseGraphError::CommError {
                neighbor: 0,
                source: "MPI initialization failed (already initialized?)".into(),
            })?;
            let world = universe.world();
            let mut comm = Self::from_world(world);
            comm._universe = Some(universe);
            Ok(comm)
        }

        /// Wrap a communicator whose environment is owned by the caller.
        pub fn from_world(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: None,
                world,
                rank,
                size,
            }
        }
    }

    /// Completes a leaked-buffer immediate send and reclaims the buffer.
    pub struct MpiSendHandle(Option<Box<dyn FnOnce()>>);

    impl Wait for MpiSendHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            if let Some(finish) = self.0.take() {
                finish();
            }
            None
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            if let Some(finish) = self.0.take() {
                finish();
            }
        }
    }

    /// Receive posted lazily: probes and receives when waited on, so the
    /// message length never has to be known in advance.
    pub struct MpiRecvHandle<'a> {
        world: &'a SimpleCommunicator,
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecvHandle<'_> {
        fn wait(self) -> Option<Vec<u8>> {
            let (msg, _status) = self
                .world
                .process_at_rank(self.peer)
                .matched_probe_with_tag(self.tag);
            let (data, _status) = msg.matched_receive_vec::<u8>();
            Some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle<'a> = MpiRecvHandle<'a>;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSendHandle {
            let owned: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = owned;
            // SAFETY: `ptr` comes from `Box::leak` and is reclaimed exactly once,
            // after the request has completed and released its borrow.
            let shared: &'static [u8] = unsafe { &*ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, shared, i32::from(tag));
            MpiSendHandle(Some(Box::new(move || {
                req.wait();
                drop(unsafe { Box::from_raw(ptr) });
            })))
        }

        fn irecv<'a>(&'a self, peer: usize, tag: u16, _expected_len: usize) -> MpiRecvHandle<'a> {
            MpiRecvHandle {
                world: &self.world,
                peer: peer as i32,
                tag: i32::from(tag),
            }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
