//! Process-group abstraction.
//!
//! The convolution engine and the detector scheduler are collective: every
//! rank of a group takes part in each call. [`SelfComm`] is the trivial
//! one-rank group, [`LocalComm`] runs a group of ranks as threads of one
//! process and exchanges messages over channels.

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommError {
    #[error("root rank {root} is outside a group of size {size}")]
    BadRoot { root: usize, size: usize },
    #[error("a peer of rank {0} has left the process group")]
    Disconnected(usize),
    #[error("rank {rank} expected a {want:?} message, got {got:?} from rank {from}")]
    Unexpected {
        rank: usize,
        want: Tag,
        got: Tag,
        from: usize,
    },
}

pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Collect `local` from every rank on `root`, ordered by rank. Non-root
    /// ranks get `None`.
    fn gather(&self, local: Vec<String>, root: usize)
        -> Result<Option<Vec<Vec<String>>>, CommError>;

    /// Send the value of `root` to every rank. The argument is ignored on
    /// the other ranks.
    fn broadcast(&self, value: Vec<String>, root: usize) -> Result<Vec<String>, CommError>;

    fn barrier(&self) -> Result<(), CommError> {
        self.gather(Vec::new(), 0)?;
        self.broadcast(Vec::new(), 0)?;
        Ok(())
    }
}

fn check_root(root: usize, size: usize) -> Result<(), CommError> {
    if root >= size {
        Err(CommError::BadRoot { root, size })
    } else {
        Ok(())
    }
}

/// Group made of the calling process only.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn gather(
        &self,
        local: Vec<String>,
        root: usize,
    ) -> Result<Option<Vec<Vec<String>>>, CommError> {
        check_root(root, 1)?;
        Ok(Some(vec![local]))
    }

    fn broadcast(&self, value: Vec<String>, root: usize) -> Result<Vec<String>, CommError> {
        check_root(root, 1)?;
        Ok(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Gather,
    Broadcast,
}

#[derive(Debug)]
struct Message {
    tag: Tag,
    from: usize,
    payload: Vec<String>,
}

/// One rank of an in-process group. Create the whole group with
/// [`LocalComm::group`] and move each member to its own thread.
///
/// Every ordered pair of ranks has its own channel, so messages from one
/// peer are received in the order they were sent.
pub struct LocalComm {
    rank: usize,
    outboxes: Vec<Sender<Message>>,
    inboxes: Vec<Receiver<Message>>,
}

impl LocalComm {
    pub fn group(size: usize) -> Vec<LocalComm> {
        // channels[from][to]
        let channels: Vec<Vec<(Sender<Message>, Receiver<Message>)>> = (0..size)
            .map(|_| (0..size).map(|_| unbounded()).collect())
            .collect();
        (0..size)
            .map(|rank| LocalComm {
                rank,
                outboxes: (0..size).map(|to| channels[rank][to].0.clone()).collect(),
                inboxes: (0..size).map(|from| channels[from][rank].1.clone()).collect(),
            })
            .collect()
    }

    fn send(&self, to: usize, tag: Tag, payload: Vec<String>) -> Result<(), CommError> {
        self.outboxes[to]
            .send(Message {
                tag,
                from: self.rank,
                payload,
            })
            .map_err(|_| CommError::Disconnected(self.rank))
    }

    fn recv(&self, from: usize, want: Tag) -> Result<Message, CommError> {
        let msg = self.inboxes[from]
            .recv()
            .map_err(|_| CommError::Disconnected(self.rank))?;
        if msg.tag != want {
            return Err(CommError::Unexpected {
                rank: self.rank,
                want,
                got: msg.tag,
                from: msg.from,
            });
        }
        Ok(msg)
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn gather(
        &self,
        local: Vec<String>,
        root: usize,
    ) -> Result<Option<Vec<Vec<String>>>, CommError> {
        let size = self.size();
        check_root(root, size)?;
        if self.rank != root {
            self.send(root, Tag::Gather, local)?;
            return Ok(None);
        }
        let mut gathered = Vec::with_capacity(size);
        let mut local = Some(local);
        for from in 0..size {
            if from == root {
                gathered.push(local.take().unwrap_or_default());
            } else {
                gathered.push(self.recv(from, Tag::Gather)?.payload);
            }
        }
        Ok(Some(gathered))
    }

    fn broadcast(&self, value: Vec<String>, root: usize) -> Result<Vec<String>, CommError> {
        let size = self.size();
        check_root(root, size)?;
        if self.rank == root {
            for to in (0..size).filter(|&r| r != root) {
                self.send(to, Tag::Broadcast, value.clone())?;
            }
            Ok(value)
        } else {
            Ok(self.recv(root, Tag::Broadcast)?.payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn self_comm_is_trivial() {
        let c = SelfComm;
        assert_eq!(
            c.gather(names(&["x"]), 0).unwrap(),
            Some(vec![names(&["x"])])
        );
        assert_eq!(c.broadcast(names(&["y"]), 0).unwrap(), names(&["y"]));
        assert!(matches!(
            c.broadcast(vec![], 1),
            Err(CommError::BadRoot { .. })
        ));
    }

    #[test]
    fn local_group_gathers_in_rank_order() {
        let handles: Vec<_> = LocalComm::group(4)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let mine = vec![format!("r{}", comm.rank())];
                    let gathered = comm.gather(mine, 0).unwrap();
                    comm.barrier().unwrap();
                    let seen = comm
                        .broadcast(
                            gathered.map(|g| g.concat()).unwrap_or_default(),
                            0,
                        )
                        .unwrap();
                    (comm.rank(), seen)
                })
            })
            .collect();
        for h in handles {
            let (_rank, seen) = h.join().unwrap();
            assert_eq!(seen, names(&["r0", "r1", "r2", "r3"]));
        }
    }
}
