//! Sized all-to-all exchange of fixed-layout records.
//!
//! Every collective phase of the numbering step has the same shape: each rank
//! has a (possibly empty) batch of records for every other rank. Sizes go
//! first under `tag`, payloads follow under `tag + 1`. Empty payloads are not
//! sent, since both sides know the count after the size round.
//! Records addressed to the calling rank never touch the communicator.

use bytemuck::Pod;

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, WireGid, cast_slice, cast_slice_mut};
use crate::dof_error::DofError;

/// Send `outgoing[r]` to rank `r` and return what every rank sent here,
/// indexed by source rank. `outgoing.len()` must equal `comm.size()`.
pub fn all_to_all<T, C>(
    comm: &C,
    tag: CommTag,
    mut outgoing: Vec<Vec<T>>,
) -> Result<Vec<Vec<T>>, DofError>
where
    T: Pod,
    C: Communicator,
{
    let size = comm.size().max(1);
    let me = comm.rank();
    outgoing.resize_with(size, Vec::new);

    let mut incoming: Vec<Vec<T>> = (0..size).map(|_| Vec::new()).collect();
    incoming[me] = std::mem::take(&mut outgoing[me]);
    if size == 1 {
        return Ok(incoming);
    }

    let counts = exchange_counts(comm, tag, &outgoing)?;
    let data_tag = tag.offset(1).as_u16();
    let record = std::mem::size_of::<T>();

    let mut pending_recvs = Vec::new();
    for (peer, &n) in counts.iter().enumerate() {
        if peer == me || n == 0 {
            continue;
        }
        let mut buffer = vec![T::zeroed(); n];
        let h = comm.irecv(peer, data_tag, cast_slice_mut(&mut buffer));
        pending_recvs.push((peer, h, buffer));
    }

    let mut pending_sends = Vec::new();
    for (peer, batch) in outgoing.iter().enumerate() {
        if peer == me || batch.is_empty() {
            continue;
        }
        pending_sends.push(comm.isend(peer, data_tag, cast_slice(batch)));
    }

    let mut maybe_err = None;
    for (peer, h, mut buffer) in pending_recvs {
        let expected = buffer.len() * record;
        match h.wait() {
            Some(raw) if raw.len() == expected => {
                cast_slice_mut(&mut buffer).copy_from_slice(&raw);
                incoming[peer] = buffer;
            }
            Some(raw) => {
                maybe_err.get_or_insert(DofError::BufferSizeMismatch {
                    neighbor: peer,
                    expected,
                    got: raw.len(),
                });
            }
            None => {
                maybe_err.get_or_insert(DofError::CommError {
                    neighbor: peer,
                    source: "No data received (wait returned None)".into(),
                });
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(incoming),
    }
}

/// Gather one `u64` from every rank, indexed by rank.
pub fn all_gather_u64<C: Communicator>(
    comm: &C,
    tag: CommTag,
    value: u64,
) -> Result<Vec<u64>, DofError> {
    let size = comm.size().max(1);
    let outgoing = vec![vec![WireGid::of(value)]; size];
    let incoming = all_to_all(comm, tag, outgoing)?;
    incoming
        .into_iter()
        .enumerate()
        .map(|(peer, batch)| {
            batch.first().map(|w| w.get()).ok_or(DofError::CommError {
                neighbor: peer,
                source: "missing all-gather contribution".into(),
            })
        })
        .collect()
}

fn exchange_counts<T, C>(
    comm: &C,
    tag: CommTag,
    outgoing: &[Vec<T>],
) -> Result<Vec<usize>, DofError>
where
    C: Communicator,
{
    let me = comm.rank();
    let header = std::mem::size_of::<WireCount>();

    let mut pending_recvs = Vec::with_capacity(outgoing.len());
    for peer in (0..outgoing.len()).filter(|&p| p != me) {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            peer,
            tag.as_u16(),
            cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        pending_recvs.push((peer, h));
    }

    let mut pending_sends = Vec::with_capacity(outgoing.len());
    for (peer, batch) in outgoing.iter().enumerate().filter(|(p, _)| *p != me) {
        let wire = WireCount::new(batch.len());
        pending_sends.push(comm.isend(
            peer,
            tag.as_u16(),
            cast_slice(std::slice::from_ref(&wire)),
        ));
    }

    let mut counts = vec![0usize; outgoing.len()];
    let mut maybe_err = None;
    for (peer, h) in pending_recvs {
        match h.wait() {
            Some(data) if data.len() == header => {
                let mut cnt = WireCount::new(0);
                cast_slice_mut(std::slice::from_mut(&mut cnt)).copy_from_slice(&data);
                counts[peer] = cnt.get();
            }
            Some(data) => {
                maybe_err.get_or_insert(DofError::CommError {
                    neighbor: peer,
                    source: format!(
                        "expected {header} bytes for size header, got {}",
                        data.len()
                    )
                    .into(),
                });
            }
            None => {
                maybe_err.get_or_insert(DofError::CommError {
                    neighbor: peer,
                    source: format!("failed to receive size from rank {peer}").into(),
                });
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(counts),
    }
}
