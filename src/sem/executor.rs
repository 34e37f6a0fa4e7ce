//! Thin wrappers over the System V semaphore calls.
//!
//! Every failure is classified into a [`KernelError`] and logged with its
//! cause here, so the layers above can collapse it without losing the
//! diagnostic.

use super::NSEMS;
use super::types::{Counter, Key, KernelError, SemId, SemOp};
use crate::error::{Result, SemError};
use nix::errno::Errno;
use nix::libc;
use tracing::{trace, warn};

/// Argument union for `semctl`. A fresh value is built for every call.
#[repr(C)]
union Semun {
    val: libc::c_int,
    buf: *mut libc::semid_ds,
}

/// Apply `ops` to the set as one atomic unit.
///
/// Either every step takes effect or none does. Steps without `no_wait`
/// may block, in which case the call returns once all of them can proceed
/// together (or a signal interrupts the wait).
pub fn execute(id: SemId, ops: &[SemOp]) -> std::result::Result<(), KernelError> {
    let mut bufs: Vec<libc::sembuf> = ops.iter().map(|op| op.to_sembuf()).collect();

    trace!(%id, ?ops, "semop");
    // SAFETY: bufs is a live, correctly sized array of sembuf for the call.
    let rc = unsafe { libc::semop(id.0, bufs.as_mut_ptr(), bufs.len()) };
    if rc == 0 {
        return Ok(());
    }

    let cause = KernelError::from_semop(Errno::last());
    match cause {
        // A timeout is diagnosed by the caller that armed it.
        KernelError::Interrupted => trace!(%id, "semop interrupted"),
        _ => warn!(%id, error = %cause, "semop failed"),
    }
    Err(cause)
}

/// Like [`execute`], wrapping the failure with the operation name.
pub fn execute_as(op: &'static str, id: SemId, ops: &[SemOp]) -> Result<()> {
    execute(id, ops).map_err(|e| SemError::kernel(op, e))
}

/// Allocate a new set for `key`, failing with `AlreadyExists` if one is present.
pub fn allocate_exclusive(key: Key, mode: u32) -> Result<SemId> {
    let flags = mode_bits(mode) | libc::IPC_CREAT | libc::IPC_EXCL;
    // SAFETY: semget takes only plain integers.
    let id = unsafe { libc::semget(key.0, NSEMS, flags) };
    if id >= 0 {
        return Ok(SemId(id));
    }

    match KernelError::from_semget(Errno::last()) {
        KernelError::AlreadyExists => Err(SemError::AlreadyExists),
        cause => {
            warn!(%key, error = %cause, "semget (create) failed");
            Err(SemError::kernel("semget", cause))
        }
    }
}

/// Look up the existing set for `key`.
pub fn lookup(key: Key) -> std::result::Result<SemId, KernelError> {
    // SAFETY: semget takes only plain integers.
    let id = unsafe { libc::semget(key.0, 0, 0) };
    if id >= 0 {
        Ok(SemId(id))
    } else {
        Err(KernelError::from_semget(Errno::last()))
    }
}

/// Read one counter of the set.
pub fn get_value(id: SemId, counter: Counter) -> Result<i32> {
    control(id, counter, libc::GETVAL, "GETVAL")
}

/// Overwrite one counter of the set.
///
/// Unlike `SETALL`, this leaves the undo adjustments of the other counters intact.
pub fn set_value(id: SemId, counter: Counter, value: i32) -> Result<()> {
    let arg = Semun { val: value };
    // SAFETY: SETVAL reads the `val` member of the union.
    let rc = unsafe { libc::semctl(id.0, counter.index(), libc::SETVAL, arg) };
    check_control(rc, id, "SETVAL").map(|_| ())
}

/// Pid of the last process to operate on `counter`.
pub fn last_pid(id: SemId, counter: Counter) -> Result<i32> {
    control(id, counter, libc::GETPID, "GETPID")
}

/// Number of processes waiting for `counter` to increase.
pub fn waiting_increase(id: SemId, counter: Counter) -> Result<i32> {
    control(id, counter, libc::GETNCNT, "GETNCNT")
}

/// Number of processes waiting for `counter` to become zero.
pub fn waiting_zero(id: SemId, counter: Counter) -> Result<i32> {
    control(id, counter, libc::GETZCNT, "GETZCNT")
}

/// Kernel bookkeeping for the set: (last semop time, last change time).
pub fn stat_times(id: SemId) -> Result<(i64, i64)> {
    // SAFETY: semid_ds is plain old data; all-zero is a valid bit pattern.
    let mut ds: libc::semid_ds = unsafe { std::mem::zeroed() };
    let arg = Semun { buf: &mut ds };
    // SAFETY: IPC_STAT writes into the semid_ds pointed to by `buf`, which outlives the call.
    let rc = unsafe { libc::semctl(id.0, 0, libc::IPC_STAT, arg) };
    check_control(rc, id, "IPC_STAT")?;
    Ok((i64::from(ds.sem_otime), i64::from(ds.sem_ctime)))
}

/// Destroy the set. Blocked waiters wake with `Removed`.
pub fn destroy(id: SemId) -> Result<()> {
    let arg = Semun { val: 0 };
    // SAFETY: IPC_RMID ignores the argument.
    let rc = unsafe { libc::semctl(id.0, 0, libc::IPC_RMID, arg) };
    check_control(rc, id, "IPC_RMID").map(|_| ())
}

fn control(id: SemId, counter: Counter, cmd: libc::c_int, name: &'static str) -> Result<i32> {
    let arg = Semun { val: 0 };
    // SAFETY: the GET* commands ignore the argument.
    let rc = unsafe { libc::semctl(id.0, counter.index(), cmd, arg) };
    check_control(rc, id, name)
}

fn check_control(rc: libc::c_int, id: SemId, name: &'static str) -> Result<i32> {
    if rc != -1 {
        return Ok(rc);
    }
    let cause = KernelError::from_semctl(Errno::last());
    warn!(%id, error = %cause, "semctl {} failed", name);
    Err(SemError::kernel(name, cause))
}

fn mode_bits(mode: u32) -> libc::c_int {
    (mode & 0o777) as libc::c_int
}
