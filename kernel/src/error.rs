//! Kernel-wide error taxonomy.
//!
//! Every fallible internal operation returns `KernelResult<T>`. System calls convert
//! a `KernelError` into the ABI's negative `isize` only at the outermost dispatch layer
//! (see `syscall::dispatch`) — internal layers never hand back raw integers.

use core::fmt;

/// Result alias used throughout the kernel core.
pub type KernelResult<T> = Result<T, KernelError>;

/// Taxonomy from spec §7: invalid argument, memory validation failure, resource
/// exhaustion, lifecycle violation, fatal (panics instead of returning).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Null pointer, misalignment, negative length, out-of-range tid/pid.
    InvalidArgument,
    /// A user pointer was not mapped, lacked required flags, or crossed the
    /// user/kernel boundary.
    MemoryValidation,
    /// Out of physical frames, kernel heap, or pid/tid table slots.
    ResourceExhausted,
    /// `exec` with more than one live thread, `wait` with no children,
    /// `remove_pages` on a non-allocation base, handler not registered, etc.
    LifecycleViolation,
    /// The requested tid/pid/region does not exist.
    NotFound,
    /// An allocation or region request overlapped an existing one.
    Overlap,
    /// The wait-list / table of the given kind is already at capacity.
    WouldBlock,
}

impl KernelError {
    /// Map to the ABI's negative-`isize` convention (§6, §7): every error is a
    /// negative return value, never zero or positive.
    pub const fn to_syscall_errno(self) -> isize {
        match self {
            KernelError::InvalidArgument => -1,
            KernelError::MemoryValidation => -2,
            KernelError::ResourceExhausted => -3,
            KernelError::LifecycleViolation => -4,
            KernelError::NotFound => -5,
            KernelError::Overlap => -6,
            KernelError::WouldBlock => -7,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::InvalidArgument => "invalid argument",
            KernelError::MemoryValidation => "user memory validation failed",
            KernelError::ResourceExhausted => "resource exhausted",
            KernelError::LifecycleViolation => "lifecycle violation",
            KernelError::NotFound => "not found",
            KernelError::Overlap => "region overlap",
            KernelError::WouldBlock => "would block",
        };
        f.write_str(msg)
    }
}

/// Frame allocator failures narrow to `ResourceExhausted`; kept as a distinct type at
/// the mm layer so callers can match on the specific cause before it's widened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    OutOfFrames,
}

impl From<FrameError> for KernelError {
    fn from(_: FrameError) -> Self {
        KernelError::ResourceExhausted
    }
}
