//! Executable memory for finalized code blocks.
//!
//! One mmap'd region per block, following W^X discipline: the region
//! is writable while the code is copied in, then flipped to
//! read+execute before the entry pointer is handed out.

use std::io;
use std::ptr;

/// An executable copy of one finalized code block.
#[derive(Debug)]
pub struct ExecRegion {
    ptr: *mut u8,
    size: usize,
    len: usize,
}

// SAFETY: ExecRegion owns its mmap'd memory exclusively.
unsafe impl Send for ExecRegion {}

impl ExecRegion {
    /// Map a fresh region, copy `code` into it and make it
    /// executable. The region size is rounded up to the page size;
    /// mmap's page alignment exceeds the 16-byte entry alignment the
    /// generated code asks for.
    pub fn alloc(code: &[u8]) -> io::Result<ExecRegion> {
        assert!(!code.is_empty(), "empty code block");

        let page_size = page_size();
        let size = (code.len() + page_size - 1) & !(page_size - 1);

        // SAFETY: anonymous private mapping, no file backing.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = ptr as *mut u8;

        // SAFETY: the mapping is at least code.len() bytes.
        unsafe {
            ptr::copy_nonoverlapping(code.as_ptr(), ptr, code.len());
        }

        let ret = unsafe {
            libc::mprotect(
                ptr as *mut libc::c_void,
                size,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };
        if ret != 0 {
            let err = io::Error::last_os_error();
            // SAFETY: ptr/size came from the mmap above.
            unsafe {
                libc::munmap(ptr as *mut libc::c_void, size);
            }
            return Err(err);
        }

        Ok(ExecRegion {
            ptr,
            size,
            len: code.len(),
        })
    }

    /// Entry pointer of the copied code.
    #[inline]
    pub fn entry(&self) -> *const u8 {
        self.ptr as *const u8
    }

    /// Length of the copied code in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The copied code bytes (readable; the region stays executable).
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr..ptr+len was written during alloc and the
        // mapping is PROT_READ.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for ExecRegion {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: ptr/size describe a live mapping we own.
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        }
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf is always safe to call.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
