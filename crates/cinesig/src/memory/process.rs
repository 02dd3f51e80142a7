//! Attaching to a live game process.
//!
//! Windows only: process and module lookup go through ToolHelp snapshots and
//! reads through `ReadProcessMemory`. The handle is opened with read and query
//! rights only, so page protections of the host are never touched.

use crate::error::{Error, Result};
use crate::module::LoadedModule;

#[cfg(target_os = "windows")]
pub use windows_impl::ProcessHandle;

#[cfg(not(target_os = "windows"))]
pub use unsupported::ProcessHandle;

/// Reader over an attached process
pub struct MemoryReader<'a> {
    process: &'a ProcessHandle,
}

impl<'a> MemoryReader<'a> {
    pub fn new(process: &'a ProcessHandle) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &ProcessHandle {
        self.process
    }
}

/// Basic facts about an attached process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn name_matches(candidate: &str, wanted: &str) -> bool {
    candidate.eq_ignore_ascii_case(wanted)
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

#[cfg(target_os = "windows")]
mod windows_impl {
    use std::ffi::c_void;
    use std::mem::size_of;

    use tracing::{debug, info};
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CREATE_TOOLHELP_SNAPSHOT_FLAGS, CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW,
        Module32NextW, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPMODULE,
        TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Memory::{
        MEM_COMMIT, MEMORY_BASIC_INFORMATION, PAGE_EXECUTE, PAGE_EXECUTE_READ,
        PAGE_EXECUTE_READWRITE, PAGE_EXECUTE_WRITECOPY, PAGE_GUARD, PAGE_NOACCESS,
        PAGE_PROTECTION_FLAGS, PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY, VirtualQueryEx,
    };
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };

    use super::*;
    use crate::memory::{ReadMemory, RegionInfo};

    /// Snapshot handle closed on drop
    struct Snapshot(HANDLE);

    impl Snapshot {
        fn new(flags: CREATE_TOOLHELP_SNAPSHOT_FLAGS, pid: u32) -> Result<Self> {
            // SAFETY: plain FFI call; the returned handle is owned by `Snapshot`.
            let handle = unsafe { CreateToolhelp32Snapshot(flags, pid) }
                .map_err(|e| Error::ModuleEnumerationFailed(e.to_string()))?;
            Ok(Self(handle))
        }
    }

    impl Drop for Snapshot {
        fn drop(&mut self) {
            // SAFETY: the handle came from CreateToolhelp32Snapshot and is closed once.
            let _ = unsafe { CloseHandle(self.0) };
        }
    }

    pub struct ProcessHandle {
        pub pid: u32,
        pub name: String,
        handle: HANDLE,
    }

    impl ProcessHandle {
        /// Find a running process by executable name and open it for reading
        pub fn find_and_open(name: &str) -> Result<Self> {
            let pid = find_pid(name)?;
            let mut process = Self::open(pid)?;
            process.name = name.to_string();
            Ok(process)
        }

        pub fn open(pid: u32) -> Result<Self> {
            // SAFETY: plain FFI call; the handle is owned by the returned value.
            let handle =
                unsafe { OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid) }
                    .map_err(|e| Error::ProcessOpenFailed(format!("pid {}: {}", pid, e)))?;
            debug!("Opened process {} for reading", pid);
            Ok(Self {
                pid,
                name: String::new(),
                handle,
            })
        }

        pub fn info(&self) -> ProcessInfo {
            ProcessInfo {
                pid: self.pid,
                name: self.name.clone(),
            }
        }

        /// Modules currently loaded in the process, including 32-bit ones
        pub fn modules(&self) -> Result<Vec<LoadedModule>> {
            let snapshot = Snapshot::new(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, self.pid)?;
            let mut entry = MODULEENTRY32W {
                dwSize: size_of::<MODULEENTRY32W>() as u32,
                ..Default::default()
            };

            let mut modules = Vec::new();
            // SAFETY: `entry` is a correctly sized MODULEENTRY32W owned by this frame.
            let mut next = unsafe { Module32FirstW(snapshot.0, &mut entry) };
            while next.is_ok() {
                modules.push(LoadedModule::new(
                    wide_to_string(&entry.szModule),
                    entry.modBaseAddr as u64,
                    entry.modBaseSize as u64,
                ));
                // SAFETY: as above.
                next = unsafe { Module32NextW(snapshot.0, &mut entry) };
            }

            if modules.is_empty() {
                return Err(Error::ModuleEnumerationFailed(format!(
                    "no modules reported for pid {}",
                    self.pid
                )));
            }
            info!("Process {} has {} loaded modules", self.pid, modules.len());
            Ok(modules)
        }
    }

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            // SAFETY: the handle came from OpenProcess and is closed once.
            let _ = unsafe { CloseHandle(self.handle) };
        }
    }

    fn find_pid(name: &str) -> Result<u32> {
        let snapshot = Snapshot::new(TH32CS_SNAPPROCESS, 0)?;
        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        // SAFETY: `entry` is a correctly sized PROCESSENTRY32W owned by this frame.
        let mut next = unsafe { Process32FirstW(snapshot.0, &mut entry) };
        while next.is_ok() {
            if name_matches(&wide_to_string(&entry.szExeFile), name) {
                return Ok(entry.th32ProcessID);
            }
            // SAFETY: as above.
            next = unsafe { Process32NextW(snapshot.0, &mut entry) };
        }

        Err(Error::ProcessNotFound(name.to_string()))
    }

    fn protection(flags: PAGE_PROTECTION_FLAGS) -> (bool, bool) {
        let has = |f: PAGE_PROTECTION_FLAGS| flags.0 & f.0 != 0;
        if has(PAGE_NOACCESS) || has(PAGE_GUARD) {
            return (false, false);
        }
        let executable = has(PAGE_EXECUTE)
            || has(PAGE_EXECUTE_READ)
            || has(PAGE_EXECUTE_READWRITE)
            || has(PAGE_EXECUTE_WRITECOPY);
        // PAGE_EXECUTE alone is not readable through ReadProcessMemory
        let readable = has(PAGE_READONLY)
            || has(PAGE_READWRITE)
            || has(PAGE_WRITECOPY)
            || has(PAGE_EXECUTE_READ)
            || has(PAGE_EXECUTE_READWRITE)
            || has(PAGE_EXECUTE_WRITECOPY);
        (readable, executable)
    }

    impl ReadMemory for MemoryReader<'_> {
        fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; size];
            let mut bytes_read = 0usize;
            // SAFETY: `buffer` holds `size` writable bytes for the duration of the call.
            unsafe {
                ReadProcessMemory(
                    self.process.handle,
                    address as *const c_void,
                    buffer.as_mut_ptr() as *mut c_void,
                    size,
                    Some(&mut bytes_read),
                )
            }
            .map_err(|e| Error::MemoryReadFailed {
                address,
                message: e.to_string(),
            })?;
            buffer.truncate(bytes_read);
            Ok(buffer)
        }

        fn regions(&self, base: u64, size: u64) -> Result<Vec<RegionInfo>> {
            let end = base.saturating_add(size);
            let mut regions = Vec::new();
            let mut addr = base;

            while addr < end {
                let mut mbi = MEMORY_BASIC_INFORMATION::default();
                // SAFETY: `mbi` is a correctly sized out-parameter owned by this frame.
                let written = unsafe {
                    VirtualQueryEx(
                        self.process.handle,
                        Some(addr as *const c_void),
                        &mut mbi,
                        size_of::<MEMORY_BASIC_INFORMATION>(),
                    )
                };
                if written == 0 || mbi.RegionSize == 0 {
                    debug!("VirtualQueryEx stopped at 0x{:X}", addr);
                    break;
                }

                let region_base = mbi.BaseAddress as u64;
                let region_end = region_base.saturating_add(mbi.RegionSize as u64);
                let (readable, executable) = if mbi.State == MEM_COMMIT {
                    protection(mbi.Protect)
                } else {
                    (false, false)
                };
                regions.push(RegionInfo {
                    base: region_base.max(addr),
                    size: region_end.min(end) - region_base.max(addr),
                    readable,
                    executable,
                });
                addr = region_end;
            }

            Ok(regions)
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod unsupported {
    use super::*;
    use crate::memory::ReadMemory;

    /// Placeholder so the API compiles off Windows; every constructor fails
    pub struct ProcessHandle {
        pub pid: u32,
        pub name: String,
    }

    impl ProcessHandle {
        pub fn find_and_open(name: &str) -> Result<Self> {
            Err(Error::Unsupported(format!(
                "attaching to '{}' requires Windows",
                name
            )))
        }

        pub fn open(pid: u32) -> Result<Self> {
            Err(Error::Unsupported(format!(
                "attaching to pid {} requires Windows",
                pid
            )))
        }

        pub fn info(&self) -> ProcessInfo {
            ProcessInfo {
                pid: self.pid,
                name: self.name.clone(),
            }
        }

        pub fn modules(&self) -> Result<Vec<LoadedModule>> {
            Err(Error::Unsupported("module enumeration requires Windows".to_string()))
        }
    }

    impl ReadMemory for MemoryReader<'_> {
        fn read_bytes(&self, address: u64, _size: usize) -> Result<Vec<u8>> {
            Err(Error::MemoryReadFailed {
                address,
                message: "process memory access requires Windows".to_string(),
            })
        }
    }
}
