//! The explicit backend handle.
//!
//! One `Backend` wraps one loaded copy of the native code generator: the
//! dynamic library plus its resolved entry points. It is constructed once
//! at startup and passed by reference to whatever needs to compile; there
//! is no ambient global state.

use std::ffi::{c_void, CStr, CString};
use std::path::Path;
use std::ptr::NonNull;

use libloading::Library;

use crate::error::Error;

pub(crate) mod ffi;

use ffi::{Api, RawResult};

/// File artifact kinds `compile_to_file` can produce, in the backend's
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Textual assembler.
    Assembler,
    /// A relocatable object file.
    ObjectFile,
    /// A platform shared library.
    DynamicLibrary,
    /// A linked executable.
    Executable,
}

/// A loaded native code generator.
pub struct Backend {
    api: Api,
    _lib: Library,
}

fn default_library_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "/opt/homebrew/lib/gcc/current/libgccjit.0.dylib"
    } else if cfg!(target_os = "windows") {
        "libgccjit-0.dll"
    } else {
        "libgccjit.so.0"
    }
}

impl Backend {
    /// Loads the backend under its platform soname.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(Path::new(default_library_name()))
    }

    /// Loads the backend from an explicit library path. Every entry point
    /// is resolved eagerly; a missing symbol fails the load.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let lib = unsafe { Library::new(path) }?;
        let api = Api::load(&lib)?;
        tracing::debug!("loaded native backend from {}", path.display());
        Ok(Self { api, _lib: lib })
    }

    /// The backend's (major, minor, patchlevel) version.
    pub fn version(&self) -> (u32, u32, u32) {
        unsafe {
            (
                (self.api.version_major)() as u32,
                (self.api.version_minor)() as u32,
                (self.api.version_patchlevel)() as u32,
            )
        }
    }

    pub(crate) fn api(&self) -> &Api {
        &self.api
    }
}

/// The artifact of a successful in-memory compilation. Owns the compiled
/// code's addressability; dropped exactly once, after which no pointer
/// resolved from it may be invoked.
pub struct CompiledUnit<'b> {
    backend: &'b Backend,
    raw: NonNull<RawResult>,
}

impl<'b> CompiledUnit<'b> {
    pub(crate) fn from_raw(backend: &'b Backend, raw: NonNull<RawResult>) -> Self {
        Self { backend, raw }
    }

    /// Resolves an exported function by name to its executable address.
    /// Transmuting the pointer to the matching `extern "C"` signature and
    /// calling it is the caller's `unsafe` responsibility, and only sound
    /// while this unit is alive.
    pub fn code(&self, name: &str) -> Result<NonNull<c_void>, Error> {
        let cname = CString::new(name).map_err(|_| Error::Nul {
            what: "symbol name",
        })?;
        let ptr = unsafe { (self.backend.api().result_get_code)(self.raw.as_ptr(), cname.as_ptr()) };
        NonNull::new(ptr).ok_or_else(|| Error::SymbolNotFound {
            name: name.to_owned(),
        })
    }

    /// Explicit release; dropping does the same.
    pub fn release(self) {}
}

impl std::fmt::Debug for CompiledUnit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

impl Drop for CompiledUnit<'_> {
    fn drop(&mut self) {
        unsafe { (self.backend.api().result_release)(self.raw.as_ptr()) }
    }
}

pub(crate) fn error_text(text: *const std::os::raw::c_char) -> String {
    if text.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(text) }
            .to_string_lossy()
            .into_owned()
    }
}
