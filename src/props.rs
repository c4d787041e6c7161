use std::{fmt, io};

#[cfg(test)]
use std::{collections::HashMap, sync::Mutex};

use crate::config::MODE_PROP;

/// Failure of one privileged round trip: the elevation binary could not be
/// started, a stream broke mid-session, or the process could not be awaited.
#[derive(Debug)]
pub enum InvocationError {
    Spawn(io::Error),
    Stream(io::Error),
    Wait(io::Error),
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationError::Spawn(e) => write!(f, "failed to start privileged shell: {}", e),
            InvocationError::Stream(e) => write!(f, "privileged shell i/o failed: {}", e),
            InvocationError::Wait(e) => write!(f, "failed to await privileged shell: {}", e),
        }
    }
}

impl std::error::Error for InvocationError {}

/// Key-value access to the OS property store. The privileged-shell backend
/// is the production one; `MemoryStore` stands in for it in tests.
pub trait PropertyStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, InvocationError>;
    fn write(&self, key: &str, value: &str) -> Result<(), InvocationError>;
}

/// Plain in-process map standing in for the device property store. Unset
/// and empty values both read back as absent, matching getprop output for
/// a missing key.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    props: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl PropertyStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, InvocationError> {
        let props = self.props.lock().unwrap();
        Ok(props.get(key).filter(|v| !v.is_empty()).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), InvocationError> {
        let mut props = self.props.lock().unwrap();
        props.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Best-effort read of the persisted mode. Errors are logged and collapse
/// to absent; callers fall back to the configured default.
pub fn read_mode(store: &dyn PropertyStore) -> Option<String> {
    match store.read(MODE_PROP) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("PROP: read {} failed ({})", MODE_PROP, e);
            None
        }
    }
}

/// Persist a new mode value. The store accepts any string; keeping the
/// value inside the three-mode set is the caller's job.
pub fn write_mode(store: &dyn PropertyStore, value: &str) -> Result<(), InvocationError> {
    store.write(MODE_PROP, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Mode;

    /// Store double whose channel never comes up.
    struct DownStore;

    impl PropertyStore for DownStore {
        fn read(&self, _key: &str) -> Result<Option<String>, InvocationError> {
            Err(InvocationError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                "su: not found",
            )))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), InvocationError> {
            Err(InvocationError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                "su: not found",
            )))
        }
    }

    #[test]
    fn round_trips_every_valid_mode() {
        let store = MemoryStore::new();
        for mode in Mode::ALL {
            write_mode(&store, mode.as_str()).unwrap();
            assert_eq!(read_mode(&store).as_deref(), Some(mode.as_str()));
        }
    }

    #[test]
    fn absent_when_never_set() {
        let store = MemoryStore::new();
        assert_eq!(read_mode(&store), None);
    }

    #[test]
    fn empty_value_reads_back_absent() {
        let store = MemoryStore::new();
        store.write(MODE_PROP, "").unwrap();
        assert_eq!(read_mode(&store), None);
    }

    #[test]
    fn repeated_reads_are_idempotent() {
        let store = MemoryStore::new();
        write_mode(&store, "efficiency").unwrap();
        assert_eq!(read_mode(&store).as_deref(), Some("efficiency"));
        assert_eq!(read_mode(&store).as_deref(), Some("efficiency"));
    }

    #[test]
    fn last_write_wins() {
        let store = MemoryStore::new();
        for value in ["benchmark", "efficiency", "advertised"] {
            write_mode(&store, value).unwrap();
        }
        assert_eq!(read_mode(&store).as_deref(), Some("advertised"));
    }

    #[test]
    fn read_swallows_invocation_errors() {
        assert_eq!(read_mode(&DownStore), None);
    }

    #[test]
    fn write_surfaces_invocation_errors() {
        assert!(write_mode(&DownStore, "benchmark").is_err());
    }
}
